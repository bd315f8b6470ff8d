//! System prompt construction
//!
//! Pure functions of their inputs: no I/O, no shared state. The plan prompt
//! grows with the revision context (prior plan, already-generated tracks); the
//! track prompt embeds the full plan and every existing track so the service
//! can write a part that fits the arrangement.

use std::fmt::Write;

use dcmp_common::{Instrument, Plan, Track};

const PLAN_INSTRUCTIONS: &str = r#"# Role

You are an experienced music producer and composer. Analyse the user's song request and produce one complete, structured composition plan as JSON. The plan is the only blueprint later used to write every instrument's part in ABC notation.

# Workflow

1. **Read the request**: extract explicit requirements (BPM, key, instruments, duration) and the implied emotion ("sad", "driving", ...).
2. **Fill the gaps**: where the request is silent, choose key, BPM and time signature that suit the mood and genre. These values become the ABC header of every part.
3. **Design the structure**:
    * Choose sections (Intro, Verse, Chorus, Bridge, Outro, ...).
    * Give every section a bar count. The total bars multiplied by the length of one bar (from BPM and time signature) must roughly equal `durationSeconds`.
    * BPM always counts quarter notes per minute (70 BPM = 70 quarter notes per minute); convert for meters such as 6/8 yourself.
4. **Instrumentation**:
    * List every instrument used anywhere in the song.
    * Assign each a General MIDI program number (0-127); it is used for the `%%MIDI program` directive.
    * A drum kit must set `"is_drum": true`.
5. **Output**: reply with a single JSON object in exactly the shape below and nothing else.

# Output JSON example

```json
{
  "songInfo": {
    "title": "Echoes in the Rain",
    "mood": ["sad", "reflective", "quiet"],
    "genre": "pop ballad",
    "bpm": 70,
    "key": "C Minor",
    "timeSignature": "4/4",
    "durationSeconds": 90
  },
  "instrumentation": [
    {
      "instrumentName": "Acoustic Grand Piano",
      "midiProgram": 0,
      "role": "main melody and harmony"
    },
    {
      "instrumentName": "Violin",
      "midiProgram": 40,
      "role": "emotional counter melody"
    },
    {
      "instrumentName": "Drums",
      "midiProgram": 0,
      "role": "minimal rhythmic support",
      "is_drum": true
    }
  ],
  "songStructure": [
    {
      "section": "Intro",
      "bars": 4,
      "description": "Piano alone, sparse high arpeggios over Cm and Gm to set a quiet, sad mood."
    },
    {
      "section": "Verse 1",
      "bars": 8,
      "description": "Piano block chords (Cm - G - Ab - Eb). Violin enters in the last 4 bars with long roots and fifths."
    },
    {
      "section": "Chorus 1",
      "bars": 8,
      "description": "Energy lifts. Richer piano voicings, expressive violin line, drums enter with rimshots on beats 2 and 4."
    },
    {
      "section": "Outro",
      "bars": 4,
      "description": "Everything fades until a single piano note remains."
    }
  ]
}
```
"#;

const TRACK_INSTRUCTIONS: &str = r#"# Role

You are a creative session composer fluent in ABC notation. Write a part that is technically correct and also musical: rhythmic, expressive and aware of the rest of the arrangement.

# Musical techniques

* **Rhythm**: use syncopation, varied note values (whole to sixteenth notes, triplets), dotted notes and rests (`z`) to give the part breath and tension.
* **Melody and harmony**: shape lines with contour; favour chord tones with tasteful passing and neighbour notes; use arpeggios where they fit.
* **Structure**: develop a short motif across sections, answer the other parts in CONTEXT_TRACKS (call and response), and follow each section's description for density and intensity.

# Workflow

1. **Internalise the plan**: understand the mood, style and energy of MUSICAL_PLAN and the job of each section.
2. **Listen to the context**: study CONTEXT_TRACKS. Decide whether this part contrasts with them or blends in.
3. **Decide the idea first**: settle on a concrete role and playing style for this instrument before writing notes.
4. **Write the ABC notation**:
    * Avoid monotonous, repeated rhythms unless the plan asks for them.
    * Write the body only. Do **not** include the fixed tune headers `X:`, `T:`, `C:`, `Z:`, `N:`, `P:`, `W:`.
    * The variable headers `K:`, `M:`, `L:`, `Q:` may be used and changed inside the body.
    * Do **not** write `V:` voice declarations or clef directives; the clef goes in the JSON `clef` field, which must be one of `"treble"`, `"bass"`, `"alto"`, `"tenor"`. Drum parts use `"bass"`.
    * Keep lines contiguous: **no blank lines**.
    * Mark sections with a comment line `% <Section Name>` (for example `% Verse 1`).
    * For an instrument with `is_drum: true`, use `K:perc` and the pitch mapping in the appendix.
5. **Format the output**: reply with a single JSON object in the shape shown at the end and nothing else.
"#;

const DRUM_PITCH_TABLE: &str = r#"# Appendix: drum pitch reference

Drum parts **must** use the ABC pitch listed for each kit piece (General MIDI percussion map as used by abcjs). For pieces not listed, follow the General MIDI percussion standard.

| Kit piece | ABC pitch | GM note |
| :--- | :--- | :--- |
| Acoustic Bass Drum | `C,,` | 36 |
| Side Stick | `_D,,` | 37 |
| Acoustic Snare | `D,,` | 38 |
| Hand Clap | `_E,,` | 39 |
| Low Floor Tom | `G,,,` | 41 |
| Closed Hi-Hat | `^F,,` | 42 |
| Pedal Hi-Hat | `_G,,` | 44 |
| Open Hi-Hat | `_B,,` | 46 |
| Crash Cymbal 1 | `^c,` | 49 |
| High Tom | `d,` | 50 |
| Ride Cymbal 1 | `^d,` | 51 |
| Cowbell | `g,` | 56 |
"#;

const TRACK_OUTPUT_EXAMPLE: &str = r#"# Output JSON example

```json
{
  "instrumentName": "Acoustic Grand Piano",
  "midiProgram": 0,
  "clef": "treble",
  "abcNotes": "Q:1/4=120\nM:4/4\nL:1/8\nK:Am\n% Verse 1\n\"Am\" A,2 E,2 ^G,A, B,A, | \"G\" G,,2 D,2 F,G, A,G, | \"C\" C,2 G,,2 E,F, G,E, | \"F\" F,,A,, C,2 z2 C,E, |\n% Chorus 1\nL:1/16\n\"Am\" (cde).e (edc).B A2cB | \"G\" (Bcd).d (dcB).A G2BA | \"C\" (efg).g (gfe).d c2ge | \"F\" (fga).a (agf).e f2z2 |"
}
```
"#;

/// System prompt for plan generation
///
/// With a prior plan the service is asked to revise it; with prior tracks it
/// is told which instruments already have parts and must keep their identity.
pub fn build_plan_prompt(prior_plan: Option<&Plan>, prior_tracks: &[Track]) -> String {
    let mut prompt = String::from(PLAN_INSTRUCTIONS);

    if let Some(plan) = prior_plan {
        prompt.push_str("\n# Previously generated plan (revise this plan)\n\n");
        prompt.push_str(&to_pretty_json(plan));
        prompt.push('\n');
    }

    if !prior_tracks.is_empty() {
        let names: Vec<&str> = prior_tracks
            .iter()
            .map(|t| t.instrument_name.as_str())
            .collect();
        prompt.push_str("\n# Instruments that already have generated tracks\n\n");
        let _ = writeln!(prompt, "{}", to_pretty_json(&names));
        prompt.push_str(
            "\nFor each of these instruments you must keep `instrumentName`, `role` and \
             `midiProgram` exactly as in the previous plan, and set its `status` to \
             \"generated\".\n",
        );
    }

    prompt
}

/// System prompt for track generation
pub fn build_track_prompt(plan: &Plan, existing_tracks: &[Track], request: &str) -> String {
    let mut prompt = String::from(TRACK_INSTRUCTIONS);

    prompt.push_str("\n# Input\n\n## 1. MUSICAL_PLAN\n\n");
    prompt.push_str(&to_pretty_json(plan));
    prompt.push_str("\n\n## 2. CONTEXT_TRACKS\n\n");
    prompt.push_str(&to_pretty_json(&existing_tracks));
    prompt.push_str("\n\n## 3. CURRENT_REQUEST\n\n");
    prompt.push_str(request.trim());
    prompt.push_str("\n\n");
    prompt.push_str(DRUM_PITCH_TABLE);
    prompt.push('\n');
    prompt.push_str(TRACK_OUTPUT_EXAMPLE);

    prompt
}

/// Natural-language request naming the instrument whose track comes next
pub fn describe_track_request(instrument: &Instrument) -> String {
    let mut request = format!(
        "Generate the Track for \"{}\" (MIDI program {}, role: {}).",
        instrument.instrument_name, instrument.midi_program, instrument.role
    );
    if instrument.is_percussion() {
        request.push_str(" This is a drum kit (is_drum: true): follow the drum rules.");
    }
    let _ = write!(request, "\nInstrument entry: {}", to_compact_json(instrument));
    request
}

fn to_pretty_json<T: serde::Serialize + ?Sized>(value: &T) -> String {
    // Plan/Track serialization cannot fail: string keys, no non-finite floats
    serde_json::to_string_pretty(value).unwrap_or_default()
}

fn to_compact_json<T: serde::Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcmp_common::{Clef, InstrumentStatus, SongInfo, SongSection};

    fn sample_plan() -> Plan {
        Plan {
            song_info: SongInfo {
                title: "Morning Light".to_string(),
                mood: vec!["happy".to_string()],
                genre: "solo piano".to_string(),
                bpm: 96,
                key: "G Major".to_string(),
                time_signature: "3/4".to_string(),
                duration_seconds: 30,
            },
            instrumentation: vec![
                Instrument {
                    instrument_name: "Piano".to_string(),
                    midi_program: 0,
                    role: "everything".to_string(),
                    is_drum: None,
                    status: InstrumentStatus::Generated,
                },
                Instrument {
                    instrument_name: "Drums".to_string(),
                    midi_program: 0,
                    role: "light groove".to_string(),
                    is_drum: Some(true),
                    status: InstrumentStatus::Pending,
                },
            ],
            song_structure: vec![SongSection {
                section: "A".to_string(),
                bars: 12,
                description: "gentle waltz".to_string(),
            }],
        }
    }

    fn piano_track() -> Track {
        Track {
            instrument_name: "Piano".to_string(),
            midi_program: 0,
            clef: Clef::Treble,
            abc_notes: "K:G\nG2 B2 d2|".to_string(),
        }
    }

    #[test]
    fn test_plain_plan_prompt_is_base_only() {
        let prompt = build_plan_prompt(None, &[]);

        assert_eq!(prompt, PLAN_INSTRUCTIONS);
        assert!(prompt.contains("\"songStructure\""));
    }

    #[test]
    fn test_revision_prompt_includes_prior_plan() {
        let plan = sample_plan();
        let prompt = build_plan_prompt(Some(&plan), &[]);

        assert!(prompt.starts_with(PLAN_INSTRUCTIONS));
        assert!(prompt.contains("Previously generated plan"));
        assert!(prompt.contains("\"title\": \"Morning Light\""));
        assert!(!prompt.contains("already have generated tracks"));
    }

    #[test]
    fn test_prior_tracks_listed_with_identity_instruction() {
        let plan = sample_plan();
        let prompt = build_plan_prompt(Some(&plan), &[piano_track()]);

        assert!(prompt.contains("already have generated tracks"));
        assert!(prompt.contains("\"Piano\""));
        assert!(prompt.contains("keep `instrumentName`, `role` and `midiProgram`"));
        assert!(prompt.contains("\"generated\""));
    }

    #[test]
    fn test_prompts_are_deterministic() {
        let plan = sample_plan();
        let tracks = vec![piano_track()];
        assert_eq!(
            build_plan_prompt(Some(&plan), &tracks),
            build_plan_prompt(Some(&plan), &tracks)
        );
        assert_eq!(
            build_track_prompt(&plan, &tracks, "next"),
            build_track_prompt(&plan, &tracks, "next")
        );
    }

    #[test]
    fn test_track_prompt_embeds_plan_tracks_and_request() {
        let plan = sample_plan();
        let drums = plan.instrument("Drums").unwrap();
        let request = describe_track_request(drums);
        let prompt = build_track_prompt(&plan, &[piano_track()], &request);

        assert!(prompt.contains("\"timeSignature\": \"3/4\""));
        assert!(prompt.contains("G2 B2 d2|"));
        assert!(prompt.contains("Generate the Track for \"Drums\""));
        assert!(prompt.contains("| Acoustic Snare | `D,,` | 38 |"));
        assert!(prompt.contains("\"clef\": \"treble\""));
    }

    #[test]
    fn test_track_prompt_with_no_tracks_has_empty_context() {
        let prompt = build_track_prompt(&sample_plan(), &[], "Generate the Piano part");
        assert!(prompt.contains("## 2. CONTEXT_TRACKS\n\n[]"));
    }

    #[test]
    fn test_describe_request_for_melodic_instrument() {
        let plan = sample_plan();
        let request = describe_track_request(plan.instrument("Piano").unwrap());

        assert!(request.contains("MIDI program 0"));
        assert!(!request.contains("drum kit"));
        assert!(request.contains("\"instrumentName\":\"Piano\""));
    }
}
