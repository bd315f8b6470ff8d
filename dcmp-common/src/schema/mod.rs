//! Composition schema model
//!
//! Typed definitions for the Plan (song blueprint) and Track (one instrument's
//! notated part) exchanged with the generation service and the host bridge.
//!
//! Every type deserializes through [`validation::validate`], so values coming
//! from the generation service and values coming from command request bodies
//! are checked by the same rules. Serialization uses the wire field names
//! (`songInfo`, `timeSignature`, `is_drum`, ...).

pub mod notation;
pub mod validation;

pub use notation::NotationWarning;
pub use validation::{
    validate, FieldWalker, Schema, SchemaEnum, ValidationError, Violation, ViolationKind,
};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Song-level metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "Value")]
pub struct SongInfo {
    pub title: String,
    pub mood: Vec<String>,
    pub genre: String,
    /// Quarter-note pulses per minute
    pub bpm: u32,
    pub key: String,
    /// "N/M" form, e.g. "6/8"
    pub time_signature: String,
    pub duration_seconds: u32,
}

impl SongInfo {
    /// Length of one bar measured in quarter notes
    ///
    /// Returns `None` when the time signature is not in "N/M" form.
    pub fn quarter_notes_per_bar(&self) -> Option<f64> {
        let (beats, unit) = self.time_signature.trim().split_once('/')?;
        let beats: u32 = beats.trim().parse().ok()?;
        let unit: u32 = unit.trim().parse().ok()?;
        if beats == 0 || unit == 0 {
            return None;
        }
        Some(f64::from(beats) * 4.0 / f64::from(unit))
    }

    /// Playing time of `bars` bars at this tempo and meter
    pub fn estimated_duration_seconds(&self, bars: u64) -> Option<f64> {
        let per_bar = self.quarter_notes_per_bar()?;
        Some(bars as f64 * per_bar * 60.0 / f64::from(self.bpm))
    }
}

impl Schema for SongInfo {
    const SHAPE: &'static str = "SongInfo";

    fn read(walker: &mut FieldWalker, value: &Value) -> Option<Self> {
        let obj = walker.object(value)?;
        let title = walker.string(obj, "title");
        let mood = walker.string_list(obj, "mood");
        let genre = walker.string(obj, "genre");
        let bpm = walker.positive_int(obj, "bpm");
        let key = walker.string(obj, "key");
        let time_signature = walker.string(obj, "timeSignature");
        let duration_seconds = walker.positive_int(obj, "durationSeconds");

        Some(SongInfo {
            title: title?,
            mood: mood?,
            genre: genre?,
            bpm: bpm?,
            key: key?,
            time_signature: time_signature?,
            duration_seconds: duration_seconds?,
        })
    }
}

/// Generation progress of one instrument, advanced by the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentStatus {
    #[default]
    Pending,
    Generating,
    Generated,
}

impl SchemaEnum for InstrumentStatus {
    const ALLOWED: &'static [&'static str] = &["pending", "generating", "generated"];

    fn from_literal(literal: &str) -> Option<Self> {
        match literal {
            "pending" => Some(Self::Pending),
            "generating" => Some(Self::Generating),
            "generated" => Some(Self::Generated),
            _ => None,
        }
    }
}

/// One entry of a Plan's instrumentation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "Value")]
pub struct Instrument {
    pub instrument_name: String,
    /// General-MIDI program number
    pub midi_program: u8,
    pub role: String,
    #[serde(rename = "is_drum", skip_serializing_if = "Option::is_none")]
    pub is_drum: Option<bool>,
    pub status: InstrumentStatus,
}

impl Instrument {
    pub fn is_percussion(&self) -> bool {
        self.is_drum.unwrap_or(false)
    }
}

impl Schema for Instrument {
    const SHAPE: &'static str = "Instrument";

    fn read(walker: &mut FieldWalker, value: &Value) -> Option<Self> {
        let obj = walker.object(value)?;
        let instrument_name = walker.string(obj, "instrumentName");
        let midi_program = walker.midi_program(obj, "midiProgram");
        let role = walker.string(obj, "role");
        let is_drum = walker.optional_bool(obj, "is_drum");
        let status = walker.enumerated_or(obj, "status", InstrumentStatus::Pending);

        Some(Instrument {
            instrument_name: instrument_name?,
            midi_program: midi_program?,
            role: role?,
            is_drum: is_drum?,
            status: status?,
        })
    }
}

/// One section of the song structure (Intro, Verse 1, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value")]
pub struct SongSection {
    pub section: String,
    pub bars: u32,
    /// Guidance for the generation service
    pub description: String,
}

impl Schema for SongSection {
    const SHAPE: &'static str = "SongSection";

    fn read(walker: &mut FieldWalker, value: &Value) -> Option<Self> {
        let obj = walker.object(value)?;
        let section = walker.string(obj, "section");
        let bars = walker.positive_int(obj, "bars");
        let description = walker.string(obj, "description");

        Some(SongSection {
            section: section?,
            bars: bars?,
            description: description?,
        })
    }
}

/// Structured composition blueprint
///
/// Plans are never edited in place: a revision is a new `Plan` value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "Value")]
pub struct Plan {
    pub song_info: SongInfo,
    pub instrumentation: Vec<Instrument>,
    /// Ordered in musical sequence
    pub song_structure: Vec<SongSection>,
}

impl Plan {
    /// First instrument entry with the given name
    pub fn instrument(&self, name: &str) -> Option<&Instrument> {
        self.instrumentation
            .iter()
            .find(|i| i.instrument_name == name)
    }

    /// Sum of bars across all sections
    pub fn total_bars(&self) -> u64 {
        self.song_structure.iter().map(|s| u64::from(s.bars)).sum()
    }

    /// Playing time implied by the section lengths, tempo and meter
    pub fn estimated_duration_seconds(&self) -> Option<f64> {
        self.song_info.estimated_duration_seconds(self.total_bars())
    }

    /// Next instrument still waiting for its Track, in instrumentation order
    pub fn next_pending_instrument(&self) -> Option<&Instrument> {
        self.instrumentation
            .iter()
            .find(|i| i.status == InstrumentStatus::Pending)
    }

    /// Copy of this plan with every instrument named `name` set to `status`
    pub fn with_instrument_status(&self, name: &str, status: InstrumentStatus) -> Plan {
        let mut revised = self.clone();
        for instrument in revised
            .instrumentation
            .iter_mut()
            .filter(|i| i.instrument_name == name)
        {
            instrument.status = status;
        }
        revised
    }
}

impl Schema for Plan {
    const SHAPE: &'static str = "Plan";

    fn read(walker: &mut FieldWalker, value: &Value) -> Option<Self> {
        let obj = walker.object(value)?;
        let song_info = walker.nested(obj, "songInfo");
        let instrumentation = walker.nested_list(obj, "instrumentation");
        let song_structure = walker.nested_list(obj, "songStructure");

        Some(Plan {
            song_info: song_info?,
            instrumentation: instrumentation?,
            song_structure: song_structure?,
        })
    }
}

/// Staff clef of a Track; there is deliberately no percussion clef
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Clef {
    Treble,
    Bass,
    Alto,
    Tenor,
}

impl SchemaEnum for Clef {
    const ALLOWED: &'static [&'static str] = &["treble", "bass", "alto", "tenor"];

    fn from_literal(literal: &str) -> Option<Self> {
        match literal {
            "treble" => Some(Self::Treble),
            "bass" => Some(Self::Bass),
            "alto" => Some(Self::Alto),
            "tenor" => Some(Self::Tenor),
            _ => None,
        }
    }
}

/// One instrument's complete notated part
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "Value")]
pub struct Track {
    pub instrument_name: String,
    pub midi_program: u8,
    pub clef: Clef,
    /// Full ABC notation body for the part
    pub abc_notes: String,
}

impl Track {
    /// Whether name and MIDI program agree with the originating instrument
    pub fn matches_instrument(&self, instrument: &Instrument) -> bool {
        self.instrument_name == instrument.instrument_name
            && self.midi_program == instrument.midi_program
    }

    /// Advisory findings about the notation body; never rejects the Track
    pub fn notation_warnings(&self) -> Vec<NotationWarning> {
        notation::lint(&self.abc_notes)
    }
}

impl Schema for Track {
    const SHAPE: &'static str = "Track";

    fn read(walker: &mut FieldWalker, value: &Value) -> Option<Self> {
        let obj = walker.object(value)?;
        let instrument_name = walker.string(obj, "instrumentName");
        let midi_program = walker.midi_program(obj, "midiProgram");
        let clef = walker.enumerated(obj, "clef");
        let abc_notes = walker.string(obj, "abcNotes");

        Some(Track {
            instrument_name: instrument_name?,
            midi_program: midi_program?,
            clef: clef?,
            abc_notes: abc_notes?,
        })
    }
}

macro_rules! impl_try_from_value {
    ($($ty:ty),*) => {
        $(
            impl TryFrom<Value> for $ty {
                type Error = ValidationError;

                fn try_from(value: Value) -> Result<Self, Self::Error> {
                    validate(&value)
                }
            }
        )*
    };
}

impl_try_from_value!(SongInfo, Instrument, SongSection, Plan, Track);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_plan_value() -> Value {
        json!({
            "songInfo": {
                "title": "Echoes in the Rain",
                "mood": ["sad", "reflective"],
                "genre": "ballad",
                "bpm": 70,
                "key": "C Minor",
                "timeSignature": "4/4",
                "durationSeconds": 90
            },
            "instrumentation": [
                {"instrumentName": "Acoustic Grand Piano", "midiProgram": 0, "role": "melody and harmony", "status": "generated"},
                {"instrumentName": "Violin", "midiProgram": 40, "role": "counter melody", "status": "pending"},
                {"instrumentName": "Drums", "midiProgram": 0, "role": "minimal pulse", "is_drum": true, "status": "pending"}
            ],
            "songStructure": [
                {"section": "Intro", "bars": 4, "description": "sparse piano arpeggios"},
                {"section": "Verse 1", "bars": 8, "description": "block chords"},
                {"section": "Outro", "bars": 4, "description": "fade out"}
            ]
        })
    }

    #[test]
    fn test_plan_round_trip_preserves_fields() {
        let raw = sample_plan_value();
        let plan: Plan = validate(&raw).unwrap();

        assert_eq!(serde_json::to_value(&plan).unwrap(), raw);
    }

    #[test]
    fn test_missing_song_info_is_named() {
        let err = validate::<Plan>(&json!({"instrumentation": [], "songStructure": []})).unwrap_err();

        assert_eq!(err.shape(), "Plan");
        assert_eq!(err.paths(), vec!["songInfo"]);
        assert!(matches!(
            err.violations()[0].kind,
            ViolationKind::Missing { .. }
        ));
    }

    #[test]
    fn test_status_defaults_to_pending() {
        let instrument: Instrument = validate(&json!({
            "instrumentName": "Cello",
            "midiProgram": 42,
            "role": "bass line"
        }))
        .unwrap();

        assert_eq!(instrument.status, InstrumentStatus::Pending);
        assert_eq!(instrument.is_drum, None);
        assert!(!instrument.is_percussion());

        let serialized = serde_json::to_value(&instrument).unwrap();
        assert_eq!(serialized["status"], "pending");
        assert!(serialized.get("is_drum").is_none());
    }

    #[test]
    fn test_unknown_status_rejected() {
        let err = validate::<Instrument>(&json!({
            "instrumentName": "Cello",
            "midiProgram": 42,
            "role": "bass line",
            "status": "done"
        }))
        .unwrap_err();

        assert_eq!(err.paths(), vec!["status"]);
        assert!(err.to_string().contains("'done' is not one of [pending, generating, generated]"));
    }

    #[test]
    fn test_percussion_clef_rejected() {
        let err = validate::<Track>(&json!({
            "instrumentName": "Drums",
            "midiProgram": 0,
            "clef": "percussion",
            "abcNotes": "K:perc\nC,,2 D,,2|"
        }))
        .unwrap_err();

        assert_eq!(err.paths(), vec!["clef"]);
    }

    #[test]
    fn test_all_clefs_accepted() {
        for literal in Clef::ALLOWED {
            let track: Track = validate(&json!({
                "instrumentName": "Viola",
                "midiProgram": 41,
                "clef": literal,
                "abcNotes": "A B c d|"
            }))
            .unwrap();
            assert_eq!(serde_json::to_value(track.clef).unwrap(), json!(literal));
        }
    }

    #[test]
    fn test_nested_violations_carry_full_path() {
        let mut raw = sample_plan_value();
        raw["instrumentation"][2]["midiProgram"] = json!(200);
        raw["songStructure"][1]["bars"] = json!(0);
        raw["songInfo"]["mood"] = json!("sad");

        let err = validate::<Plan>(&raw).unwrap_err();

        assert_eq!(
            err.paths(),
            vec![
                "songInfo.mood",
                "instrumentation[2].midiProgram",
                "songStructure[1].bars"
            ]
        );
    }

    #[test]
    fn test_deserialize_runs_validation() {
        let err = serde_json::from_value::<Track>(json!({
            "instrumentName": "Bass",
            "midiProgram": 33,
            "clef": "perc",
            "abcNotes": ""
        }))
        .unwrap_err();
        assert!(err.to_string().contains("clef"));

        let plan: Plan = serde_json::from_value(sample_plan_value()).unwrap();
        assert_eq!(plan.instrumentation.len(), 3);
    }

    #[test]
    fn test_plan_helpers() {
        let plan: Plan = validate(&sample_plan_value()).unwrap();

        assert_eq!(plan.total_bars(), 16);
        // 16 bars of 4/4 at 70 bpm
        let estimate = plan.estimated_duration_seconds().unwrap();
        assert!((estimate - 54.857).abs() < 0.01);

        assert_eq!(plan.next_pending_instrument().unwrap().instrument_name, "Violin");
        assert_eq!(plan.instrument("Drums").unwrap().midi_program, 0);
        assert!(plan.instrument("Tuba").is_none());

        let revised = plan.with_instrument_status("Violin", InstrumentStatus::Generated);
        assert_eq!(revised.next_pending_instrument().unwrap().instrument_name, "Drums");
        // Original value is untouched
        assert_eq!(plan.instrument("Violin").unwrap().status, InstrumentStatus::Pending);
    }

    #[test]
    fn test_compound_meter_converts_to_quarter_notes() {
        let mut info: SongInfo = validate(&sample_plan_value()["songInfo"]).unwrap();
        info.time_signature = "6/8".to_string();
        assert_eq!(info.quarter_notes_per_bar(), Some(3.0));

        info.time_signature = "common".to_string();
        assert_eq!(info.quarter_notes_per_bar(), None);
        assert_eq!(info.estimated_duration_seconds(8), None);
    }

    #[test]
    fn test_track_matches_instrument() {
        let plan: Plan = validate(&sample_plan_value()).unwrap();
        let violin = plan.instrument("Violin").unwrap();
        let mut track = Track {
            instrument_name: "Violin".to_string(),
            midi_program: 40,
            clef: Clef::Treble,
            abc_notes: "A2 B2|".to_string(),
        };
        assert!(track.matches_instrument(violin));

        track.midi_program = 41;
        assert!(!track.matches_instrument(violin));
    }
}
