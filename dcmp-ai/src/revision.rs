//! Identity check for revised plans
//!
//! When a plan is regenerated after some tracks exist, those instruments must
//! keep their name, role and MIDI program, and be marked generated. The prompt
//! asks for this; this module checks what actually came back.

use std::collections::HashSet;
use std::fmt;

use dcmp_common::{InstrumentStatus, Plan, Track};

/// One way a revised plan deviates from already-generated instruments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityDrift {
    /// Instrument no longer present in the revised instrumentation
    Missing { instrument: String },
    MidiProgram {
        instrument: String,
        before: u8,
        after: u8,
    },
    Role {
        instrument: String,
        before: String,
        after: String,
    },
    /// Instrument not marked as generated
    Status {
        instrument: String,
        status: InstrumentStatus,
    },
}

impl fmt::Display for IdentityDrift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityDrift::Missing { instrument } => {
                write!(f, "'{}' missing from instrumentation", instrument)
            }
            IdentityDrift::MidiProgram {
                instrument,
                before,
                after,
            } => write!(
                f,
                "'{}' midiProgram changed from {} to {}",
                instrument, before, after
            ),
            IdentityDrift::Role {
                instrument,
                before,
                after,
            } => write!(
                f,
                "'{}' role changed from '{}' to '{}'",
                instrument, before, after
            ),
            IdentityDrift::Status { instrument, status } => write!(
                f,
                "'{}' status is {:?}, expected Generated",
                instrument, status
            ),
        }
    }
}

/// Compare a revised plan against the instruments that already have tracks
///
/// Expected identity comes from the prior plan entry when there is one, and
/// from the track itself otherwise (role is only checked against a prior plan).
pub fn check_identity(
    prior_plan: Option<&Plan>,
    prior_tracks: &[Track],
    revised: &Plan,
) -> Vec<IdentityDrift> {
    let mut drifts = Vec::new();
    let mut seen = HashSet::new();

    for track in prior_tracks {
        let name = track.instrument_name.as_str();
        if !seen.insert(name) {
            continue;
        }

        let Some(after) = revised.instrument(name) else {
            drifts.push(IdentityDrift::Missing {
                instrument: name.to_string(),
            });
            continue;
        };
        let before = prior_plan.and_then(|p| p.instrument(name));

        let expected_program = before.map_or(track.midi_program, |b| b.midi_program);
        if after.midi_program != expected_program {
            drifts.push(IdentityDrift::MidiProgram {
                instrument: name.to_string(),
                before: expected_program,
                after: after.midi_program,
            });
        }

        if let Some(before) = before {
            if before.role != after.role {
                drifts.push(IdentityDrift::Role {
                    instrument: name.to_string(),
                    before: before.role.clone(),
                    after: after.role.clone(),
                });
            }
        }

        if after.status != InstrumentStatus::Generated {
            drifts.push(IdentityDrift::Status {
                instrument: name.to_string(),
                status: after.status,
            });
        }
    }

    drifts
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcmp_common::{Clef, Instrument, SongInfo};

    fn plan_with(instruments: Vec<Instrument>) -> Plan {
        Plan {
            song_info: SongInfo {
                title: "t".to_string(),
                mood: vec![],
                genre: "g".to_string(),
                bpm: 120,
                key: "C".to_string(),
                time_signature: "4/4".to_string(),
                duration_seconds: 60,
            },
            instrumentation: instruments,
            song_structure: vec![],
        }
    }

    fn instrument(name: &str, program: u8, role: &str, status: InstrumentStatus) -> Instrument {
        Instrument {
            instrument_name: name.to_string(),
            midi_program: program,
            role: role.to_string(),
            is_drum: None,
            status,
        }
    }

    fn track(name: &str, program: u8) -> Track {
        Track {
            instrument_name: name.to_string(),
            midi_program: program,
            clef: Clef::Treble,
            abc_notes: "C D E F|".to_string(),
        }
    }

    #[test]
    fn test_preserved_identity_has_no_drift() {
        let prior = plan_with(vec![instrument("Piano", 0, "lead", InstrumentStatus::Generated)]);
        let revised = plan_with(vec![
            instrument("Piano", 0, "lead", InstrumentStatus::Generated),
            instrument("Cello", 42, "bass", InstrumentStatus::Pending),
        ]);

        assert!(check_identity(Some(&prior), &[track("Piano", 0)], &revised).is_empty());
    }

    #[test]
    fn test_every_deviation_reported() {
        let prior = plan_with(vec![
            instrument("Piano", 0, "lead", InstrumentStatus::Generated),
            instrument("Violin", 40, "counter", InstrumentStatus::Generated),
        ]);
        let revised = plan_with(vec![instrument(
            "Piano",
            1,
            "accompaniment",
            InstrumentStatus::Pending,
        )]);

        let drifts = check_identity(
            Some(&prior),
            &[track("Piano", 0), track("Violin", 40)],
            &revised,
        );

        assert_eq!(
            drifts,
            vec![
                IdentityDrift::MidiProgram {
                    instrument: "Piano".to_string(),
                    before: 0,
                    after: 1
                },
                IdentityDrift::Role {
                    instrument: "Piano".to_string(),
                    before: "lead".to_string(),
                    after: "accompaniment".to_string()
                },
                IdentityDrift::Status {
                    instrument: "Piano".to_string(),
                    status: InstrumentStatus::Pending
                },
                IdentityDrift::Missing {
                    instrument: "Violin".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_track_program_used_without_prior_plan() {
        let revised = plan_with(vec![instrument("Bass", 34, "root", InstrumentStatus::Generated)]);

        let drifts = check_identity(None, &[track("Bass", 33), track("Bass", 33)], &revised);

        assert_eq!(drifts.len(), 1);
        assert_eq!(
            drifts[0].to_string(),
            "'Bass' midiProgram changed from 33 to 34"
        );
    }
}
