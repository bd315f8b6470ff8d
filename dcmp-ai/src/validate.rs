//! Validator: structural value → schema types
//!
//! Thin entry points over the schema model so the pipeline stages read
//! extract → validate. Every violated rule is reported, not just the first.

use serde_json::Value;

use dcmp_common::schema::validate;
use dcmp_common::{Plan, Track, ValidationError};

pub fn to_plan(value: &Value) -> Result<Plan, ValidationError> {
    validate(value)
}

pub fn to_track(value: &Value) -> Result<Track, ValidationError> {
    validate(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract;
    use dcmp_common::{Clef, ViolationKind};
    use serde_json::json;

    #[test]
    fn test_plan_from_fenced_output() {
        let raw = r#"```json
{
  "songInfo": {"title": "T", "mood": [], "genre": "g", "bpm": 100, "key": "C", "timeSignature": "4/4", "durationSeconds": 30},
  "instrumentation": [{"instrumentName": "Piano", "midiProgram": 0, "role": "all"}],
  "songStructure": [{"section": "A", "bars": 12, "description": "d"}]
}
```"#;
        let plan = to_plan(&extract(raw).unwrap()).unwrap();

        assert_eq!(plan.song_info.duration_seconds, 30);
        assert_eq!(plan.song_structure[0].bars, 12);
    }

    #[test]
    fn test_track_reports_every_violation() {
        let err = to_track(&json!({
            "instrumentName": 7,
            "clef": "percussion",
            "abcNotes": "K:perc"
        }))
        .unwrap_err();

        assert_eq!(err.paths(), vec!["instrumentName", "midiProgram", "clef"]);
        assert!(matches!(
            err.violations()[2].kind,
            ViolationKind::NotInEnum { .. }
        ));
    }

    #[test]
    fn test_track_extra_fields_ignored() {
        let track = to_track(&json!({
            "instrumentName": "Bass",
            "midiProgram": 33,
            "clef": "bass",
            "abcNotes": "K:E\nE,2 B,,2|",
            "comment": "walking line"
        }))
        .unwrap();

        assert_eq!(track.clef, Clef::Bass);
        assert!(serde_json::to_value(&track).unwrap().get("comment").is_none());
    }
}
