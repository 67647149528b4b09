use crate::catalog::{Gesture, GestureMetadata};

use serde_json::Value;

/// Letters of the Libras manual alphabet.
const LIBRAS_LETTERS: [char; 26] = [
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S',
    'T', 'U', 'V', 'W', 'X', 'Y', 'Z',
];

/// Letters signed with movement rather than a static hand shape.
const MOTION_LETTERS: [char; 5] = ['H', 'J', 'K', 'X', 'Z'];

/// The fixed catalog compiled into the binary.
pub(crate) fn builtin_gestures() -> Vec<Gesture> {
    LIBRAS_LETTERS
        .iter()
        .map(|&letter| {
            let mut metadata = GestureMetadata::new();
            metadata.insert("source".to_string(), Value::from("libras"));
            metadata.insert(
                "motion".to_string(),
                Value::from(MOTION_LETTERS.contains(&letter)),
            );

            Gesture {
                name: letter.to_string(),
                metadata,
            }
        })
        .collect()
}
