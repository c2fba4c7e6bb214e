//! Exercise type vocabulary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The fixed exercise vocabulary sent to the backend.
///
/// Source stores identify exercise kinds with integer codes; anything
/// outside this vocabulary maps to [`ExerciseType::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExerciseType {
    /// Outdoor running.
    Running,
    /// Walking.
    Walking,
    /// Hiking.
    Hiking,
    /// Cycling.
    Biking,
    /// Pool swimming.
    SwimmingPool,
    /// Open-water swimming.
    SwimmingOpenWater,
    /// Strength training.
    StrengthTraining,
    /// Weightlifting.
    Weightlifting,
    /// High-intensity interval training.
    Hiit,
    /// Elliptical trainer.
    Elliptical,
    /// Rowing machine.
    RowingMachine,
    /// Stair climbing.
    StairClimbing,
    /// Treadmill running.
    Treadmill,
    /// Yoga.
    Yoga,
    /// Pilates.
    Pilates,
    /// Skiing.
    Skiing,
    /// Tennis.
    Tennis,
    /// Golf.
    Golf,
    /// Rock climbing.
    RockClimbing,
    /// Generic workout.
    Workout,
    /// Anything not covered above.
    #[serde(other)]
    Other,
}

impl ExerciseType {
    /// Maps a source exercise code to the backend vocabulary.
    pub fn from_source_code(code: i32) -> Self {
        match code {
            56 => Self::Running,
            79 => Self::Walking,
            37 => Self::Hiking,
            8 => Self::Biking,
            74 => Self::SwimmingPool,
            73 => Self::SwimmingOpenWater,
            70 => Self::StrengthTraining,
            81 => Self::Weightlifting,
            36 => Self::Hiit,
            25 => Self::Elliptical,
            54 => Self::RowingMachine,
            68 => Self::StairClimbing,
            57 => Self::Treadmill,
            83 => Self::Yoga,
            48 => Self::Pilates,
            61 => Self::Skiing,
            76 => Self::Tennis,
            32 => Self::Golf,
            51 => Self::RockClimbing,
            0 => Self::Workout,
            _ => Self::Other,
        }
    }

    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Walking => "WALKING",
            Self::Hiking => "HIKING",
            Self::Biking => "BIKING",
            Self::SwimmingPool => "SWIMMING_POOL",
            Self::SwimmingOpenWater => "SWIMMING_OPEN_WATER",
            Self::StrengthTraining => "STRENGTH_TRAINING",
            Self::Weightlifting => "WEIGHTLIFTING",
            Self::Hiit => "HIIT",
            Self::Elliptical => "ELLIPTICAL",
            Self::RowingMachine => "ROWING_MACHINE",
            Self::StairClimbing => "STAIR_CLIMBING",
            Self::Treadmill => "TREADMILL",
            Self::Yoga => "YOGA",
            Self::Pilates => "PILATES",
            Self::Skiing => "SKIING",
            Self::Tennis => "TENNIS",
            Self::Golf => "GOLF",
            Self::RockClimbing => "ROCK_CLIMBING",
            Self::Workout => "WORKOUT",
            Self::Other => "OTHER",
        }
    }
}

impl fmt::Display for ExerciseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes() {
        assert_eq!(ExerciseType::from_source_code(56), ExerciseType::Running);
        assert_eq!(ExerciseType::from_source_code(36), ExerciseType::Hiit);
        assert_eq!(ExerciseType::from_source_code(57), ExerciseType::Treadmill);
        assert_eq!(ExerciseType::from_source_code(0), ExerciseType::Workout);
    }

    #[test]
    fn unknown_code_is_other() {
        assert_eq!(ExerciseType::from_source_code(9999), ExerciseType::Other);
        assert_eq!(ExerciseType::from_source_code(-1), ExerciseType::Other);
    }

    #[test]
    fn serde_names_match_as_str() {
        for ty in [
            ExerciseType::Hiit,
            ExerciseType::SwimmingOpenWater,
            ExerciseType::RockClimbing,
            ExerciseType::Other,
        ] {
            let json = serde_json::to_string(&ty).unwrap();
            assert_eq!(json, format!("\"{}\"", ty.as_str()));
        }
    }

    #[test]
    fn unknown_name_deserializes_to_other() {
        let ty: ExerciseType = serde_json::from_str("\"KITESURFING\"").unwrap();
        assert_eq!(ty, ExerciseType::Other);
    }
}
