//! Dataset gripper conventions and target-robot gripper apertures.
//!
//! Source datasets encode "gripper open" in many incompatible ways: a
//! finger distance, a signed command, a pair of finger positions, or
//! nothing at all. Each dataset gets one [`GripperConvention`] entry in a
//! [`ConventionTable`], and a single interpreter turns raw signals into the
//! canonical open flag. A dataset without an entry is an error, never a
//! default, because a wrong guess silently corrupts labels.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{ReplayError, Result};

/// A raw gripper reading from a source dataset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GripperSignal {
    Scalar(f64),
    Pair(f64, f64),
}

impl GripperSignal {
    /// Interpret a dataset row: one value is a scalar, two are a finger pair.
    pub fn from_slice(values: &[f64]) -> Result<Self> {
        match values {
            [v] => Ok(GripperSignal::Scalar(*v)),
            [a, b] => Ok(GripperSignal::Pair(*a, *b)),
            _ => Err(ReplayError::invalid_input(format!(
                "gripper signal must have 1 or 2 values, got {}",
                values.len()
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
    Equal,
}

impl Comparison {
    pub fn holds(&self, value: f64, threshold: f64) -> bool {
        match self {
            Comparison::Greater => value > threshold,
            Comparison::GreaterOrEqual => value >= threshold,
            Comparison::Less => value < threshold,
            Comparison::LessOrEqual => value <= threshold,
            Comparison::Equal => value == threshold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GripperConvention {
    /// Open when `signal <direction> value`.
    Threshold { value: f64, direction: Comparison },
    /// Open when the two finger positions are further apart than `threshold`.
    PairDifference { threshold: f64 },
    /// The dataset carries no usable gripper signal.
    Fixed { open: bool },
}

impl GripperConvention {
    pub fn is_open(&self, signal: &GripperSignal) -> Result<bool> {
        match (self, signal) {
            (GripperConvention::Threshold { value, direction }, GripperSignal::Scalar(s)) => {
                Ok(direction.holds(*s, *value))
            }
            (GripperConvention::PairDifference { threshold }, GripperSignal::Pair(a, b)) => {
                Ok(a - b > *threshold)
            }
            (GripperConvention::Fixed { open }, _) => Ok(*open),
            (convention, signal) => Err(ReplayError::invalid_input(format!(
                "gripper signal {:?} does not fit convention {:?}",
                signal, convention
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConventionTable {
    entries: BTreeMap<String, GripperConvention>,
}

impl ConventionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Conventions of the supported source datasets.
    pub fn builtin() -> Self {
        use Comparison::*;

        let threshold = |value: f64, direction: Comparison| GripperConvention::Threshold {
            value,
            direction,
        };
        let sim_pair = GripperConvention::PairDifference { threshold: 0.06 };

        let mut table = Self::new();
        table.insert("autolab_ur5", threshold(0.0, Equal));
        table.insert("furniture_bench", threshold(0.05, Greater));
        for name in ["viola", "austin_sailor", "austin_mutex", "austin_buds"] {
            table.insert(name, threshold(0.07, Greater));
        }
        table.insert("nyu_franka", threshold(0.0, GreaterOrEqual));
        table.insert("ucsd_kitchen_rlds", threshold(0.5, Greater));
        table.insert("taco_play", threshold(0.0, Less));
        table.insert("iamlab_cmu", threshold(0.5, Greater));
        table.insert("toto", threshold(0.0, Greater));
        table.insert("asu_table_top_rlds", threshold(0.0, Less));
        table.insert("utokyo_pick_and_place", threshold(0.02, Greater));
        for name in ["can", "lift", "square", "stack", "three_piece_assembly"] {
            table.insert(name, sim_pair);
        }
        table.insert("kaist", GripperConvention::Fixed { open: false });
        table
    }

    pub fn insert(&mut self, dataset: impl Into<String>, convention: GripperConvention) {
        self.entries.insert(dataset.into(), convention);
    }

    /// Overlay `other` on top of this table; its entries win.
    pub fn extend(&mut self, other: &ConventionTable) {
        for (name, convention) in &other.entries {
            self.entries.insert(name.clone(), *convention);
        }
    }

    pub fn lookup(&self, dataset: &str) -> Result<&GripperConvention> {
        self.entries
            .get(dataset)
            .ok_or_else(|| ReplayError::UnknownDatasetConvention(dataset.to_string()))
    }

    /// Map a raw dataset reading to the canonical "gripper open" flag.
    pub fn canonical_open(&self, dataset: &str, signal: &GripperSignal) -> Result<bool> {
        self.lookup(dataset)?.is_open(signal)
    }

    pub fn datasets(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Finger width range of a target gripper, from fully closed to fully open.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ApertureRange {
    pub closed: f64,
    pub open: f64,
}

impl ApertureRange {
    /// Fraction of the way from closed (0) to open (1), clipped.
    pub fn fraction(&self, width: f64) -> f64 {
        let span = self.open - self.closed;
        if span.abs() < f64::EPSILON {
            return 0.0;
        }
        ((width - self.closed) / span).clamp(0.0, 1.0)
    }
}

/// Width between the fingers given the first finger joint position.
pub fn finger_width(finger_qpos: f64) -> f64 {
    2.0 * finger_qpos
}

/// Robots that source trajectories are replayed onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetRobot {
    Panda,
    Ur5e,
    Kinova3,
    Iiwa,
    Sawyer,
    Jaco,
}

impl TargetRobot {
    pub const ALL: [TargetRobot; 6] = [
        TargetRobot::Panda,
        TargetRobot::Ur5e,
        TargetRobot::Kinova3,
        TargetRobot::Iiwa,
        TargetRobot::Sawyer,
        TargetRobot::Jaco,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TargetRobot::Panda => "Panda",
            TargetRobot::Ur5e => "UR5e",
            TargetRobot::Kinova3 => "Kinova3",
            TargetRobot::Iiwa => "IIWA",
            TargetRobot::Sawyer => "Sawyer",
            TargetRobot::Jaco => "Jaco",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|r| r.name() == name)
    }

    pub fn default_gripper(&self) -> &'static str {
        match self {
            TargetRobot::Panda => "PandaGripper",
            TargetRobot::Sawyer => "RethinkGripper",
            TargetRobot::Jaco => "JacoThreeFingerGripper",
            TargetRobot::Ur5e | TargetRobot::Kinova3 | TargetRobot::Iiwa => "Robotiq85Gripper",
        }
    }

    pub fn aperture(&self) -> ApertureRange {
        match self {
            TargetRobot::Panda => ApertureRange {
                closed: 0.0,
                open: 0.08,
            },
            // Robotiq knuckle reads 1 when closed.
            TargetRobot::Ur5e | TargetRobot::Kinova3 | TargetRobot::Iiwa => ApertureRange {
                closed: 1.0,
                open: 0.0,
            },
            TargetRobot::Sawyer => ApertureRange {
                closed: -0.024,
                open: 0.0,
            },
            TargetRobot::Jaco => ApertureRange {
                closed: 0.0,
                open: 2.2,
            },
        }
    }

    /// Normalized opening of this robot's gripper from its first finger joint.
    pub fn opening_fraction(&self, finger_qpos: f64) -> f64 {
        self.aperture().fraction(finger_width(finger_qpos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_threshold_convention_closed_at_zero() {
        let table = ConventionTable::builtin();
        assert!(!table
            .canonical_open("furniture_bench", &GripperSignal::Scalar(0.0))
            .unwrap());
        assert!(table
            .canonical_open("furniture_bench", &GripperSignal::Scalar(0.1))
            .unwrap());
    }

    #[test]
    fn test_equality_and_inverted_conventions() {
        let table = ConventionTable::builtin();
        assert!(table.canonical_open("autolab_ur5", &GripperSignal::Scalar(0.0)).unwrap());
        assert!(!table.canonical_open("autolab_ur5", &GripperSignal::Scalar(1.0)).unwrap());
        assert!(table.canonical_open("taco_play", &GripperSignal::Scalar(-1.0)).unwrap());
        assert!(!table.canonical_open("taco_play", &GripperSignal::Scalar(1.0)).unwrap());
        assert!(table.canonical_open("nyu_franka", &GripperSignal::Scalar(0.0)).unwrap());
    }

    #[test]
    fn test_pair_difference_convention() {
        let table = ConventionTable::builtin();
        assert!(table.canonical_open("lift", &GripperSignal::Pair(0.04, -0.04)).unwrap());
        assert!(!table.canonical_open("lift", &GripperSignal::Pair(0.01, -0.01)).unwrap());
    }

    #[test]
    fn test_fixed_convention_ignores_signal() {
        let table = ConventionTable::builtin();
        assert!(!table.canonical_open("kaist", &GripperSignal::Scalar(1.0)).unwrap());
        assert!(!table.canonical_open("kaist", &GripperSignal::Pair(1.0, 0.0)).unwrap());
    }

    #[test]
    fn test_unknown_dataset_fails_loudly() {
        let table = ConventionTable::builtin();
        let err = table
            .canonical_open("bridge", &GripperSignal::Scalar(0.5))
            .unwrap_err();
        assert!(matches!(err, ReplayError::UnknownDatasetConvention(name) if name == "bridge"));
    }

    #[test]
    fn test_signal_shape_mismatch() {
        let table = ConventionTable::builtin();
        assert!(matches!(
            table.canonical_open("lift", &GripperSignal::Scalar(0.5)),
            Err(ReplayError::InvalidInput(_))
        ));
        assert!(matches!(
            table.canonical_open("viola", &GripperSignal::Pair(0.5, 0.0)),
            Err(ReplayError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_extend_overrides_builtin() {
        let mut table = ConventionTable::builtin();
        let mut overrides = ConventionTable::new();
        overrides.insert(
            "viola",
            GripperConvention::Threshold {
                value: 0.02,
                direction: Comparison::Greater,
            },
        );
        overrides.insert("bridge", GripperConvention::Fixed { open: true });
        table.extend(&overrides);

        assert!(table.canonical_open("viola", &GripperSignal::Scalar(0.05)).unwrap());
        assert!(table.canonical_open("bridge", &GripperSignal::Scalar(0.0)).unwrap());
    }

    #[test]
    fn test_convention_json_format() {
        let json = r#"{
            "bridge": { "kind": "threshold", "value": 0.5, "direction": "less_or_equal" },
            "sim_pairs": { "kind": "pair_difference", "threshold": 0.06 },
            "no_gripper": { "kind": "fixed", "open": false }
        }"#;
        let table: ConventionTable = serde_json::from_str(json).unwrap();
        assert_eq!(table.len(), 3);
        assert!(table.canonical_open("bridge", &GripperSignal::Scalar(0.5)).unwrap());
    }

    #[test]
    fn test_signal_from_slice() {
        assert_eq!(GripperSignal::from_slice(&[0.3]).unwrap(), GripperSignal::Scalar(0.3));
        assert_eq!(
            GripperSignal::from_slice(&[0.3, 0.1]).unwrap(),
            GripperSignal::Pair(0.3, 0.1)
        );
        assert!(GripperSignal::from_slice(&[]).is_err());
    }

    #[test]
    fn test_target_robot_apertures() {
        assert_relative_eq!(TargetRobot::Panda.opening_fraction(0.04), 1.0);
        assert_relative_eq!(TargetRobot::Panda.opening_fraction(0.02), 0.5);
        assert_relative_eq!(TargetRobot::Ur5e.opening_fraction(0.5), 0.0);
        assert_relative_eq!(TargetRobot::Ur5e.opening_fraction(0.0), 1.0);
        assert_relative_eq!(TargetRobot::Sawyer.opening_fraction(-0.006), 0.5, epsilon = 1e-12);
        assert_relative_eq!(TargetRobot::Jaco.opening_fraction(0.55), 0.5, epsilon = 1e-12);
        assert_eq!(TargetRobot::Iiwa.default_gripper(), "Robotiq85Gripper");
        assert_eq!(TargetRobot::from_name("UR5e"), Some(TargetRobot::Ur5e));
        assert_eq!(TargetRobot::from_name("Baxter"), None);
    }
}
