// Demonstrations - operator-recorded (features, action) pairs
//
// A DemonstrationSet is owned by the current training session: it starts
// empty, grows by append and is cleared on reset. Records are immutable once
// stored.
//
// Interchange format (JSON): an ordered array of
//   { "input": [numbers...], "output": "FORWARD" }
//
// Inputs are held as f32, the classifier's input type. Encoded features are
// small integers and round-trip exactly; other numbers are rounded to the
// nearest f32 on import, so re-exporting them is not byte-identical.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::encoding::{FeatureEncoder, FeatureMode, FeatureVector};
use crate::error::ModelError;

pub mod action;

pub use action::{ActionLabel, ACTION_COUNT, ALL_ACTIONS};

/// One recorded demonstration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemonstrationRecord {
    features: FeatureVector,
    action: ActionLabel,
}

impl DemonstrationRecord {
    pub fn new(features: FeatureVector, action: ActionLabel) -> Self {
        Self { features, action }
    }

    pub fn features(&self) -> &[f32] {
        &self.features
    }

    pub fn action(&self) -> ActionLabel {
        self.action
    }
}

/// On-disk shape of one record
///
/// `input` is stored at f32 precision; see the module notes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterchangeRecord {
    pub input: Vec<f32>,
    pub output: ActionLabel,
}

impl From<&DemonstrationRecord> for InterchangeRecord {
    fn from(record: &DemonstrationRecord) -> Self {
        Self {
            input: record.features.clone(),
            output: record.action,
        }
    }
}

impl From<InterchangeRecord> for DemonstrationRecord {
    fn from(record: InterchangeRecord) -> Self {
        Self::new(record.input, record.output)
    }
}

/// Ordered collection of demonstrations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DemonstrationSet {
    records: Vec<DemonstrationRecord>,
}

impl DemonstrationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: DemonstrationRecord) {
        self.records.push(record);
    }

    /// Append `features` → `action`
    pub fn record(&mut self, features: FeatureVector, action: ActionLabel) {
        self.push(DemonstrationRecord::new(features, action));
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DemonstrationRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[DemonstrationRecord] {
        &self.records
    }

    /// Number of demonstrations per action, in output-index order
    pub fn counts_by_action(&self) -> [usize; ACTION_COUNT] {
        let mut counts = [0; ACTION_COUNT];
        for record in &self.records {
            counts[record.action.index()] += 1;
        }
        counts
    }

    /// Check every record's feature length against `mode`.
    pub fn validate_for(&self, mode: FeatureMode) -> Result<(), ModelError> {
        let encoder = FeatureEncoder::new(mode);
        self.records
            .iter()
            .try_for_each(|record| encoder.conform(&record.features))
    }

    /// Interchange records in stored order
    pub fn to_interchange(&self) -> Vec<InterchangeRecord> {
        self.records.iter().map(InterchangeRecord::from).collect()
    }

    pub fn from_interchange(records: Vec<InterchangeRecord>) -> Self {
        Self {
            records: records.into_iter().map(DemonstrationRecord::from).collect(),
        }
    }

    pub fn to_json(&self) -> Result<String, ModelError> {
        Ok(serde_json::to_string_pretty(&self.to_interchange())?)
    }

    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let records: Vec<InterchangeRecord> = serde_json::from_str(json)?;
        Ok(Self::from_interchange(records))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ModelError> {
        fs::write(&path, self.to_json()?)?;
        log::info!(
            "[Demonstrations] Saved {} records to {:?}",
            self.len(),
            path.as_ref()
        );
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let contents = fs::read_to_string(&path)?;
        let set = Self::from_json(&contents)?;
        log::info!(
            "[Demonstrations] Loaded {} records from {:?}",
            set.len(),
            path.as_ref()
        );
        Ok(set)
    }
}

impl FromIterator<DemonstrationRecord> for DemonstrationSet {
    fn from_iter<I: IntoIterator<Item = DemonstrationRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a DemonstrationSet {
    type Item = &'a DemonstrationRecord;
    type IntoIter = std::slice::Iter<'a, DemonstrationRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_set() -> DemonstrationSet {
        let mut set = DemonstrationSet::new();
        set.record(vec![0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 5.0], ActionLabel::Forward);
        set.record(vec![1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 9.0], ActionLabel::Stop);
        set.record(vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0], ActionLabel::Left);
        set
    }

    #[test]
    fn test_interchange_round_trip_preserves_order_and_values() {
        let set = sample_set();
        let json = set.to_json().unwrap();
        let restored = DemonstrationSet::from_json(&json).unwrap();

        assert_eq!(restored, set);
        let labels: Vec<_> = restored.iter().map(|r| r.action()).collect();
        assert_eq!(
            labels,
            vec![ActionLabel::Forward, ActionLabel::Stop, ActionLabel::Left]
        );
    }

    #[test]
    fn test_interchange_field_names() {
        let mut set = DemonstrationSet::new();
        set.record(vec![3.0], ActionLabel::Right);
        let value: serde_json::Value = serde_json::from_str(&set.to_json().unwrap()).unwrap();

        assert_eq!(value[0]["input"], serde_json::json!([3.0]));
        assert_eq!(value[0]["output"], "RIGHT");
    }

    #[test]
    fn test_import_keeps_integers_and_rounds_to_f32() {
        let json = r#"[{"input": [0, 26, 16777216, 0.123456789, 16777217], "output": "STOP"}]"#;
        let set = DemonstrationSet::from_json(json).unwrap();
        let features = set.records()[0].features();

        assert_eq!(&features[..3], &[0.0, 26.0, 16_777_216.0]);
        assert_eq!(features[3], 0.123456789_f64 as f32);
        // 2^24 + 1 has no f32 representation
        assert_eq!(features[4], 16_777_216.0);

        // a second export/import is stable once values are f32
        let again = DemonstrationSet::from_json(&set.to_json().unwrap()).unwrap();
        assert_eq!(again, set);
    }

    #[test]
    fn test_import_rejects_unknown_label() {
        let result = DemonstrationSet::from_json(r#"[{"input": [1], "output": "JUMP"}]"#);
        assert!(matches!(result, Err(ModelError::Interchange { .. })));
    }

    #[test]
    fn test_validate_for_mode() {
        let set = sample_set();
        assert!(set.validate_for(FeatureMode::CaptorsAndNote).is_ok());
        assert_eq!(
            set.validate_for(FeatureMode::NoteOnly),
            Err(ModelError::FeatureShapeMismatch {
                expected: 1,
                actual: 10
            })
        );
    }

    #[test]
    fn test_counts_and_clear() {
        let mut set = sample_set();
        assert_eq!(set.counts_by_action(), [1, 1, 0, 1, 0]);
        set.clear();
        assert!(set.is_empty());
        assert_eq!(set.counts_by_action(), [0; ACTION_COUNT]);
    }

    #[test]
    fn test_save_and_load_file() {
        let path = std::env::temp_dir().join(format!(
            "robot_trainer_demos_{}.json",
            std::process::id()
        ));
        let set = sample_set();
        set.save(&path).unwrap();
        let loaded = DemonstrationSet::load(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded, set);
    }
}
