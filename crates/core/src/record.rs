use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::ComponentKind;
use crate::error::CoreError;
use crate::ids::{OwnerId, RecordId};

/// Width and length of one transistor, as typed by the experimenter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransistorSize {
    #[serde(rename = "W", default)]
    pub width: String,
    #[serde(rename = "L", default)]
    pub length: String,
}

impl TransistorSize {
    pub fn new(width: impl Into<String>, length: impl Into<String>) -> Self {
        Self {
            width: width.into(),
            length: length.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Width,
    Length,
}

/// The user-editable part of a record. Everything here is copied on duplicate
/// and carried over when a deleted record is restored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordContent {
    #[serde(default)]
    pub experimenter: String,
    #[serde(default)]
    pub transistors: BTreeMap<String, TransistorSize>,
    #[serde(default)]
    pub capacitors: BTreeMap<String, String>,
    #[serde(default)]
    pub voltages: BTreeMap<String, String>,
    #[serde(default)]
    pub waveform_image: Option<String>,
    #[serde(default)]
    pub observations: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentRecord {
    pub id: RecordId,
    pub user_id: Option<OwnerId>,
    pub sequence_number: i64,
    /// Creation instant, milliseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(flatten)]
    pub content: RecordContent,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExperimentRecord {
    /// Heading used when the record is displayed, e.g. `Experiment Record 007`.
    pub fn label(&self) -> String {
        format!("Experiment Record {:03}", self.sequence_number)
    }

    pub fn created_instant(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }
}

/// Fields submitted to a store when a record is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub sequence_number: i64,
    pub timestamp: i64,
    pub content: RecordContent,
}

/// Next sequence number for a record created against `records`.
pub fn next_sequence_number(records: &[ExperimentRecord]) -> Result<i64, CoreError> {
    let highest = records
        .iter()
        .map(|r| r.sequence_number)
        .max()
        .unwrap_or(0)
        .max(0);
    sequence_after(highest)
}

/// The number following `highest`, or an error once the range is used up.
pub fn sequence_after(highest: i64) -> Result<i64, CoreError> {
    highest
        .checked_add(1)
        .ok_or_else(|| CoreError::InvalidData(format!("no sequence number after {highest}")))
}

/// A merge patch over [`RecordContent`].
///
/// Only fields that are `Some` replace the stored value; component maps are
/// replaced whole. Identity, ownership and bookkeeping fields cannot be
/// expressed in a patch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPatch {
    pub experimenter: Option<String>,
    pub transistors: Option<BTreeMap<String, TransistorSize>>,
    pub capacitors: Option<BTreeMap<String, String>>,
    pub voltages: Option<BTreeMap<String, String>>,
    pub waveform_image: Option<Option<String>>,
    pub observations: Option<String>,
}

impl RecordPatch {
    pub fn is_empty(&self) -> bool {
        self.experimenter.is_none()
            && self.transistors.is_none()
            && self.capacitors.is_none()
            && self.voltages.is_none()
            && self.waveform_image.is_none()
            && self.observations.is_none()
    }

    pub fn apply_to(&self, content: &mut RecordContent) {
        if let Some(experimenter) = &self.experimenter {
            content.experimenter = experimenter.clone();
        }
        if let Some(transistors) = &self.transistors {
            content.transistors = transistors.clone();
        }
        if let Some(capacitors) = &self.capacitors {
            content.capacitors = capacitors.clone();
        }
        if let Some(voltages) = &self.voltages {
            content.voltages = voltages.clone();
        }
        if let Some(waveform) = &self.waveform_image {
            content.waveform_image = waveform.clone();
        }
        if let Some(observations) = &self.observations {
            content.observations = observations.clone();
        }
    }

    pub fn experimenter(name: impl Into<String>) -> Self {
        Self {
            experimenter: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn observations(text: impl Into<String>) -> Self {
        Self {
            observations: Some(text.into()),
            ..Self::default()
        }
    }

    /// Attach (`Some`) or remove (`None`) the waveform image.
    pub fn waveform(image: Option<String>) -> Self {
        Self {
            waveform_image: Some(image),
            ..Self::default()
        }
    }

    /// Change one transistor dimension, carrying the rest of the map along.
    pub fn transistor(
        current: &RecordContent,
        name: &str,
        dimension: Dimension,
        value: impl Into<String>,
    ) -> Result<Self, CoreError> {
        let name = ComponentKind::Transistor.canonical(name)?;
        let mut transistors = current.transistors.clone();
        let entry = transistors.entry(name.to_string()).or_default();
        match dimension {
            Dimension::Width => entry.width = value.into(),
            Dimension::Length => entry.length = value.into(),
        }
        Ok(Self {
            transistors: Some(transistors),
            ..Self::default()
        })
    }

    pub fn capacitor(
        current: &RecordContent,
        name: &str,
        value: impl Into<String>,
    ) -> Result<Self, CoreError> {
        let name = ComponentKind::Capacitor.canonical(name)?;
        let mut capacitors = current.capacitors.clone();
        capacitors.insert(name.to_string(), value.into());
        Ok(Self {
            capacitors: Some(capacitors),
            ..Self::default()
        })
    }

    pub fn voltage(
        current: &RecordContent,
        name: &str,
        value: impl Into<String>,
    ) -> Result<Self, CoreError> {
        let name = ComponentKind::Voltage.canonical(name)?;
        let mut voltages = current.voltages.clone();
        voltages.insert(name.to_string(), value.into());
        Ok(Self {
            voltages: Some(voltages),
            ..Self::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populated() -> RecordContent {
        let mut content = RecordContent {
            experimenter: "ada".into(),
            observations: "baseline".into(),
            ..RecordContent::default()
        };
        content
            .transistors
            .insert("M_r".into(), TransistorSize::new("2u", "180n"));
        content.capacitors.insert("C1".into(), "1p".into());
        content
    }

    #[test]
    fn observations_patch_leaves_components_alone() {
        let mut content = populated();
        let before = content.clone();
        RecordPatch::observations("x").apply_to(&mut content);
        assert_eq!(content.observations, "x");
        assert_eq!(content.transistors, before.transistors);
        assert_eq!(content.capacitors, before.capacitors);
        assert_eq!(content.experimenter, before.experimenter);
    }

    #[test]
    fn transistor_patch_fills_missing_dimension_with_empty() {
        let content = populated();
        let patch = RecordPatch::transistor(&content, "M_dp", Dimension::Length, "350n").unwrap();
        let transistors = patch.transistors.unwrap();
        assert_eq!(transistors["M_dp"], TransistorSize::new("", "350n"));
        assert_eq!(transistors["M_r"], TransistorSize::new("2u", "180n"));
    }

    #[test]
    fn unknown_component_is_rejected() {
        let content = populated();
        let err = RecordPatch::capacitor(&content, "C9", "1p").unwrap_err();
        assert!(matches!(err, CoreError::UnknownComponent { kind: "capacitor", .. }));
    }

    #[test]
    fn waveform_patch_can_clear() {
        let mut content = populated();
        content.waveform_image = Some("data:image/png;base64,AAAA".into());
        RecordPatch::waveform(None).apply_to(&mut content);
        assert_eq!(content.waveform_image, None);
    }

    fn numbered(sequence_number: i64) -> ExperimentRecord {
        let now = Utc::now();
        ExperimentRecord {
            id: RecordId::new(),
            user_id: None,
            sequence_number,
            timestamp: now.timestamp_millis(),
            content: RecordContent::default(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn next_sequence_starts_at_one() {
        assert_eq!(next_sequence_number(&[]).unwrap(), 1);
        assert_eq!(next_sequence_number(&[numbered(-4)]).unwrap(), 1);
        assert_eq!(next_sequence_number(&[numbered(2), numbered(7)]).unwrap(), 8);
    }

    #[test]
    fn exhausted_sequence_is_an_error() {
        let err = next_sequence_number(&[numbered(i64::MAX)]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidData(_)));
        assert_eq!(sequence_after(i64::MAX - 1).unwrap(), i64::MAX);
    }

    #[test]
    fn label_is_zero_padded() {
        let now = Utc::now();
        let record = ExperimentRecord {
            id: RecordId::new(),
            user_id: None,
            sequence_number: 7,
            timestamp: now.timestamp_millis(),
            content: RecordContent::default(),
            created_at: now,
            updated_at: now,
        };
        assert_eq!(record.label(), "Experiment Record 007");
    }

    #[test]
    fn serialized_shape_uses_snake_case_and_wl_keys() {
        let now = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        let record = ExperimentRecord {
            id: RecordId::new(),
            user_id: None,
            sequence_number: 3,
            timestamp: now.timestamp_millis(),
            content: populated(),
            created_at: now,
            updated_at: now,
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["sequence_number"], 3);
        assert_eq!(value["transistors"]["M_r"]["W"], "2u");
        assert_eq!(value["transistors"]["M_r"]["L"], "180n");
        assert!(value.get("waveform_image").is_some());
        assert!(value.get("content").is_none());
    }
}
