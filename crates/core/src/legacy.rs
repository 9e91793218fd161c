//! Translation between stored JSON snapshots and [`ExperimentRecord`].
//!
//! The local-only notebook wrote camelCase keys (`sequenceNumber`,
//! `waveformImage`) and had no ownership or bookkeeping columns. Database rows
//! use snake_case. The decoder accepts either spelling and fills in whatever
//! the source format lacked.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::ids::{OwnerId, RecordId};
use crate::record::{ExperimentRecord, RecordContent, TransistorSize};

#[derive(Debug, Deserialize)]
struct StoredEntry {
    #[serde(default)]
    id: Option<String>,
    #[serde(default, alias = "userId")]
    user_id: Option<String>,
    #[serde(default, alias = "sequenceNumber")]
    sequence_number: Option<i64>,
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default)]
    experimenter: Option<String>,
    #[serde(default)]
    transistors: Option<BTreeMap<String, TransistorSize>>,
    #[serde(default)]
    capacitors: Option<BTreeMap<String, String>>,
    #[serde(default)]
    voltages: Option<BTreeMap<String, String>>,
    #[serde(default, alias = "waveformImage")]
    waveform_image: Option<String>,
    #[serde(default)]
    observations: Option<String>,
    #[serde(default, alias = "createdAt")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "updatedAt")]
    updated_at: Option<DateTime<Utc>>,
}

impl StoredEntry {
    /// `index` is the display position (newest first) within `total` entries.
    fn into_record(self, index: usize, total: usize) -> ExperimentRecord {
        let timestamp = self.timestamp.unwrap_or(0);
        let created_fallback = DateTime::from_timestamp_millis(timestamp).unwrap_or_default();
        let created_at = self.created_at.unwrap_or(created_fallback);
        ExperimentRecord {
            id: self
                .id
                .as_deref()
                .map(RecordId::from_legacy)
                .unwrap_or_default(),
            user_id: self.user_id.and_then(|raw| raw.parse::<OwnerId>().ok()),
            sequence_number: self
                .sequence_number
                .unwrap_or((total - index) as i64),
            timestamp,
            content: RecordContent {
                experimenter: self.experimenter.unwrap_or_default(),
                transistors: self.transistors.unwrap_or_default(),
                capacitors: self.capacitors.unwrap_or_default(),
                voltages: self.voltages.unwrap_or_default(),
                waveform_image: self.waveform_image.filter(|image| !image.is_empty()),
                observations: self.observations.unwrap_or_default(),
            },
            created_at,
            updated_at: self.updated_at.unwrap_or(created_at),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LocalEntry<'a> {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
    sequence_number: i64,
    timestamp: i64,
    experimenter: &'a str,
    transistors: &'a BTreeMap<String, TransistorSize>,
    capacitors: &'a BTreeMap<String, String>,
    voltages: &'a BTreeMap<String, String>,
    waveform_image: Option<&'a str>,
    observations: &'a str,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'a> From<&'a ExperimentRecord> for LocalEntry<'a> {
    fn from(record: &'a ExperimentRecord) -> Self {
        Self {
            id: record.id.to_string(),
            user_id: record.user_id.map(|owner| owner.to_string()),
            sequence_number: record.sequence_number,
            timestamp: record.timestamp,
            experimenter: &record.content.experimenter,
            transistors: &record.content.transistors,
            capacitors: &record.content.capacitors,
            voltages: &record.content.voltages,
            waveform_image: record.content.waveform_image.as_deref(),
            observations: &record.content.observations,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Decode a JSON array of records in either format, newest first.
pub fn decode_records(json: &str) -> Result<Vec<ExperimentRecord>, CoreError> {
    let entries: Vec<StoredEntry> = serde_json::from_str(json)?;
    let total = entries.len();
    Ok(entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| entry.into_record(index, total))
        .collect())
}

/// Encode records in the local (camelCase) format.
pub fn encode_records(records: &[ExperimentRecord]) -> Result<String, CoreError> {
    let entries: Vec<LocalEntry<'_>> = records.iter().map(LocalEntry::from).collect();
    Ok(serde_json::to_string_pretty(&entries)?)
}
