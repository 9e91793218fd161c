use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::CoreError;
use crate::record::ExperimentRecord;

/// A rendered export, ready to be written wherever the caller wants it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDocument {
    pub file_name: String,
    pub contents: String,
    pub record_count: usize,
}

pub fn export_file_name(at: DateTime<Utc>) -> String {
    format!(
        "experiment_records_{}.json",
        at.to_rfc3339_opts(SecondsFormat::Millis, true)
    )
}

/// Render `records` as a pretty-printed JSON array in display order.
pub fn export_records(
    records: &[ExperimentRecord],
    at: DateTime<Utc>,
) -> Result<ExportDocument, CoreError> {
    Ok(ExportDocument {
        file_name: export_file_name(at),
        contents: serde_json::to_string_pretty(records)?,
        record_count: records.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::RecordId;
    use crate::record::RecordContent;

    #[test]
    fn file_name_carries_the_export_instant() {
        let at = DateTime::parse_from_rfc3339("2025-03-04T05:06:07.089Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(
            export_file_name(at),
            "experiment_records_2025-03-04T05:06:07.089Z.json"
        );
    }

    #[test]
    fn export_preserves_order() {
        let at = Utc::now();
        let make = |seq: i64| ExperimentRecord {
            id: RecordId::new(),
            user_id: None,
            sequence_number: seq,
            timestamp: at.timestamp_millis(),
            content: RecordContent::default(),
            created_at: at,
            updated_at: at,
        };
        let records = vec![make(2), make(1)];
        let doc = export_records(&records, at).unwrap();
        assert_eq!(doc.record_count, 2);
        let parsed: Vec<ExperimentRecord> = serde_json::from_str(&doc.contents).unwrap();
        assert_eq!(parsed, records);
        assert!(doc.contents.contains('\n'));
    }
}
