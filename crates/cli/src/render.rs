use std::fmt::Write as _;

use labnote_core::ExperimentRecord;
use labnote_core::catalog::{CAPACITOR_NAMES, TRANSISTOR_NAMES, VOLTAGE_NAMES};

/// One line per record: heading, short id, creation time and experimenter.
pub fn summary(record: &ExperimentRecord) -> String {
    let created = record
        .created_instant()
        .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string());
    let experimenter = if record.content.experimenter.is_empty() {
        "(no experimenter)"
    } else {
        record.content.experimenter.as_str()
    };
    format!(
        "{}  {}  {}  {}",
        record.label(),
        record.id.short(),
        created,
        experimenter
    )
}

/// Full form view. Every catalog entry is listed, filled or not, in catalog order.
pub fn detail(record: &ExperimentRecord) -> String {
    let content = &record.content;
    let mut out = String::new();
    let _ = writeln!(out, "{}", summary(record));
    let _ = writeln!(out, "id: {}", record.id);

    let _ = writeln!(out, "transistors (W / L):");
    for name in TRANSISTOR_NAMES {
        let (w, l) = content
            .transistors
            .get(*name)
            .map(|size| (size.width.as_str(), size.length.as_str()))
            .unwrap_or(("", ""));
        let _ = writeln!(out, "  {name:<8} {:<10} {}", or_blank(w), or_blank(l));
    }

    let _ = writeln!(out, "capacitors:");
    for name in CAPACITOR_NAMES {
        let value = content.capacitors.get(*name).map(String::as_str).unwrap_or("");
        let _ = writeln!(out, "  {name:<8} {}", or_blank(value));
    }

    let _ = writeln!(out, "voltages:");
    for name in VOLTAGE_NAMES {
        let value = content.voltages.get(*name).map(String::as_str).unwrap_or("");
        let _ = writeln!(out, "  {name:<8} {}", or_blank(value));
    }

    let waveform = match &content.waveform_image {
        Some(image) => format!("attached ({} bytes)", image.len()),
        None => "none".to_string(),
    };
    let _ = writeln!(out, "waveform: {waveform}");
    let _ = write!(out, "observations:\n{}", content.observations);
    out
}

fn or_blank(value: &str) -> &str {
    if value.is_empty() { "-" } else { value }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use labnote_core::{RecordContent, RecordId, TransistorSize};

    fn record() -> ExperimentRecord {
        let at = DateTime::from_timestamp_millis(1_704_067_200_000).unwrap();
        let mut content = RecordContent {
            experimenter: "wu".into(),
            observations: "clean edges".into(),
            ..RecordContent::default()
        };
        content
            .transistors
            .insert("M_ref".into(), TransistorSize::new("4u", ""));
        content.voltages.insert("V_refr".into(), "200m".into());
        ExperimentRecord {
            id: RecordId::new(),
            user_id: None,
            sequence_number: 12,
            timestamp: at.timestamp_millis(),
            content,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn summary_line() {
        let r = record();
        assert_eq!(
            summary(&r),
            format!("Experiment Record 012  {}  2024-01-01 00:00  wu", r.id.short())
        );
    }

    #[test]
    fn detail_lists_every_catalog_entry() {
        let text = detail(&record());
        for name in TRANSISTOR_NAMES.iter().chain(CAPACITOR_NAMES).chain(VOLTAGE_NAMES) {
            assert!(text.contains(name), "missing {name}");
        }
        assert!(text.contains("M_ref    4u         -"));
        assert!(text.contains("V_refr   200m"));
        assert!(text.contains("waveform: none"));
        assert!(text.ends_with("clean edges"));
    }
}
