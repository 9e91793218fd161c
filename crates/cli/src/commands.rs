use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Subcommand, ValueEnum};
use tracing::{info, warn};

use labnote_core::{
    Clock, Dimension, ExperimentRecord, RecordContent, RecordId, RecordPatch, SystemClock,
};
use labnote_engine::{LocalBackup, Notebook};
use labnote_storage::{LocalStore, RecordStore, SqliteStore};

use crate::config::{Backend, NotebookConfig};
use crate::render;

/// Verbs shared by the one-shot command line and the interactive shell.
#[derive(Subcommand, Debug)]
pub enum RecordCommand {
    /// List records, newest first
    List,

    /// Show every field of one record
    Show {
        /// Record id, unique id prefix, or #<sequence number>
        id: String,
    },

    /// Create a blank record
    New,

    /// Create a new record with the same content as an existing one
    Duplicate {
        /// Record id, unique id prefix, or #<sequence number>
        id: String,
    },

    /// Change one field of a record
    Set {
        /// Record id, unique id prefix, or #<sequence number>
        id: String,

        #[command(subcommand)]
        field: Field,
    },

    /// Delete a record
    Delete {
        /// Record id, unique id prefix, or #<sequence number>
        id: String,
    },

    /// Write all records to a JSON file
    Export {
        /// Output file (defaults to a timestamped name in the export directory)
        #[arg(long = "out", value_name = "FILE")]
        file: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum Field {
    /// Who ran the experiment
    Experimenter { name: String },

    /// Free-text notes
    Observations { text: String },

    /// One transistor dimension, e.g. `transistor M_r W 2u`
    Transistor {
        name: String,
        #[arg(value_enum)]
        dimension: DimensionArg,
        value: String,
    },

    /// One capacitor value, e.g. `capacitor C1 1p`
    Capacitor { name: String, value: String },

    /// One voltage value, e.g. `voltage V_diff 30m`
    Voltage { name: String, value: String },

    /// Attach a waveform image given as a data URL, or remove it
    Waveform {
        #[arg(required_unless_present = "clear")]
        image: Option<String>,

        #[arg(long, conflicts_with = "image")]
        clear: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum DimensionArg {
    /// Gate width
    #[value(name = "W", aliases = ["w", "width"])]
    Width,
    /// Gate length
    #[value(name = "L", aliases = ["l", "length"])]
    Length,
}

impl From<DimensionArg> for Dimension {
    fn from(arg: DimensionArg) -> Self {
        match arg {
            DimensionArg::Width => Dimension::Width,
            DimensionArg::Length => Dimension::Length,
        }
    }
}

impl Field {
    /// Build the patch for this field, carrying the rest of the record's
    /// component maps along.
    pub fn into_patch(self, current: &RecordContent) -> Result<RecordPatch> {
        let patch = match self {
            Field::Experimenter { name } => RecordPatch::experimenter(name),
            Field::Observations { text } => RecordPatch::observations(text),
            Field::Transistor {
                name,
                dimension,
                value,
            } => RecordPatch::transistor(current, &name, dimension.into(), value)?,
            Field::Capacitor { name, value } => RecordPatch::capacitor(current, &name, value)?,
            Field::Voltage { name, value } => RecordPatch::voltage(current, &name, value)?,
            Field::Waveform { clear: true, .. } => RecordPatch::waveform(None),
            Field::Waveform { image, .. } => {
                let image = image.context("no waveform image given")?;
                if !image.starts_with("data:image/") {
                    bail!("waveform must be an image data URL (data:image/...)");
                }
                RecordPatch::waveform(Some(image))
            }
        };
        Ok(patch)
    }
}

impl RecordCommand {
    pub fn run(self, notebook: &mut Notebook, export_dir: &Path, out: &mut dyn Write) -> Result<()> {
        match self {
            RecordCommand::List => {
                if notebook.records().is_empty() {
                    writeln!(out, "no records")?;
                }
                for record in notebook.records() {
                    writeln!(out, "{}", render::summary(record))?;
                }
            }
            RecordCommand::Show { id } => {
                let record = find(notebook, &id)?;
                writeln!(out, "{}", render::detail(record))?;
            }
            RecordCommand::New => {
                let record = notebook.create()?;
                writeln!(out, "created {}", render::summary(&record))?;
            }
            RecordCommand::Duplicate { id } => {
                let source = find(notebook, &id)?.id;
                let record = notebook.duplicate(source)?;
                writeln!(out, "created {}", render::summary(&record))?;
            }
            RecordCommand::Set { id, field } => {
                let record = find(notebook, &id)?;
                let (id, patch) = (record.id, field.into_patch(&record.content)?);
                let updated = notebook.update(id, patch)?;
                writeln!(out, "updated {}", updated.label())?;
            }
            RecordCommand::Delete { id } => {
                let record = find(notebook, &id)?;
                let (id, label) = (record.id, record.label());
                notebook.delete(id)?;
                writeln!(out, "deleted {label}")?;
            }
            RecordCommand::Export { file } => {
                let doc = notebook.export()?;
                let target = file.unwrap_or_else(|| export_dir.join(&doc.file_name));
                std::fs::write(&target, &doc.contents)
                    .with_context(|| format!("writing {}", target.display()))?;
                info!(path = %target.display(), count = doc.record_count, "export written");
                writeln!(out, "exported {} records to {}", doc.record_count, target.display())?;
            }
        }
        Ok(())
    }
}

fn find<'a>(notebook: &'a Notebook, token: &str) -> Result<&'a ExperimentRecord> {
    let id = resolve_id(notebook.records(), token)?;
    notebook
        .record(id)
        .with_context(|| format!("no record with id {id}"))
}

/// Accept a full id, a unique prefix of its hex digits, or `#<sequence number>`.
pub fn resolve_id(records: &[ExperimentRecord], token: &str) -> Result<RecordId> {
    if let Ok(id) = token.parse::<RecordId>() {
        return Ok(id);
    }
    let matches: Vec<&ExperimentRecord> = match token.strip_prefix('#') {
        Some(number) => {
            let number: i64 = number
                .parse()
                .with_context(|| format!("'{token}' is not a sequence number"))?;
            records.iter().filter(|r| r.sequence_number == number).collect()
        }
        None => {
            let needle = token.to_ascii_lowercase().replace('-', "");
            if needle.is_empty() {
                bail!("empty record id");
            }
            records
                .iter()
                .filter(|r| r.id.as_uuid().simple().to_string().starts_with(&needle))
                .collect()
        }
    };
    match matches.as_slice() {
        [record] => Ok(record.id),
        [] => bail!("no record matches '{token}'"),
        many => bail!("'{token}' matches {} records", many.len()),
    }
}

pub fn open_store(config: &NotebookConfig) -> Result<Box<dyn RecordStore>> {
    let path = &config.store.path;
    match config.store.backend {
        Backend::Sqlite => {
            let utf8 = path.to_str().context("store.path is not valid UTF-8")?;
            let mut store = SqliteStore::open(utf8)
                .with_context(|| format!("opening database {}", path.display()))?;
            store.set_owner(config.store.owner);
            Ok(Box::new(store))
        }
        Backend::Local => {
            let store = LocalStore::open_seeded(path.clone(), SystemClock.now_millis())
                .with_context(|| format!("opening notebook file {}", path.display()))?;
            Ok(Box::new(store))
        }
    }
}

pub fn open_notebook(config: &NotebookConfig) -> Result<Notebook> {
    let mut notebook = Notebook::new(open_store(config)?);
    if let Some(path) = &config.backup.path {
        notebook = notebook.with_backup(LocalBackup::new(path.clone()));
    }
    Ok(notebook)
}

/// Load the notebook and print the resulting message, if any, as a banner.
/// A failed load leaves the notebook empty but usable.
pub fn load_with_banner(notebook: &mut Notebook, out: &mut dyn Write) -> Result<()> {
    if let Err(e) = notebook.load() {
        warn!(error = %e, "starting without records");
    }
    if let Some(message) = notebook.last_error() {
        writeln!(out, "! {message}")?;
    }
    notebook.clear_error();
    Ok(())
}
