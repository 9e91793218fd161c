//! Line-oriented session over stdin. Unlike one-shot commands, it keeps
//! the notebook (and so the undo buffer) alive between commands.

use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use tracing::debug;

use labnote_engine::Notebook;

use crate::commands::RecordCommand;
use crate::render;

const PROMPT: &str = "labnote> ";

#[derive(Parser, Debug)]
#[command(no_binary_name = true, disable_version_flag = true)]
struct ShellLine {
    #[command(subcommand)]
    verb: ShellVerb,
}

#[derive(Subcommand, Debug)]
enum ShellVerb {
    #[command(flatten)]
    Record(RecordCommand),

    /// Bring back the most recently deleted record as a new record
    Undo,

    /// Pick up changes made by other sessions
    Sync,

    /// Leave the shell
    #[command(alias = "exit")]
    Quit,
}

pub fn run(
    notebook: &mut Notebook,
    export_dir: &Path,
    mut input: impl BufRead,
    out: &mut dyn Write,
) -> Result<()> {
    let mut line = String::new();
    loop {
        write!(out, "{PROMPT}")?;
        out.flush()?;
        line.clear();
        if input.read_line(&mut line)? == 0 {
            writeln!(out)?;
            return Ok(());
        }

        let words = match split_words(&line) {
            Ok(words) if words.is_empty() => continue,
            Ok(words) => words,
            Err(e) => {
                writeln!(out, "error: {e}")?;
                continue;
            }
        };
        let verb = match ShellLine::try_parse_from(&words) {
            Ok(parsed) => parsed.verb,
            Err(e) => {
                write!(out, "{}", e.render())?;
                continue;
            }
        };
        debug!(?verb, "shell command");

        let result = match verb {
            ShellVerb::Quit => return Ok(()),
            ShellVerb::Record(command) => command.run(notebook, export_dir, out),
            ShellVerb::Undo => undo(notebook, out),
            ShellVerb::Sync => sync(notebook, out),
        };
        if let Err(e) = result {
            writeln!(out, "error: {e:#}")?;
        }
        notebook.clear_error();
    }
}

fn undo(notebook: &mut Notebook, out: &mut dyn Write) -> Result<()> {
    match notebook.undo_delete()? {
        Some(record) => writeln!(out, "restored as {}", render::summary(&record))?,
        None => writeln!(out, "nothing to undo")?,
    }
    Ok(())
}

fn sync(notebook: &mut Notebook, out: &mut dyn Write) -> Result<()> {
    if notebook.sync()? {
        writeln!(out, "{} records after refresh", notebook.records().len())?;
    } else {
        writeln!(out, "no external changes")?;
    }
    Ok(())
}

/// Split on whitespace; double quotes group words and may be escaped with `\`.
fn split_words(line: &str) -> Result<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quoted = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' if quoted => match chars.next() {
                Some(escaped) => current.push(escaped),
                None => bail!("dangling escape"),
            },
            '"' => {
                quoted = !quoted;
                in_word = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if quoted {
        bail!("unterminated quote");
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}
