use anyhow::{anyhow, Context, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use slo_agent::models::message::Message;

/// Directory holding one JSONL file per recorded session.
pub fn ensure_session_dir() -> Result<PathBuf> {
    let home_dir =
        dirs::home_dir().ok_or_else(|| anyhow!("Could not determine home directory"))?;
    let sessions = home_dir.join(".config").join("slo-agent").join("sessions");
    fs::create_dir_all(&sessions)?;
    Ok(sessions)
}

/// Resolve a session name (generated when absent) to its JSONL file path.
pub fn session_path(session_dir: &Path, name: Option<&str>) -> PathBuf {
    let name = match name {
        Some(name) => name.to_string(),
        None => uuid::Uuid::new_v4().to_string(),
    };
    session_dir.join(format!("{}.jsonl", name))
}

pub fn readable_session_file(session_file: &Path) -> Result<File> {
    fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(session_file)
        .with_context(|| format!("Failed to open session file {}", session_file.display()))
}

/// Rewrite the session file with the full message log, one JSON document
/// per line.
pub fn persist_messages(session_file: &Path, messages: &[Message]) -> Result<()> {
    write_messages(File::create(session_file)?, messages)
}

pub(crate) fn write_messages(file: File, messages: &[Message]) -> Result<()> {
    let mut writer = BufWriter::new(file);
    for message in messages {
        serde_json::to_writer(&mut writer, message)?;
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}
