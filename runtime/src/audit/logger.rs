//! JSONL run trace — one line per entry or establishment visited.

use crate::model::Skip;
use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const TRACE_FILE: &str = "harvest-trace.jsonl";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Skipped,
    Fatal,
}

/// A single trace event.
#[derive(Debug, Clone, Serialize)]
pub struct TraceEvent {
    pub timestamp: String,
    pub run_id: String,
    pub stage: String,
    pub page: Option<u32>,
    pub index: Option<usize>,
    pub name: Option<String>,
    pub url: Option<String>,
    pub status: Status,
    pub reason: Option<String>,
}

/// Append-only JSONL trace shared by every event of one run.
pub struct RunTrace {
    file: File,
    path: PathBuf,
    run_id: Uuid,
}

impl RunTrace {
    /// Open or create the trace file, appending to earlier runs.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open run trace: {}", path.display()))?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
            run_id: Uuid::new_v4(),
        })
    }

    /// Open `harvest-trace.jsonl` inside the output directory.
    pub fn in_dir(dir: &Path) -> Result<Self> {
        Self::open(&dir.join(TRACE_FILE))
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn log(&mut self, event: &TraceEvent) -> Result<()> {
        let json = serde_json::to_string(event)?;
        writeln!(self.file, "{json}")?;
        Ok(())
    }

    fn event(&self, stage: &str, status: Status) -> TraceEvent {
        TraceEvent {
            timestamp: Utc::now().to_rfc3339(),
            run_id: self.run_id.to_string(),
            stage: stage.to_string(),
            page: None,
            index: None,
            name: None,
            url: None,
            status,
            reason: None,
        }
    }

    /// A record was produced.
    pub fn ok(&mut self, stage: &str, page: Option<u32>, name: &str, url: &str) -> Result<()> {
        let event = TraceEvent {
            page,
            name: Some(name.to_string()),
            url: Some(url.to_string()),
            ..self.event(stage, Status::Ok)
        };
        self.log(&event)
    }

    /// An entry or establishment was passed over.
    pub fn skipped(&mut self, stage: &str, skip: &Skip, url: Option<&str>) -> Result<()> {
        let event = TraceEvent {
            page: (skip.page > 0).then_some(skip.page),
            index: Some(skip.index),
            name: skip.name.clone(),
            url: url.map(String::from),
            reason: Some(skip.reason.clone()),
            ..self.event(stage, Status::Skipped)
        };
        self.log(&event)
    }

    /// The run ended on a session-fatal error.
    pub fn fatal(&mut self, stage: &str, reason: &str) -> Result<()> {
        let event = TraceEvent {
            reason: Some(reason.to_string()),
            ..self.event(stage, Status::Fatal)
        };
        self.log(&event)
    }
}
