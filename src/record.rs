//! Installation record
//!
//! The ordered list of visited panels and the data each one collected. Written
//! at the end of an interactive run, it is the script an unattended run
//! replays.

use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{InstallerError, Result};

/// One visited panel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelRecord {
    #[serde(rename = "panel")]
    pub panel_id: String,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl PanelRecord {
    pub fn new(panel_id: impl Into<String>, data: BTreeMap<String, String>) -> Self {
        Self {
            panel_id: panel_id.into(),
            data,
        }
    }
}

/// Receives the records of visited panels, in panel order.
pub trait RecordSink {
    fn write_panel(&mut self, record: &PanelRecord) -> Result<()>;

    /// Called once after the last panel.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl RecordSink for Vec<PanelRecord> {
    fn write_panel(&mut self, record: &PanelRecord) -> Result<()> {
        self.push(record.clone());
        Ok(())
    }
}

/// Writes the record as a pretty-printed JSON array on `finish`.
#[derive(Debug)]
pub struct JsonRecordSink<W: Write> {
    writer: W,
    records: Vec<PanelRecord>,
    finished: bool,
}

impl<W: Write> JsonRecordSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            records: Vec::new(),
            finished: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> RecordSink for JsonRecordSink<W> {
    fn write_panel(&mut self, record: &PanelRecord) -> Result<()> {
        if self.finished {
            return Err(InstallerError::record("record already finished"));
        }
        self.records.push(record.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Err(InstallerError::record("record already finished"));
        }
        serde_json::to_writer_pretty(&mut self.writer, &self.records)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.finished = true;
        Ok(())
    }
}

/// Parse a record previously written by [`JsonRecordSink`].
pub fn read_records(reader: impl Read) -> Result<Vec<PanelRecord>> {
    Ok(serde_json::from_reader(reader)?)
}

pub fn load_records(path: impl AsRef<Path>) -> Result<Vec<PanelRecord>> {
    let file = fs::File::open(path)?;
    read_records(std::io::BufReader::new(file))
}
