//! Append-only record sinks.
//!
//! The simulation loop hands every state row and diagnostic record to a
//! `RecordSink` in emission order. Sinks never reorder or drop records.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;

use ecu_protocol::{DiagnosticRecord, EngineState};

use crate::error::SinkError;

/// One item handed to a sink.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum SinkRecord<'a> {
    State(&'a EngineState),
    Diagnostic(&'a DiagnosticRecord),
}

/// Destination for simulation output.
pub trait RecordSink: Send {
    /// Append one record. Must preserve call order.
    fn append(&mut self, record: SinkRecord<'_>) -> Result<(), SinkError>;

    /// Push buffered output to the underlying medium.
    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

// ── Memory ──────────────────────────────────────────────────────

/// Owned copy of a `SinkRecord`.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredRecord {
    State(EngineState),
    Diagnostic(DiagnosticRecord),
}

/// In-memory sink for tests and live views.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Vec<StoredRecord>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything appended, in order.
    pub fn entries(&self) -> &[StoredRecord] {
        &self.entries
    }

    pub fn states(&self) -> Vec<&EngineState> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                StoredRecord::State(s) => Some(s),
                StoredRecord::Diagnostic(_) => None,
            })
            .collect()
    }

    pub fn records(&self) -> Vec<&DiagnosticRecord> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                StoredRecord::Diagnostic(r) => Some(r),
                StoredRecord::State(_) => None,
            })
            .collect()
    }

    /// Number of event records with the given code.
    pub fn count_events(&self, code: &str) -> usize {
        self.records().iter().filter(|r| r.is_event(code)).count()
    }
}

impl RecordSink for MemorySink {
    fn append(&mut self, record: SinkRecord<'_>) -> Result<(), SinkError> {
        self.entries.push(match record {
            SinkRecord::State(s) => StoredRecord::State(s.clone()),
            SinkRecord::Diagnostic(r) => StoredRecord::Diagnostic(r.clone()),
        });
        Ok(())
    }
}

// ── CSV ─────────────────────────────────────────────────────────

pub const DATA_LOG: &str = "data_log.csv";
pub const DTC_LOG: &str = "dtc_log.csv";
pub const EVENT_LOG: &str = "event_log.csv";

const DATA_HEADER: &[&str] = &[
    "recorded_at",
    "tick",
    "elapsed_secs",
    "rpm",
    "coolant_temp_c",
    "coolant_reading_c",
    "oil_temp_c",
    "oil_pressure_kpa",
    "throttle",
    "oil_health",
    "fan_on",
    "derate",
    "fault",
];

const DTC_HEADER: &[&str] = &[
    "recorded_at",
    "tick",
    "elapsed_secs",
    "code",
    "status",
    "occurrence",
    "severity",
    "description",
];

const EVENT_HEADER: &[&str] = &["recorded_at", "tick", "elapsed_secs", "code", "description"];

/// Writes the three CSV logs into a directory.
///
/// The data log is truncated per run; DTC and event logs are appended to
/// and get a header only when new.
pub struct CsvSink {
    dir: PathBuf,
    data: csv::Writer<File>,
    dtcs: csv::Writer<File>,
    events: csv::Writer<File>,
}

impl CsvSink {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, SinkError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;

        let data_file = File::create(dir.join(DATA_LOG))?;
        let mut data = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(data_file);
        data.write_record(DATA_HEADER)?;

        let dtcs = open_append(&dir.join(DTC_LOG), DTC_HEADER)?;
        let events = open_append(&dir.join(EVENT_LOG), EVENT_HEADER)?;

        tracing::info!(dir = %dir.display(), "CSV logs opened");
        Ok(Self {
            dir,
            data,
            dtcs,
            events,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn open_append(path: &Path, header: &[&str]) -> Result<csv::Writer<File>, SinkError> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let is_new = file.metadata()?.len() == 0;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    if is_new {
        writer.write_record(header)?;
    }
    Ok(writer)
}

impl RecordSink for CsvSink {
    fn append(&mut self, record: SinkRecord<'_>) -> Result<(), SinkError> {
        let now = Utc::now().to_rfc3339();
        match record {
            SinkRecord::State(s) => {
                let fault = s
                    .active_faults
                    .iter()
                    .map(|f| f.as_str())
                    .collect::<Vec<_>>()
                    .join("|");
                self.data.write_record([
                    now,
                    s.tick.to_string(),
                    format!("{:.3}", s.elapsed_secs),
                    format!("{:.2}", s.rpm),
                    format!("{:.2}", s.coolant_temp_c),
                    format!("{:.2}", s.coolant_reading_c()),
                    format!("{:.2}", s.oil_temp_c),
                    format!("{:.2}", s.oil_pressure_kpa),
                    format!("{:.3}", s.throttle),
                    format!("{:.3}", s.oil_health),
                    s.fan_on.to_string(),
                    s.derate_engaged().to_string(),
                    fault,
                ])?;
            }
            SinkRecord::Diagnostic(DiagnosticRecord::Dtc(d)) => {
                self.dtcs.write_record([
                    now,
                    d.tick.to_string(),
                    format!("{:.3}", d.elapsed_secs),
                    d.code.clone(),
                    d.status.as_str().to_string(),
                    d.occurrence.to_string(),
                    d.severity.as_str().to_string(),
                    d.description.clone(),
                ])?;
            }
            SinkRecord::Diagnostic(DiagnosticRecord::Event(e)) => {
                self.events.write_record([
                    now,
                    e.tick.to_string(),
                    format!("{:.3}", e.elapsed_secs),
                    e.code.clone(),
                    e.payload.clone(),
                ])?;
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.data.flush()?;
        self.dtcs.flush()?;
        self.events.flush()?;
        Ok(())
    }
}

// ── JSON lines ──────────────────────────────────────────────────

/// Writes one JSON object per record (NDJSON).
pub struct JsonLinesSink<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> RecordSink for JsonLinesSink<W> {
    fn append(&mut self, record: SinkRecord<'_>) -> Result<(), SinkError> {
        serde_json::to_writer(&mut self.writer, &record)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

// ── Fan-out ─────────────────────────────────────────────────────

/// Forwards every record to each inner sink, in registration order.
/// Stops at the first failing sink.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn RecordSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sink: Box<dyn RecordSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl RecordSink for FanoutSink {
    fn append(&mut self, record: SinkRecord<'_>) -> Result<(), SinkError> {
        for sink in &mut self.sinks {
            sink.append(record)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        for sink in &mut self.sinks {
            sink.flush()?;
        }
        Ok(())
    }
}
