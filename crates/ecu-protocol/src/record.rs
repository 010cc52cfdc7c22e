use serde::{Deserialize, Serialize};

use crate::dtc::{DtcRecord, DtcStatus};
use crate::event::EventRecord;

/// Anything the diagnostics layer emits. Append-only once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiagnosticRecord {
    Dtc(DtcRecord),
    Event(EventRecord),
}

impl DiagnosticRecord {
    pub fn code(&self) -> &str {
        match self {
            Self::Dtc(dtc) => &dtc.code,
            Self::Event(event) => &event.code,
        }
    }

    pub fn tick(&self) -> u64 {
        match self {
            Self::Dtc(dtc) => dtc.tick,
            Self::Event(event) => event.tick,
        }
    }

    pub fn as_dtc(&self) -> Option<&DtcRecord> {
        match self {
            Self::Dtc(dtc) => Some(dtc),
            Self::Event(_) => None,
        }
    }

    pub fn as_event(&self) -> Option<&EventRecord> {
        match self {
            Self::Event(event) => Some(event),
            Self::Dtc(_) => None,
        }
    }

    /// True for an `Active` DTC record with the given code.
    pub fn is_dtc_activation(&self, code: &str) -> bool {
        self.as_dtc()
            .is_some_and(|d| d.code == code && d.status == DtcStatus::Active)
    }

    /// True for an event record with the given code.
    pub fn is_event(&self, code: &str) -> bool {
        self.as_event().is_some_and(|e| e.code == code)
    }
}

impl From<DtcRecord> for DiagnosticRecord {
    fn from(record: DtcRecord) -> Self {
        Self::Dtc(record)
    }
}

impl From<EventRecord> for DiagnosticRecord {
    fn from(record: EventRecord) -> Self {
        Self::Event(record)
    }
}
