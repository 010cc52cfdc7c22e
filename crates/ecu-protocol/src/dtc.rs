use serde::{Deserialize, Serialize};

/// Severity classification of a DTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DtcSeverity {
    /// Informational — no immediate action needed.
    Info,
    /// Warning — schedule maintenance.
    Warning,
    /// Critical — immediate attention required.
    Critical,
}

impl DtcSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

/// Lifecycle status carried by a DTC record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DtcStatus {
    Active,
    Cleared,
}

impl DtcStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Cleared => "cleared",
        }
    }
}

/// One status transition of a diagnostic trouble code.
///
/// An occurrence produces exactly two records over its life: `Active` when
/// it sets and `Cleared` when it heals. Both share the occurrence number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DtcRecord {
    /// Standard DTC string (e.g., "P0217").
    pub code: String,
    /// Human-readable description.
    pub description: String,
    /// Severity classification.
    pub severity: DtcSeverity,
    /// Status this record transitions the code into.
    pub status: DtcStatus,
    /// 1-based occurrence counter for this code within the run.
    pub occurrence: u32,
    /// Tick on which the transition was committed.
    pub tick: u64,
    /// Simulated seconds at the transition.
    pub elapsed_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dtc_record_json_shape() {
        let record = DtcRecord {
            code: "P0217".into(),
            description: "Engine Coolant Over Temperature Condition".into(),
            severity: DtcSeverity::Critical,
            status: DtcStatus::Active,
            occurrence: 1,
            tick: 42,
            elapsed_secs: 21.0,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["status"], "active");
        assert_eq!(json["severity"], "critical");
        assert_eq!(json["occurrence"], 1);
    }

    #[test]
    fn severity_ordering() {
        assert!(DtcSeverity::Info < DtcSeverity::Warning);
        assert!(DtcSeverity::Warning < DtcSeverity::Critical);
    }
}
