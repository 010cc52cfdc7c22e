//! Core CAN bus types and identifiers used by the simulator.

use crate::error::{CanError, CanResult};

// ── CAN IDs ─────────────────────────────────────────────────────

/// Arbitration ID of the engine status broadcast frame.
pub const ENGINE_FRAME_ID: u32 = 0x100;

/// Highest valid standard (11-bit) arbitration ID.
pub const STANDARD_ID_MAX: u32 = 0x7FF;

/// Maximum payload length of a classic CAN frame.
pub const CAN_MAX_DLC: usize = 8;

// ── CAN Frame ───────────────────────────────────────────────────

/// A raw CAN 2.0A frame (standard 11-bit ID).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanFrame {
    /// CAN arbitration ID (11-bit standard).
    pub id: u32,
    /// Data payload (0–8 bytes for standard CAN).
    pub data: Vec<u8>,
}

impl CanFrame {
    pub fn new(id: u32, data: Vec<u8>) -> Self {
        Self { id, data }
    }

    /// Reject frames a classic CAN bus cannot carry: IDs beyond 11 bits or
    /// payloads longer than 8 bytes.
    pub fn check(&self) -> CanResult<()> {
        if self.id > STANDARD_ID_MAX {
            return Err(CanError::Interface(format!(
                "invalid standard ID 0x{:X}",
                self.id
            )));
        }
        if self.data.len() > CAN_MAX_DLC {
            return Err(CanError::Interface(format!(
                "invalid payload length {}",
                self.data.len()
            )));
        }
        Ok(())
    }

    /// Payload as space-separated uppercase hex (e.g. "0B B8 03 84").
    pub fn hex_data(&self) -> String {
        self.data
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_formatting() {
        let frame = CanFrame::new(ENGINE_FRAME_ID, vec![0x2E, 0xE0, 0x03, 0x84]);
        assert_eq!(frame.hex_data(), "2E E0 03 84");
    }

    #[test]
    fn engine_frame_passes_check() {
        CanFrame::new(ENGINE_FRAME_ID, vec![0; CAN_MAX_DLC]).check().unwrap();
        CanFrame::new(STANDARD_ID_MAX, vec![]).check().unwrap();
    }

    #[test]
    fn check_rejects_extended_id_and_long_payload() {
        let extended = CanFrame::new(STANDARD_ID_MAX + 1, vec![0; 8]);
        assert!(matches!(extended.check(), Err(CanError::Interface(_))));

        let long = CanFrame::new(ENGINE_FRAME_ID, vec![0; CAN_MAX_DLC + 1]);
        assert!(matches!(long.check(), Err(CanError::Interface(_))));
    }
}
