//! Engine status frame codec.
//!
//! Layout of the 8-byte payload on ID `0x100` (big-endian):
//!
//! | Bytes | Field        | Type | Scale        |
//! |-------|--------------|------|--------------|
//! | 0–1   | RPM          | u16  | 0.25 rpm/bit |
//! | 2–3   | Coolant temp | i16  | 0.1 °C/bit   |
//! | 4–5   | Oil pressure | i16  | 0.1 kPa/bit  |
//! | 6     | Status flags | u8   | see `FLAG_*` |
//! | 7     | Rolling ctr  | u8   | sequence & 0xFF |
//!
//! Values are rounded to the nearest step and saturate at the type limits.

use ecu_protocol::EngineState;

use crate::error::{CanError, CanResult};
use crate::types::{CAN_MAX_DLC, CanFrame, ENGINE_FRAME_ID};

/// RPM resolution in rpm per bit.
pub const RPM_SCALE: f64 = 0.25;

/// Coolant temperature resolution in celsius per bit.
pub const TEMP_SCALE: f64 = 0.1;

/// Oil pressure resolution in kPa per bit.
pub const PRESSURE_SCALE: f64 = 0.1;

/// Payload length of the engine status frame.
pub const FRAME_LEN: usize = CAN_MAX_DLC;

/// Status bit: cooling fan running.
pub const FLAG_FAN_ON: u8 = 0b0000_0001;
/// Status bit: derate engaged (fault or protective).
pub const FLAG_DERATE: u8 = 0b0000_0010;
/// Status bit: an injected fault is active this tick.
pub const FLAG_FAULT: u8 = 0b0000_0100;

/// One encoded engine snapshot. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineFrame {
    /// CAN arbitration ID.
    pub id: u32,
    /// Monotonic encode counter (ordering checks only, never retransmission).
    pub sequence: u64,
    /// Fixed-length payload.
    pub data: [u8; FRAME_LEN],
}

impl EngineFrame {
    pub fn to_can_frame(&self) -> CanFrame {
        CanFrame::new(self.id, self.data.to_vec())
    }
}

/// Stateful encoder that stamps each frame with the next sequence number.
#[derive(Debug, Default)]
pub struct FrameEncoder {
    next_sequence: u64,
}

impl FrameEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence number the next `encode` call will use.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Encode a state snapshot. The counter advances on every call.
    pub fn encode(&mut self, state: &EngineState) -> EngineFrame {
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let rpm = scale_unsigned(state.rpm, RPM_SCALE);
        let temp = scale_signed(state.coolant_reading_c(), TEMP_SCALE);
        let pressure = scale_signed(state.oil_pressure_kpa, PRESSURE_SCALE);

        let mut flags = 0u8;
        if state.fan_on {
            flags |= FLAG_FAN_ON;
        }
        if state.derate_engaged() {
            flags |= FLAG_DERATE;
        }
        if !state.active_faults.is_empty() {
            flags |= FLAG_FAULT;
        }

        let mut data = [0u8; FRAME_LEN];
        data[0..2].copy_from_slice(&rpm.to_be_bytes());
        data[2..4].copy_from_slice(&temp.to_be_bytes());
        data[4..6].copy_from_slice(&pressure.to_be_bytes());
        data[6] = flags;
        data[7] = (sequence & 0xFF) as u8;

        EngineFrame {
            id: ENGINE_FRAME_ID,
            sequence,
            data,
        }
    }
}

fn scale_unsigned(value: f64, scale: f64) -> u16 {
    if !value.is_finite() {
        return 0;
    }
    (value / scale).round().clamp(0.0, f64::from(u16::MAX)) as u16
}

fn scale_signed(value: f64, scale: f64) -> i16 {
    if !value.is_finite() {
        return 0;
    }
    (value / scale)
        .round()
        .clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
}

/// Physical values recovered from an engine status frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    pub rpm: f64,
    pub coolant_temp_c: f64,
    pub oil_pressure_kpa: f64,
    pub fan_on: bool,
    pub derate: bool,
    pub fault_present: bool,
    pub rolling_counter: u8,
}

/// Decode an engine status frame.
pub fn decode(frame: &CanFrame) -> CanResult<DecodedFrame> {
    if frame.id != ENGINE_FRAME_ID {
        return Err(CanError::Decode(format!(
            "unexpected arbitration ID 0x{:03X}",
            frame.id
        )));
    }
    if frame.data.len() != FRAME_LEN {
        return Err(CanError::Decode(format!(
            "expected {FRAME_LEN} data bytes, got {}",
            frame.data.len()
        )));
    }

    let d = &frame.data;
    let rpm = u16::from_be_bytes([d[0], d[1]]);
    let temp = i16::from_be_bytes([d[2], d[3]]);
    let pressure = i16::from_be_bytes([d[4], d[5]]);
    let flags = d[6];

    Ok(DecodedFrame {
        rpm: f64::from(rpm) * RPM_SCALE,
        coolant_temp_c: f64::from(temp) * TEMP_SCALE,
        oil_pressure_kpa: f64::from(pressure) * PRESSURE_SCALE,
        fan_on: flags & FLAG_FAN_ON != 0,
        derate: flags & FLAG_DERATE != 0,
        fault_present: flags & FLAG_FAULT != 0,
        rolling_counter: d[7],
    })
}
