//! CAN bus transport abstraction.
//!
//! `CanInterface` trait with `send_frame`. Three impls:
//! - `NullInterface` — all platforms, logs the frame and discards it
//! - `SocketCanInterface` — Linux-only, wraps `socketcan::CanSocket`
//! - `MockCanInterface` — all platforms, records or fails on demand (in `mock.rs`)

use async_trait::async_trait;

use crate::error::CanResult;
use crate::types::CanFrame;

/// Trait for CAN bus transport implementations.
#[async_trait]
pub trait CanInterface: Send + Sync {
    /// Interface name used in logs and events (e.g. "vcan0", "null").
    fn name(&self) -> &str;

    /// Send a CAN frame. Must not block for longer than a bus write.
    async fn send_frame(&self, frame: &CanFrame) -> CanResult<()>;
}

// ── Null transport ──────────────────────────────────────────────

/// Transport that always succeeds. Frames are only written to the log.
#[derive(Debug, Default)]
pub struct NullInterface;

#[async_trait]
impl CanInterface for NullInterface {
    fn name(&self) -> &str {
        "null"
    }

    async fn send_frame(&self, frame: &CanFrame) -> CanResult<()> {
        tracing::info!(
            id = format_args!("0x{:03X}", frame.id),
            data = %frame.hex_data(),
            "frame"
        );
        Ok(())
    }
}

// ── SocketCAN (Linux-only) ──────────────────────────────────────

/// SocketCAN interface for Linux hosts.
///
/// The socket is opened non-blocking: a full transmit queue surfaces as an
/// error instead of stalling the caller.
#[cfg(target_os = "linux")]
pub struct SocketCanInterface {
    interface_name: String,
    socket: socketcan::CanSocket,
}

#[cfg(target_os = "linux")]
impl SocketCanInterface {
    /// Open the named interface (e.g. "vcan0", "can0").
    pub fn open(interface_name: &str) -> CanResult<Self> {
        use socketcan::Socket;

        let socket = socketcan::CanSocket::open(interface_name).map_err(|e| {
            crate::error::CanError::Interface(format!("failed to open {interface_name}: {e}"))
        })?;
        socket.set_nonblocking(true)?;

        tracing::info!(interface = interface_name, "CAN interface opened");
        Ok(Self {
            interface_name: interface_name.to_string(),
            socket,
        })
    }
}

#[cfg(target_os = "linux")]
#[async_trait]
impl CanInterface for SocketCanInterface {
    fn name(&self) -> &str {
        &self.interface_name
    }

    async fn send_frame(&self, frame: &CanFrame) -> CanResult<()> {
        use crate::error::CanError;
        use socketcan::{EmbeddedFrame, Socket, StandardId};

        frame.check()?;
        // `check` bounds the ID to 11 bits and the payload to 8 bytes.
        let id = StandardId::new(frame.id as u16)
            .ok_or_else(|| CanError::Interface(format!("invalid standard ID 0x{:X}", frame.id)))?;
        let raw = socketcan::CanFrame::new(id, &frame.data)
            .ok_or_else(|| CanError::Interface(format!("invalid payload length {}", frame.data.len())))?;

        self.socket.write_frame(&raw)?;
        Ok(())
    }
}
