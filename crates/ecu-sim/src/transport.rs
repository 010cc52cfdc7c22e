//! Frame transport selection and the log-and-continue fallback.
//!
//! A send goes to the bus at most once, bounded by a timeout. If it fails
//! the frame is handed to the null transport and the caller gets the error
//! back as data, never as a panic or an aborted tick.

use std::sync::Arc;
use std::time::Duration;

use ecu_canbus::{CanError, CanInterface, CanResult, EngineFrame, NullInterface};
use ecu_protocol::EventRecord;
use ecu_protocol::event::CAN_OPEN_FAIL;

use crate::config::{SimConfig, TransportSelection};

/// Send one frame on `interface`, giving up after `timeout`.
pub async fn transmit(
    frame: &EngineFrame,
    interface: &dyn CanInterface,
    timeout: Duration,
) -> CanResult<()> {
    let can_frame = frame.to_can_frame();
    match tokio::time::timeout(timeout, interface.send_frame(&can_frame)).await {
        Ok(result) => result,
        Err(_) => Err(CanError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

/// What happened to a frame.
#[derive(Debug)]
pub enum Delivery {
    /// Accepted by the bus.
    Sent,
    /// No bus configured; logged by the null transport.
    Logged,
    /// Bus send failed; logged by the null transport instead.
    FellBack(CanError),
}

/// The run's frame destination.
pub struct Transport {
    bus: Option<Arc<dyn CanInterface>>,
    null: NullInterface,
    timeout: Duration,
}

impl Transport {
    /// Log-only transport.
    pub fn null(timeout: Duration) -> Self {
        Self {
            bus: None,
            null: NullInterface,
            timeout,
        }
    }

    /// Transport that tries `bus` first.
    pub fn with_bus(bus: Arc<dyn CanInterface>, timeout: Duration) -> Self {
        Self {
            bus: Some(bus),
            null: NullInterface,
            timeout,
        }
    }

    /// Build the transport named by the configuration. When the bus cannot
    /// be opened the null transport is used and a `CAN_OPEN_FAIL` event is
    /// returned for the caller to record.
    pub fn connect(config: &SimConfig) -> (Self, Option<EventRecord>) {
        let timeout = config.transmit_timeout();
        match config.transport {
            TransportSelection::None => (Self::null(timeout), None),
            TransportSelection::Bus => match open_bus(&config.can_interface) {
                Ok(bus) => (Self::with_bus(bus, timeout), None),
                Err(e) => {
                    tracing::warn!(
                        interface = %config.can_interface,
                        error = %e,
                        "unable to open CAN interface, frames will be logged only"
                    );
                    let event = EventRecord::new(
                        CAN_OPEN_FAIL,
                        0,
                        0.0,
                        format!("Failed to open CAN interface {}: {e}", config.can_interface),
                    );
                    (Self::null(timeout), Some(event))
                }
            },
        }
    }

    /// Name of the bus interface, if one is attached.
    pub fn bus_name(&self) -> Option<&str> {
        self.bus.as_deref().map(|b| b.name())
    }

    /// Deliver one frame. Never retries and never fails.
    pub async fn deliver(&self, frame: &EngineFrame) -> Delivery {
        let Some(bus) = &self.bus else {
            self.log_only(frame).await;
            return Delivery::Logged;
        };

        match transmit(frame, bus.as_ref(), self.timeout).await {
            Ok(()) => {
                tracing::debug!(sequence = frame.sequence, interface = bus.name(), "frame sent");
                Delivery::Sent
            }
            Err(e) => {
                tracing::warn!(
                    sequence = frame.sequence,
                    interface = bus.name(),
                    error = %e,
                    "CAN send failed, falling back to log"
                );
                self.log_only(frame).await;
                Delivery::FellBack(e)
            }
        }
    }

    async fn log_only(&self, frame: &EngineFrame) {
        // NullInterface::send_frame is infallible.
        let _ = self.null.send_frame(&frame.to_can_frame()).await;
    }
}

#[cfg(target_os = "linux")]
fn open_bus(name: &str) -> CanResult<Arc<dyn CanInterface>> {
    let bus = ecu_canbus::SocketCanInterface::open(name)?;
    Ok(Arc::new(bus))
}

#[cfg(not(target_os = "linux"))]
fn open_bus(name: &str) -> CanResult<Arc<dyn CanInterface>> {
    Err(CanError::Interface(format!(
        "SocketCAN interface {name} requires Linux"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecu_canbus::{FrameEncoder, MockCanInterface};
    use ecu_protocol::EngineState;

    fn frame() -> EngineFrame {
        FrameEncoder::new().encode(&EngineState::initial(25.0, 7000.0))
    }

    #[tokio::test]
    async fn null_transport_logs() {
        let transport = Transport::null(Duration::from_millis(50));
        assert!(matches!(transport.deliver(&frame()).await, Delivery::Logged));
        assert!(transport.bus_name().is_none());
    }

    #[tokio::test]
    async fn healthy_bus_receives_frame() {
        let mock = Arc::new(MockCanInterface::new());
        let transport = Transport::with_bus(mock.clone(), Duration::from_millis(50));
        assert!(matches!(transport.deliver(&frame()).await, Delivery::Sent));
        assert_eq!(mock.sent_frames().len(), 1);
        assert_eq!(transport.bus_name(), Some("mock"));
    }

    #[tokio::test]
    async fn failing_bus_falls_back_without_retry() {
        let mock = Arc::new(MockCanInterface::failing("permission denied"));
        let transport = Transport::with_bus(mock.clone(), Duration::from_millis(50));
        let outcome = transport.deliver(&frame()).await;
        assert!(matches!(outcome, Delivery::FellBack(CanError::Interface(_))));
        assert_eq!(mock.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_bus_times_out() {
        let mock = Arc::new(MockCanInterface::stalled(Duration::from_secs(30)));
        let transport = Transport::with_bus(mock.clone(), Duration::from_millis(50));
        let outcome = transport.deliver(&frame()).await;
        assert!(matches!(
            outcome,
            Delivery::FellBack(CanError::Timeout { timeout_ms: 50 })
        ));
        assert!(mock.sent_frames().is_empty());
    }

    #[test]
    fn connect_without_bus_is_null() {
        let (transport, event) = Transport::connect(&SimConfig::default());
        assert!(transport.bus_name().is_none());
        assert!(event.is_none());
    }

    #[test]
    fn connect_to_missing_interface_records_open_failure() {
        let config = SimConfig {
            transport: TransportSelection::Bus,
            can_interface: "nosuchcan7".into(),
            ..Default::default()
        };
        let (transport, event) = Transport::connect(&config);
        assert!(transport.bus_name().is_none());
        let event = event.unwrap();
        assert_eq!(event.code, CAN_OPEN_FAIL);
        assert!(event.payload.contains("nosuchcan7"));
    }
}
