//! Mock CAN interface for testing.
//!
//! Records sent frames, or fails/stalls every send on demand. All tests use
//! this instead of real CAN hardware so the suite runs in CI on any platform.

use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::{CanError, CanResult};
use crate::interface::CanInterface;
use crate::types::CanFrame;

#[derive(Debug, Clone)]
enum Behavior {
    Accept,
    Fail(String),
    Stall(Duration),
}

/// Mock CAN interface with frame recording and scripted failures.
pub struct MockCanInterface {
    behavior: Behavior,
    /// Frames accepted by `send_frame` (for test assertions).
    sent_frames: Mutex<Vec<CanFrame>>,
    /// Every `send_frame` call, successful or not.
    attempts: AtomicUsize,
}

impl MockCanInterface {
    /// Create a mock that accepts and records every frame.
    pub fn new() -> Self {
        Self::with_behavior(Behavior::Accept)
    }

    /// Create a mock whose every send fails with an interface error.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self::with_behavior(Behavior::Fail(reason.into()))
    }

    /// Create a mock whose every send sleeps for `delay` before accepting.
    pub fn stalled(delay: Duration) -> Self {
        Self::with_behavior(Behavior::Stall(delay))
    }

    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior,
            sent_frames: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
        }
    }

    /// Get copies of all frames that were accepted.
    pub fn sent_frames(&self) -> Vec<CanFrame> {
        self.sent_frames.lock().unwrap().clone()
    }

    /// Number of `send_frame` calls, including failed ones.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Default for MockCanInterface {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CanInterface for MockCanInterface {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send_frame(&self, frame: &CanFrame) -> CanResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        frame.check()?;

        match &self.behavior {
            Behavior::Accept => {}
            Behavior::Fail(reason) => return Err(CanError::Interface(reason.clone())),
            Behavior::Stall(delay) => tokio::time::sleep(*delay).await,
        }

        self.sent_frames.lock().unwrap().push(frame.clone());
        Ok(())
    }
}
