pub mod codec;
pub mod error;
pub mod interface;
pub mod mock;
pub mod types;

pub use codec::{DecodedFrame, EngineFrame, FrameEncoder, decode};
pub use error::{CanError, CanResult};
pub use interface::{CanInterface, NullInterface};
pub use mock::MockCanInterface;
pub use types::{CanFrame, ENGINE_FRAME_ID};

// SocketCAN only available on Linux
#[cfg(target_os = "linux")]
pub use interface::SocketCanInterface;
