pub mod dtc;
pub mod event;
pub mod record;
pub mod state;

pub use dtc::*;
pub use event::*;
pub use record::*;
pub use state::*;
