pub mod error;
pub mod frame;
pub mod time;
pub mod types;

pub use error::{Result, TallyError};
pub use frame::{CountFrame, MinuteCount};
pub use time::{truncate_to_minute, Timestamp};
pub use types::*;
