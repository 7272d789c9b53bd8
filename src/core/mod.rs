pub mod error;
pub mod path;
pub mod types;

pub use error::{CoordError, ErrorCode, Result};
pub use types::{ANY_VERSION, CreateMode, SessionId, Stat, Zxid};
