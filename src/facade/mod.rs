pub mod store;

pub use store::{CoordinationStore, WatchedRead};
