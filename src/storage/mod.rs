pub mod journal;
pub mod node;
pub mod tree;

pub use journal::{ChangeLog, DurabilityMode, FileChangeLog, JournalRecord, JournalScan, NullChangeLog};
pub use node::Node;
pub use tree::NamespaceTree;
