//! Graph items, the channel that carries them, and the collected graph.

pub mod builder;
pub mod channel;
pub mod engine;
pub mod types;

pub use builder::{collect_items, join_parse, parse, parse_with_cancel, spawn_parse};
pub use channel::{item_channel, ItemCounters, ItemReceiver, ItemSender};
pub use engine::{GraphStats, ItemGraph};
pub use types::{Item, Link, LinkKind, MemberKind, Node, NodeKind, SourceLocation};
