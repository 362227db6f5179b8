//! Item channel: the hand-off point between the walkers and the consumer.
//!
//! Unbounded and multi-producer. Every worker holds a clone of the
//! sender; the stream completes when the last clone is dropped.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use super::types::{Item, Link, Node};

/// Per-invocation item counters shared by all senders of one channel.
#[derive(Debug, Default)]
pub struct ItemCounters {
    nodes: AtomicUsize,
    links: AtomicUsize,
}

impl ItemCounters {
    pub fn nodes(&self) -> usize {
        self.nodes.load(Ordering::Relaxed)
    }

    pub fn links(&self) -> usize {
        self.links.load(Ordering::Relaxed)
    }
}

/// Producer side. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ItemSender {
    tx: UnboundedSender<Item>,
    counters: Arc<ItemCounters>,
}

/// Consumer side.
#[derive(Debug)]
pub struct ItemReceiver {
    rx: UnboundedReceiver<Item>,
}

/// Create a new item channel.
pub fn item_channel() -> (ItemSender, ItemReceiver) {
    let (tx, rx) = unbounded_channel();
    (
        ItemSender {
            tx,
            counters: Arc::new(ItemCounters::default()),
        },
        ItemReceiver { rx },
    )
}

impl ItemSender {
    /// Send one item. Returns false once the receiver is gone.
    pub fn send(&self, item: Item) -> bool {
        let counter = match item {
            Item::Node(_) => &self.counters.nodes,
            Item::Link(_) => &self.counters.links,
        };
        if self.tx.send(item).is_err() {
            return false;
        }
        counter.fetch_add(1, Ordering::Relaxed);
        true
    }

    pub fn node(&self, node: Node) -> bool {
        self.send(Item::Node(node))
    }

    pub fn link(&self, link: Link) -> bool {
        self.send(Item::Link(link))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn counters(&self) -> &ItemCounters {
        &self.counters
    }
}

impl ItemReceiver {
    /// Wait for the next item; `None` once all senders are dropped.
    pub async fn recv(&mut self) -> Option<Item> {
        self.rx.recv().await
    }

    /// Blocking variant for use outside an async runtime.
    pub fn blocking_recv(&mut self) -> Option<Item> {
        self.rx.blocking_recv()
    }

    /// Take everything currently buffered without waiting.
    pub fn drain(&mut self) -> Vec<Item> {
        let mut items = Vec::new();
        while let Ok(item) = self.rx.try_recv() {
            items.push(item);
        }
        items
    }

    /// Block until the stream completes and return every item.
    pub fn collect_blocking(mut self) -> Vec<Item> {
        let mut items = Vec::new();
        while let Some(item) = self.blocking_recv() {
            items.push(item);
        }
        items
    }
}
