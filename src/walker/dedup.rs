//! Per-member link deduplication.

use std::collections::HashSet;

use crate::graph::channel::ItemSender;
use crate::graph::types::{Link, LinkKind, NodeKind};

/// Forwards links from one source, dropping repeats of `(target, target kind)`.
///
/// Lives exactly as long as the analysis of one member or type.
pub struct LinkDedup<'a> {
    sender: &'a ItemSender,
    source: String,
    seen: HashSet<(String, NodeKind)>,
}

impl<'a> LinkDedup<'a> {
    pub fn new(sender: &'a ItemSender, source: impl Into<String>) -> Self {
        Self {
            sender,
            source: source.into(),
            seen: HashSet::new(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Forward the link unless its key was already seen. Returns true if sent.
    pub fn link(&mut self, target: String, target_kind: NodeKind, kind: LinkKind) -> bool {
        if !self.seen.insert((target.clone(), target_kind)) {
            return false;
        }
        self.sender
            .link(Link::new(self.source.clone(), target, target_kind, kind))
    }

    pub fn emitted(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::channel::item_channel;

    #[test]
    fn test_repeats_are_dropped_within_scope() {
        let (tx, mut rx) = item_channel();
        let mut dedup = LinkDedup::new(&tx, "m.A.M()");
        assert!(dedup.link("m.B.X()".into(), NodeKind::Member, LinkKind::Call));
        assert!(!dedup.link("m.B.X()".into(), NodeKind::Member, LinkKind::Call));
        // classification does not take part in the key
        assert!(!dedup.link("m.B.X()".into(), NodeKind::Member, LinkKind::MemberAccess));
        assert!(dedup.link("m.B.X()".into(), NodeKind::Private, LinkKind::Call));
        assert_eq!(dedup.emitted(), 2);
        assert_eq!(rx.drain().len(), 2);
    }

    #[test]
    fn test_scopes_are_independent() {
        let (tx, mut rx) = item_channel();
        for source in ["m.A.M()", "m.A.N()"] {
            let mut dedup = LinkDedup::new(&tx, source);
            dedup.link("m.B.X()".into(), NodeKind::Member, LinkKind::Call);
        }
        let links: Vec<Link> = rx.drain().into_iter().filter_map(|i| i.as_link().cloned()).collect();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].source, "m.A.M()");
        assert_eq!(links[1].source, "m.A.N()");
    }
}
