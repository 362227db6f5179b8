//! Core types for the dependency graph item stream.
//!
//! Defines node kinds, link kinds, and the `Item` values that flow
//! from the walkers through the item channel.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::names;

/// The kind of a node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// The root of a solution input.
    Solution,
    /// A folder grouping projects inside a solution.
    SolutionFolder,
    /// An assembly or compilation.
    Module,
    /// A namespace segment.
    Namespace,
    /// A class, struct, interface, enum, record or delegate.
    Type,
    /// A visible member. `Node::member_kind` carries the sub-kind.
    Member,
    /// A private member. `Node::member_kind` carries the sub-kind.
    Private,
    /// A module outside the input, or the group holding such modules.
    External,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Solution => write!(f, "solution"),
            NodeKind::SolutionFolder => write!(f, "solution_folder"),
            NodeKind::Module => write!(f, "module"),
            NodeKind::Namespace => write!(f, "namespace"),
            NodeKind::Type => write!(f, "type"),
            NodeKind::Member => write!(f, "member"),
            NodeKind::Private => write!(f, "private"),
            NodeKind::External => write!(f, "external"),
        }
    }
}

/// Sub-kind of a member node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberKind {
    Method,
    Field,
    Property,
    Event,
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberKind::Method => write!(f, "method"),
            MemberKind::Field => write!(f, "field"),
            MemberKind::Property => write!(f, "property"),
            MemberKind::Event => write!(f, "event"),
        }
    }
}

/// How the source of a link refers to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    /// Type derives from target type.
    BaseType,
    /// Type implements target interface.
    Interface,
    /// Method returns target type.
    ReturnType,
    /// Method takes a parameter of target type.
    ParameterType,
    /// Field, property, event, local, loop variable or catch clause of target type.
    VariableType,
    /// Target type is a generic argument somewhere in the source.
    GenericArgument,
    /// Source invokes or constructs through the target member.
    Call,
    /// Source reads or writes the target field/property/event.
    MemberAccess,
    /// Module references another module.
    Reference,
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkKind::BaseType => write!(f, "base_type"),
            LinkKind::Interface => write!(f, "interface"),
            LinkKind::ReturnType => write!(f, "return_type"),
            LinkKind::ParameterType => write!(f, "parameter_type"),
            LinkKind::VariableType => write!(f, "variable_type"),
            LinkKind::GenericArgument => write!(f, "generic_argument"),
            LinkKind::Call => write!(f, "call"),
            LinkKind::MemberAccess => write!(f, "member_access"),
            LinkKind::Reference => write!(f, "reference"),
        }
    }
}

/// A file and 1-indexed line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub path: PathBuf,
    pub line: usize,
}

/// A graph vertex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Canonical hierarchical name, unique within one parse.
    pub name: String,
    /// Canonical name of the parent, empty for the root.
    pub parent: String,
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_kind: Option<MemberKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

impl Node {
    pub fn new(name: impl Into<String>, parent: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            parent: parent.into(),
            kind,
            member_kind: None,
            description: None,
            location: None,
        }
    }

    /// A member node; private members get `NodeKind::Private`.
    pub fn member(
        name: impl Into<String>,
        parent: impl Into<String>,
        member_kind: MemberKind,
        is_private: bool,
    ) -> Self {
        let kind = if is_private {
            NodeKind::Private
        } else {
            NodeKind::Member
        };
        Self {
            member_kind: Some(member_kind),
            ..Self::new(name, parent, kind)
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description.filter(|d| !d.is_empty());
        self
    }

    pub fn with_location(mut self, location: Option<SourceLocation>) -> Self {
        self.location = location;
        self
    }

    /// Human-readable form of the last name segment.
    pub fn display_name(&self) -> String {
        names::display_name(names::last_segment(&self.name))
    }
}

/// A directed edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    pub source: String,
    pub target: String,
    /// Kind the target node has, or would have if it was filtered out.
    pub target_kind: NodeKind,
    pub kind: LinkKind,
}

impl Link {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        target_kind: NodeKind,
        kind: LinkKind,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            target_kind,
            kind,
        }
    }
}

/// One element of the item stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "item", rename_all = "snake_case")]
pub enum Item {
    Node(Node),
    Link(Link),
}

impl Item {
    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Item::Node(node) => Some(node),
            Item::Link(_) => None,
        }
    }

    pub fn as_link(&self) -> Option<&Link> {
        match self {
            Item::Link(link) => Some(link),
            Item::Node(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_member_kind() {
        let node = Node::member("m.N.Foo.x", "m.N.Foo", MemberKind::Field, true);
        assert_eq!(node.kind, NodeKind::Private);
        assert_eq!(node.member_kind, Some(MemberKind::Field));
    }

    #[test]
    fn test_item_json_shape() {
        let item = Item::Link(Link::new("a.B.C()", "a.B.D()", NodeKind::Member, LinkKind::Call));
        let json = serde_json::to_string(&item).unwrap();
        assert!(json.contains("\"item\":\"link\""));
        assert!(json.contains("\"kind\":\"call\""));
        let back: Item = serde_json::from_str(&json).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn test_empty_description_is_dropped() {
        let node = Node::new("m", "", NodeKind::Module).with_description(Some(String::new()));
        assert!(node.description.is_none());
    }

    #[test]
    fn test_display_name_uses_last_segment() {
        let node = Node::new("m.N.Foo.op_Equality(Foo,Foo)", "m.N.Foo", NodeKind::Member);
        assert_eq!(node.display_name(), "==(Foo,Foo)");
    }
}
