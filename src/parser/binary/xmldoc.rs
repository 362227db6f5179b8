//! Sibling `{assembly}.xml` documentation files.

use std::collections::HashMap;
use std::path::Path;

use roxmltree::Document;
use tracing::debug;

use crate::parser::doc;
use crate::parser::TypeRef;

/// Descriptions keyed by documentation id (`T:N.Foo`, `M:N.Foo.Bar(System.String)`).
#[derive(Debug, Default)]
pub struct XmlDocs {
    entries: HashMap<String, String>,
}

impl XmlDocs {
    /// Load the file if it exists. Unreadable or malformed files give no entries.
    pub fn load(path: &Path) -> Option<Self> {
        let text = std::fs::read_to_string(path).ok()?;
        match Self::parse(&text) {
            Ok(docs) => Some(docs),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "ignoring malformed doc file");
                None
            }
        }
    }

    pub fn parse(text: &str) -> Result<Self, roxmltree::Error> {
        let document = Document::parse(text)?;
        let entries = document
            .descendants()
            .filter(|n| n.has_tag_name("member"))
            .filter_map(|member| {
                let id = member.attribute("name")?;
                let description = doc::summarize_element(member)?;
                Some((id.to_string(), description))
            })
            .collect();
        Ok(Self { entries })
    }

    pub fn get(&self, id: &str) -> Option<String> {
        self.entries.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ─── Documentation Ids ──────────────────────────────────────────────

/// `N.Outer.Inner`1` as used after `T:`.
pub fn type_id(namespace: &str, nesting: &[String]) -> String {
    let chain = nesting.join(".");
    if namespace.is_empty() {
        chain
    } else {
        format!("{namespace}.{chain}")
    }
}

/// Member id body: `N.Foo.Bar(System.String,System.Int32)`; no parentheses
/// when there are no parameters.
pub fn member_id(owner: &str, name: &str, generic_count: u32, params: &[TypeRef]) -> String {
    let name = name.replace('.', "#");
    let mut id = format!("{owner}.{name}");
    if generic_count > 0 {
        id.push_str(&format!("``{generic_count}"));
    }
    if !params.is_empty() {
        let params: Vec<String> = params.iter().map(param_id).collect();
        id.push_str(&format!("({})", params.join(",")));
    }
    id
}

/// A parameter type in documentation-id form.
fn param_id(ty: &TypeRef) -> String {
    match ty {
        TypeRef::Named(named) => {
            let mut chain = Vec::with_capacity(named.nesting.len());
            for (i, raw) in named.nesting.iter().enumerate() {
                let is_last = i + 1 == named.nesting.len();
                if is_last && !named.generic_args.is_empty() {
                    let base = raw.split('`').next().unwrap_or(raw);
                    let args: Vec<String> = named.generic_args.iter().map(param_id).collect();
                    chain.push(format!("{base}{{{}}}", args.join(",")));
                } else {
                    chain.push(raw.clone());
                }
            }
            type_id(&named.namespace, &chain)
        }
        TypeRef::Array(inner) => format!("{}[]", param_id(inner)),
        TypeRef::Pointer(inner) => format!("{}*", param_id(inner)),
        TypeRef::ByRef(inner) => format!("{}@", param_id(inner)),
        TypeRef::GenericParam(name) => {
            if let Some(index) = name.strip_prefix('M').filter(|i| is_index(i)) {
                format!("``{index}")
            } else if let Some(index) = name.strip_prefix('T').filter(|i| is_index(i)) {
                format!("`{index}")
            } else {
                name.clone()
            }
        }
    }
}

fn is_index(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}
