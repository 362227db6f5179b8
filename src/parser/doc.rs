//! XML documentation comments → one-line descriptions.

use roxmltree::{Document, Node as XmlNode};

/// Description from a doc-comment fragment (`<summary>...</summary><param .../>`).
///
/// Uses the `<summary>` text when there is one, the whole text otherwise.
/// Returns `None` for empty results.
pub fn summarize(fragment: &str) -> Option<String> {
    let wrapped = format!("<doc>{fragment}</doc>");
    match Document::parse(&wrapped) {
        Ok(doc) => summarize_element(doc.root_element()),
        Err(_) => non_empty(collapse_whitespace(fragment)),
    }
}

/// Description of a parsed `<member>` or wrapper element.
pub fn summarize_element(element: XmlNode<'_, '_>) -> Option<String> {
    let summary = element
        .children()
        .find(|c| c.is_element() && c.tag_name().name() == "summary");
    let mut text = String::new();
    collect_text(summary.unwrap_or(element), &mut text);
    non_empty(collapse_whitespace(&text))
}

/// Join `///` comment lines into the fragment they carry.
pub fn strip_comment_markers<'a>(lines: impl IntoIterator<Item = &'a str>) -> String {
    lines
        .into_iter()
        .map(|line| line.trim_start().trim_start_matches("///"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn collect_text(node: XmlNode<'_, '_>, out: &mut String) {
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if current.is_text() {
            out.push_str(current.text().unwrap_or_default());
            continue;
        }
        if current.is_element() && current != node && !current.has_children() {
            if let Some(reference) = current
                .attribute("cref")
                .or_else(|| current.attribute("langword"))
                .or_else(|| current.attribute("name"))
            {
                out.push(' ');
                out.push_str(short_cref(reference));
                out.push(' ');
            }
            continue;
        }
        for child in current.children().rev() {
            stack.push(child);
        }
    }
}

/// `T:System.String` → `String`.
fn short_cref(cref: &str) -> &str {
    let name = cref.split_once(':').map_or(cref, |(_, rest)| rest);
    let name = name.split('(').next().unwrap_or(name);
    name.rsplit('.').next().unwrap_or(name)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(text: String) -> Option<String> {
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_is_preferred() {
        let fragment = "<summary>\n  Reads the   whole\n  file.\n</summary>\n<param name=\"path\">Where.</param>";
        assert_eq!(summarize(fragment).as_deref(), Some("Reads the whole file."));
    }

    #[test]
    fn test_text_without_summary() {
        assert_eq!(summarize("<remarks>Only remarks.</remarks>").as_deref(), Some("Only remarks."));
        assert_eq!(summarize("   ").as_deref(), None);
    }

    #[test]
    fn test_cref_references_are_shortened() {
        let fragment = "<summary>Wraps a <see cref=\"T:System.IO.Stream\"/> for <paramref name=\"x\"/>.</summary>";
        assert_eq!(summarize(fragment).as_deref(), Some("Wraps a Stream for x ."));
    }

    #[test]
    fn test_malformed_fragment_falls_back_to_text() {
        assert_eq!(summarize("a < b and\n c").as_deref(), Some("a < b and c"));
    }

    #[test]
    fn test_strip_comment_markers() {
        let text = strip_comment_markers(["/// <summary>", "    /// Hi.", "/// </summary>"]);
        assert_eq!(summarize(&text).as_deref(), Some("Hi."));
    }
}
