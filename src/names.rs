//! Canonical and display names.
//!
//! Every node name is a dot-separated path built from segments:
//! module (dots escaped as `*`), namespace parts, type names with
//! generic arity rendered as `<T,...>`, and a member segment such as
//! `Bar(String,Int32)`. Parents are always the name minus its last segment.

/// Group node that holds modules outside the input.
pub const EXTERNALS: &str = "$Externals";

/// Name fragments the C# and VB compilers put into synthetic types and members.
const SYNTHETIC_MARKERS: &[&str] = &[
    "__StaticArrayInit",
    "__AnonymousType",
    "<PrivateImplementationDetails>",
    "__DisplayClass",
    "$VB$",
];

const OPERATORS: &[(&str, &str)] = &[
    ("op_Equality", "=="),
    ("op_Inequality", "!="),
    ("op_GreaterThanOrEqual", ">="),
    ("op_LessThanOrEqual", "<="),
    ("op_GreaterThan", ">"),
    ("op_LessThan", "<"),
    ("op_Addition", "+"),
    ("op_Subtraction", "-"),
    ("op_Multiply", "*"),
    ("op_Division", "/"),
    ("op_Modulus", "%"),
    ("op_BitwiseAnd", "&"),
    ("op_BitwiseOr", "|"),
    ("op_ExclusiveOr", "^"),
    ("op_LeftShift", "<<"),
    ("op_RightShift", ">>"),
    ("op_UnsignedRightShift", ">>>"),
    ("op_LogicalNot", "!"),
    ("op_OnesComplement", "~"),
    ("op_Increment", "++"),
    ("op_Decrement", "--"),
    ("op_UnaryNegation", "-"),
    ("op_UnaryPlus", "+"),
    ("op_True", "true"),
    ("op_False", "false"),
    ("op_Implicit", "implicit"),
    ("op_Explicit", "explicit"),
];

// ─── Canonicalization ───────────────────────────────────────────────

/// Canonical form of a raw type or member name.
///
/// Removes `[scope]` markers, turns `::`, `/` and `+` into `.`, renders
/// generic arity, simplifies parameter types to their last segment and
/// maps `get_X(...)`/`set_X(...)` to `X`. Idempotent.
pub fn canonicalize(raw: &str) -> String {
    let text = normalize_separators(&strip_scope_markers(raw.trim()));
    let text = collapse_arity(&text);

    let Some((head, params)) = split_parameters(&text) else {
        return text;
    };
    let (prefix, last) = split_last_segment(head);
    if let Some(property) = accessor_property(last) {
        return join(prefix, &property);
    }
    let params: Vec<String> = split_top_level(params, ',')
        .into_iter()
        .map(simplify_type)
        .filter(|p| !p.is_empty())
        .collect();
    join(prefix, &format!("{last}({})", params.join(",")))
}

/// Last-segment form of a parameter or generic argument type:
/// `System.Collections.Generic.List<System.String>[]` becomes `List<String>[]`.
pub fn simplify_type(text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        return String::new();
    }
    let (base, args, suffix) = split_generic(text);
    let base = last_dotted(base);
    match args {
        Some(args) => {
            let args: Vec<String> = split_top_level(args, ',')
                .into_iter()
                .map(simplify_type)
                .collect();
            format!("{base}<{}>{suffix}", args.join(","))
        }
        None => format!("{base}{suffix}"),
    }
}

/// Member segment from a raw metadata or source name.
///
/// Methods always carry a parameter list. Constructors become `#ctor`
/// and `#cctor`; explicit interface names keep their dots as `*`.
pub fn member_segment(raw_name: &str, params: &[String], is_method: bool) -> String {
    let name = match raw_name {
        ".ctor" => "#ctor".to_string(),
        ".cctor" => "#cctor".to_string(),
        other => other.replace('.', "*"),
    };
    if is_method {
        canonicalize(&format!("{name}({})", params.join(",")))
    } else {
        canonicalize(&name)
    }
}

/// Canonical path of a type below its module: namespace parts then nesting chain.
pub fn type_path(namespace: &str, nesting: &[String]) -> String {
    let mut path = namespace.to_string();
    for raw in nesting {
        let segment = canonicalize(raw).replace('.', "*");
        path = join(&path, &segment);
    }
    path
}

/// Segment used for a module or project name.
pub fn module_segment(name: &str) -> String {
    name.replace('.', "*")
}

/// Join a parent name and a child segment.
pub fn join(parent: &str, child: &str) -> String {
    match (parent.is_empty(), child.is_empty()) {
        (true, _) => child.to_string(),
        (_, true) => parent.to_string(),
        _ => format!("{parent}.{child}"),
    }
}

/// Name of the parent: everything before the last top-level `.`.
pub fn parent_name(name: &str) -> &str {
    split_last_segment(name).0
}

/// The last top-level segment of a name.
pub fn last_segment(name: &str) -> &str {
    split_last_segment(name).1
}

/// True if `parent` is a strict hierarchical prefix of `name`.
pub fn is_strict_prefix(parent: &str, name: &str) -> bool {
    !parent.is_empty()
        && name.len() > parent.len() + 1
        && name.starts_with(parent)
        && name.as_bytes()[parent.len()] == b'.'
}

/// Name-based test for compiler-synthesized types and members.
pub fn is_compiler_generated_name(name: &str) -> bool {
    name.starts_with('<')
        || name.contains("<>")
        || SYNTHETIC_MARKERS.iter().any(|marker| name.contains(marker))
}

// ─── Display ────────────────────────────────────────────────────────

/// Human-readable form of one canonical segment.
pub fn display_name(segment: &str) -> String {
    let (head, params) = match segment.find('(') {
        Some(i) => segment.split_at(i),
        None => (segment, ""),
    };
    let head = match head {
        "#ctor" => "ctor".to_string(),
        "#cctor" => "cctor".to_string(),
        other => operator_symbol(other)
            .map(str::to_string)
            .unwrap_or_else(|| other.replace('*', ".")),
    };
    format!("{head}{params}")
}

/// Display symbol for an operator method name.
pub fn operator_symbol(name: &str) -> Option<&'static str> {
    OPERATORS
        .iter()
        .find(|(method, _)| *method == name)
        .map(|(_, symbol)| *symbol)
}

/// Metadata method name for a C# operator token and its parameter count.
pub fn operator_method_name(symbol: &str, param_count: usize) -> Option<&'static str> {
    let unary = param_count == 1;
    let name = match symbol {
        "+" if unary => "op_UnaryPlus",
        "-" if unary => "op_UnaryNegation",
        _ => OPERATORS
            .iter()
            .find(|(method, sym)| {
                *sym == symbol && !matches!(*method, "op_UnaryPlus" | "op_UnaryNegation")
            })
            .map(|(method, _)| *method)?,
    };
    Some(name)
}

// ─── Helpers ────────────────────────────────────────────────────────

fn strip_scope_markers(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find('[') {
        out.push_str(&rest[..open]);
        let after_open = &rest[open + 1..];
        let Some(close) = after_open.find(']') else {
            out.push_str(&rest[open..]);
            return out;
        };
        let content = &after_open[..close];
        let after = &after_open[close + 1..];
        let is_marker = !content.is_empty()
            && content
                .chars()
                .all(|c| c.is_alphanumeric() || matches!(c, '.' | '_' | '-'))
            && after
                .chars()
                .next()
                .is_some_and(|c| c.is_alphabetic() || c == '_');
        if !is_marker {
            out.push('[');
            out.push_str(content);
            out.push(']');
        }
        rest = after;
    }
    out.push_str(rest);
    out
}

fn normalize_separators(text: &str) -> String {
    let mut text = text
        .replace("::", ".")
        .replace(&['/', '+'][..], ".")
        .replace("..cctor", ".#cctor")
        .replace("..ctor", ".#ctor");
    for ctor in [".cctor", ".ctor"] {
        if text.starts_with(ctor) {
            text = format!("#{}", &text[1..]);
        }
    }
    text
}

fn collapse_arity(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '`' {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        let ticks = chars[i..].iter().take_while(|c| **c == '`').count();
        let digits_start = i + ticks;
        let digits: String = chars[digits_start..]
            .iter()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        let next = chars.get(digits_start + digits.len()).copied();
        let arity: usize = digits.parse().unwrap_or(0);
        if ticks == 1 && !digits.is_empty() && next == Some('<') {
            // instantiated: the argument list follows
        } else if ticks == 1 && (1..=5).contains(&arity) {
            out.push('<');
            out.push_str(&vec!["T"; arity].join(","));
            out.push('>');
        } else {
            out.extend(&chars[i..digits_start]);
            out.push_str(&digits);
        }
        i = digits_start + digits.len();
    }
    out
}

fn split_parameters(text: &str) -> Option<(&str, &str)> {
    if !text.ends_with(')') {
        return None;
    }
    let mut depth = 0i32;
    for (i, c) in text.char_indices().rev() {
        match c {
            ')' | '>' | ']' => depth += 1,
            '(' | '<' | '[' => {
                depth -= 1;
                if depth == 0 {
                    if c != '(' || i == 0 {
                        return None;
                    }
                    return Some((&text[..i], &text[i + 1..text.len() - 1]));
                }
            }
            _ => {}
        }
    }
    None
}

fn split_last_segment(name: &str) -> (&str, &str) {
    let mut depth = 0i32;
    let mut split = None;
    for (i, c) in name.char_indices() {
        match c {
            '<' | '(' | '[' => depth += 1,
            '>' | ')' | ']' => depth -= 1,
            '.' if depth == 0 => split = Some(i),
            _ => {}
        }
    }
    match split {
        Some(i) => (&name[..i], &name[i + 1..]),
        None => ("", name),
    }
}

fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '<' | '(' | '[' => depth += 1,
            '>' | ')' | ']' => depth -= 1,
            c if c == separator && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Split `Name<Args>Suffix`, or `Name` plus a trailing `[]`/`&`/`*`/`?` suffix.
fn split_generic(text: &str) -> (&str, Option<&str>, &str) {
    if let Some(open) = text.find('<') {
        let mut depth = 0i32;
        for (i, c) in text[open..].char_indices() {
            match c {
                '<' => depth += 1,
                '>' => {
                    depth -= 1;
                    if depth == 0 {
                        let close = open + i;
                        return (&text[..open], Some(&text[open + 1..close]), &text[close + 1..]);
                    }
                }
                _ => {}
            }
        }
    }
    match text.find(&['[', '&', '*', '?'][..]) {
        Some(i) => (&text[..i], None, &text[i..]),
        None => (text, None, ""),
    }
}

fn last_dotted(text: &str) -> &str {
    text.rsplit('.').next().unwrap_or(text)
}

fn accessor_property(segment: &str) -> Option<String> {
    let (explicit, tail) = match segment.rfind('*') {
        Some(i) => (&segment[..=i], &segment[i + 1..]),
        None => ("", segment),
    };
    let property = tail
        .strip_prefix("get_")
        .or_else(|| tail.strip_prefix("set_"))
        .filter(|p| !p.is_empty())?;
    Some(format!("{explicit}{property}"))
}
