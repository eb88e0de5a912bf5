//! Turn file contents into a template by substituting known data values
//!
//! Used by `add --autotemplate`. Every string leaf of the template data is a
//! candidate. Longer values are substituted first so that a short value never
//! splits a longer one. Among equally long values the shallowest key wins, so
//! `.email` is preferred over `.chezmoi.config.email`. A value is only
//! replaced where it does not split a word.
//!
//! ```
//! use hearth_engine::autotemplate::auto_template;
//! use serde_json::json;
//!
//! let (out, replaced) = auto_template("HOME=/home/user/something", &json!({"homeDir": "/home/user"}));
//! assert!(replaced);
//! assert_eq!(out, "HOME={{ .homeDir }}/something");
//! ```

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static TEMPLATE_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{{2,}|\}{2,}").expect("Failed to compile template marker pattern"));

/// A candidate substitution
#[derive(Debug, Clone, PartialEq, Eq)]
struct Variable {
    name: String,
    value: String,
}

fn collect_variables(out: &mut Vec<Variable>, prefix: &str, data: &Value) {
    let Value::Object(map) = data else {
        return;
    };
    for (key, value) in map {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::String(s) => out.push(Variable {
                name,
                value: s.clone(),
            }),
            Value::Object(_) => collect_variables(out, &name, value),
            _ => {}
        }
    }
}

#[inline]
fn is_word(b: u8) -> bool {
    b.is_ascii_alphanumeric()
}

/// Whether splitting `s` at byte `i` would split a word
fn in_word(s: &[u8], i: usize) -> bool {
    i > 0 && i < s.len() && is_word(s[i - 1]) && is_word(s[i])
}

/// Replace data values in `contents` with template references
///
/// Existing template delimiters are escaped first so the output renders back
/// to the input. Returns the new contents and whether anything was replaced
/// or escaped.
pub fn auto_template(contents: &str, data: &Value) -> (String, bool) {
    let escaped = TEMPLATE_MARKER_RE.replace_all(contents, r#"{{ "${0}" }}"#);
    let mut replaced = escaped != contents;
    let mut text = escaped.into_owned();

    // Longest value first, then the shallowest key, then by key components
    let mut variables = Vec::new();
    collect_variables(&mut variables, "", data);
    variables.sort_by(|a, b| {
        b.value
            .len()
            .cmp(&a.value.len())
            .then_with(|| a.name.matches('.').count().cmp(&b.name.matches('.').count()))
            .then_with(|| a.name.split('.').cmp(b.name.split('.')))
    });

    for Variable { name, value } in &variables {
        if value.is_empty() {
            continue;
        }
        let replacement = format!("{{{{ .{name} }}}}");
        let Some(mut index) = text.find(value.as_str()) else {
            continue;
        };
        loop {
            let end = index + value.len();
            if in_word(text.as_bytes(), index) || in_word(text.as_bytes(), end) {
                // Step over one character and keep looking
                index += text[index..].chars().next().map_or(1, char::len_utf8);
            } else {
                text.replace_range(index..end, &replacement);
                index += replacement.len();
                replaced = true;
            }
            match text.get(index..).and_then(|rest| rest.find(value.as_str())) {
                Some(offset) => index += offset,
                None => break,
            }
        }
    }
    (text, replaced)
}
