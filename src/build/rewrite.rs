//! Reference rewriting: swap original asset paths for their fingerprinted
//! names inside HTML and CSS text. Only exact, delimiter-bounded path
//! references are touched; anything else passes through verbatim.

use std::collections::BTreeMap;

/// Rewrite every reference to a renamed asset. `renames` maps original
/// forward-slash relative paths to their fingerprinted counterparts.
pub fn rewrite_references(text: &str, renames: &BTreeMap<String, String>) -> String {
    // Longest key first so `vendor/app.js` wins over a root-level `app.js`.
    let mut keys: Vec<&String> = renames.keys().collect();
    keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    let mut out = text.to_string();
    for key in keys {
        out = replace_path(&out, key, &renames[key]);
    }
    out
}

fn replace_path(text: &str, from: &str, to: &str) -> String {
    let mut result = String::with_capacity(text.len() + 16);
    let mut pos = 0;
    // Boundary checks always look at the full original prefix, so a match
    // directly after a previous occurrence is not mistaken for text start.
    while let Some(found) = text[pos..].find(from) {
        let start = pos + found;
        let end = start + from.len();
        result.push_str(&text[pos..start]);
        if starts_reference(&text[..start]) && ends_reference(&text[end..]) {
            result.push_str(to);
        } else {
            result.push_str(from);
        }
        pos = end;
    }
    result.push_str(&text[pos..]);
    result
}

/// A path reference begins right after a quote, `(`, `=`, or whitespace,
/// optionally with a `./` or `/` prefix.
fn starts_reference(before: &str) -> bool {
    let mut chars = before.chars().rev();
    let mut prev = chars.next();
    // Allow a single `/` or `./` between the delimiter and the path.
    if prev == Some('/') {
        prev = chars.next();
        if prev == Some('.') {
            prev = chars.next();
        }
    }
    matches!(prev, None | Some('"') | Some('\'') | Some('(') | Some('=') | Some(' ') | Some('\n') | Some('\t'))
}

/// A reference ends at a quote, `)`, query/fragment marker, or whitespace.
fn ends_reference(after: &str) -> bool {
    matches!(
        after.chars().next(),
        None | Some('"') | Some('\'') | Some(')') | Some('?') | Some('#') | Some(' ') | Some('\n') | Some('\t')
    )
}
