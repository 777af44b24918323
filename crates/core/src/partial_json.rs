//! Best-effort parsing of truncated JSON.
//!
//! While a response streams in, the accumulated text is a prefix of a
//! well-formed document. Repairing it means finding the last boundary
//! at which the prefix can be cut so that synthesizing the closing
//! brackets yields valid JSON again: unterminated value strings are
//! closed, half-written keys, literals and escapes are dropped, and
//! every container still open is closed in reverse order.

use serde_json::Value;

/// Parses a prefix of a JSON document into the largest complete value
/// it contains. Returns `None` while nothing presentable has arrived.
pub(crate) fn parse_partial(raw: &str) -> Option<Value> {
    let trimmed = raw.trim_start();
    if trimmed.is_empty() {
        return None;
    }
    let repaired = repair(trimmed)?;
    serde_json::from_str(&repaired).ok()
}

fn repair(src: &str) -> Option<String> {
    let mut stack: Vec<char> = Vec::new();
    // Byte index after the last complete value (or opener); the prefix
    // up to here plus the synthesized closers is valid JSON.
    let mut cut = 0;
    let mut in_string = false;
    let mut key_string = false;
    let mut escape = false;
    let mut unicode_left = 0u8;
    // In-string cut point that never splits an escape sequence or a
    // multi-byte character.
    let mut string_safe = 0;
    let mut atom_start: Option<usize> = None;
    let mut last_sig = '\0';

    for (i, c) in src.char_indices() {
        if in_string {
            if unicode_left > 0 {
                if !c.is_ascii_hexdigit() {
                    return None;
                }
                unicode_left -= 1;
                if unicode_left == 0 {
                    string_safe = i + 1;
                }
                continue;
            }
            if escape {
                escape = false;
                if c == 'u' {
                    unicode_left = 4;
                } else {
                    string_safe = i + c.len_utf8();
                }
                continue;
            }
            match c {
                '\\' => escape = true,
                '"' => {
                    in_string = false;
                    if key_string {
                        last_sig = 'k';
                    } else {
                        cut = i + 1;
                        last_sig = 'v';
                    }
                }
                _ => string_safe = i + c.len_utf8(),
            }
            continue;
        }

        if atom_start.is_some() {
            if matches!(c, ',' | '}' | ']') || c.is_whitespace() {
                // The input is a prefix of well-formed JSON, so an atom
                // followed by a delimiter is a complete value.
                cut = i;
                atom_start = None;
            } else {
                continue;
            }
        }

        match c {
            '{' | '[' => {
                stack.push(c);
                cut = i + 1;
                last_sig = c;
            }
            '}' | ']' => {
                stack.pop()?;
                cut = i + 1;
                last_sig = c;
            }
            ':' | ',' => last_sig = c,
            '"' => {
                in_string = true;
                string_safe = i + 1;
                key_string = stack.last() == Some(&'{')
                    && matches!(last_sig, '{' | ',');
            }
            c if c.is_whitespace() => {}
            _ => atom_start = Some(i),
        }
    }

    let mut repaired = if in_string && !key_string {
        let mut prefix = src[..string_safe].to_owned();
        prefix.push('"');
        prefix
    } else {
        if let Some(start) = atom_start {
            let atom = &src[start..];
            if atom.starts_with(['t', 'f', 'n']) {
                if matches!(atom, "true" | "false" | "null") {
                    cut = src.len();
                }
            } else {
                // A trailing number may be cut mid-token; trim back to
                // the last usable digit.
                let digits = atom
                    .trim_end_matches(['.', 'e', 'E', '+', '-']);
                if !digits.is_empty() && digits != "-" {
                    cut = start + digits.len();
                }
            }
        }
        if cut == 0 {
            return None;
        }
        src[..cut].to_owned()
    };

    for opener in stack.iter().rev() {
        repaired.push(match opener {
            '{' => '}',
            _ => ']',
        });
    }
    Some(repaired)
}
