// partial_json.rs: best-effort parsing of a JSON document that is still being written.

use serde_json::Value;

/// Attempt to parse partial JSON by closing unclosed strings, brackets, and braces.
///
/// When closing alone is not enough (a dangling key, a half-written literal such
/// as `tr`, a truncated escape), the text is cut back to the last structural
/// boundary and closed again. Returns `None` if no prefix parses.
pub fn try_parse_partial(text: &str) -> Option<Value> {
    let text = strip_code_fence(text.trim_start());
    // Trailing whitespace inside an open string is content.
    let trimmed = if scan(text).in_string {
        text
    } else {
        text.trim_end()
    };
    if trimmed.is_empty() {
        return None;
    }

    // First try: parse as-is (might already be complete JSON)
    if let Ok(val) = serde_json::from_str::<Value>(trimmed) {
        return Some(val);
    }

    let scan = scan(trimmed);
    if let Some(val) = parse_closed(trimmed, &scan) {
        return Some(val);
    }

    // Cut back to each boundary, most recent first.
    for &(pos, ch) in scan.boundaries.iter().rev() {
        let candidate = match ch {
            ',' => &trimmed[..pos],
            _ => &trimmed[..=pos],
        };
        let candidate_scan = self::scan(candidate);
        if let Some(val) = parse_closed(candidate, &candidate_scan) {
            return Some(val);
        }
    }

    None
}

/// Strip a Markdown code fence (```json ... ```) some models wrap output in.
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        // Only the fence opener (and maybe a language tag) has arrived.
        None => "",
    };
    match body.trim_end().strip_suffix("```") {
        Some(inner) => inner.trim(),
        // Still streaming: the body may end inside a string.
        None => body.trim_start(),
    }
}

struct Scan {
    /// Closers for every open `{` / `[`, innermost last.
    stack: Vec<char>,
    in_string: bool,
    /// Text ends in the middle of an escape sequence introducer.
    dangling_escape: bool,
    /// Byte offsets of `,`, `{`, `[` outside strings.
    boundaries: Vec<(usize, char)>,
}

fn scan(text: &str) -> Scan {
    let mut stack: Vec<char> = Vec::new();
    let mut boundaries = Vec::new();
    let mut in_string = false;
    let mut escape_next = false;

    for (pos, ch) in text.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        if ch == '\\' && in_string {
            escape_next = true;
            continue;
        }
        if ch == '"' {
            in_string = !in_string;
            continue;
        }
        if in_string {
            continue;
        }
        match ch {
            '{' => {
                stack.push('}');
                boundaries.push((pos, ch));
            }
            '[' => {
                stack.push(']');
                boundaries.push((pos, ch));
            }
            '}' | ']' => {
                stack.pop();
            }
            ',' => boundaries.push((pos, ch)),
            _ => {}
        }
    }

    Scan {
        stack,
        in_string,
        dangling_escape: escape_next,
        boundaries,
    }
}

fn parse_closed(text: &str, scan: &Scan) -> Option<Value> {
    let mut fixed = text.to_string();

    if scan.dangling_escape {
        fixed.pop();
    }
    if scan.in_string {
        fixed.push('"');
    }

    // Remove trailing comma before closing (invalid JSON: `{"a": 1,}`)
    let trimmed_end = fixed.trim_end();
    if let Some(stripped) = trimmed_end.strip_suffix(',') {
        fixed = stripped.to_string();
    }

    for closer in scan.stack.iter().rev() {
        fixed.push(*closer);
    }

    serde_json::from_str::<Value>(&fixed).ok()
}
