use serde_json::{Map, Value};

/// Removes a surrounding Markdown code fence, including an optional `json`
/// language tag. The closing fence may sit on its own line or directly after
/// the last content line; an unclosed fence is stripped too.
pub fn strip_code_fence(text: &str) -> String {
    let raw = text.trim();
    if !raw.starts_with("```") {
        return raw.to_string();
    }
    let inner = raw.trim_start_matches('`').trim_end_matches('`');
    let body = match inner.split_once('\n') {
        Some((opening, rest)) if is_fence_tag(opening) => rest,
        _ => inner,
    };
    let body = body.trim();
    match body.get(..4) {
        Some(tag) if tag.eq_ignore_ascii_case("json") => body[4..].trim().to_string(),
        _ => body.to_string(),
    }
}

fn is_fence_tag(line: &str) -> bool {
    line.trim()
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '+'))
}

/// Best-effort recovery of a JSON object from free model text.
///
/// Candidates are tried in order: the whole fence-stripped text, each
/// balanced top-level `{...}` span, then the widest `{ .. }` span. The
/// unstripped text gets the same span pass last. The first candidate that
/// parses as an object wins.
pub fn extract_json_object_from_text(text: &str) -> Option<Map<String, Value>> {
    let stripped = strip_code_fence(text);
    let original = text.trim();
    let mut candidates = Vec::new();
    if !stripped.is_empty() {
        candidates.push(stripped.clone());
        candidates.extend(object_spans(&stripped));
    }
    if original != stripped {
        candidates.extend(object_spans(original));
    }
    candidates.into_iter().find_map(|candidate| {
        match serde_json::from_str::<Value>(&candidate) {
            Ok(Value::Object(object)) => Some(object),
            _ => None,
        }
    })
}

fn object_spans(raw: &str) -> Vec<String> {
    let mut spans = balanced_object_spans(raw);
    if let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) {
        if end > start {
            spans.push(raw[start..=end].to_string());
        }
    }
    spans
}

fn balanced_object_spans(raw: &str) -> Vec<String> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in raw.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(idx);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(begin) = start.take() {
                        spans.push(raw[begin..=idx].to_string());
                    }
                }
            }
            _ => {}
        }
    }
    spans
}
