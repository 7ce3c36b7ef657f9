use serde_json::Value;

/// Collapses whitespace, trims wrapping quotes and trailing punctuation, and
/// caps the result at `max_chars` on a word boundary when possible.
pub fn clean_text(text: &str, max_chars: usize) -> String {
    let mut cleaned = text
        .replace(['\r', '\n', '\t'], " ")
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ");
    cleaned = cleaned
        .trim()
        .trim_matches(|ch: char| matches!(ch, '"' | '\''))
        .trim()
        .to_string();
    if cleaned.is_empty() || max_chars == 0 {
        return String::new();
    }
    if cleaned.chars().count() > max_chars {
        cleaned = cleaned.chars().take(max_chars + 1).collect::<String>();
        if let Some((head, _)) = cleaned.rsplit_once(' ') {
            cleaned = head.trim().to_string();
        }
        if cleaned.chars().count() > max_chars {
            cleaned = cleaned.chars().take(max_chars).collect();
        }
    }
    cleaned
        .trim_end_matches(|ch: char| matches!(ch, ',' | ':' | ';'))
        .trim()
        .to_string()
}

pub fn value_as_clean_text(value: Option<&Value>, max_chars: usize) -> Option<String> {
    let text = match value? {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        _ => return None,
    };
    let cleaned = clean_text(&text, max_chars);
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Accepts either a JSON array of strings or a comma separated string.
/// Entries are cleaned, de-duplicated case-insensitively and capped.
pub fn coerce_text_list(value: Option<&Value>, max_items: usize, max_chars: usize) -> Vec<String> {
    let Some(value) = value else {
        return Vec::new();
    };
    let mut raw_items: Vec<String> = Vec::new();
    match value {
        Value::Array(rows) => {
            for row in rows {
                if let Some(text) = row.as_str() {
                    raw_items.push(text.to_string());
                }
            }
        }
        Value::String(text) => {
            raw_items.extend(text.split(',').map(str::to_string));
        }
        _ => {}
    }

    let mut cleaned = Vec::new();
    let mut seen: Vec<String> = Vec::new();
    for row in raw_items {
        let text = clean_text(&row, max_chars);
        if text.is_empty() {
            continue;
        }
        let key = text.to_ascii_lowercase();
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        cleaned.push(text);
        if cleaned.len() >= max_items {
            break;
        }
    }
    cleaned
}

/// `#abc` and `abc123` style inputs become `#AABBCC` / `#ABC123`.
pub fn normalize_hex_color(value: &str) -> Option<String> {
    let mut body = value.trim().trim_start_matches('#').to_string();
    if body.len() == 3 && body.chars().all(|ch| ch.is_ascii_hexdigit()) {
        body = body.chars().flat_map(|ch| [ch, ch]).collect::<String>();
    }
    if body.len() != 6 || !body.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!("#{}", body.to_ascii_uppercase()))
}
