//! Tolerant parsing of JSON-mode model responses.
//!
//! Models asked for a strict JSON object still return arrays, bare strings,
//! fenced code blocks, arrays embedded in prose, and arrays with trailing
//! commas. The parsers here layer fallbacks bottom-up: structured object,
//! JSON array, JSON string, code-fence strip, balanced-array extraction with
//! trailing-comma repair, and finally a newline split.

use serde_json::Value;

/// Parses an extraction response into the list of opinion strings.
pub fn parse_opinion_list(content: &str) -> Vec<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if let Some(list) = opinions_from_value(&value, true) {
            return list;
        }
    }

    if let Some(inner) = strip_code_fence(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(inner.trim()) {
            if let Some(list) = opinions_from_value(&value, true) {
                return list;
            }
        }
    }

    if let Some(array) = extract_balanced_array(trimmed) {
        let repaired = strip_trailing_commas(&array);
        if let Ok(value) = serde_json::from_str::<Value>(&repaired) {
            if let Some(list) = opinions_from_value(&value, false) {
                return list;
            }
        }
    }

    split_lines(trimmed)
}

/// Parses a labelling response into `(label, description)`.
pub fn parse_label_payload(content: &str) -> Option<(String, String)> {
    let trimmed = content.trim();
    let value = serde_json::from_str::<Value>(trimmed)
        .ok()
        .or_else(|| {
            strip_code_fence(trimmed)
                .and_then(|inner| serde_json::from_str::<Value>(inner.trim()).ok())
        })?;
    let object = value.as_object()?;
    let label = object.get("label")?.as_str()?.trim().to_string();
    if label.is_empty() {
        return None;
    }
    let description = object
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or("")
        .trim()
        .to_string();
    Some((label, description))
}

fn opinions_from_value(value: &Value, allow_reparse: bool) -> Option<Vec<String>> {
    match value {
        Value::Object(map) => map
            .get("extractedOpinionList")
            .or_else(|| map.get("opinions"))
            .and_then(Value::as_array)
            .map(|items| collect_strings(items)),
        Value::Array(items) => Some(collect_strings(items)),
        Value::String(inner) => {
            if allow_reparse {
                if let Ok(reparsed) = serde_json::from_str::<Value>(inner) {
                    if let Some(list) = opinions_from_value(&reparsed, false) {
                        return Some(list);
                    }
                }
            }
            let trimmed = inner.trim();
            (!trimmed.is_empty()).then(|| vec![trimmed.to_string()])
        }
        _ => None,
    }
}

fn collect_strings(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Returns the body of the first fenced code block, tolerating a language
/// tag after the opening fence.
pub fn strip_code_fence(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_fence = &text[open + 3..];
    let body_start = after_fence.find('\n')? + 1;
    let body = &after_fence[body_start..];
    let close = body.find("```")?;
    Some(&body[..close])
}

/// Extracts the first top-level `[...]` array from prose, tracking JSON
/// string and escape state so brackets inside strings are ignored.
pub fn extract_balanced_array(text: &str) -> Option<String> {
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in text.char_indices() {
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
            '"' => in_string = true,
            '[' => {
                if depth == 0 {
                    start = Some(idx);
                }
                depth += 1;
            }
            ']' => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        let begin = start?;
                        return Some(text[begin..=idx].to_string());
                    }
                }
            }
            _ => {}
        }
    }
    None
}

/// Removes commas that directly precede `]`, outside of strings.
pub fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut result = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (idx, &ch) in chars.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            result.push(ch);
            continue;
        }
        if ch == '"' {
            in_string = true;
            result.push(ch);
            continue;
        }
        if ch == ',' {
            let mut next = idx + 1;
            while next < chars.len() && chars[next].is_whitespace() {
                next += 1;
            }
            if next < chars.len() && chars[next] == ']' {
                continue;
            }
        }
        result.push(ch);
    }
    result
}

fn split_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| {
            line.trim()
                .trim_start_matches(['-', '*'])
                .trim()
        })
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
