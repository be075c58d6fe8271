//! Salvage card records from free-form model output
//!
//! Models wrap their JSON in code fences, truncate arrays, forget commas and
//! add chatter. Rather than parsing the whole reply as one document, the
//! scanner decodes one object at a time starting at each `{` and keeps
//! whatever decodes cleanly.

use serde_json::{Map, Value};
use tracing::debug;

/// A decoded JSON object that carries both a question-like and an answer-like key
pub type Record = Map<String, Value>;

/// Extract every card record from `text`, in encounter order
///
/// Never fails: unparsable input yields an empty list. The scan position
/// only moves forward, so the work is bounded by the input length.
pub fn extract_records(text: &str) -> Vec<Record> {
    let text = strip_code_fence(text);
    let mut records = Vec::new();
    let mut pos = 0;

    while let Some(offset) = text[pos..].find('{') {
        let start = pos + offset;
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(value)) => {
                collect_records(value, &mut records);
                pos = start + stream.byte_offset();
            }
            Some(Err(e)) => {
                debug!("No object at byte {}: {}", start, e);
                pos = start + 1;
            }
            None => break,
        }
    }

    records
}

/// Remove one leading ```lang line and one trailing ``` fence
fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };

    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    let rest = rest.trim_start();

    let rest = rest.trim_end();
    match rest.strip_suffix("```") {
        Some(body) => body.strip_suffix('\n').unwrap_or(body),
        None => rest,
    }
}

fn is_record(map: &Map<String, Value>) -> bool {
    let mut has_question = false;
    let mut has_answer = false;
    for key in map.keys() {
        match key.to_lowercase().as_str() {
            "question" => has_question = true,
            "answer" => has_answer = true,
            _ => {}
        }
    }
    has_question && has_answer
}

/// Depth-first search for records, preserving document order
///
/// A record is emitted whole and not searched further; any other object or
/// array is descended into.
fn collect_records(root: Value, out: &mut Vec<Record>) {
    let mut stack = vec![root];
    while let Some(current) = stack.pop() {
        match current {
            Value::Object(map) => {
                if is_record(&map) {
                    out.push(map);
                } else {
                    stack.extend(map.into_iter().map(|(_, v)| v).rev());
                }
            }
            Value::Array(items) => stack.extend(items.into_iter().rev()),
            _ => {}
        }
    }
}
