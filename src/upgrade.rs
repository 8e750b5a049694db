//! Format 3 to format 4 upgrade, applied when a notebook is read.
//!
//! Worksheets are flattened into one cell list, `heading` cells become
//! markdown headings, code cells move `input`/`prompt_number` to
//! `source`/`execution_count`, and rich outputs gain a mime-keyed `data` map.

use serde_json::{Map, Value};

use crate::notebook::random_cell_id;

pub const V3_MAJOR: u64 = 3;

/// Upgraded notebooks are written as 4.5, so every cell gets an id.
const UPGRADED_MINOR: u64 = 5;

const MIME_ALIASES: [(&str, &str); 8] = [
    ("text", "text/plain"),
    ("html", "text/html"),
    ("svg", "image/svg+xml"),
    ("png", "image/png"),
    ("jpeg", "image/jpeg"),
    ("latex", "text/latex"),
    ("json", "application/json"),
    ("javascript", "application/javascript"),
];

fn take_object(raw: &mut Map<String, Value>, key: &str) -> Map<String, Value> {
    match raw.remove(key) {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

fn take_array(raw: &mut Map<String, Value>, key: &str) -> Vec<Value> {
    match raw.remove(key) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

fn source_text(source: Option<&Value>) -> String {
    match source {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(lines)) => lines.iter().filter_map(Value::as_str).collect(),
        _ => String::new(),
    }
}

fn to_mime_keys(map: &mut Map<String, Value>) {
    for (alias, mime) in MIME_ALIASES {
        if let Some(value) = map.remove(alias) {
            map.insert(mime.to_string(), value);
        }
    }
}

pub fn upgrade_v3(mut nb: Map<String, Value>) -> Map<String, Value> {
    let orig_nbformat = nb
        .remove("orig_nbformat")
        .filter(|v| !v.is_null())
        .unwrap_or_else(|| Value::from(V3_MAJOR));
    let orig_minor = nb
        .remove("orig_nbformat_minor")
        .filter(|v| !v.is_null())
        .unwrap_or_else(|| Value::from(0));

    let mut metadata = take_object(&mut nb, "metadata");
    metadata.remove("name");
    metadata.remove("signature");
    metadata.insert("orig_nbformat".to_string(), orig_nbformat);
    metadata.insert("orig_nbformat_minor".to_string(), orig_minor);

    // multiple worksheets are flattened in order
    let cells = take_array(&mut nb, "worksheets")
        .into_iter()
        .flat_map(|worksheet| match worksheet {
            Value::Object(mut worksheet) => take_array(&mut worksheet, "cells"),
            _ => Vec::new(),
        })
        .map(upgrade_cell)
        .collect();

    nb.insert("metadata".to_string(), Value::Object(metadata));
    nb.insert("nbformat".to_string(), Value::from(4));
    nb.insert("nbformat_minor".to_string(), Value::from(UPGRADED_MINOR));
    nb.insert("cells".to_string(), Value::Array(cells));
    nb
}

fn upgrade_cell(cell: Value) -> Value {
    let Value::Object(mut cell) = cell else {
        return cell;
    };
    let mut metadata = take_object(&mut cell, "metadata");
    cell.insert("id".to_string(), Value::String(random_cell_id()));

    let cell_type = cell.get("cell_type").and_then(Value::as_str).map(str::to_owned);
    match cell_type.as_deref() {
        Some("code") => {
            cell.remove("language");
            if let Some(collapsed) = cell.remove("collapsed") {
                metadata.insert("collapsed".to_string(), collapsed);
            }
            let source = cell.remove("input").unwrap_or_else(|| Value::from(""));
            cell.insert("source".to_string(), source);
            let count = cell.remove("prompt_number").unwrap_or(Value::Null);
            cell.insert("execution_count".to_string(), count);
            let outputs = take_array(&mut cell, "outputs")
                .into_iter()
                .map(upgrade_output)
                .collect();
            cell.insert("outputs".to_string(), Value::Array(outputs));
        }
        Some("heading") => {
            let level = cell.remove("level").and_then(|l| l.as_u64()).unwrap_or(1).clamp(1, 6);
            let text = source_text(cell.get("source"));
            let single_line = text.lines().collect::<Vec<_>>().join(" ");
            let heading = format!("{} {}", "#".repeat(level as usize), single_line);
            cell.insert("cell_type".to_string(), Value::from("markdown"));
            cell.insert("source".to_string(), Value::String(heading));
        }
        Some("html") => {
            cell.insert("cell_type".to_string(), Value::from("markdown"));
        }
        _ => {}
    }

    cell.insert("metadata".to_string(), Value::Object(metadata));
    Value::Object(cell)
}

fn upgrade_output(output: Value) -> Value {
    let Value::Object(mut output) = output else {
        return output;
    };

    let output_type = output.get("output_type").and_then(Value::as_str).map(str::to_owned);
    match output_type.as_deref() {
        Some(kind @ ("pyout" | "display_data")) => {
            let mut metadata = take_object(&mut output, "metadata");
            if kind == "pyout" {
                output.insert("output_type".to_string(), Value::from("execute_result"));
                let count = output.remove("prompt_number").unwrap_or(Value::Null);
                output.insert("execution_count".to_string(), count);
            }

            let data_keys = output
                .keys()
                .filter(|key| !matches!(key.as_str(), "output_type" | "execution_count"))
                .cloned()
                .collect::<Vec<_>>();
            let mut data = Map::new();
            for key in data_keys {
                if let Some(value) = output.remove(&key) {
                    data.insert(key, value);
                }
            }
            to_mime_keys(&mut data);
            to_mime_keys(&mut metadata);

            // format 3 stored JSON output as a string
            let parsed = match data.get("application/json") {
                Some(Value::String(text)) => serde_json::from_str::<Value>(text).ok(),
                _ => None,
            };
            if let Some(parsed) = parsed {
                data.insert("application/json".to_string(), parsed);
            }

            output.insert("data".to_string(), Value::Object(data));
            output.insert("metadata".to_string(), Value::Object(metadata));
        }
        Some("pyerr") => {
            output.insert("output_type".to_string(), Value::from("error"));
        }
        Some("stream") => {
            let name = output.remove("stream").unwrap_or_else(|| Value::from("stdout"));
            output.insert("name".to_string(), name);
        }
        _ => {}
    }
    Value::Object(output)
}
