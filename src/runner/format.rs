use serde_json::{Map, Value};

use crate::registry::OutputFormat;

/// Turns a handler's captured stdout into the JSON value stored in its
/// result. The error is the diagnostic for an `unreadable-output` result.
pub fn interpret(format: OutputFormat, stdout: &[u8]) -> Result<Value, String> {
    match format {
        OutputFormat::Doc => serde_json::from_slice(stdout)
            .map_err(|err| format!("output is not a valid JSON document: {err}")),
        OutputFormat::Kv => parse_key_values(as_utf8(stdout)?),
        OutputFormat::Raw => Ok(Value::String(as_utf8(stdout)?.to_string())),
    }
}

fn as_utf8(stdout: &[u8]) -> Result<&str, String> {
    std::str::from_utf8(stdout).map_err(|err| format!("output is not valid UTF-8: {err}"))
}

fn parse_key_values(text: &str) -> Result<Value, String> {
    let mut map = Map::new();

    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            return Err(format!("line {} is not a key=value pair", index + 1));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("line {} has an empty key", index + 1));
        }

        // Later keys override earlier ones.
        map.insert(key.to_string(), Value::String(value.trim().to_string()));
    }

    Ok(Value::Object(map))
}
