use std::path::Path;

use serde_json::{Map, Value};

use crate::assets::AssetRecord;

pub const RECEIPT_SCHEMA_VERSION: u64 = 1;

/// Everything sent to and received from the generation service for one
/// asset. Inline media payloads are replaced with `<omitted>`.
pub fn build_asset_receipt(
    asset: &AssetRecord,
    tool: &str,
    tool_request: &Map<String, Value>,
    tool_response: &Value,
    warnings: &[String],
) -> Value {
    let mut root = Map::new();
    root.insert(
        "schema_version".to_string(),
        Value::Number(RECEIPT_SCHEMA_VERSION.into()),
    );
    root.insert(
        "asset".to_string(),
        serde_json::to_value(asset).unwrap_or(Value::Null),
    );
    root.insert("tool".to_string(), Value::String(tool.to_string()));
    root.insert(
        "tool_request".to_string(),
        sanitize_payload(&Value::Object(tool_request.clone())),
    );
    root.insert("tool_response".to_string(), sanitize_payload(tool_response));
    root.insert(
        "warnings".to_string(),
        Value::Array(warnings.iter().cloned().map(Value::String).collect()),
    );
    Value::Object(root)
}

pub fn write_receipt(path: &Path, payload: &Value) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(payload)?)?;
    Ok(())
}

pub fn sanitize_payload(value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::Bool(_) | Value::Number(_) | Value::String(_) => value.clone(),
        Value::Array(rows) => Value::Array(rows.iter().map(sanitize_payload).collect()),
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, row) in map {
                let lowered = key.to_ascii_lowercase();
                if matches!(
                    lowered.as_str(),
                    "b64_json"
                        | "image_bytes"
                        | "imagebytes"
                        | "bytesbase64encoded"
                        | "video_bytes"
                        | "api_key"
                ) || (lowered == "data" && row.is_string())
                {
                    out.insert(key.clone(), Value::String("<omitted>".to_string()));
                    continue;
                }
                out.insert(key.clone(), sanitize_payload(row));
            }
            Value::Object(out)
        }
    }
}
