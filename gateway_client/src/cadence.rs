//! JSON-Cadence Data Interchange Format helpers.
//!
//! See <https://cadence-lang.org/docs/json-cadence-spec>

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde_json::{Map, Value, json};

use crate::{GatewayResult, error::GatewayError};

/// Decodes a base64 encoded JSON-CDC document.
pub fn decode_base64_json(raw: &str) -> GatewayResult<Value> {
    let bytes = STANDARD.decode(raw.trim()).map_err(GatewayError::decode)?;
    serde_json::from_slice(&bytes).map_err(GatewayError::decode)
}

pub fn decode_base64_string(raw: &str) -> GatewayResult<String> {
    let bytes = STANDARD.decode(raw.trim()).map_err(GatewayError::decode)?;
    String::from_utf8(bytes).map_err(GatewayError::decode)
}

pub fn encode_base64(raw: &[u8]) -> String {
    STANDARD.encode(raw)
}

pub fn address_argument(address: &str) -> Value {
    json!({ "type": "Address", "value": address })
}

/// Strips type annotations from a JSON-CDC value.
///
/// Composites (structs, resources, events) become objects keyed by field name,
/// paths become `/<domain>/<identifier>` strings and numbers stay strings,
/// since most Cadence number types do not fit into a JSON number.
pub fn decode_value(value: &Value) -> Value {
    let Some(kind) = value.get("type").and_then(Value::as_str) else {
        return value.clone();
    };
    let inner = value.get("value").unwrap_or(&Value::Null);

    match kind {
        "Void" => Value::Null,
        "Optional" => match inner {
            Value::Null => Value::Null,
            some => decode_value(some),
        },
        "Array" => Value::Array(
            inner
                .as_array()
                .map(|items| items.iter().map(decode_value).collect())
                .unwrap_or_default(),
        ),
        "Dictionary" => {
            let mut object = Map::new();
            for entry in inner.as_array().into_iter().flatten() {
                let key = match decode_value(entry.get("key").unwrap_or(&Value::Null)) {
                    Value::String(key) => key,
                    other => other.to_string(),
                };
                object.insert(
                    key,
                    decode_value(entry.get("value").unwrap_or(&Value::Null)),
                );
            }
            Value::Object(object)
        }
        "Struct" | "Resource" | "Event" | "Contract" | "Enum" => {
            let mut object = Map::new();
            for field in inner
                .get("fields")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
            {
                if let Some(name) = field.get("name").and_then(Value::as_str) {
                    object.insert(
                        name.to_string(),
                        decode_value(field.get("value").unwrap_or(&Value::Null)),
                    );
                }
            }
            Value::Object(object)
        }
        "Path" => {
            let domain = inner.get("domain").and_then(Value::as_str).unwrap_or("");
            let identifier = inner
                .get("identifier")
                .and_then(Value::as_str)
                .unwrap_or("");
            Value::String(format!("/{domain}/{identifier}"))
        }
        "Type" => inner.get("staticType").cloned().unwrap_or(Value::Null),
        _ => inner.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_account_created_event() {
        let payload = json!({
            "type": "Event",
            "value": {
                "id": "flow.AccountCreated",
                "fields": [
                    { "name": "address", "value": { "type": "Address", "value": "0x01cf0e2f2f715450" } }
                ]
            }
        });

        assert_eq!(
            decode_value(&payload),
            json!({ "address": "0x01cf0e2f2f715450" })
        );
    }

    #[test]
    fn decodes_nested_values() {
        let value = json!({
            "type": "Struct",
            "value": {
                "id": "s.StorageEntry",
                "fields": [
                    { "name": "path", "value": { "type": "Path", "value": { "domain": "storage", "identifier": "flowTokenVault" } } },
                    { "name": "targetPath", "value": { "type": "Optional", "value": null } },
                    { "name": "amounts", "value": { "type": "Array", "value": [ { "type": "UFix64", "value": "10.00000000" } ] } },
                    { "name": "labels", "value": { "type": "Dictionary", "value": [
                        { "key": { "type": "String", "value": "a" }, "value": { "type": "Bool", "value": true } }
                    ] } },
                    { "name": "type", "value": { "type": "Type", "value": { "staticType": { "kind": "Resource", "typeID": "A.0ae53cb6e3f42a79.FlowToken.Vault" } } } }
                ]
            }
        });

        assert_eq!(
            decode_value(&value),
            json!({
                "path": "/storage/flowTokenVault",
                "targetPath": null,
                "amounts": ["10.00000000"],
                "labels": { "a": true },
                "type": { "kind": "Resource", "typeID": "A.0ae53cb6e3f42a79.FlowToken.Vault" }
            })
        );
    }

    #[test]
    fn base64_documents() {
        let raw = encode_base64(br#"{"type":"Int","value":"42"}"#);
        assert_eq!(decode_value(&decode_base64_json(&raw).unwrap()), json!("42"));
        assert!(decode_base64_json("%%%").is_err());
    }
}
