//! JSON-RPC envelope types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::JsonRpcError;

/// JSON-RPC protocol version string.
pub const JSONRPC_VERSION: &str = "2.0";

/// The only JSON-RPC method the host understands; the target is carried in
/// the params.
pub const CALL_METHOD: &str = "call";

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version, always "2.0".
    pub jsonrpc: String,
    /// Method name.
    pub method: String,
    /// Call parameters.
    pub params: Value,
    /// Request identifier.
    pub id: u64,
}

impl JsonRpcRequest {
    /// Creates a `call` request with the given params.
    pub fn call(id: u64, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: CALL_METHOD.to_string(),
            params,
            id,
        }
    }
}

/// A JSON-RPC 2.0 response carrying either a result or an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol version.
    #[serde(default)]
    pub jsonrpc: String,
    /// Identifier of the request this answers.
    #[serde(default)]
    pub id: Option<u64>,
    /// Successful result.
    #[serde(default)]
    pub result: Option<Value>,
    /// Error object.
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Splits the response into its result or error.
    ///
    /// A response with neither is treated as a `null` result, which the host
    /// returns for procedures without a return value.
    pub fn into_result(self) -> Result<Value, JsonRpcError> {
        match (self.result, self.error) {
            (_, Some(error)) => Err(error),
            (Some(result), None) => Ok(result),
            (None, None) => Ok(Value::Null),
        }
    }
}

/// Parameters of a model method call (`call_kw`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallKwParams {
    /// Technical model name.
    pub model: String,
    /// Model method.
    pub method: String,
    /// Positional arguments.
    pub args: Vec<Value>,
    /// Keyword arguments.
    pub kwargs: Map<String, Value>,
}

impl CallKwParams {
    /// Creates call parameters without keyword arguments.
    pub fn new(model: &str, method: &str, args: Vec<Value>) -> Self {
        Self {
            model: model.to_string(),
            method: method.to_string(),
            args,
            kwargs: Map::new(),
        }
    }

    /// Adds a keyword argument.
    pub fn with_kwarg(mut self, key: &str, value: Value) -> Self {
        self.kwargs.insert(key.to_string(), value);
        self
    }
}

/// Builds a host domain clause, `[field, operator, value]`.
pub fn domain_leaf(field: &str, operator: &str, value: Value) -> Value {
    Value::Array(vec![
        Value::String(field.to_string()),
        Value::String(operator.to_string()),
        value,
    ])
}

/// Reads a many2one field, which the host encodes as `[id, "display name"]`
/// or `false`.
pub fn many2one_id(value: &Value) -> Option<i64> {
    match value {
        Value::Array(items) => items.first().and_then(Value::as_i64),
        Value::Number(number) => number.as_i64(),
        _ => None,
    }
}

/// Reads a field the host may encode as `false` when empty.
pub fn optional_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_call_request_serialization() {
        let params = CallKwParams::new("knowledge.article", "read", vec![json!([1, 2])])
            .with_kwarg("fields", json!(["content"]));
        let request = JsonRpcRequest::call(7, serde_json::to_value(&params).unwrap());
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["jsonrpc"], "2.0");
        assert_eq!(json["method"], "call");
        assert_eq!(json["id"], 7);
        assert_eq!(json["params"]["model"], "knowledge.article");
        assert_eq!(json["params"]["kwargs"]["fields"][0], "content");
    }

    #[test]
    fn test_response_error_wins() {
        let response: JsonRpcResponse = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": 200, "message": "Odoo Server Error"}
        }))
        .unwrap();

        let error = response.into_result().unwrap_err();
        assert_eq!(error.code, 200);
    }

    #[test]
    fn test_response_without_result_is_null() {
        let response: JsonRpcResponse =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": 1})).unwrap();
        assert_eq!(response.into_result().unwrap(), Value::Null);
    }

    #[test]
    fn test_many2one_decoding() {
        assert_eq!(many2one_id(&json!([4, "Parent"])), Some(4));
        assert_eq!(many2one_id(&json!(false)), None);
        assert_eq!(optional_string(&json!(false)), None);
        assert_eq!(optional_string(&json!("📄")), Some("📄".to_string()));
    }
}
