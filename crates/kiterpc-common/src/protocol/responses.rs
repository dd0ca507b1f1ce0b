use serde::{Deserialize, Serialize};

/// Header written before every RPC return. It is used internally but
/// documented here as an aid to debugging, such as when analyzing network
/// traffic.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Response {
    /// Echoes that of the request
    #[serde(rename = "ServiceMethod")]
    pub service_method: String,
    /// Echoes that of the request
    #[serde(rename = "Seq")]
    pub seq: u64,
    /// Error, if any; empty string means success
    #[serde(rename = "Error", default)]
    pub error: String,
}

impl Response {
    pub fn success(service_method: impl Into<String>, seq: u64) -> Self {
        Response {
            service_method: service_method.into(),
            seq,
            error: String::new(),
        }
    }

    pub fn error(service_method: impl Into<String>, seq: u64, error: impl Into<String>) -> Self {
        Response {
            service_method: service_method.into(),
            seq,
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_empty()
    }
}

/// A value sent as a placeholder for the reply body when the response carries
/// an error. It is never decoded by the client since the `Response` header
/// contains an error when it is used.
pub fn placeholder_body() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_wire_field_names() {
        let response = Response::error("Arith.Div", 42, "divide by zero");
        let encoded = serde_json::to_value(&response).unwrap();
        assert_eq!(
            encoded,
            json!({"ServiceMethod": "Arith.Div", "Seq": 42, "Error": "divide by zero"})
        );
    }

    #[test]
    fn test_response_success() {
        let response = Response::success("inner.Ping", 7);
        assert!(response.is_success());
        assert_eq!(response.seq, 7);
    }

    #[test]
    fn test_placeholder_is_zero_field_record() {
        assert_eq!(placeholder_body(), json!({}));
    }
}
