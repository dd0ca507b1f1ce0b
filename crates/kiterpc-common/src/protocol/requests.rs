//! KiteRPC Request Types
//!
//! The request header written before every call, plus the handshake message.

use serde::{Deserialize, Serialize};

use super::error::{Result, RpcError};

/// Opaque tracing payload propagated verbatim from request to handler.
///
/// The server neither interprets nor validates it; handlers and interceptors
/// read it from the invocation context by convention.
pub type TracePayload = serde_json::Value;

/// Header written before every RPC call. It is used internally but documented
/// here as an aid to debugging, such as when analyzing network traffic.
///
/// # Fields
///
/// - `service_method`: format `"Service.Method"`, split on the last `.`
/// - `seq`: sequence number chosen by the client, echoed back opaquely
/// - `trace`: optional trace payload, carried through untouched
///
/// # Example
///
/// ```
/// use kiterpc_common::Request;
/// use serde_json::json;
///
/// let request = Request::new("Arith.Div", 42).with_trace(json!({"span": 1}));
/// let (service, method) = request.service_and_method().unwrap();
/// assert_eq!(service, "Arith");
/// assert_eq!(method, "Div");
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Request {
    /// Format: "Service.Method"
    #[serde(rename = "ServiceMethod")]
    pub service_method: String,
    /// Sequence number chosen by the client
    #[serde(rename = "Seq")]
    pub seq: u64,
    /// Opaque trace payload, if any
    #[serde(rename = "Trace", default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<TracePayload>,
}

impl Request {
    /// Creates a new request header.
    pub fn new(service_method: impl Into<String>, seq: u64) -> Self {
        Request {
            service_method: service_method.into(),
            seq,
            trace: None,
        }
    }

    /// Attaches an opaque trace payload to this request.
    pub fn with_trace(mut self, trace: TracePayload) -> Self {
        self.trace = Some(trace);
        self
    }

    /// Splits the identifier into its service and method halves.
    pub fn service_and_method(&self) -> Result<(&str, &str)> {
        split_service_method(&self.service_method)
    }
}

/// Splits a `Service.Method` identifier on the **last** `.`.
///
/// An identifier without a dot is an ill-formed request.
pub fn split_service_method(service_method: &str) -> Result<(&str, &str)> {
    match service_method.rfind('.') {
        Some(dot) => Ok((&service_method[..dot], &service_method[dot + 1..])),
        None => Err(RpcError::IllFormedServiceMethod(service_method.to_owned())),
    }
}

/// Handshake message sent as the body of the first `inner.Auth` request when
/// the server requires authentication.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Auth {
    #[serde(rename = "User", default)]
    pub user: String,
    #[serde(rename = "Token", default)]
    pub token: String,
}

impl Auth {
    /// Creates a new handshake message.
    pub fn new(user: impl Into<String>, token: impl Into<String>) -> Self {
        Auth {
            user: user.into(),
            token: token.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_split_on_last_dot() {
        let (service, method) = split_service_method("Arith.Div").unwrap();
        assert_eq!(service, "Arith");
        assert_eq!(method, "Div");

        // Service names may themselves contain dots; only the last one splits.
        let (service, method) = split_service_method("a.b.C").unwrap();
        assert_eq!(service, "a.b");
        assert_eq!(method, "C");
    }

    #[test]
    fn test_split_missing_dot() {
        let err = split_service_method("NoDotHere").unwrap_err();
        assert_eq!(
            err.to_string(),
            "rpc: service/method request ill-formed: NoDotHere"
        );
    }

    #[test]
    fn test_request_wire_field_names() {
        let request = Request::new("inner.Ping", 7);
        let encoded = serde_json::to_value(&request).unwrap();
        assert_eq!(encoded, json!({"ServiceMethod": "inner.Ping", "Seq": 7}));
    }

    #[test]
    fn test_request_trace_round_trip() {
        let request = Request::new("Svc.M", 1).with_trace(json!({"id": "abc"}));
        let encoded = serde_json::to_string(&request).unwrap();
        let decoded: Request = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.trace, Some(json!({"id": "abc"})));
    }

    #[test]
    fn test_request_trace_accepts_null_and_missing() {
        let decoded: Request =
            serde_json::from_str(r#"{"ServiceMethod":"S.M","Seq":1,"Trace":null}"#).unwrap();
        assert_eq!(decoded.trace, None);

        let decoded: Request =
            serde_json::from_str(r#"{"ServiceMethod":"S.M","Seq":1}"#).unwrap();
        assert_eq!(decoded.trace, None);
    }

    #[test]
    fn test_auth_wire_field_names() {
        let auth = Auth::new("u", "secret");
        let encoded = serde_json::to_value(&auth).unwrap();
        assert_eq!(encoded, json!({"User": "u", "Token": "secret"}));
    }
}
