//! KiteRPC Protocol Definitions
//!
//! This module defines the wire-level types exchanged on every connection:
//! request and response headers, the handshake message, and the error type
//! used throughout the system.
//!
//! # Protocol Types
//!
//! - **[`Request`]**: header written before every call, carrying the
//!   `Service.Method` identifier, a client-chosen sequence number, and an
//!   opaque trace payload
//! - **[`Response`]**: header echoed back for every call, with an error
//!   string (empty on success)
//! - **[`Auth`]**: the handshake message sent as the body of the first
//!   `inner.Auth` request when the server requires authentication
//! - **[`RpcError`]**: error taxonomy covering registration, framing,
//!   dispatch, and encode failures
//!
//! Sequence numbers are opaque to the server; they are echoed back so the
//! client can match responses to in-flight calls, and nothing requires them
//! to be unique or monotonic.

pub mod error;
pub mod requests;
pub mod responses;

pub use error::{Result, RpcError};
pub use requests::{split_service_method, Auth, Request, TracePayload};
pub use responses::{placeholder_body, Response};

/// Service identifier of the reserved handshake endpoint.
pub const AUTH_SERVICE_METHOD: &str = "inner.Auth";

/// Service identifier of the built-in liveness endpoint.
pub const PING_SERVICE_METHOD: &str = "inner.Ping";

/// Name of the auto-registered built-in service.
pub const INNER_SERVICE: &str = "inner";
