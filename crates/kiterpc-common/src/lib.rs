//! KiteRPC Common Types and Transport
//!
//! This crate provides the wire protocol definitions and the framed codec
//! used by the KiteRPC reflective RPC server.
//!
//! # Overview
//!
//! KiteRPC lets a host process publish in-process objects as network-callable
//! services. This crate contains the pieces shared by the server and by any
//! client-side tooling:
//!
//! - **Protocol Layer**: `Request` / `Response` headers, the `Auth` handshake
//!   message, and the error taxonomy
//! - **Transport Layer**: length-delimited JSON record framing over any
//!   bidirectional byte stream
//!
//! # Wire Format
//!
//! Every record on a connection is framed as
//! `[4-byte length prefix as u32 big-endian] + [JSON data]`. A call consists
//! of a `Request` header record followed by one argument record; the server
//! answers with a `Response` header record followed by one reply record (or a
//! zero-field placeholder record when the response carries an error).
//!
//! # Example
//!
//! ```
//! use kiterpc_common::{Request, Response};
//!
//! let request = Request::new("Arith.Add", 7);
//! let response = Response::success(&request.service_method, request.seq);
//! assert!(response.is_success());
//! ```

pub mod protocol;
pub mod transport;

pub use protocol::*;
pub use transport::{FrameReader, FrameWriter, MAX_MESSAGE_SIZE};
