//! KiteRPC Transport Layer
//!
//! This module provides the record framing used on every connection.
//!
//! # Architecture
//!
//! - **Wire Format**: `[4-byte length prefix as u32 big-endian] + [JSON data]`
//! - **[`FrameReader`]**: decodes records from the read side of a stream
//! - **[`FrameWriter`]**: buffered-writes records to the write side
//!
//! # Message Size Limits
//!
//! Both directions enforce a maximum record size of 100 MB to prevent memory
//! exhaustion from a hostile or broken peer.

pub mod codec;

pub use codec::{FrameReader, FrameWriter, MAX_MESSAGE_SIZE};
