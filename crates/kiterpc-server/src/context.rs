use std::net::SocketAddr;

use kiterpc_common::TracePayload;

/// Per-call invocation context.
///
/// Constructed once per request (and once during handshake), then shared by
/// reference with the user method and every interceptor hook. It is never
/// mutated after construction, so overlapping invocation workers may read it
/// concurrently.
#[derive(Debug, Clone)]
pub struct Context {
    service_method: String,
    seq: u64,
    user: String,
    trace: Option<TracePayload>,
    remote_addr: SocketAddr,
}

impl Context {
    pub(crate) fn new(
        service_method: String,
        seq: u64,
        user: String,
        trace: Option<TracePayload>,
        remote_addr: SocketAddr,
    ) -> Self {
        Context {
            service_method,
            seq,
            user,
            trace,
            remote_addr,
        }
    }

    /// The `Service.Method` identifier of this call.
    pub fn service_method(&self) -> &str {
        &self.service_method
    }

    /// The client-chosen sequence number, echoed back in the response.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// The authenticated user, or the empty string when the server runs
    /// without a handshake.
    pub fn user(&self) -> &str {
        &self.user
    }

    /// The opaque trace payload carried by the request, if any.
    pub fn trace(&self) -> Option<&TracePayload> {
        self.trace.as_ref()
    }

    /// The peer address of the connection this call arrived on.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }
}
