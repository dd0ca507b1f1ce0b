use std::any::Any;
use std::net::SocketAddr;

use crate::context::Context;

/// Error type returned by user methods and interceptor hooks.
///
/// These errors are flattened to their string form before transmission;
/// structured error types are not preserved on the wire.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Return type of user methods and of the fallible interceptor hooks.
pub type HandlerResult = Result<(), HandlerError>;

/// Pluggable per-server hooks seeing every request.
///
/// An interceptor is optional; without one, no rate limiting happens, no
/// statistics are observed, and handshake authentication reduces to the
/// structural `inner.Auth` check.
pub trait Interceptor: Send + Sync {
    /// Pre-call admission control. A returned error aborts the dispatch and
    /// is surfaced as the response error.
    fn rate(&self, ctx: &Context) -> HandlerResult;

    /// Post-call observation. Runs after the response has been written and
    /// never affects it. `arg` is the decoded argument the handler saw (or
    /// would have seen, when `rate` refused the call).
    fn stat(
        &self,
        ctx: &Context,
        arg: &(dyn Any + Send + Sync),
        err: Option<&(dyn std::error::Error + Send + Sync)>,
    );

    /// Called once per connection during handshake. A returned error fails
    /// the handshake and closes the connection.
    fn auth(&self, ctx: &Context, remote_addr: SocketAddr, token: &str) -> HandlerResult;
}
