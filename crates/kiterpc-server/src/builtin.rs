//! Built-in `inner` service, auto-registered alongside every user service.
//!
//! `inner.Ping` answers liveness checks with a unit reply. `inner.Auth` is a
//! reserved identifier with no dispatchable body: the handshake engine
//! consumes it structurally before the dispatch loop starts, and a
//! post-handshake request naming it gets an empty-error response.

use crate::context::Context;
use crate::interceptor::HandlerResult;
use crate::registry::{MethodTable, Service};

/// Receiver behind the built-in `inner` service.
pub(crate) struct Pinger;

impl Pinger {
    fn ping(&self, _ctx: &Context, _arg: &(), _reply: &mut ()) -> HandlerResult {
        Ok(())
    }
}

impl Service for Pinger {
    fn methods(table: &mut MethodTable<Self>) {
        table.method("Ping", Pinger::ping);
    }
}
