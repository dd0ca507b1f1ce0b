//! KiteRPC Server
//!
//! A reflective RPC server: a host process publishes in-process objects as
//! network-callable services, and the server multiplexes many client
//! connections over a length-delimited, self-describing binary stream,
//! dispatching each request to the correct user-defined handler with
//! type-checked arguments and replies.
//!
//! # Architecture
//!
//! - **Registration**: a receiver implements [`Service`] to publish its
//!   methods; the server indexes them by `"Service.Method"` identifiers and
//!   auto-registers the built-in `inner` service (`inner.Ping` liveness,
//!   the reserved `inner.Auth` handshake identifier)
//! - **Connection engine**: one serve-loop task per connection reads
//!   requests in wire order; every accepted request is invoked on its own
//!   task; a per-connection send mutex keeps each response's header and body
//!   contiguous on the wire
//! - **Interceptor**: optional [`Interceptor`] hooks for admission control
//!   (`rate`), connection authentication (`auth`), and post-call
//!   observation (`stat`)
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use kiterpc_server::{Context, HandlerResult, MethodTable, Server, Service};
//! use serde::{Deserialize, Serialize};
//!
//! struct Arith;
//!
//! #[derive(Deserialize)]
//! struct Args { a: i64, b: i64 }
//!
//! #[derive(Serialize, Default)]
//! struct Quotient { quo: i64 }
//!
//! impl Arith {
//!     fn div(&self, _ctx: &Context, args: &Args, reply: &mut Quotient) -> HandlerResult {
//!         if args.b == 0 {
//!             return Err("divide by zero".into());
//!         }
//!         reply.quo = args.a / args.b;
//!         Ok(())
//!     }
//! }
//!
//! impl Service for Arith {
//!     fn methods(table: &mut MethodTable<Self>) {
//!         table.method("Div", Arith::div);
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let server = Arc::new(Server::new());
//!     server.register(Arith)?;
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:9000").await?;
//!     server.accept(listener).await;
//!     Ok(())
//! }
//! ```

mod builtin;
mod connection;
mod context;
mod interceptor;
mod registry;
mod server;

pub use context::Context;
pub use interceptor::{HandlerError, HandlerResult, Interceptor};
pub use registry::{MethodTable, Service};
pub use server::{accept, default_server, register, register_name, serve_conn, Server};

pub use kiterpc_common::{
    Auth, Request, Response, RpcError, AUTH_SERVICE_METHOD, INNER_SERVICE, PING_SERVICE_METHOD,
};
