//! Per-connection protocol engine: handshake, read-dispatch loop, and the
//! serialized response path.
//!
//! One task (the serve loop) owns the read side and decodes requests in wire
//! order; each accepted request is handled on its own task. All response
//! writes go through [`Connection::send_response`], which holds the send
//! mutex for the whole header+body write, so responses are emitted atomically
//! even when invocations complete out of order.

use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::Value;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use kiterpc_common::{
    placeholder_body, Auth, FrameReader, FrameWriter, Request, Response, Result, RpcError,
    AUTH_SERVICE_METHOD,
};

use crate::context::Context;
use crate::interceptor::HandlerError;
use crate::registry::{BoxedArg, Completion, ErasedMethod};
use crate::server::Server;

/// Write side of a connection, shared between the serve loop and every
/// in-flight invocation worker.
pub(crate) struct Connection {
    sending: Mutex<Sender>,
    remote_addr: SocketAddr,
}

/// Encoder state guarded by the send mutex: the reused response header slot,
/// the buffered writer, and the closed flag.
struct Sender {
    resp: Response,
    writer: FrameWriter<OwnedWriteHalf>,
    closed: bool,
}

impl Sender {
    async fn close(&mut self) {
        if self.closed {
            // Only shut the transport down once.
            return;
        }
        self.closed = true;
        let _ = self.writer.shutdown().await;
    }
}

impl Connection {
    fn new(write_half: OwnedWriteHalf, remote_addr: SocketAddr) -> Self {
        Connection {
            sending: Mutex::new(Sender {
                resp: Response::default(),
                writer: FrameWriter::new(write_half),
                closed: false,
            }),
            remote_addr,
        }
    }

    fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Writes one response (header record, body record, one flush) holding
    /// the send mutex throughout. A non-empty `errmsg` replaces the
    /// body with the placeholder record so partial handler-side mutations of
    /// the reply are not serialized. Write failures log and close the
    /// connection: the stream framing cannot be trusted afterwards.
    async fn send_response(&self, ctx: &Context, body: Value, errmsg: String) {
        let body = if errmsg.is_empty() {
            body
        } else {
            placeholder_body()
        };

        let mut sender = self.sending.lock().await;
        if sender.closed {
            return;
        }
        let Sender { resp, writer, .. } = &mut *sender;
        resp.service_method = ctx.service_method().to_owned();
        resp.seq = ctx.seq();
        resp.error = errmsg;

        let written = async {
            writer.write_value(&*resp).await?;
            writer.write_value(&body).await?;
            writer.flush().await
        }
        .await;
        if let Err(e) = written {
            warn!("rpc: writing response: {}", e);
            sender.close().await;
        }
    }

    async fn close(&self) {
        self.sending.lock().await.close().await;
    }
}

/// One fully read request, classified for the serve loop.
enum ReadOutcome {
    /// Clean end of stream at a record boundary.
    Eof,
    /// The header could not be read or decoded; framing is lost.
    Fatal(RpcError),
    /// The header decoded but the request cannot be dispatched; the body
    /// record has been drained.
    Reject(Arc<Context>, RpcError),
    /// Ready to invoke: context, resolved method, decoded argument.
    Dispatch(Arc<Context>, Arc<dyn ErasedMethod>, BoxedArg),
}

impl Server {
    /// Runs the server on a single connection, serving requests until the
    /// client hangs up. The caller typically spawns this onto its own task.
    pub async fn serve_conn(self: Arc<Self>, stream: TcpStream) {
        let remote_addr = match stream.peer_addr() {
            Ok(addr) => addr,
            Err(e) => {
                warn!("rpc: peer address: {}", e);
                return;
            }
        };
        let (read_half, write_half) = stream.into_split();
        let mut reader = FrameReader::new(read_half);
        let conn = Arc::new(Connection::new(write_half, remote_addr));

        let user = match self.handshake(&mut reader, &conn).await {
            Ok(user) => user,
            Err(e) => {
                debug!("rpc: handshake: {}", e);
                conn.close().await;
                return;
            }
        };

        loop {
            match self.read_request(&mut reader, &user, remote_addr).await {
                ReadOutcome::Eof => break,
                ReadOutcome::Fatal(e) => {
                    warn!("rpc: {}", e);
                    break;
                }
                ReadOutcome::Reject(ctx, e) => {
                    debug!("rpc: {}", e);
                    // inner.Auth after the handshake is answered as a no-op.
                    let errmsg = if ctx.service_method() == AUTH_SERVICE_METHOD {
                        String::new()
                    } else {
                        e.to_string()
                    };
                    conn.send_response(&ctx, placeholder_body(), errmsg).await;
                }
                ReadOutcome::Dispatch(ctx, method, arg) => {
                    let server = self.clone();
                    let conn = conn.clone();
                    tokio::spawn(async move { server.call(ctx, method, arg, conn).await });
                }
            }
        }
        conn.close().await;
    }

    /// First exchange on a connection when the handshake flag is set: one
    /// `Request` header naming `inner.Auth`, one `Auth` body. The
    /// interceptor's verdict is answered with a single response; a rejected
    /// or structurally invalid handshake error is returned so the caller
    /// closes the connection. Returns the authenticated user.
    async fn handshake(
        &self,
        reader: &mut FrameReader<OwnedReadHalf>,
        conn: &Connection,
    ) -> Result<String> {
        if !self.handshake_enabled() {
            return Ok(String::new());
        }

        let req: Request = match reader.read_value().await? {
            Some(req) => req,
            None => return Err(closed_early()),
        };
        let auth: Auth = match reader.read_value().await? {
            Some(auth) => auth,
            None => return Err(closed_early()),
        };
        if req.service_method != AUTH_SERVICE_METHOD {
            return Err(RpcError::AuthServiceMethod(req.service_method));
        }

        let user = auth.user.clone();
        if let Some(interceptor) = self.interceptor() {
            let ctx = Context::new(
                req.service_method,
                req.seq,
                auth.user,
                req.trace,
                conn.remote_addr(),
            );
            let verdict = interceptor.auth(&ctx, conn.remote_addr(), &auth.token);
            let errmsg = match &verdict {
                Ok(()) => String::new(),
                Err(e) => e.to_string(),
            };
            conn.send_response(&ctx, placeholder_body(), errmsg).await;
            if let Err(e) = verdict {
                return Err(RpcError::Unauthorized(e.to_string()));
            }
        }
        Ok(user)
    }

    /// Reads one request: header record, lookup, then the body record
    /// decoded into a freshly constructed argument value. Runs on the serve
    /// loop, so records are consumed strictly in wire order.
    async fn read_request(
        &self,
        reader: &mut FrameReader<OwnedReadHalf>,
        user: &str,
        remote_addr: SocketAddr,
    ) -> ReadOutcome {
        let frame = match reader.read_frame().await {
            Ok(Some(frame)) => frame,
            Ok(None) => return ReadOutcome::Eof,
            Err(e) => return ReadOutcome::Fatal(e),
        };
        let req: Request = match serde_json::from_slice(&frame) {
            Ok(req) => req,
            Err(e) => return ReadOutcome::Fatal(RpcError::DecodeRequest(e.to_string())),
        };

        let ctx = Arc::new(Context::new(
            req.service_method.clone(),
            req.seq,
            user.to_owned(),
            req.trace,
            remote_addr,
        ));

        let method = match self.lookup(&req.service_method) {
            Ok(method) => method,
            Err(e) => {
                // Discard the body record; the next header follows it.
                let _ = reader.read_frame().await;
                return ReadOutcome::Reject(ctx, e);
            }
        };

        let body = match reader.read_frame().await {
            Ok(Some(body)) => body,
            Ok(None) => {
                return ReadOutcome::Fatal(RpcError::Io(
                    std::io::ErrorKind::UnexpectedEof.into(),
                ))
            }
            Err(e) => return ReadOutcome::Fatal(e),
        };
        match method.decode_arg(&body) {
            Ok(arg) => ReadOutcome::Dispatch(ctx, method, arg),
            Err(e) => ReadOutcome::Reject(ctx, e),
        }
    }

    /// Invocation worker: rate gate, handler call, one response under the
    /// send mutex, then the stat hook.
    async fn call(
        self: Arc<Self>,
        ctx: Arc<Context>,
        method: Arc<dyn ErasedMethod>,
        arg: BoxedArg,
        conn: Arc<Connection>,
    ) {
        let interceptor = self.interceptor();
        let mut err: Option<HandlerError> = None;

        if let Some(interceptor) = &interceptor {
            if let Err(e) = interceptor.rate(&ctx) {
                err = Some(e);
            }
        }

        let mut body = placeholder_body();
        let mut write_response = true;
        if err.is_none() {
            match method.call(&ctx, &arg) {
                Completion::Reply(reply) => body = reply,
                Completion::Fault(e) => err = Some(e),
                Completion::EncodeFailed(e) => {
                    warn!("rpc: writing response: {}", e);
                    conn.close().await;
                    write_response = false;
                }
            }
        }

        if write_response {
            let errmsg = err.as_ref().map(|e| e.to_string()).unwrap_or_default();
            conn.send_response(&ctx, body, errmsg).await;
        }

        if let Some(interceptor) = &interceptor {
            interceptor.stat(&ctx, arg.as_ref(), err.as_deref());
        }

        if let Some(trace) = ctx.trace() {
            debug!(
                service_method = ctx.service_method(),
                seq = ctx.seq(),
                ?trace,
                "call finished"
            );
        }
    }
}

fn closed_early() -> RpcError {
    RpcError::Io(std::io::ErrorKind::UnexpectedEof.into())
}
