//! Server surface: registration, lookup, and the accept loop.
//!
//! Registration must complete before the server starts accepting
//! connections; the registry is read-only while serving.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

use kiterpc_common::{split_service_method, Result, RpcError, INNER_SERVICE};

use crate::builtin::Pinger;
use crate::interceptor::Interceptor;
use crate::registry::{ErasedMethod, Service, ServiceEntry};

/// A KiteRPC server: a set of registered services plus the per-server
/// interceptor and handshake settings.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use kiterpc_server::Server;
/// # use kiterpc_server::{Context, HandlerResult, MethodTable, Service};
/// # struct Arith;
/// # impl Arith {
/// #     fn add(&self, _c: &Context, _a: &(), _r: &mut ()) -> HandlerResult { Ok(()) }
/// # }
/// # impl Service for Arith {
/// #     fn methods(t: &mut MethodTable<Self>) { t.method("Add", Arith::add); }
/// # }
///
/// # async fn run() -> anyhow::Result<()> {
/// let server = Arc::new(Server::new());
/// server.register(Arith)?;
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:9000").await?;
/// server.accept(listener).await;
/// # Ok(())
/// # }
/// ```
pub struct Server {
    services: RwLock<HashMap<String, Arc<ServiceEntry>>>,
    interceptor: RwLock<Option<Arc<dyn Interceptor>>>,
    handshake: AtomicBool,
}

impl Server {
    pub fn new() -> Self {
        Server {
            services: RwLock::new(HashMap::new()),
            interceptor: RwLock::new(None),
            handshake: AtomicBool::new(false),
        }
    }

    /// Publishes the set of methods of the receiver under the receiver's
    /// concrete type name.
    ///
    /// Fails when the derived name is empty or not exported, when the name
    /// collides with an already registered service, or when the receiver
    /// publishes no methods. Also installs the built-in `inner` service.
    ///
    /// Clients access each method using a string of the form `"Type.Method"`.
    pub fn register<S: Service>(&self, receiver: S) -> Result<()> {
        self.install(receiver, None)?;
        self.install_inner()
    }

    /// Like [`Server::register`] but uses the provided name for the service
    /// instead of the receiver's concrete type name. The exported-name
    /// restriction does not apply to the provided name.
    pub fn register_name<S: Service>(&self, name: &str, receiver: S) -> Result<()> {
        self.install(receiver, Some(name))?;
        self.install_inner()
    }

    fn install<S: Service>(&self, receiver: S, name: Option<&str>) -> Result<()> {
        let entry = ServiceEntry::build(receiver, name)?;
        let mut services = write_guard(&self.services);
        if services.contains_key(entry.name()) {
            return Err(RpcError::ServiceAlreadyDefined(entry.name().to_owned()));
        }
        services.insert(entry.name().to_owned(), Arc::new(entry));
        Ok(())
    }

    /// Installs the built-in `inner` service. Every registration re-runs
    /// this; repeats are a no-op.
    fn install_inner(&self) -> Result<()> {
        match self.install(Pinger, Some(INNER_SERVICE)) {
            Err(RpcError::ServiceAlreadyDefined(_)) => Ok(()),
            other => other,
        }
    }

    /// Sets the interceptor whose hooks see every request on this server.
    pub fn set_interceptor(&self, interceptor: Arc<dyn Interceptor>) {
        *write_guard(&self.interceptor) = Some(interceptor);
    }

    /// Requires (or stops requiring) the `inner.Auth` handshake as the first
    /// exchange on every new connection.
    pub fn set_handshake(&self, enabled: bool) {
        self.handshake.store(enabled, Ordering::Relaxed);
    }

    pub(crate) fn interceptor(&self) -> Option<Arc<dyn Interceptor>> {
        read_guard(&self.interceptor).clone()
    }

    pub(crate) fn handshake_enabled(&self) -> bool {
        self.handshake.load(Ordering::Relaxed)
    }

    /// Resolves a `Service.Method` identifier to its handler.
    pub(crate) fn lookup(&self, service_method: &str) -> Result<Arc<dyn ErasedMethod>> {
        let (service_name, method_name) = split_service_method(service_method)?;
        let services = read_guard(&self.services);
        let service = services
            .get(service_name)
            .ok_or_else(|| RpcError::ServiceNotFound(service_method.to_owned()))?;
        service
            .method(method_name)
            .ok_or_else(|| RpcError::MethodNotFound(service_method.to_owned()))
    }

    /// Accepts connections on the listener and serves requests for each
    /// incoming connection. Blocks until the listener returns an error;
    /// accept errors are terminal. The listener itself is never closed.
    pub async fn accept(self: Arc<Self>, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    debug!("connection established from {}", peer_addr);
                    tokio::spawn(self.clone().serve_conn(stream));
                }
                Err(e) => {
                    warn!("rpc.Serve: accept: {}", e);
                    return;
                }
            }
        }
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

fn read_guard<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_guard<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

static DEFAULT_SERVER: LazyLock<Arc<Server>> = LazyLock::new(|| Arc::new(Server::new()));

/// The process-wide default instance of [`Server`].
pub fn default_server() -> Arc<Server> {
    DEFAULT_SERVER.clone()
}

/// Publishes the receiver's methods in the default server.
pub fn register<S: Service>(receiver: S) -> Result<()> {
    DEFAULT_SERVER.register(receiver)
}

/// Like [`register`] but uses the provided name for the service instead of
/// the receiver's concrete type name.
pub fn register_name<S: Service>(name: &str, receiver: S) -> Result<()> {
    DEFAULT_SERVER.register_name(name, receiver)
}

/// Accepts connections on the listener and serves requests on the default
/// server for each incoming connection.
pub async fn accept(listener: TcpListener) {
    DEFAULT_SERVER.clone().accept(listener).await
}

/// Runs the default server on a single connection.
pub async fn serve_conn(stream: TcpStream) {
    DEFAULT_SERVER.clone().serve_conn(stream).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::interceptor::HandlerResult;
    use crate::registry::MethodTable;

    struct Arith;

    impl Arith {
        fn add(&self, _ctx: &Context, _arg: &(), _reply: &mut ()) -> HandlerResult {
            Ok(())
        }
    }

    impl Service for Arith {
        fn methods(table: &mut MethodTable<Self>) {
            table.method("Add", Arith::add);
        }
    }

    struct Strings;

    impl Service for Strings {
        fn methods(table: &mut MethodTable<Self>) {
            table.method(
                "Upper",
                |_s: &Strings, _ctx: &Context, arg: &String, reply: &mut String| {
                    reply.push_str(&arg.to_uppercase());
                    Ok(())
                },
            );
        }
    }

    #[test]
    fn test_register_installs_inner() {
        let server = Server::new();
        server.register(Arith).unwrap();
        assert!(server.lookup("inner.Ping").is_ok());
        assert!(server.lookup("Arith.Add").is_ok());
    }

    #[test]
    fn test_register_twice_collides() {
        let server = Server::new();
        server.register(Arith).unwrap();
        let err = server.register(Arith).unwrap_err();
        assert_eq!(err.to_string(), "rpc: service already defined: Arith");
    }

    #[test]
    fn test_inner_installation_is_idempotent() {
        let server = Server::new();
        server.register(Arith).unwrap();
        server.register(Strings).unwrap();
        assert!(server.lookup("Strings.Upper").is_ok());
    }

    #[test]
    fn test_register_name_overrides_type_name() {
        let server = Server::new();
        server.register_name("calc", Arith).unwrap();
        assert!(server.lookup("calc.Add").is_ok());
        assert!(matches!(
            server.lookup("Arith.Add"),
            Err(RpcError::ServiceNotFound(_))
        ));
    }

    #[test]
    fn test_lookup_errors() {
        let server = Server::new();
        server.register(Arith).unwrap();

        let err = server.lookup("NoDotHere").unwrap_err();
        assert!(matches!(err, RpcError::IllFormedServiceMethod(_)));

        let err = server.lookup("Missing.Add").unwrap_err();
        assert_eq!(err.to_string(), "rpc: can't find service Missing.Add");

        let err = server.lookup("Arith.Nope").unwrap_err();
        assert_eq!(err.to_string(), "rpc: can't find method Arith.Nope");
    }

    #[test]
    fn test_inner_auth_has_no_dispatchable_body() {
        let server = Server::new();
        server.register(Arith).unwrap();
        assert!(matches!(
            server.lookup("inner.Auth"),
            Err(RpcError::MethodNotFound(_))
        ));
    }
}
