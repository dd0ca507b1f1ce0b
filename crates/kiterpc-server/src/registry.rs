//! Method registry: reflect over a receiver and index its methods by name.
//!
//! A receiver publishes itself by implementing [`Service`]: the framework
//! hands it a [`MethodTable`] and the receiver lists its callable methods.
//! The signature contract, `(receiver, ctx, arg, reply) -> error` with a
//! deserializable argument and a default-constructible, serializable reply
//! behind a unique reference, is enforced by the bounds of
//! [`MethodTable::method`]; what remains to check at runtime are the naming
//! rules, which mirror the identifier conventions of the wire protocol:
//! methods published under a non-exported name (first character not
//! uppercase) are skipped with a log line, and a receiver whose table ends up
//! empty fails registration.
//!
//! Each published method is stored type-erased behind [`ErasedMethod`], which
//! keeps the typed argument constructor (decode) and the invocation itself
//! available to the connection engine without compile-time knowledge of user
//! types.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use kiterpc_common::{Result, RpcError};

use crate::context::Context;
use crate::interceptor::{HandlerError, HandlerResult};

/// A receiver whose methods can be published on a server.
///
/// # Example
///
/// ```
/// use kiterpc_server::{Context, HandlerResult, MethodTable, Service};
/// use serde::{Deserialize, Serialize};
///
/// struct Arith;
///
/// #[derive(Deserialize)]
/// struct Args { a: i64, b: i64 }
///
/// #[derive(Serialize, Default)]
/// struct Sum { total: i64 }
///
/// impl Arith {
///     fn add(&self, _ctx: &Context, args: &Args, reply: &mut Sum) -> HandlerResult {
///         reply.total = args.a + args.b;
///         Ok(())
///     }
/// }
///
/// impl Service for Arith {
///     fn methods(table: &mut MethodTable<Self>) {
///         table.method("Add", Arith::add);
///     }
/// }
/// ```
pub trait Service: Send + Sync + 'static {
    /// Lists the receiver's callable methods.
    fn methods(table: &mut MethodTable<Self>)
    where
        Self: Sized;
}

/// Decoded argument value, type-erased so the connection engine and the
/// `stat` hook can carry it without knowing the concrete type.
pub(crate) type BoxedArg = Box<dyn Any + Send + Sync>;

/// What happened when a method was invoked.
pub(crate) enum Completion {
    /// The handler succeeded; the serialized reply body.
    Reply(serde_json::Value),
    /// The handler returned an error; the reply body is replaced by the
    /// placeholder record.
    Fault(HandlerError),
    /// The reply could not be serialized; the connection must be closed.
    EncodeFailed(serde_json::Error),
}

/// A published method with its typed argument and reply constructors erased.
pub(crate) trait ErasedMethod: Send + Sync {
    /// Constructs a fresh argument value by decoding one body record.
    fn decode_arg(&self, body: &[u8]) -> Result<BoxedArg>;

    /// Invokes the handler with a freshly allocated reply value.
    fn call(&self, ctx: &Context, arg: &BoxedArg) -> Completion;
}

impl std::fmt::Debug for dyn ErasedMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErasedMethod").finish_non_exhaustive()
    }
}

struct TypedMethod<S, A, R, F> {
    receiver: Arc<S>,
    func: F,
    _marker: std::marker::PhantomData<fn(A) -> R>,
}

impl<S, A, R, F> ErasedMethod for TypedMethod<S, A, R, F>
where
    S: Service,
    A: DeserializeOwned + Send + Sync + 'static,
    R: Serialize + Default + Send + 'static,
    F: Fn(&S, &Context, &A, &mut R) -> HandlerResult + Send + Sync + 'static,
{
    fn decode_arg(&self, body: &[u8]) -> Result<BoxedArg> {
        let arg: A = serde_json::from_slice(body)?;
        Ok(Box::new(arg))
    }

    fn call(&self, ctx: &Context, arg: &BoxedArg) -> Completion {
        let Some(arg) = arg.downcast_ref::<A>() else {
            // Unreachable in practice: the arg was decoded by this method.
            return Completion::Fault("argument type mismatch".into());
        };
        let mut reply = R::default();
        match (self.func)(&self.receiver, ctx, arg, &mut reply) {
            Ok(()) => match serde_json::to_value(&reply) {
                Ok(body) => Completion::Reply(body),
                Err(e) => Completion::EncodeFailed(e),
            },
            Err(e) => Completion::Fault(e),
        }
    }
}

/// Collects the methods a receiver publishes during registration.
pub struct MethodTable<S> {
    receiver: Arc<S>,
    methods: HashMap<String, Arc<dyn ErasedMethod>>,
}

impl<S: Service> MethodTable<S> {
    fn new(receiver: Arc<S>) -> Self {
        MethodTable {
            receiver,
            methods: HashMap::new(),
        }
    }

    /// Publishes one method under `name`.
    ///
    /// A method whose name is not exported (first character not uppercase)
    /// is skipped and logged rather than published.
    pub fn method<A, R, F>(&mut self, name: &str, func: F)
    where
        A: DeserializeOwned + Send + Sync + 'static,
        R: Serialize + Default + Send + 'static,
        F: Fn(&S, &Context, &A, &mut R) -> HandlerResult + Send + Sync + 'static,
    {
        if !is_exported(name) {
            warn!("rpc.Register: method {} is not exported", name);
            return;
        }
        self.methods.insert(
            name.to_owned(),
            Arc::new(TypedMethod {
                receiver: self.receiver.clone(),
                func,
                _marker: std::marker::PhantomData,
            }),
        );
    }
}

/// A registered service: immutable after registration.
#[derive(Debug)]
pub(crate) struct ServiceEntry {
    name: String,
    methods: HashMap<String, Arc<dyn ErasedMethod>>,
}

impl ServiceEntry {
    /// Validates the service name, collects the receiver's methods, and
    /// builds the immutable entry.
    ///
    /// `name` is the caller-supplied service name, if any; without one the
    /// receiver's concrete type name is used and must be exported.
    pub(crate) fn build<S: Service>(receiver: S, name: Option<&str>) -> Result<ServiceEntry> {
        let use_name = name.is_some();
        let sname = match name {
            Some(n) => n.to_owned(),
            None => short_type_name::<S>().to_owned(),
        };
        if sname.is_empty() {
            warn!(
                "rpc.Register: no service name for type {}",
                std::any::type_name::<S>()
            );
            return Err(RpcError::NoServiceName(
                std::any::type_name::<S>().to_owned(),
            ));
        }
        if !use_name && !is_exported(&sname) {
            warn!("rpc.Register: type {} is not exported", sname);
            return Err(RpcError::ServiceNotExported(sname));
        }

        let mut table = MethodTable::new(Arc::new(receiver));
        S::methods(&mut table);
        if table.methods.is_empty() {
            warn!(
                "rpc.Register: type {} has no exported methods of suitable type",
                sname
            );
            return Err(RpcError::NoSuitableMethods(sname));
        }

        Ok(ServiceEntry {
            name: sname,
            methods: table.methods,
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn method(&self, name: &str) -> Option<Arc<dyn ErasedMethod>> {
        self.methods.get(name).cloned()
    }
}

/// Is this an exported - upper case - name?
pub(crate) fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

/// Last path segment of the receiver's concrete type name.
fn short_type_name<S>() -> &'static str {
    let full = std::any::type_name::<S>();
    full.rsplit("::").next().unwrap_or(full)
}
