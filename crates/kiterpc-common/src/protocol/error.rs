use thiserror::Error;

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("rpc.Register: no service name for type {0}")]
    NoServiceName(String),

    #[error("rpc.Register: type {0} is not exported")]
    ServiceNotExported(String),

    #[error("rpc: service already defined: {0}")]
    ServiceAlreadyDefined(String),

    #[error("rpc.Register: type {0} has no exported methods of suitable type")]
    NoSuitableMethods(String),

    #[error("rpc: service/method request ill-formed: {0}")]
    IllFormedServiceMethod(String),

    #[error("rpc: can't find service {0}")]
    ServiceNotFound(String),

    #[error("rpc: can't find method {0}")]
    MethodNotFound(String),

    #[error("rpc: server cannot decode request: {0}")]
    DecodeRequest(String),

    #[error("rpc: auth service method: {0}")]
    AuthServiceMethod(String),

    #[error("rpc: connection unauthorized: {0}")]
    Unauthorized(String),

    #[error("frame too large: {size} bytes (max {max} bytes)")]
    FrameTooLarge { size: usize, max: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RpcError>;
