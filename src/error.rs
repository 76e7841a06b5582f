use rmcp::ErrorData as RpcError;

use thiserror::Error;
use tokio::io;

pub type ServiceResult<T> = core::result::Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("network error: {0}")]
    NetworkError(String),
    #[error("api error: {0}")]
    ApiError(String),
    #[error("{0}")]
    IoError(#[from] io::Error),
    #[error("{0}")]
    SerdeJsonError(#[from] serde_json::Error),
    #[error("invalid curated table: {0}")]
    TomlError(#[from] toml::de::Error),
    #[error("plan store error: {0}")]
    Storage(String),
    #[error("plan not found: {0}")]
    PlanNotFound(String),
    #[error("index {index} out of range for plan with {len} entries")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("{0}")]
    Other(String),
}

impl ServiceError {
    /// Map onto an MCP error payload for tool handlers.
    pub fn into_rpc(self) -> RpcError {
        match self {
            ServiceError::PlanNotFound(_) | ServiceError::IndexOutOfRange { .. } => {
                RpcError::invalid_params(self.to_string(), None)
            }
            other => RpcError::internal_error(other.to_string(), None),
        }
    }
}
