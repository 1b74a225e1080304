// quell/src/error.rs
use anyhow::Error as AnyhowError;
use thiserror::Error;

use crate::core::interrupt::InterruptType;

#[derive(Debug, Error)]
pub enum QuellError {
  /// A mutually-exclusive interrupt is already active for the target scope.
  /// Surfaced to the caller, never retried internally.
  #[error("Conflicting interrupt already active: {message}")]
  Conflict { message: String },

  /// The target plan or node is not in a status compatible with the
  /// requested interrupt type.
  #[error("Invalid state for interrupt: {message}")]
  InvalidState { message: String },

  /// A conditional status update was refused: the current status was not in
  /// the allowed set, or a bulk update reported a negative count. Terminal
  /// for the issuing interrupt.
  #[error("Status transition failed for {entity} '{id}': {detail}")]
  TransitionFailed {
    entity: &'static str,
    id: String,
    detail: String,
  },

  /// A handler was invoked for a scope its interrupt type does not support.
  #[error("{interrupt_type} does not support {operation}")]
  UnsupportedOperation {
    interrupt_type: InterruptType,
    operation: &'static str,
  },

  #[error("{entity} not found: {id}")]
  NotFound { entity: &'static str, id: String },

  /// The external stop/expire/retry executor failed.
  #[error("Executor call failed. Source: {source}")]
  Executor {
    #[source]
    source: AnyhowError,
  },

  /// The interrupt store or an execution-tree service failed below the
  /// conditional-update contract.
  #[error("Storage operation failed. Source: {source}")]
  Storage {
    #[source]
    source: AnyhowError,
  },

  #[error("Internal quell error: {0}")]
  Internal(String),
}

impl QuellError {
  pub fn conflict(message: impl Into<String>) -> Self {
    QuellError::Conflict { message: message.into() }
  }

  pub fn invalid_state(message: impl Into<String>) -> Self {
    QuellError::InvalidState { message: message.into() }
  }
}

impl From<AnyhowError> for QuellError {
  fn from(err: AnyhowError) -> Self {
    QuellError::Storage { source: err }
  }
}

pub type QuellResult<T, E = QuellError> = std::result::Result<T, E>;
