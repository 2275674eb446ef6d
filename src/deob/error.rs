use thiserror::Error;

use crate::parser::ParseError;
use crate::runner::sandbox::SandboxError;

/// Failure of a whole deobfuscation call. The target text is never
/// modified when one of these is returned.
#[derive(Debug, Error)]
pub enum DeobError {
    /// The description does not have the shape the technique expects.
    #[error("invalid description: {0}")]
    Validation(String),
    /// A sandboxed technique was called through the synchronous entry point.
    #[error("technique '{0}' must be run asynchronously")]
    Asynchronous(&'static str),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Sandbox(#[from] SandboxError),
}

impl DeobError {
    pub fn validation(message: impl Into<String>) -> Self {
        DeobError::Validation(message.into())
    }
}
