//! Loader error types.

use crate::result::{result_to_str, ErrorKind, VkResult};
use ash::vk;
use thiserror::Error;

/// Prefix shared by every formatted error message.
pub const ERROR_PREFIX: &str = "Vulkan error";

/// Message-bearing error for the rich calling convention.
///
/// Every negative native code maps to exactly one [`ErrorKind`]; codes
/// without a dedicated kind produce [`ErrorKind::Unrecognized`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
}

impl Error {
    /// Builds the error for `code` returned by `function`.
    pub fn from_result(code: vk::Result, function: &str) -> Self {
        let message = format!(
            "{ERROR_PREFIX}: {function}() failed with error {} (code {}).",
            result_to_str(code),
            code.as_raw()
        );
        Self {
            kind: ErrorKind::from_code(code),
            message,
        }
    }

    /// Builds an error of `kind` with a caller-supplied message.
    pub fn custom(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: format!("{ERROR_PREFIX}: {}", message.into()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The native code carried by this error.
    pub fn code(&self) -> vk::Result {
        self.kind.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Raises the error matching `code`.
///
/// The dispatch is exhaustive: explicitly enumerated codes get their own
/// kind, anything else gets the generic fallback naming `function`.
pub fn raise(code: vk::Result, function: &str) -> Error {
    Error::from_result(code, function)
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Adapter from the raw convention to the rich one.
pub trait ResultExt<T> {
    /// Converts a raw failure into an [`Error`] attributed to `function`.
    fn or_raise(self, function: &str) -> Result<T>;
}

impl<T> ResultExt<T> for VkResult<T> {
    #[inline]
    fn or_raise(self, function: &str) -> Result<T> {
        self.map_err(|code| raise(code, function))
    }
}
