/// Error value produced by failed tasks, search functions, transforms,
/// and lifecycle callbacks.
///
/// Caller-supplied code normalizes its failures into this type, usually
/// through the `From<String>` conversion:
///
/// ```
/// use fetchstate::FetchError;
///
/// fn load() -> Result<u32, FetchError> {
///     "42".parse::<u32>().map_err(|e| e.to_string())?;
///     Ok(42)
/// }
///
/// assert_eq!(load(), Ok(42));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct FetchError {
    message: String,
}

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The displayable message carried by this error.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for FetchError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for FetchError {
    fn from(message: &str) -> Self {
        Self {
            message: message.into(),
        }
    }
}
