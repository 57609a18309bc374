//! Internal result and error types.

/// The result type for fallible engine operations.
///
/// `Err` indicates an unrecoverable internal condition (an unbreakable
/// timing loop, intern table exhaustion), not a user data problem. User
/// data problems are reported through the diagnostic sink and the
/// operation still returns `Ok` with the offending item skipped.
pub type ChronosResult<T> = Result<T, InternalError>;

/// An unrecoverable internal error. The engine state remains consistent
/// enough to destroy cleanly.
#[derive(Debug, thiserror::Error)]
#[error("internal timing engine error [{id}]: {message}")]
pub struct InternalError {
    /// Stable numeric id for the failure kind.
    pub id: u16,
    /// Description of the failure.
    pub message: String,
}

impl InternalError {
    /// Creates a new internal error with a stable id and message.
    pub fn new(id: u16, message: impl Into<String>) -> Self {
        Self {
            id,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_format() {
        let err = InternalError::new(900, "unbreakable timing loop");
        assert_eq!(
            format!("{err}"),
            "internal timing engine error [900]: unbreakable timing loop"
        );
    }

    #[test]
    fn ok_and_err_paths() {
        let ok: ChronosResult<u32> = Ok(1);
        assert!(ok.is_ok());
        let err: ChronosResult<u32> = Err(InternalError::new(901, "boom"));
        assert_eq!(err.err().unwrap().id, 901);
    }
}
