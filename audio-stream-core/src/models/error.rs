use std::fmt;

use thiserror::Error;

use super::state::StreamId;

/// Native status code reported when the engine has not been initialized.
pub const NOT_INITIALIZED: i32 = -10000;
/// Native status code for an operation that requires a stopped stream.
pub const STREAM_IS_NOT_STOPPED: i32 = -9982;
/// Native status code for an operation that requires a running stream.
pub const STREAM_IS_STOPPED: i32 = -9983;
/// Native status code for an unknown or already closed stream.
pub const BAD_STREAM_PTR: i32 = -9988;

/// Errors that can occur while driving the native audio engine.
///
/// Every public operation that can fail returns one of these instead of a
/// raw native status code.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StreamError {
    /// Local invariant violation. Never reaches the native layer.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The native engine rejected a call.
    #[error("native error {code}: {message}")]
    Native { code: i32, message: String },

    /// The engine has not been initialized (or was already terminated).
    #[error("audio engine not initialized")]
    NotInitialized,

    /// A binary record did not match the layout the codec expects.
    #[error("record integrity error in {record}: {detail}")]
    Integrity { record: &'static str, detail: String },

    /// The stream callback failed on the real-time thread; the stream was aborted.
    #[error("callback failure on {stream}: {message}")]
    CallbackFailure { stream: StreamId, message: String },

    /// An open enumeration already holds a value for this code.
    #[error("{kind} code {code:#x} is already registered")]
    DuplicateCode { kind: &'static str, code: u32 },
}

impl StreamError {
    /// Builds a native error for `code` using the engine's well-known text.
    pub fn native(code: i32) -> Self {
        Self::from(NativeStatus::new(code))
    }

    /// The native status code, if this error came from the native layer.
    pub fn native_code(&self) -> Option<i32> {
        match self {
            Self::Native { code, .. } => Some(*code),
            Self::NotInitialized => Some(NOT_INITIALIZED),
            _ => None,
        }
    }
}

/// Failure status returned by a [`NativeEngine`](crate::traits::native_engine::NativeEngine) call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeStatus {
    pub code: i32,
    pub message: Option<String>,
}

impl NativeStatus {
    pub fn new(code: i32) -> Self {
        Self { code, message: None }
    }

    pub fn with_message(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }
}

impl fmt::Display for NativeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{} ({})", message, self.code),
            None => write!(f, "{} ({})", error_text(self.code), self.code),
        }
    }
}

impl From<NativeStatus> for StreamError {
    fn from(status: NativeStatus) -> Self {
        if status.code == NOT_INITIALIZED {
            return StreamError::NotInitialized;
        }
        let message = status
            .message
            .unwrap_or_else(|| error_text(status.code).to_string());
        StreamError::Native {
            code: status.code,
            message,
        }
    }
}

/// Maps a raw native return value to a result: zero and above is success.
pub fn check(code: i32) -> Result<i32, StreamError> {
    if code < 0 {
        Err(StreamError::native(code))
    } else {
        Ok(code)
    }
}

/// Human-readable text for the engine's well-known error codes.
pub fn error_text(code: i32) -> &'static str {
    match code {
        0 => "Success",
        NOT_INITIALIZED => "PortAudio not initialized",
        -9999 => "Unanticipated host error",
        -9998 => "Invalid number of channels",
        -9997 => "Invalid sample rate",
        -9996 => "Invalid device",
        -9995 => "Invalid flag",
        -9994 => "Sample format not supported",
        -9993 => "Illegal combination of I/O devices",
        -9992 => "Insufficient memory",
        -9991 => "Buffer too big",
        -9990 => "Buffer too small",
        -9989 => "No callback routine specified",
        BAD_STREAM_PTR => "Invalid stream pointer",
        -9987 => "Wait timed out",
        -9986 => "Internal PortAudio error",
        -9985 => "Device unavailable",
        -9984 => "Incompatible host API specific stream info",
        STREAM_IS_STOPPED => "Stream is stopped",
        STREAM_IS_NOT_STOPPED => "Stream is not stopped",
        -9981 => "Input overflowed",
        -9980 => "Output underflowed",
        -9979 => "Host API not found",
        -9978 => "Invalid host API",
        -9977 => "Can't read from a callback stream",
        -9976 => "Can't write to a callback stream",
        -9975 => "Can't read from an output only stream",
        -9974 => "Can't write to an input only stream",
        -9973 => "Incompatible stream host API",
        -9972 => "Bad buffer pointer",
        _ => "Invalid error code",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_initialized_is_distinct_from_call_failure() {
        assert_eq!(StreamError::native(NOT_INITIALIZED), StreamError::NotInitialized);
        assert!(matches!(
            StreamError::native(-9996),
            StreamError::Native { code: -9996, .. }
        ));
    }

    #[test]
    fn native_message_is_preferred_over_table() {
        let err = StreamError::from(NativeStatus::with_message(-9985, "busy"));
        assert_eq!(
            err,
            StreamError::Native {
                code: -9985,
                message: "busy".into()
            }
        );
    }

    #[test]
    fn table_text_fills_missing_message() {
        let err = StreamError::native(STREAM_IS_NOT_STOPPED);
        assert_eq!(err.to_string(), "native error -9982: Stream is not stopped");
        assert_eq!(err.native_code(), Some(STREAM_IS_NOT_STOPPED));
    }

    #[test]
    fn check_passes_non_negative_values() {
        assert_eq!(check(0), Ok(0));
        assert_eq!(check(1), Ok(1));
        assert_eq!(check(-9994).unwrap_err().native_code(), Some(-9994));
    }

    #[test]
    fn unknown_codes_get_generic_text() {
        assert_eq!(error_text(-1), "Invalid error code");
    }
}
