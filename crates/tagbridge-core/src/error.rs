// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error taxonomy for tag session operations.
//!
//! Every failure inside the bridge is one of a small number of kinds, and
//! each kind knows how it surfaces at the command boundary:
//!
//! ```text
//! BridgeError
//! ├── Config         - Malformed or missing device document field (fatal to init)
//! ├── Session        - Host/server/group creation failure (fatal to one connect)
//! ├── Transient      - Session is down for a single read/write (DISCONNECTED)
//! ├── ServerReported - Remote reported a bad value for one tag (ok=false value)
//! ├── Codec          - Unsupported wire type or wrong buffer width
//! ├── Operation      - Local caller fault (unknown tag, bad parameter, ...)
//! └── UnknownCommand - Unrecognized command string
//! ```
//!
//! # Examples
//!
//! ```
//! use tagbridge_core::error::{BridgeError, TransientError};
//! use tagbridge_core::ResultCode;
//!
//! let error = BridgeError::disconnected("Disconnected");
//! assert!(error.is_transient());
//! assert_eq!(error.result_code(), ResultCode::Disconnected);
//! ```

use std::fmt;
use thiserror::Error;
use tracing::Level;

use crate::types::{ResultCode, TagId};

// =============================================================================
// BridgeError - Main Error Type
// =============================================================================

/// The main error type for the tag bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Device document is malformed or incomplete.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the offending field.
        message: String,
    },

    /// Session establishment or provisioning failed.
    #[error("{0}")]
    Session(#[from] SessionError),

    /// The session is down for this operation.
    #[error("{0}")]
    Transient(#[from] TransientError),

    /// The server reported a failure for a specific tag.
    #[error("Server reported error 0x{code:08X} for tag {tag_id}")]
    ServerReported {
        /// Tag the error belongs to.
        tag_id: TagId,
        /// Raw server error code.
        code: i32,
    },

    /// Value marshaling failed.
    #[error("{0}")]
    Codec(#[from] CodecError),

    /// Local operation fault.
    #[error("{0}")]
    Operation(#[from] OperationError),

    /// The command gateway received an unrecognized command.
    #[error("Unknown command: '{command}'")]
    UnknownCommand {
        /// The raw command string.
        command: String,
    },
}

impl BridgeError {
    // =========================================================================
    // Factory Methods
    // =========================================================================

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a transient error for an operation attempted while the session is down.
    pub fn disconnected(state: impl Into<String>) -> Self {
        Self::Transient(TransientError::Disconnected {
            state: state.into(),
        })
    }

    /// Creates a transient communication failure.
    pub fn communication(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transient(TransientError::CommunicationFailed {
            operation: operation.into(),
            message: message.into(),
        })
    }

    /// Creates a server-reported error.
    pub fn server_reported(tag_id: TagId, code: i32) -> Self {
        Self::ServerReported { tag_id, code }
    }

    /// Creates a tag-not-found error.
    pub fn tag_not_found(tag_id: TagId) -> Self {
        Self::Operation(OperationError::TagNotFound { tag_id })
    }

    /// Creates an unknown command error.
    pub fn unknown_command(command: impl Into<String>) -> Self {
        Self::UnknownCommand {
            command: command.into(),
        }
    }

    // =========================================================================
    // Error Properties
    // =========================================================================

    /// Returns `true` if the failure means the session is down.
    ///
    /// Transient failures are the only ones the gateway answers with a
    /// health check and a single retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Session(e) => e.is_retryable(),
            Self::Transient(_) => true,
            Self::Config { .. }
            | Self::ServerReported { .. }
            | Self::Codec(_)
            | Self::Operation(_)
            | Self::UnknownCommand { .. } => false,
        }
    }

    /// Returns the gateway result code this error surfaces as.
    pub fn result_code(&self) -> ResultCode {
        match self {
            Self::Transient(_) => ResultCode::Disconnected,
            Self::UnknownCommand { .. } => ResultCode::UnknownCommand,
            _ => ResultCode::Error,
        }
    }

    /// Returns the severity level of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Config { .. } => ErrorSeverity::Critical,
            Self::Session(e) => e.severity(),
            Self::Transient(_) => ErrorSeverity::Warning,
            Self::ServerReported { .. } => ErrorSeverity::Info,
            Self::Codec(e) => e.severity(),
            Self::Operation(e) => e.severity(),
            Self::UnknownCommand { .. } => ErrorSeverity::Warning,
        }
    }

    /// Returns the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Session(_) => "session",
            Self::Transient(_) => "transient",
            Self::ServerReported { .. } => "server",
            Self::Codec(_) => "codec",
            Self::Operation(_) => "operation",
            Self::UnknownCommand { .. } => "command",
        }
    }

    /// Returns a unique error code for this error.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Config { .. } => ErrorCode::new(1, 1),
            Self::Session(e) => e.error_code(),
            Self::Transient(e) => e.error_code(),
            Self::ServerReported { .. } => ErrorCode::new(4, 1),
            Self::Codec(e) => e.error_code(),
            Self::Operation(e) => e.error_code(),
            Self::UnknownCommand { .. } => ErrorCode::new(7, 1),
        }
    }

    /// Returns recovery hints for this error.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::Config { .. } => vec![
                "Check the device document against the expected schema",
                "Ensure Server, Group and Name fields are non-empty strings",
            ],
            Self::Session(e) => e.recovery_hints(),
            Self::Transient(_) => vec![
                "Issue GetStatus to force a reconnect",
                "Verify the automation server is running",
            ],
            Self::ServerReported { .. } => vec!["Inspect the tag on the server side"],
            Self::Codec(e) => e.recovery_hints(),
            Self::Operation(e) => e.recovery_hints(),
            Self::UnknownCommand { .. } => vec!["Use one of the documented command names"],
        }
    }

    /// Returns the tracing level for this error.
    pub fn tracing_level(&self) -> Level {
        self.severity().to_tracing_level()
    }

    /// Logs this error with appropriate level and context.
    pub fn log(&self, context: &str) {
        let code = self.error_code();

        match self.tracing_level() {
            Level::ERROR => tracing::error!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            Level::WARN => tracing::warn!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            _ => tracing::debug!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
        }
    }
}

// =============================================================================
// SessionError
// =============================================================================

/// Failures while establishing or provisioning a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The host could not be resolved or reached.
    #[error("Failed to open host '{host}': {message}")]
    HostUnavailable {
        /// Host name.
        host: String,
        /// Error message.
        message: String,
    },

    /// The server could not be created on the host.
    #[error("Failed to open server '{server}' on '{host}': {message}")]
    ServerUnavailable {
        /// Host name.
        host: String,
        /// Server name.
        server: String,
        /// Error message.
        message: String,
    },

    /// The server answered the health poll with a fatal state.
    #[error("Server '{server}' reported state {state}")]
    ServerUnhealthy {
        /// Server name.
        server: String,
        /// Reported state.
        state: String,
    },

    /// The first health poll after opening the session failed.
    #[error("Health poll of server '{server}' failed: {message}")]
    HealthCheckFailed {
        /// Server name.
        server: String,
        /// Error message.
        message: String,
    },

    /// Group creation failed.
    #[error("Failed to create group '{group}': {message}")]
    GroupCreation {
        /// Group name.
        group: String,
        /// Error message.
        message: String,
    },

    /// Reconnect was requested before any configuration was supplied.
    #[error("No device configuration has been applied")]
    NotConfigured,
}

impl SessionError {
    /// Creates a server unavailable error.
    pub fn server_unavailable(
        host: impl Into<String>,
        server: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ServerUnavailable {
            host: host.into(),
            server: server.into(),
            message: message.into(),
        }
    }

    /// Creates a group creation error.
    pub fn group_creation(group: impl Into<String>, message: impl Into<String>) -> Self {
        Self::GroupCreation {
            group: group.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if a later reconnect may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::NotConfigured)
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotConfigured => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::HostUnavailable { .. } => ErrorCode::new(2, 1),
            Self::ServerUnavailable { .. } => ErrorCode::new(2, 2),
            Self::ServerUnhealthy { .. } => ErrorCode::new(2, 3),
            Self::GroupCreation { .. } => ErrorCode::new(2, 4),
            Self::NotConfigured => ErrorCode::new(2, 5),
            Self::HealthCheckFailed { .. } => ErrorCode::new(2, 6),
        }
    }

    /// Returns recovery hints.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::HostUnavailable { .. } => vec![
                "Verify the Host entry resolves on this machine",
                "Check DCOM/remote access permissions on the host",
            ],
            Self::ServerUnavailable { .. } => vec![
                "Verify the Server program id is registered on the host",
                "Check that the server process can be launched",
            ],
            Self::ServerUnhealthy { .. } => vec![
                "Restart the automation server",
                "Check the server's device communication",
            ],
            Self::HealthCheckFailed { .. } => vec![
                "Check the network path to the host",
                "Retry once the server answers status requests",
            ],
            Self::GroupCreation { .. } => vec!["Check the group's update rate and deadband"],
            Self::NotConfigured => vec!["Initialize the driver with a device document first"],
        }
    }
}

// =============================================================================
// TransientError
// =============================================================================

/// The session is down for a single operation.
#[derive(Debug, Error)]
pub enum TransientError {
    /// The manager is not in the connected state.
    #[error("Session not connected (state: {state})")]
    Disconnected {
        /// The observed connection state.
        state: String,
    },

    /// A call through the underlying protocol failed at transport level.
    #[error("{operation} failed: {message}")]
    CommunicationFailed {
        /// The operation that failed.
        operation: String,
        /// Error message.
        message: String,
    },

    /// The server is reachable but not running.
    #[error("Server not running (state: {state})")]
    ServerNotRunning {
        /// Reported state.
        state: String,
    },
}

impl TransientError {
    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Disconnected { .. } => ErrorCode::new(3, 1),
            Self::CommunicationFailed { .. } => ErrorCode::new(3, 2),
            Self::ServerNotRunning { .. } => ErrorCode::new(3, 3),
        }
    }
}

// =============================================================================
// CodecError
// =============================================================================

/// Value marshaling failures.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The wire type tag is outside the supported set.
    #[error("Unsupported wire type 0x{vt:04X}")]
    UnsupportedType {
        /// Raw wire type tag.
        vt: u16,
    },

    /// The buffer does not match the target type's width.
    #[error("Buffer length {actual} does not match {data_type} width {expected}")]
    LengthMismatch {
        /// Target type name.
        data_type: &'static str,
        /// Expected width in bytes.
        expected: usize,
        /// Supplied length in bytes.
        actual: usize,
    },

    /// The buffer has the right width but cannot be represented.
    #[error("Invalid {data_type} value: {message}")]
    InvalidValue {
        /// Target type name.
        data_type: &'static str,
        /// Error message.
        message: String,
    },
}

impl CodecError {
    /// Creates a length mismatch error.
    pub fn length_mismatch(data_type: &'static str, expected: usize, actual: usize) -> Self {
        Self::LengthMismatch {
            data_type,
            expected,
            actual,
        }
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::UnsupportedType { .. } => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::UnsupportedType { .. } => ErrorCode::new(5, 1),
            Self::LengthMismatch { .. } => ErrorCode::new(5, 2),
            Self::InvalidValue { .. } => ErrorCode::new(5, 3),
        }
    }

    /// Returns recovery hints.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::UnsupportedType { .. } => vec!["Map the tag to a scalar type on the server"],
            Self::LengthMismatch { .. } => {
                vec!["Size the write buffer to the tag's native width"]
            }
            Self::InvalidValue { .. } => vec!["Check the value's encoding"],
        }
    }
}

// =============================================================================
// OperationError
// =============================================================================

/// Local faults raised by callers of the session manager or gateway.
#[derive(Debug, Error)]
pub enum OperationError {
    /// The manager has been closed.
    #[error("Session manager is stopped")]
    Stopped,

    /// The tag id is not registered.
    #[error("Tag {tag_id} is not registered")]
    TagNotFound {
        /// The tag id.
        tag_id: TagId,
    },

    /// The tag id string could not be parsed.
    #[error("Invalid tag id '{raw}'")]
    InvalidTagId {
        /// The raw id string.
        raw: String,
    },

    /// The command parameter has the wrong shape.
    #[error("Invalid parameter for {command}: expected {expected}")]
    InvalidParameter {
        /// Command name.
        command: &'static str,
        /// Expected parameter shape.
        expected: &'static str,
    },

    /// The caller's buffer cannot hold the encoded value.
    #[error("Buffer for tag {tag_id} holds {capacity} bytes, {required} required")]
    BufferTooSmall {
        /// The tag id.
        tag_id: TagId,
        /// Caller capacity.
        capacity: usize,
        /// Encoded length.
        required: usize,
    },

    /// The session handle does not name a live session.
    #[error("Invalid session handle {handle}")]
    InvalidSession {
        /// Display form of the handle.
        handle: String,
    },

    /// The server refused a write.
    #[error("Write to tag {tag_id} rejected: {message}")]
    WriteRejected {
        /// The tag id.
        tag_id: TagId,
        /// Error message.
        message: String,
    },
}

impl OperationError {
    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Stopped => ErrorSeverity::Info,
            _ => ErrorSeverity::Warning,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Stopped => ErrorCode::new(6, 1),
            Self::TagNotFound { .. } => ErrorCode::new(6, 2),
            Self::InvalidTagId { .. } => ErrorCode::new(6, 3),
            Self::InvalidParameter { .. } => ErrorCode::new(6, 4),
            Self::BufferTooSmall { .. } => ErrorCode::new(6, 5),
            Self::InvalidSession { .. } => ErrorCode::new(6, 6),
            Self::WriteRejected { .. } => ErrorCode::new(6, 7),
        }
    }

    /// Returns recovery hints.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::Stopped => vec!["Initialize a new session"],
            Self::TagNotFound { .. } => vec![
                "Check the tag id against the device document",
                "Retry after a reconnect completes",
            ],
            Self::InvalidTagId { .. } => vec!["Pass the numeric Id from the device document"],
            Self::InvalidParameter { .. } => vec!["Check the command's parameter shape"],
            Self::BufferTooSmall { .. } => vec!["Allocate at least the tag's native width"],
            Self::InvalidSession { .. } => vec!["Use the handle returned by InitDriver"],
            Self::WriteRejected { .. } => vec!["Check the tag's access rights on the server"],
        }
    }
}

// =============================================================================
// ErrorSeverity
// =============================================================================

/// Error severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    /// Informational - no action required.
    Info,
    /// Warning - action may be required.
    Warning,
    /// Error - action required, but recoverable.
    Error,
    /// Critical - immediate action required.
    Critical,
}

impl ErrorSeverity {
    /// Converts to tracing level.
    pub fn to_tracing_level(self) -> Level {
        match self {
            Self::Info => Level::INFO,
            Self::Warning => Level::WARN,
            Self::Error | Self::Critical => Level::ERROR,
        }
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// ErrorCode
// =============================================================================

/// Structured error code for categorization.
///
/// Format: `TB-XXYY` where XX is category and YY is specific error.
///
/// Categories:
/// - 1: Config
/// - 2: Session
/// - 3: Transient
/// - 4: Server reported
/// - 5: Codec
/// - 6: Operation
/// - 7: Command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode {
    /// Category (1-7).
    pub category: u8,
    /// Specific error within category.
    pub code: u8,
}

impl ErrorCode {
    /// Creates a new error code.
    pub const fn new(category: u8, code: u8) -> Self {
        Self { category, code }
    }

    /// Returns the full error code as a u16.
    pub fn as_u16(&self) -> u16 {
        ((self.category as u16) << 8) | (self.code as u16)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TB-{:02X}{:02X}", self.category, self.code)
    }
}

// =============================================================================
// Result Type
// =============================================================================

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

// =============================================================================
// Tests
// =============================================================================
