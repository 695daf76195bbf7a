//! Error types for the print spool

/// Result type for spool operations
pub type Result<T> = std::result::Result<T, SpoolError>;

/// Errors that can occur in the print spool
///
/// A full buffer is not an error: producers log the backpressure notice and
/// block, and the event is counted in [`QueueStats`](crate::queue::QueueStats).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SpoolError {
    /// Capacity or thread counts are out of range
    #[error("Invalid configuration for '{parameter}': {message}")]
    InvalidConfiguration {
        /// Configuration parameter name
        parameter: String,
        /// Error message
        message: String,
    },

    /// A synchronization primitive could not be created
    #[error("Failed to create synchronization primitive '{resource}': {source}")]
    ResourceCreation {
        /// Name of the primitive
        resource: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// Waiting on or posting to a primitive failed
    #[error("Synchronization primitive '{primitive}' failed to {operation}: {source}")]
    Synchronization {
        /// Name of the primitive
        primitive: String,
        /// Operation that failed (wait, post, ...)
        operation: &'static str,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// Buffer state disagrees with the slot counters
    #[error("Internal consistency violation: {message}")]
    InternalConsistency {
        /// Description of the mismatch
        message: String,
    },

    /// A bounded wait on a primitive expired
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        /// Operation that timed out
        operation: &'static str,
        /// Timeout duration in milliseconds
        timeout_ms: u64,
    },

    /// The queue no longer accepts jobs
    #[error("Job queue is closed")]
    QueueClosed,

    /// Spool is already running
    #[error("Spool is already running with {clients} clients and {printers} printers")]
    AlreadyRunning {
        /// Number of client threads
        clients: usize,
        /// Number of printer threads
        printers: usize,
    },

    /// Spool is not running
    #[error("Spool is not running")]
    NotRunning,

    /// Failed to spawn a client or printer thread
    #[error("Failed to spawn thread '{thread}': {message}")]
    SpawnError {
        /// Name of the thread that failed to spawn
        thread: String,
        /// Error message
        message: String,
        /// Source IO error
        #[source]
        source: Option<std::io::Error>,
    },

    /// Failed to join a client or printer thread
    #[error("Failed to join thread '{thread}': {message}")]
    JoinError {
        /// Name of the thread
        thread: String,
        /// Error message
        message: String,
    },
}

impl SpoolError {
    /// Create an invalid configuration error
    pub fn invalid_config(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        SpoolError::InvalidConfiguration {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a resource creation error
    pub fn resource_creation(resource: impl Into<String>, source: std::io::Error) -> Self {
        SpoolError::ResourceCreation {
            resource: resource.into(),
            source,
        }
    }

    /// Create a synchronization error
    pub fn synchronization(
        primitive: impl Into<String>,
        operation: &'static str,
        source: std::io::Error,
    ) -> Self {
        SpoolError::Synchronization {
            primitive: primitive.into(),
            operation,
            source,
        }
    }

    /// Create an internal consistency error
    pub fn consistency(message: impl Into<String>) -> Self {
        SpoolError::InternalConsistency {
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: &'static str, timeout_ms: u64) -> Self {
        SpoolError::Timeout {
            operation,
            timeout_ms,
        }
    }

    /// Create a spawn error with source
    pub fn spawn_with_source(
        thread: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        SpoolError::SpawnError {
            thread: thread.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a join error
    pub fn join(thread: impl Into<String>, message: impl Into<String>) -> Self {
        SpoolError::JoinError {
            thread: thread.into(),
            message: message.into(),
        }
    }

    /// Whether the error indicates a broken synchronization invariant
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SpoolError::InternalConsistency { .. }
                | SpoolError::Synchronization { .. }
                | SpoolError::ResourceCreation { .. }
        )
    }
}
