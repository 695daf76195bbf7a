//! Convenient re-exports for common types and traits

pub use crate::core::{ClientId, JobId, PrintJob, Result, SpoolError, Spoolable};
pub use crate::queue::{BoundedJobQueue, Dequeued, Offer, Placement, QueueStats};
pub use crate::spool::{
    PageSource, PrintReceipt, PrinterState, SpoolConfig, SpoolController, SpoolReport,
};
pub use crate::sync::{CountingSemaphore, PrimitiveBackend, PrimitiveSnapshot};
