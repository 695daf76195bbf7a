//! # Print Spool
//!
//! A print spool simulation built around a bounded circular job buffer shared
//! by producer (client) and consumer (printer) threads.
//!
//! ## Features
//!
//! - **Bounded Buffer**: Fixed-capacity FIFO ring gated by an exclusion lock and two counting semaphores
//! - **Backpressure**: Clients block while the buffer is full, with non-blocking and timed variants
//! - **Named Primitives**: Optional POSIX named semaphores (Linux), with stale resources cleared at startup
//! - **Relay Shutdown**: One close signal stops every printer once the buffer is drained
//! - **Reports**: Per-printer statistics and a serializable run report with print receipts
//!
//! ## Quick Start
//!
//! ```rust
//! use print_spool::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let config = SpoolConfig::new(4, 2, 3).with_jobs_per_client(5);
//!
//! let report = SpoolController::run(config)?;
//! assert_eq!(report.jobs_printed(), 20);
//! # Ok(())
//! # }
//! ```
//!
//! ## Using the Buffer Directly
//!
//! ```rust
//! use print_spool::prelude::*;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<()> {
//! let queue = BoundedJobQueue::new(2)?;
//! let job = PrintJob::new(JobId { client: ClientId(1), seq: 0 }, Arc::from("Client 1"), 3)?;
//! queue.enqueue(job)?;
//! queue.close()?;
//!
//! // Queued jobs are still delivered after close
//! assert!(matches!(queue.dequeue()?, Dequeued::Job(_)));
//! assert!(queue.dequeue()?.is_shutdown());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod core;
pub mod prelude;
pub mod queue;
pub mod spool;
pub mod sync;

pub use core::{Result, SpoolError};
pub use spool::{SpoolConfig, SpoolController, SpoolReport};
