//! The bounded job buffer shared by clients and printers.
//!
//! [`BoundedJobQueue`] is a fixed-capacity circular buffer gated by the three
//! primitives in [`crate::sync`]. Producers block on `empty_slots` while the
//! buffer is full; consumers block on `full_slots` while it is empty. The ring
//! indices are only touched while holding the exclusion lock, and the lock is
//! never held across a blocking wait.
//!
//! # Shutdown
//!
//! [`BoundedJobQueue::close`] marks the queue closed and posts a single unit
//! of `full_slots`. A consumer that wakes on that unit and finds nothing to
//! take receives [`Dequeued::Shutdown`] and must call
//! [`BoundedJobQueue::relay_shutdown`] so the next parked consumer wakes too.
//! Jobs already queued are still delivered first.
//!
//! # Example
//!
//! ```rust
//! use print_spool::core::{ClientId, JobId, PrintJob};
//! use print_spool::queue::{BoundedJobQueue, Dequeued};
//! use std::sync::Arc;
//!
//! # fn main() -> print_spool::Result<()> {
//! let queue = BoundedJobQueue::new(3)?;
//! let id = JobId { client: ClientId(1), seq: 0 };
//! let placement = queue.enqueue(PrintJob::new(id, Arc::from("Client 1"), 4)?)?;
//! assert_eq!(placement.slot, 0);
//!
//! match queue.dequeue()? {
//!     Dequeued::Job(job) => assert_eq!(job.pages(), 4),
//!     Dequeued::Shutdown => unreachable!(),
//! }
//! # Ok(())
//! # }
//! ```

mod bounded;
mod stats;

pub(crate) use bounded::millis;
pub use bounded::BoundedJobQueue;
pub use stats::{QueueStats, QueueStatsSnapshot};

/// Result of taking from the queue
#[derive(Debug)]
pub enum Dequeued<J> {
    /// The oldest queued job
    Job(J),
    /// The queue is closed and drained; stop consuming
    Shutdown,
}

impl<J> Dequeued<J> {
    /// The job, if one was returned
    pub fn into_job(self) -> Option<J> {
        match self {
            Dequeued::Job(job) => Some(job),
            Dequeued::Shutdown => None,
        }
    }

    /// Whether this is the shutdown signal
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Dequeued::Shutdown)
    }
}

/// Where a job landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Slot the job was written to
    pub slot: usize,
    /// Removal index after the insertion
    pub tail: usize,
    /// Insertion index after the insertion
    pub head: usize,
    /// Jobs queued after the insertion
    pub queued: usize,
    /// Whether the producer had to wait for a free slot
    pub waited: bool,
}

/// Result of a non-blocking or bounded enqueue
#[derive(Debug)]
pub enum Offer<J> {
    /// The job was placed
    Placed(Placement),
    /// No slot was free; the job is handed back
    Rejected(J),
    /// The queue was closed; the job is handed back
    Closed(J),
}

impl<J> Offer<J> {
    /// The placement, if the job was accepted
    pub fn placement(&self) -> Option<Placement> {
        match self {
            Offer::Placed(placement) => Some(*placement),
            Offer::Rejected(_) | Offer::Closed(_) => None,
        }
    }
}
