//! Print jobs and the identities attached to them

use crate::core::error::{Result, SpoolError};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Identity of the client that created a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ClientId(pub usize);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// Unique job identity: originating client plus that client's sequence number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct JobId {
    /// Client that created the job
    pub client: ClientId,
    /// Position of the job in the client's submission order, starting at 0
    pub seq: u64,
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.client, self.seq)
    }
}

/// Items the job buffer can hold
///
/// `Display` is used for the buffer-full notice.
pub trait Spoolable: Send + fmt::Display {
    /// Record the slot the item was written to
    fn assign_slot(&mut self, slot: usize);
}

/// A print request
///
/// Owned by exactly one of its client, the queue, or a printer at any time.
/// The printer drops it after printing.
#[derive(Debug)]
pub struct PrintJob {
    id: JobId,
    client_name: Arc<str>,
    pages: u32,
    slot: Option<usize>,
}

impl PrintJob {
    /// Create a job of `pages` pages for the given client
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if `pages` is zero.
    pub fn new(id: JobId, client_name: Arc<str>, pages: u32) -> Result<Self> {
        if pages == 0 {
            return Err(SpoolError::invalid_config(
                "pages",
                format!("job {} must have at least one page", id),
            ));
        }
        Ok(Self {
            id,
            client_name,
            pages,
            slot: None,
        })
    }

    /// Job identity
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Originating client
    pub fn client(&self) -> ClientId {
        self.id.client
    }

    /// Display name of the originating client
    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    /// Page count, always positive
    pub fn pages(&self) -> u32 {
        self.pages
    }

    /// Buffer slot the job occupied, once enqueued
    pub fn slot(&self) -> Option<usize> {
        self.slot
    }

    /// Simulate printing: sleep `per_page` for every page
    ///
    /// Returns the time spent.
    pub fn print(&self, per_page: Duration) -> Duration {
        let start = Instant::now();
        if !per_page.is_zero() {
            thread::sleep(per_page.saturating_mul(self.pages));
        }
        start.elapsed()
    }
}

impl fmt::Display for PrintJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} has {} pages to print", self.client_name, self.pages)
    }
}

impl Spoolable for PrintJob {
    fn assign_slot(&mut self, slot: usize) {
        self.slot = Some(slot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_id(client: usize, seq: u64) -> JobId {
        JobId {
            client: ClientId(client),
            seq,
        }
    }

    #[test]
    fn test_zero_pages_rejected() {
        let result = PrintJob::new(job_id(1, 0), Arc::from("Client 1"), 0);
        assert!(matches!(
            result,
            Err(SpoolError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_job_accessors() {
        let mut job = PrintJob::new(job_id(3, 7), Arc::from("Client 3"), 5).unwrap();
        assert_eq!(job.pages(), 5);
        assert_eq!(job.client(), ClientId(3));
        assert_eq!(job.client_name(), "Client 3");
        assert_eq!(job.slot(), None);
        assert_eq!(job.id().to_string(), "client-3#7");
        assert_eq!(job.to_string(), "Client 3 has 5 pages to print");

        job.assign_slot(2);
        assert_eq!(job.slot(), Some(2));
    }

    #[test]
    fn test_print_scales_with_pages() {
        let job = PrintJob::new(job_id(1, 0), Arc::from("Client 1"), 3).unwrap();
        let spent = job.print(Duration::from_millis(5));
        assert!(spent >= Duration::from_millis(15));

        assert!(job.print(Duration::ZERO) < Duration::from_millis(5));
    }
}
