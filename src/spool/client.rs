//! Client threads: build print jobs and offer them to the buffer.

use super::config::PageSource;
use crate::core::{ClientId, JobId, PrintJob, Result, SpoolError};
use crate::queue::{millis, BoundedJobQueue, Offer, Placement};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "tracing")]
use tracing::{span, Level};

/// What a client accomplished
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientSummary {
    /// Client identity
    pub client: ClientId,
    /// Display name
    pub name: String,
    /// Jobs placed in the buffer
    pub jobs_submitted: usize,
    /// Total pages across those jobs
    pub pages_submitted: u64,
    /// Times the client found the buffer full
    pub times_blocked: usize,
}

/// A producer of print jobs
#[derive(Debug, Clone)]
pub struct Client {
    id: ClientId,
    name: Arc<str>,
    jobs: usize,
    pages: PageSource,
    enqueue_timeout: Option<Duration>,
}

impl Client {
    /// Create a client that submits `jobs` jobs
    pub fn new(id: usize, jobs: usize, pages: PageSource) -> Self {
        Self {
            id: ClientId(id),
            name: Arc::from(format!("Client {}", id)),
            jobs,
            pages,
            enqueue_timeout: None,
        }
    }

    /// Give up with `Timeout` if a free slot takes longer than `timeout`
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_enqueue_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.enqueue_timeout = timeout;
        self
    }

    /// Client identity
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Submit every job, blocking while the buffer is full
    ///
    /// # Errors
    ///
    /// Stops at the first job that could not be placed: `Timeout` when a
    /// bounded wait expired, `QueueClosed`, or a fatal queue error.
    pub fn run(&self, queue: &BoundedJobQueue<PrintJob>) -> Result<ClientSummary> {
        #[cfg(feature = "tracing")]
        let client_span = span!(Level::DEBUG, "client", id = self.id.0);
        #[cfg(feature = "tracing")]
        let _guard = client_span.enter();

        let mut rng = fastrand::Rng::new();
        let mut summary = ClientSummary {
            client: self.id,
            name: self.name.to_string(),
            jobs_submitted: 0,
            pages_submitted: 0,
            times_blocked: 0,
        };

        for seq in 0..self.jobs {
            let id = JobId {
                client: self.id,
                seq: seq as u64,
            };
            let job = PrintJob::new(id, Arc::clone(&self.name), self.pages.next_pages(&mut rng))?;
            let pages = job.pages();

            let placement = self.submit(queue, job).map_err(|e| {
                log::error!(
                    "{} stopped after {} of {} jobs: {}",
                    self.name,
                    summary.jobs_submitted,
                    self.jobs,
                    e
                );
                e
            })?;

            log::info!(
                "{} has {} pages to print, puts request in Buffer[{}] [{},{}]",
                self.name,
                pages,
                placement.slot,
                placement.tail,
                placement.head
            );
            summary.jobs_submitted += 1;
            summary.pages_submitted += u64::from(pages);
            if placement.waited {
                summary.times_blocked += 1;
            }
        }

        log::debug!("{} finished submitting {} jobs", self.name, summary.jobs_submitted);
        Ok(summary)
    }

    fn submit(&self, queue: &BoundedJobQueue<PrintJob>, job: PrintJob) -> Result<Placement> {
        let Some(timeout) = self.enqueue_timeout else {
            return queue.enqueue(job);
        };
        match queue.enqueue_timeout(job, timeout)? {
            Offer::Placed(placement) => Ok(placement),
            Offer::Rejected(_) => Err(SpoolError::timeout("enqueue", millis(timeout))),
            Offer::Closed(_) => Err(SpoolError::QueueClosed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::Dequeued;

    #[test]
    fn test_client_submits_in_order() {
        let queue = BoundedJobQueue::new(5).unwrap();
        let client = Client::new(2, 5, PageSource::Fixed(3));

        let summary = client.run(&queue).unwrap();
        assert_eq!(summary.jobs_submitted, 5);
        assert_eq!(summary.pages_submitted, 15);
        assert_eq!(summary.times_blocked, 0);
        assert_eq!(summary.name, "Client 2");

        for expected in 0..5 {
            match queue.dequeue().unwrap() {
                Dequeued::Job(job) => {
                    assert_eq!(job.id().seq, expected);
                    assert_eq!(job.client(), ClientId(2));
                    assert_eq!(job.pages(), 3);
                }
                Dequeued::Shutdown => panic!("unexpected shutdown"),
            }
        }
    }

    #[test]
    fn test_client_times_out_on_full_buffer() {
        let queue = BoundedJobQueue::new(1).unwrap();
        let client = Client::new(1, 2, PageSource::Fixed(1))
            .with_enqueue_timeout(Some(Duration::from_millis(10)));

        match client.run(&queue) {
            Err(SpoolError::Timeout { operation, .. }) => assert_eq!(operation, "enqueue"),
            other => panic!("expected Timeout, got {:?}", other),
        }
        // The first job is still queued
        assert_eq!(queue.len().unwrap(), 1);
    }

    #[test]
    fn test_client_rejected_after_close() {
        let queue = BoundedJobQueue::new(2).unwrap();
        queue.close().unwrap();

        let client = Client::new(1, 1, PageSource::Fixed(1));
        assert!(matches!(client.run(&queue), Err(SpoolError::QueueClosed)));

        let client = Client::new(2, 1, PageSource::Fixed(1))
            .with_enqueue_timeout(Some(Duration::from_millis(10)));
        assert!(matches!(client.run(&queue), Err(SpoolError::QueueClosed)));
    }

    #[test]
    fn test_random_pages_in_range() {
        let queue = BoundedJobQueue::new(20).unwrap();
        let client = Client::new(1, 20, PageSource::Random { max: 10 });
        client.run(&queue).unwrap();

        while let Some(Dequeued::Job(job)) = queue.try_dequeue().unwrap() {
            assert!((1..=10).contains(&job.pages()));
        }
    }
}
