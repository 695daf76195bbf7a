//! Configuration for the spool controller.

use crate::core::{Result, SpoolError};
use crate::sync::PrimitiveBackend;
use serde::Serialize;
use std::time::Duration;

/// How clients choose page counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PageSource {
    /// Uniformly random in `1..=max`
    Random {
        /// Largest page count
        max: u32,
    },
    /// Every job has the same page count
    Fixed(u32),
}

impl Default for PageSource {
    fn default() -> Self {
        PageSource::Random { max: 10 }
    }
}

impl PageSource {
    /// Draws the page count for the next job
    pub fn next_pages(&self, rng: &mut fastrand::Rng) -> u32 {
        match *self {
            PageSource::Random { max } => rng.u32(1..=max.max(1)),
            PageSource::Fixed(pages) => pages,
        }
    }

    fn validate(&self) -> Result<()> {
        let pages = match *self {
            PageSource::Random { max } => max,
            PageSource::Fixed(pages) => pages,
        };
        if pages == 0 {
            return Err(SpoolError::invalid_config(
                "pages",
                "jobs must have at least one page",
            ));
        }
        Ok(())
    }
}

/// Configuration for a [`SpoolController`](super::SpoolController)
///
/// # Example
///
/// ```rust
/// use print_spool::spool::{PageSource, SpoolConfig};
/// use std::time::Duration;
///
/// let config = SpoolConfig::new(4, 2, 3)
///     .with_jobs_per_client(10)
///     .with_pages(PageSource::Fixed(2))
///     .with_time_per_page(Duration::from_millis(5));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct SpoolConfig {
    /// Number of client (producer) threads
    pub clients: usize,
    /// Number of printer (consumer) threads
    pub printers: usize,
    /// Buffer capacity in jobs
    pub capacity: usize,
    /// Jobs each client submits before finishing
    pub jobs_per_client: usize,
    /// Page counts of generated jobs
    pub pages: PageSource,
    /// Simulated printing time per page
    pub time_per_page: Duration,
    /// Thread name prefix
    pub thread_name_prefix: String,
    /// Where the synchronization primitives live
    pub backend: PrimitiveBackend,
    /// Longest a client waits for a free slot (`None` = forever)
    pub enqueue_timeout: Option<Duration>,
}

impl Default for SpoolConfig {
    fn default() -> Self {
        Self {
            clients: 4,
            printers: 2,
            capacity: 3,
            jobs_per_client: 1,
            pages: PageSource::default(),
            time_per_page: Duration::ZERO,
            thread_name_prefix: "spool".to_string(),
            backend: PrimitiveBackend::InProcess,
            enqueue_timeout: None,
        }
    }
}

impl SpoolConfig {
    /// Create a configuration with the given thread counts and capacity
    #[must_use]
    pub fn new(clients: usize, printers: usize, capacity: usize) -> Self {
        Self {
            clients,
            printers,
            capacity,
            ..Default::default()
        }
    }

    /// Set the number of jobs each client submits
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_jobs_per_client(mut self, jobs: usize) -> Self {
        self.jobs_per_client = jobs;
        self
    }

    /// Set how page counts are chosen
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_pages(mut self, pages: PageSource) -> Self {
        self.pages = pages;
        self
    }

    /// Set the simulated printing time per page
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_time_per_page(mut self, time_per_page: Duration) -> Self {
        self.time_per_page = time_per_page;
        self
    }

    /// Set thread name prefix
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Set where the synchronization primitives live
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_backend(mut self, backend: PrimitiveBackend) -> Self {
        self.backend = backend;
        self
    }

    /// Bound how long clients wait for a free slot.
    ///
    /// A client whose wait expires fails with `Timeout` instead of blocking.
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_enqueue_timeout(mut self, timeout: Duration) -> Self {
        self.enqueue_timeout = Some(timeout);
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let counts = [
            ("clients", self.clients),
            ("printers", self.printers),
            ("capacity", self.capacity),
        ];
        for (parameter, value) in counts {
            if value == 0 {
                return Err(SpoolError::invalid_config(
                    parameter,
                    "must be at least 1",
                ));
            }
        }
        if let PrimitiveBackend::Named { prefix } = &self.backend {
            if !prefix.starts_with('/') || prefix[1..].contains('/') {
                return Err(SpoolError::invalid_config(
                    "backend",
                    format!("named prefix '{}' must be '/' followed by a name", prefix),
                ));
            }
        }
        self.pages.validate()
    }
}
