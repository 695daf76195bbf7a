//! Printer threads: take jobs from the buffer and print them.

use super::report::PrintReceipt;
use crate::core::{PrintJob, Result, SpoolError};
use crate::queue::{BoundedJobQueue, Dequeued};
use crossbeam_channel::Sender;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[cfg(feature = "tracing")]
use tracing::{debug, span, Level};

/// Where a printer is in its loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PrinterState {
    /// Parked on the buffer until a job or the shutdown signal arrives
    WaitingForJob,
    /// Printing a job
    Executing,
    /// Terminal
    Stopped,
}

impl PrinterState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => PrinterState::WaitingForJob,
            1 => PrinterState::Executing,
            _ => PrinterState::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            PrinterState::WaitingForJob => 0,
            PrinterState::Executing => 1,
            PrinterState::Stopped => 2,
        }
    }
}

/// Statistics for a printer thread
#[derive(Debug)]
pub struct PrinterStats {
    state: AtomicU8,
    /// Total number of jobs printed
    pub jobs_printed: AtomicU64,
    /// Total number of pages printed
    pub pages_printed: AtomicU64,
    /// Total time spent printing (microseconds)
    pub printing_time_us: AtomicU64,
}

impl Default for PrinterStats {
    fn default() -> Self {
        Self {
            state: AtomicU8::new(PrinterState::WaitingForJob.as_u8()),
            jobs_printed: AtomicU64::new(0),
            pages_printed: AtomicU64::new(0),
            printing_time_us: AtomicU64::new(0),
        }
    }
}

impl PrinterStats {
    /// Create new printer statistics
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of the printer
    pub fn state(&self) -> PrinterState {
        PrinterState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: PrinterState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    /// Record one printed job
    pub fn record_job(&self, pages: u32, elapsed: Duration) {
        self.jobs_printed.fetch_add(1, Ordering::Relaxed);
        self.pages_printed
            .fetch_add(u64::from(pages), Ordering::Relaxed);
        self.printing_time_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    /// Get total jobs printed
    pub fn get_jobs_printed(&self) -> u64 {
        self.jobs_printed.load(Ordering::Relaxed)
    }

    /// Get total pages printed
    pub fn get_pages_printed(&self) -> u64 {
        self.pages_printed.load(Ordering::Relaxed)
    }

    /// Get average printing time per job in microseconds
    pub fn get_average_printing_time_us(&self) -> f64 {
        let total = self.printing_time_us.load(Ordering::Relaxed);
        let count = self.jobs_printed.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }
}

/// Everything a printer thread needs
struct PrinterContext {
    id: usize,
    name: String,
    queue: Arc<BoundedJobQueue<PrintJob>>,
    time_per_page: Duration,
    receipts: Sender<PrintReceipt>,
    stats: Arc<PrinterStats>,
}

/// A consumer thread that prints jobs from the buffer
#[derive(Debug)]
pub struct Printer {
    id: usize,
    name: String,
    thread: Option<thread::JoinHandle<Result<()>>>,
    stats: Arc<PrinterStats>,
}

impl Printer {
    /// Create and start a printer
    ///
    /// # Arguments
    ///
    /// * `id` - Printer number, used in logs and receipts
    /// * `thread_name_prefix` - Prefix of the OS thread name
    /// * `queue` - Buffer to take jobs from
    /// * `time_per_page` - Simulated printing time per page
    /// * `receipts` - Where a receipt is sent for every printed job
    ///
    /// # Shutdown Behavior
    ///
    /// The printer stops when the queue is closed and drained, passing the
    /// shutdown signal on to the next waiting printer.
    pub fn spawn(
        id: usize,
        thread_name_prefix: &str,
        queue: Arc<BoundedJobQueue<PrintJob>>,
        time_per_page: Duration,
        receipts: Sender<PrintReceipt>,
    ) -> Result<Self> {
        let stats = Arc::new(PrinterStats::new());
        let name = format!("Printer {}", id);
        let thread_name = format!("{}-printer-{}", thread_name_prefix, id);
        let context = PrinterContext {
            id,
            name: name.clone(),
            queue,
            time_per_page,
            receipts,
            stats: Arc::clone(&stats),
        };

        let thread = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || context.run())
            .map_err(|e| SpoolError::spawn_with_source(thread_name, "cannot start printer", e))?;

        log::debug!("{}: started, {:?}/page", name, time_per_page);
        Ok(Self {
            id,
            name,
            thread: Some(thread),
            stats,
        })
    }

    /// Get printer number
    pub fn id(&self) -> usize {
        self.id
    }

    /// Get printer name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get printer statistics
    pub fn stats(&self) -> Arc<PrinterStats> {
        Arc::clone(&self.stats)
    }

    /// Current state of the printer
    pub fn state(&self) -> PrinterState {
        self.stats.state()
    }

    /// Join the printer thread
    ///
    /// Blocks until the printer has stopped, so the queue must be closed first.
    pub fn join(mut self) -> Result<()> {
        match self.thread.take() {
            Some(thread) => thread
                .join()
                .map_err(|_| SpoolError::join(&self.name, "printer panicked"))?,
            None => Ok(()),
        }
    }
}

impl PrinterContext {
    /// Main printer loop
    fn run(self) -> Result<()> {
        #[cfg(feature = "tracing")]
        let printer_span = span!(Level::DEBUG, "printer", id = self.id);
        #[cfg(feature = "tracing")]
        let _guard = printer_span.enter();

        let result = self.print_until_shutdown();
        self.stats.set_state(PrinterState::Stopped);

        #[cfg(feature = "tracing")]
        debug!(
            jobs_printed = self.stats.get_jobs_printed(),
            pages_printed = self.stats.get_pages_printed(),
            "printer stopped"
        );

        if let Err(e) = &result {
            log::error!("{}: stopped on error: {}", self.name, e);
            // Keep the remaining printers from waiting forever
            if let Err(relay) = self.queue.relay_shutdown() {
                log::error!("{}: could not relay shutdown: {}", self.name, relay);
            }
        }
        result
    }

    fn print_until_shutdown(&self) -> Result<()> {
        loop {
            self.stats.set_state(PrinterState::WaitingForJob);
            log::debug!("{} waiting.", self.name);

            let job = match self.queue.dequeue()? {
                Dequeued::Job(job) => job,
                Dequeued::Shutdown => {
                    log::info!("{}: nothing to print; exiting.", self.name);
                    return self.queue.relay_shutdown();
                }
            };

            self.stats.set_state(PrinterState::Executing);
            self.print(job);
        }
    }

    /// Prints the job, then drops it.
    fn print(&self, job: PrintJob) {
        log::info!(
            "{} starts printing {} pages from buffer[{}] (from {})",
            self.name,
            job.pages(),
            job.slot().map_or_else(|| "?".to_string(), |s| s.to_string()),
            job.client_name()
        );

        let elapsed = job.print(self.time_per_page);
        self.stats.record_job(job.pages(), elapsed);

        if self
            .receipts
            .send(PrintReceipt::new(&job, self.id, elapsed))
            .is_err()
        {
            log::debug!("{}: receipt for {} dropped, nobody listening", self.name, job.id());
        }
    }
}

impl Drop for Printer {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            // Use a timeout to prevent Drop from hanging on a printer that
            // never got the shutdown signal
            const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

            let start = Instant::now();
            loop {
                if thread.is_finished() {
                    if thread.join().is_err() {
                        log::error!("{} panicked during shutdown", self.name);
                    }
                    break;
                }

                if start.elapsed() >= JOIN_TIMEOUT {
                    log::warn!(
                        "{} did not stop within {}s during drop; thread may be leaked",
                        self.name,
                        JOIN_TIMEOUT.as_secs()
                    );
                    break;
                }

                // Small sleep to avoid busy-waiting
                thread::sleep(Duration::from_millis(10));
            }
        }
    }
}
