//! Spool controller: owns the buffer, its primitives and every thread.

use super::client::{Client, ClientSummary};
use super::config::SpoolConfig;
use super::printer::{Printer, PrinterState};
use super::report::{PrintReceipt, PrinterSummary, SpoolReport};
use crate::core::{PrintJob, Result, SpoolError};
use crate::queue::BoundedJobQueue;
use crate::sync::PrimitiveSnapshot;
use chrono::{DateTime, Utc};
use crossbeam_channel::Receiver;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Threads and buffer of one run, from `start` to `shutdown`
struct Session {
    queue: Arc<BoundedJobQueue<PrintJob>>,
    printers: Vec<Printer>,
    clients: Vec<(String, JoinHandle<Result<ClientSummary>>)>,
    receipts: Receiver<PrintReceipt>,
    started_at: DateTime<Utc>,
}

/// Runs clients and printers around one shared bounded buffer.
///
/// `start` creates the buffer and primitives, then spawns printers before
/// clients so no job can be left without a printer. `shutdown` waits for the
/// clients, closes the buffer, lets the printers drain it and stop, and only
/// then releases the primitives.
///
/// # Example
///
/// ```rust
/// use print_spool::spool::{PageSource, SpoolConfig, SpoolController};
///
/// # fn main() -> print_spool::Result<()> {
/// let config = SpoolConfig::new(3, 2, 2)
///     .with_jobs_per_client(4)
///     .with_pages(PageSource::Fixed(1));
///
/// let spool = SpoolController::new(config)?;
/// spool.start()?;
/// let report = spool.shutdown()?;
///
/// assert_eq!(report.jobs_printed(), 12);
/// # Ok(())
/// # }
/// ```
pub struct SpoolController {
    config: SpoolConfig,
    session: RwLock<Option<Session>>,
    running: AtomicBool,
}

impl std::fmt::Debug for SpoolController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpoolController")
            .field("config", &self.config)
            .field("running", &self.running.load(Ordering::Relaxed))
            .finish()
    }
}

impl SpoolController {
    /// Create a controller for `config`
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if the configuration does not validate.
    pub fn new(config: SpoolConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            session: RwLock::new(None),
            running: AtomicBool::new(false),
        })
    }

    /// Create a controller with default settings and start it
    pub fn start_with(clients: usize, printers: usize, capacity: usize) -> Result<Self> {
        let controller = Self::new(SpoolConfig::new(clients, printers, capacity))?;
        controller.start()?;
        Ok(controller)
    }

    /// Start, wait for every client, shut down and report
    pub fn run(config: SpoolConfig) -> Result<SpoolReport> {
        let controller = Self::new(config)?;
        controller.start()?;
        controller.shutdown()
    }

    /// Start the spool
    ///
    /// The controller can be started again after `shutdown`; each run gets
    /// fresh primitives.
    ///
    /// # Errors
    ///
    /// - `AlreadyRunning` if called twice without `shutdown`
    /// - `ResourceCreation` if a primitive cannot be created
    /// - `SpawnError` if a thread cannot be started; threads already started
    ///   are stopped and the primitives released first
    pub fn start(&self) -> Result<()> {
        // Held across launch so shutdown never sees a running spool without
        // its session
        let mut session = self.session.write();
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SpoolError::AlreadyRunning {
                clients: self.config.clients,
                printers: self.config.printers,
            });
        }

        match self.launch() {
            Ok(launched) => {
                *session = Some(launched);
                log::info!(
                    "Spool started: {} clients, {} printers, buffer of {}",
                    self.config.clients,
                    self.config.printers,
                    self.config.capacity
                );
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::Release);
                Err(e)
            }
        }
    }

    fn launch(&self) -> Result<Session> {
        let config = &self.config;
        let started_at = Utc::now();
        let queue = Arc::new(BoundedJobQueue::with_backend(
            config.capacity,
            &config.backend,
        )?);
        log::debug!("primitives created: {}", queue.primitive_snapshot());

        let (tx, receipts) = crossbeam_channel::unbounded();
        let mut printers = Vec::with_capacity(config.printers);
        for id in 1..=config.printers {
            match Printer::spawn(
                id,
                &config.thread_name_prefix,
                Arc::clone(&queue),
                config.time_per_page,
                tx.clone(),
            ) {
                Ok(printer) => printers.push(printer),
                Err(e) => {
                    abort(&queue, printers, Vec::new());
                    return Err(e);
                }
            }
        }
        drop(tx);

        let mut clients = Vec::with_capacity(config.clients);
        for id in 1..=config.clients {
            let client = Client::new(id, config.jobs_per_client, config.pages)
                .with_enqueue_timeout(config.enqueue_timeout);
            let thread_name = format!("{}-client-{}", config.thread_name_prefix, id);
            let client_queue = Arc::clone(&queue);

            let spawned = thread::Builder::new()
                .name(thread_name.clone())
                .spawn(move || client.run(&client_queue));
            match spawned {
                Ok(handle) => clients.push((thread_name, handle)),
                Err(e) => {
                    abort(&queue, printers, clients);
                    return Err(SpoolError::spawn_with_source(
                        thread_name,
                        "cannot start client",
                        e,
                    ));
                }
            }
        }

        Ok(Session {
            queue,
            printers,
            clients,
            receipts,
            started_at,
        })
    }

    /// Wait for every client, then stop every printer
    ///
    /// Jobs already in the buffer are printed before the printers stop. The
    /// primitives are released once the last printer has joined.
    ///
    /// # Errors
    ///
    /// Returns `NotRunning` if the spool was not started. Otherwise teardown
    /// always completes and the first client, queue or printer error is
    /// returned.
    pub fn shutdown(&self) -> Result<SpoolReport> {
        let session = {
            let mut current = self.session.write();
            if !self.running.load(Ordering::Acquire) {
                return Err(SpoolError::NotRunning);
            }
            // None while another shutdown is tearing the session down
            current.take().ok_or(SpoolError::NotRunning)?
        };
        let Session {
            queue,
            printers,
            clients,
            receipts,
            started_at,
        } = session;

        let mut first_error: Option<SpoolError> = None;
        let mut keep = |result: Result<()>| {
            if let Err(e) = result {
                log::error!("shutdown: {}", e);
                first_error.get_or_insert(e);
            }
        };

        let mut client_summaries = Vec::with_capacity(clients.len());
        for (thread_name, handle) in clients {
            match handle.join() {
                Ok(Ok(summary)) => client_summaries.push(summary),
                Ok(Err(e)) => keep(Err(e)),
                Err(_) => keep(Err(SpoolError::join(thread_name, "client panicked"))),
            }
        }
        log::debug!("all clients finished; closing the buffer");

        let closed = queue.close();
        let close_failed = closed.is_err();
        keep(closed);

        let mut printer_summaries = Vec::with_capacity(printers.len());
        for printer in printers {
            let stats = printer.stats();
            let id = printer.id();
            let name = printer.name().to_string();
            if close_failed {
                // Nobody will wake it; Drop gives up after its timeout
                drop(printer);
            } else {
                keep(printer.join());
            }
            printer_summaries.push(PrinterSummary {
                id,
                name,
                jobs_printed: stats.get_jobs_printed(),
                pages_printed: stats.get_pages_printed(),
                average_printing_time_us: stats.get_average_printing_time_us(),
                state: stats.state(),
            });
        }

        let report = SpoolReport {
            started_at,
            finished_at: Utc::now(),
            capacity: queue.capacity(),
            clients: client_summaries,
            printers: printer_summaries,
            queue: queue.stats().snapshot(),
            primitives: queue.primitive_snapshot(),
            receipts: receipts.try_iter().collect(),
        };
        drop(queue);
        self.running.store(false, Ordering::Release);

        log::info!("Spool stopped after {} jobs", report.jobs_printed());
        match first_error {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    /// Configuration this controller runs with
    pub fn config(&self) -> &SpoolConfig {
        &self.config
    }

    /// Check if the spool is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Get the number of printer threads
    pub fn num_printers(&self) -> usize {
        self.config.printers
    }

    /// Get the number of client threads
    pub fn num_clients(&self) -> usize {
        self.config.clients
    }

    /// Jobs currently waiting in the buffer
    pub fn queue_len(&self) -> Result<usize> {
        match self.session.read().as_ref() {
            Some(session) => session.queue.len(),
            None => Err(SpoolError::NotRunning),
        }
    }

    /// Current primitive values, if running
    pub fn primitive_snapshot(&self) -> Option<PrimitiveSnapshot> {
        self.session
            .read()
            .as_ref()
            .map(|session| session.queue.primitive_snapshot())
    }

    /// Current state of every printer
    pub fn printer_states(&self) -> Vec<PrinterState> {
        self.session
            .read()
            .as_ref()
            .map(|session| session.printers.iter().map(Printer::state).collect())
            .unwrap_or_default()
    }
}

/// Stops whatever `launch` started before it failed.
fn abort(
    queue: &BoundedJobQueue<PrintJob>,
    printers: Vec<Printer>,
    clients: Vec<(String, JoinHandle<Result<ClientSummary>>)>,
) {
    for (thread_name, handle) in clients {
        if handle.join().is_err() {
            log::error!("{} panicked during abort", thread_name);
        }
    }
    if let Err(e) = queue.close() {
        log::error!("cannot close the buffer during abort: {}", e);
    }
    for printer in printers {
        if let Err(e) = printer.join() {
            log::error!("printer failed during abort: {}", e);
        }
    }
}

impl Drop for SpoolController {
    fn drop(&mut self) {
        if self.running.load(Ordering::Acquire) {
            if let Err(e) = self.shutdown() {
                log::error!(
                    "Failed to shut down spool '{}' during drop: {}",
                    self.config.thread_name_prefix,
                    e
                );
            }
        }
    }
}
