//! Receipts and end-of-run summaries.

use super::client::ClientSummary;
use super::printer::PrinterState;
use crate::core::{ClientId, JobId, PrintJob};
use crate::queue::{millis, QueueStatsSnapshot};
use crate::sync::PrimitiveSnapshot;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// Proof that a printer finished a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrintReceipt {
    /// The job that was printed
    pub job: JobId,
    /// Originating client
    pub client: ClientId,
    /// Originating client's name
    pub client_name: String,
    /// Pages printed
    pub pages: u32,
    /// Buffer slot the job passed through
    pub slot: Option<usize>,
    /// Printer number
    pub printer: usize,
    /// When printing finished
    pub printed_at: DateTime<Utc>,
    /// Time spent printing in milliseconds
    pub duration_ms: u64,
}

impl PrintReceipt {
    /// Receipt for `job` printed by printer `printer`
    pub fn new(job: &PrintJob, printer: usize, elapsed: Duration) -> Self {
        Self {
            job: job.id(),
            client: job.client(),
            client_name: job.client_name().to_string(),
            pages: job.pages(),
            slot: job.slot(),
            printer,
            printed_at: Utc::now(),
            duration_ms: millis(elapsed),
        }
    }
}

/// Final counters for one printer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrinterSummary {
    /// Printer number
    pub id: usize,
    /// Display name
    pub name: String,
    /// Jobs printed
    pub jobs_printed: u64,
    /// Pages printed
    pub pages_printed: u64,
    /// Average printing time per job in microseconds
    pub average_printing_time_us: f64,
    /// State when the report was taken
    pub state: PrinterState,
}

/// Everything that happened during one run of the spool
#[derive(Debug, Clone, Serialize)]
pub struct SpoolReport {
    /// When the spool started
    pub started_at: DateTime<Utc>,
    /// When the last printer stopped
    pub finished_at: DateTime<Utc>,
    /// Buffer capacity
    pub capacity: usize,
    /// Per-client results
    pub clients: Vec<ClientSummary>,
    /// Per-printer results
    pub printers: Vec<PrinterSummary>,
    /// Queue traffic
    pub queue: QueueStatsSnapshot,
    /// Primitive values after the printers stopped
    pub primitives: PrimitiveSnapshot,
    /// Receipts in the order printing finished
    pub receipts: Vec<PrintReceipt>,
}

impl SpoolReport {
    /// Jobs placed in the buffer by all clients
    pub fn jobs_submitted(&self) -> usize {
        self.clients.iter().map(|c| c.jobs_submitted).sum()
    }

    /// Jobs printed by all printers
    pub fn jobs_printed(&self) -> usize {
        self.receipts.len()
    }

    /// Pages printed by all printers
    pub fn pages_printed(&self) -> u64 {
        self.receipts.iter().map(|r| u64::from(r.pages)).sum()
    }

    /// Receipts for one client, in the order printing finished
    pub fn receipts_for(&self, client: ClientId) -> impl Iterator<Item = &PrintReceipt> {
        self.receipts.iter().filter(move |r| r.client == client)
    }

    /// Serialize the report as pretty-printed JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
