//! Clients, printers and the controller that runs them.
//!
//! A [`SpoolController`] creates one [`BoundedJobQueue`](crate::queue::BoundedJobQueue),
//! starts the [`Printer`] threads, then the [`Client`] threads. When every
//! client has submitted its jobs the controller closes the buffer, the
//! printers drain it and stop one after another, and the run is summarized in
//! a [`SpoolReport`].

mod client;
mod config;
mod controller;
mod printer;
mod report;

pub use client::{Client, ClientSummary};
pub use config::{PageSource, SpoolConfig};
pub use controller::SpoolController;
pub use printer::{Printer, PrinterState, PrinterStats};
pub use report::{PrintReceipt, PrinterSummary, SpoolReport};
