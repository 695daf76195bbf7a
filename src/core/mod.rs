//! Core types for the print spool

pub mod error;
pub mod job;

pub use error::{Result, SpoolError};
pub use job::{ClientId, JobId, PrintJob, Spoolable};
