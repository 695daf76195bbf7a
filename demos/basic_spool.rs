//! Basic print spool example
//!
//! Runs a small spool, then drives the buffer by hand to show backpressure
//! and the shutdown signal.
//!
//! Run with: cargo run --example basic_spool

use print_spool::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<()> {
    println!("=== Print Spool - Basic Example ===\n");

    println!("1. Running 4 clients and 2 printers over a buffer of 3");
    let config = SpoolConfig::new(4, 2, 3)
        .with_jobs_per_client(3)
        .with_pages(PageSource::Random { max: 5 })
        .with_time_per_page(Duration::from_millis(5));
    let report = SpoolController::run(config)?;

    for receipt in &report.receipts {
        println!(
            "   Printer {} printed {} pages from buffer[{}] (from {})",
            receipt.printer,
            receipt.pages,
            receipt.slot.map_or_else(|| "?".to_string(), |s| s.to_string()),
            receipt.client_name
        );
    }
    println!(
        "   {} jobs, {} pages, buffer full {} times",
        report.jobs_printed(),
        report.pages_printed(),
        report.queue.backpressure_events
    );

    println!("\n2. Driving the buffer directly");
    let queue = BoundedJobQueue::new(2)?;
    for seq in 0..3 {
        let id = JobId {
            client: ClientId(1),
            seq,
        };
        let job = PrintJob::new(id, Arc::from("Client 1"), 2)?;
        match queue.try_enqueue(job)? {
            Offer::Placed(p) => {
                println!("   job {} -> Buffer[{}] [{},{}]", seq, p.slot, p.tail, p.head)
            }
            Offer::Rejected(job) => println!("   {}, but buffer full", job),
            Offer::Closed(job) => println!("   {} after close", job.id()),
        }
    }
    println!("   primitives: {}", queue.primitive_snapshot());

    queue.close()?;
    while let Dequeued::Job(job) = queue.dequeue()? {
        println!("   took job {} from buffer[{:?}]", job.id(), job.slot());
    }
    println!("   nothing to print; exiting.");

    println!("\nShutting down.");
    Ok(())
}
