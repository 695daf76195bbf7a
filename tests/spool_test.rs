//! End-to-end tests for the print spool

use print_spool::prelude::*;
use print_spool::spool::PrinterSummary;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn job(client: usize, seq: u64, pages: u32) -> PrintJob {
    let id = JobId {
        client: ClientId(client),
        seq,
    };
    PrintJob::new(id, Arc::from(format!("Client {}", client)), pages).expect("valid job")
}

fn wait_until(condition: impl Fn() -> bool) {
    let start = Instant::now();
    while !condition() {
        assert!(
            start.elapsed() < Duration::from_secs(5),
            "condition not reached in time"
        );
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_single_client_jobs_printed_in_order() {
    let config = SpoolConfig::new(1, 1, 3)
        .with_jobs_per_client(5)
        .with_pages(PageSource::Fixed(2));
    let report = SpoolController::run(config).expect("spool run failed");

    let seqs: Vec<u64> = report.receipts.iter().map(|r| r.job.seq).collect();
    assert_eq!(seqs, vec![0, 1, 2, 3, 4]);

    // Slots are used round-robin
    let slots: Vec<Option<usize>> = report.receipts.iter().map(|r| r.slot).collect();
    assert_eq!(slots, vec![Some(0), Some(1), Some(2), Some(0), Some(1)]);
    assert_eq!(report.pages_printed(), 10);
}

#[test]
fn test_full_buffer_blocks_producer() {
    let queue = Arc::new(BoundedJobQueue::new(1).expect("queue"));
    queue.enqueue(job(1, 0, 1)).expect("first enqueue");

    let placed = Arc::new(AtomicBool::new(false));
    let producer = {
        let queue = Arc::clone(&queue);
        let placed = Arc::clone(&placed);
        thread::spawn(move || {
            let placement = queue.enqueue(job(2, 0, 1)).expect("second enqueue");
            placed.store(true, Ordering::SeqCst);
            placement
        })
    };

    thread::sleep(Duration::from_millis(100));
    assert!(!placed.load(Ordering::SeqCst), "producer should be blocked");
    assert_eq!(queue.len().unwrap(), 1);

    let first = queue.dequeue().unwrap().into_job().expect("job");
    assert_eq!(first.client(), ClientId(1));

    let placement = producer.join().expect("producer panicked");
    assert!(placement.waited);
    assert_eq!(queue.stats().backpressure_events(), 1);

    let second = queue.dequeue().unwrap().into_job().expect("job");
    assert_eq!(second.client(), ClientId(2));
}

#[test]
fn test_empty_buffer_blocks_consumer() {
    let queue = Arc::new(BoundedJobQueue::new(2).expect("queue"));

    let taken = Arc::new(AtomicBool::new(false));
    let consumer = {
        let queue = Arc::clone(&queue);
        let taken = Arc::clone(&taken);
        thread::spawn(move || {
            let dequeued = queue.dequeue().expect("dequeue");
            taken.store(true, Ordering::SeqCst);
            dequeued
        })
    };

    thread::sleep(Duration::from_millis(100));
    assert!(!taken.load(Ordering::SeqCst), "consumer should be blocked");

    queue.enqueue(job(1, 7, 3)).unwrap();
    let dequeued = consumer.join().expect("consumer panicked");
    assert_eq!(dequeued.into_job().expect("job").id().seq, 7);
}

#[test]
fn test_every_printer_stops() {
    let config = SpoolConfig::new(2, 4, 2)
        .with_jobs_per_client(3)
        .with_pages(PageSource::Fixed(1));
    let controller = SpoolController::new(config).unwrap();
    controller.start().unwrap();
    wait_until(|| {
        controller
            .printer_states()
            .iter()
            .all(|s| *s == PrinterState::WaitingForJob)
            && controller.queue_len().map(|n| n == 0).unwrap_or(false)
    });

    let report = controller.shutdown().unwrap();
    assert_eq!(report.printers.len(), 4);
    assert!(report
        .printers
        .iter()
        .all(|p: &PrinterSummary| p.state == PrinterState::Stopped));
    assert_eq!(report.jobs_printed(), 6);
}

#[test]
fn test_stress_no_loss_no_duplicates() {
    let config = SpoolConfig::new(4, 2, 3)
        .with_jobs_per_client(25)
        .with_pages(PageSource::Random { max: 5 });
    let report = SpoolController::run(config).expect("spool run failed");

    assert_eq!(report.jobs_submitted(), 100);
    assert_eq!(report.jobs_printed(), 100);

    let unique: HashSet<JobId> = report.receipts.iter().map(|r| r.job).collect();
    assert_eq!(unique.len(), 100);
    for client in 1..=4 {
        for seq in 0..25 {
            assert!(unique.contains(&JobId {
                client: ClientId(client),
                seq
            }));
        }
    }

    // Each client's jobs leave the buffer in submission order; with two
    // printers they may finish out of order, but one printer never reorders.
    for printer in 1..=2 {
        for client in 1..=4 {
            let seqs: Vec<u64> = report
                .receipts
                .iter()
                .filter(|r| r.printer == printer && r.client == ClientId(client))
                .map(|r| r.job.seq)
                .collect();
            assert!(seqs.windows(2).all(|w| w[0] < w[1]));
        }
    }

    assert!(report.queue.high_water_mark <= 3);
    assert_eq!(report.primitives.empty_slots, Some(3));
}

#[test]
fn test_invalid_configuration() {
    for (clients, printers, capacity) in [(0, 2, 3), (4, 0, 3), (4, 2, 0)] {
        let result = SpoolController::new(SpoolConfig::new(clients, printers, capacity));
        assert!(matches!(
            result,
            Err(SpoolError::InvalidConfiguration { .. })
        ));
    }
}

#[test]
fn test_shutdown_drains_pending_jobs() {
    let queue = BoundedJobQueue::new(4).unwrap();
    for seq in 0..3 {
        queue.enqueue(job(1, seq, 1)).unwrap();
    }
    queue.close().unwrap();

    assert!(matches!(
        queue.enqueue(job(1, 3, 1)),
        Err(SpoolError::QueueClosed)
    ));
    for seq in 0..3 {
        let taken = queue.dequeue().unwrap().into_job().expect("pending job");
        assert_eq!(taken.id().seq, seq);
    }
    assert!(queue.dequeue().unwrap().is_shutdown());
    queue.relay_shutdown().unwrap();
    assert!(queue.dequeue().unwrap().is_shutdown());
}

#[cfg(target_os = "linux")]
#[test]
fn test_named_primitives() {
    let prefix = format!("/print-spool-it-{}", std::process::id());
    let config = SpoolConfig::new(3, 2, 2)
        .with_jobs_per_client(4)
        .with_pages(PageSource::Fixed(1))
        .with_backend(PrimitiveBackend::Named {
            prefix: prefix.clone(),
        });

    let report = SpoolController::run(config).expect("named spool run failed");
    assert_eq!(report.jobs_printed(), 12);
    assert_eq!(report.primitives.mutex, Some(1));

    // Released at shutdown, so a second run can create them again
    let config = SpoolConfig::new(1, 1, 1).with_backend(PrimitiveBackend::Named { prefix });
    let report = SpoolController::run(config).expect("second named run failed");
    assert_eq!(report.jobs_printed(), 1);
}
