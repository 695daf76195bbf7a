//! Bounded circular job buffer.

use super::{Dequeued, Offer, Placement, QueueStats};
use crate::core::{Result, SpoolError, Spoolable};
use crate::sync::{
    CountingSemaphore, PrimitiveBackend, PrimitiveSnapshot, SemaphoreMutex, SyncPrimitives,
};
use std::time::Duration;

/// Ring indices and slots; only touched under the exclusion lock.
#[derive(Debug)]
struct Ring<J> {
    slots: Vec<Option<J>>,
    /// Next insertion index
    head: usize,
    /// Next removal index
    tail: usize,
    /// Resolves `head == tail`: true means full, false means empty
    occupied: bool,
    closed: bool,
}

impl<J> Ring<J> {
    fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            head: 0,
            tail: 0,
            occupied: false,
            closed: false,
        }
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn len(&self) -> usize {
        let capacity = self.capacity();
        match (self.head == self.tail, self.occupied) {
            (true, true) => capacity,
            (true, false) => 0,
            (false, _) => (self.head + capacity - self.tail) % capacity,
        }
    }

    fn is_full(&self) -> bool {
        self.occupied && self.head == self.tail
    }

    /// Caller has checked `!is_full()`.
    fn push(&mut self, job: J) {
        self.slots[self.head] = Some(job);
        self.head = (self.head + 1) % self.capacity();
        self.occupied = true;
    }

    fn pop(&mut self) -> Result<Option<J>> {
        if !self.occupied {
            return Ok(None);
        }
        let job = self.slots[self.tail].take().ok_or_else(|| {
            SpoolError::consistency(format!(
                "slot {} is empty but the buffer holds {} jobs",
                self.tail,
                self.len()
            ))
        })?;
        self.tail = (self.tail + 1) % self.capacity();
        if self.tail == self.head {
            self.occupied = false;
        }
        Ok(Some(job))
    }
}

/// A fixed-capacity FIFO buffer of jobs shared by producers and consumers.
///
/// `enqueue` blocks while the buffer is full and `dequeue` blocks while it is
/// empty. Jobs come out in the order they were placed.
///
/// # Example
///
/// ```rust
/// use print_spool::core::{ClientId, JobId, PrintJob};
/// use print_spool::queue::{BoundedJobQueue, Offer};
/// use std::sync::Arc;
///
/// # fn main() -> print_spool::Result<()> {
/// let queue = BoundedJobQueue::new(1)?;
/// let job = |seq| PrintJob::new(JobId { client: ClientId(1), seq }, Arc::from("Client 1"), 2);
///
/// queue.enqueue(job(0)?)?;
///
/// // The buffer is full - try_enqueue hands the job back
/// match queue.try_enqueue(job(1)?)? {
///     Offer::Rejected(returned) => assert_eq!(returned.id().seq, 1),
///     _ => panic!("expected the buffer to be full"),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct BoundedJobQueue<J> {
    ring: SemaphoreMutex<Ring<J>>,
    empty_slots: Box<dyn CountingSemaphore>,
    full_slots: Box<dyn CountingSemaphore>,
    capacity: usize,
    stats: QueueStats,
}

impl<J: Spoolable> BoundedJobQueue<J> {
    /// Creates a queue of `capacity` slots with in-process primitives.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if `capacity` is 0.
    pub fn new(capacity: usize) -> Result<Self> {
        Self::with_backend(capacity, &PrimitiveBackend::InProcess)
    }

    /// Creates a queue whose primitives live in `backend`.
    pub fn with_backend(capacity: usize, backend: &PrimitiveBackend) -> Result<Self> {
        Self::with_primitives(capacity, SyncPrimitives::create(backend, capacity)?)
    }

    /// Creates a queue over freshly created primitives.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if `capacity` is 0 or the primitives do
    /// not start at mutex 1, empty `capacity`, full 0.
    pub fn with_primitives(capacity: usize, primitives: SyncPrimitives) -> Result<Self> {
        if capacity == 0 {
            return Err(SpoolError::invalid_config(
                "capacity",
                "buffer capacity must be at least 1",
            ));
        }
        let snapshot = primitives.snapshot();
        let expected = [
            (snapshot.empty_slots, capacity, "empty_slots"),
            (snapshot.full_slots, 0, "full_slots"),
        ];
        for (actual, want, name) in expected {
            if let Some(actual) = actual.filter(|&v| v != want) {
                return Err(SpoolError::invalid_config(
                    name,
                    format!("expected initial value {}, found {}", want, actual),
                ));
            }
        }

        let SyncPrimitives {
            mutex,
            empty_slots,
            full_slots,
        } = primitives;
        Ok(Self {
            ring: SemaphoreMutex::new(mutex, Ring::new(capacity))?,
            empty_slots,
            full_slots,
            capacity,
            stats: QueueStats::new(),
        })
    }

    /// Places a job, blocking while the buffer is full.
    ///
    /// If no slot is free right away the backpressure notice is logged before
    /// blocking. The job is never overwritten; use [`try_enqueue`](Self::try_enqueue)
    /// or [`enqueue_timeout`](Self::enqueue_timeout) to get it back when the
    /// queue is closed.
    ///
    /// # Errors
    ///
    /// - `QueueClosed` if the queue was closed; the job is dropped
    /// - `InternalConsistency` if a free slot was granted but the buffer is full
    pub fn enqueue(&self, job: J) -> Result<Placement> {
        let offer = if self.empty_slots.try_acquire()? {
            self.place(job, false)?
        } else {
            self.note_backpressure(&job);
            self.empty_slots.acquire()?;
            self.place(job, true)?
        };
        match offer {
            Offer::Placed(placement) => Ok(placement),
            Offer::Rejected(_) | Offer::Closed(_) => Err(SpoolError::QueueClosed),
        }
    }

    /// Places a job only if a slot is free right now.
    ///
    /// Hands the job back in [`Offer::Rejected`] when the buffer is full and
    /// in [`Offer::Closed`] when the queue was closed.
    pub fn try_enqueue(&self, job: J) -> Result<Offer<J>> {
        if !self.empty_slots.try_acquire()? {
            self.stats.record_backpressure();
            return Ok(Offer::Rejected(job));
        }
        self.place(job, false)
    }

    /// Places a job, waiting at most `timeout` for a free slot.
    ///
    /// Returns the job in [`Offer::Rejected`] if the wait expired and in
    /// [`Offer::Closed`] if the queue was closed.
    pub fn enqueue_timeout(&self, job: J, timeout: Duration) -> Result<Offer<J>> {
        if self.empty_slots.try_acquire()? {
            return self.place(job, false);
        }
        self.note_backpressure(&job);
        if !self.empty_slots.acquire_timeout(timeout)? {
            self.stats.record_timeout();
            return Ok(Offer::Rejected(job));
        }
        self.place(job, true)
    }

    /// Takes the oldest job, blocking while the buffer is empty.
    ///
    /// Returns [`Dequeued::Shutdown`] once the queue is closed and drained;
    /// the caller must then [`relay_shutdown`](Self::relay_shutdown).
    ///
    /// # Errors
    ///
    /// Returns `InternalConsistency` if a queued-job unit was granted but the
    /// buffer is empty and open.
    pub fn dequeue(&self) -> Result<Dequeued<J>> {
        self.full_slots.acquire()?;
        self.take()
    }

    /// Takes the oldest job if one is pending right now.
    pub fn try_dequeue(&self) -> Result<Option<Dequeued<J>>> {
        if !self.full_slots.try_acquire()? {
            return Ok(None);
        }
        self.take().map(Some)
    }

    /// Takes the oldest job, waiting at most `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `Timeout` if nothing arrived in time.
    pub fn dequeue_timeout(&self, timeout: Duration) -> Result<Dequeued<J>> {
        if !self.full_slots.acquire_timeout(timeout)? {
            self.stats.record_timeout();
            return Err(SpoolError::timeout("dequeue", millis(timeout)));
        }
        self.take()
    }

    /// Stops accepting jobs and wakes one consumer with the shutdown signal.
    ///
    /// Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        let mut ring = self.ring.lock()?;
        if ring.closed {
            return ring.unlock();
        }
        ring.closed = true;
        let pending = ring.len();
        ring.unlock()?;
        log::debug!("queue closed with {} jobs pending", pending);
        self.full_slots.release()
    }

    /// Passes the shutdown signal on to the next waiting consumer.
    pub fn relay_shutdown(&self) -> Result<()> {
        self.full_slots.release()
    }

    /// Whether the queue was closed.
    pub fn is_closed(&self) -> Result<bool> {
        let ring = self.ring.lock()?;
        let closed = ring.closed;
        ring.unlock()?;
        Ok(closed)
    }

    /// Number of jobs currently in the buffer.
    pub fn len(&self) -> Result<usize> {
        let ring = self.ring.lock()?;
        let len = ring.len();
        ring.unlock()?;
        Ok(len)
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Whether every slot is taken.
    pub fn is_full(&self) -> Result<bool> {
        Ok(self.len()? == self.capacity)
    }

    /// Maximum number of jobs the buffer holds.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Traffic counters.
    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }

    /// Current values of the primitives.
    pub fn primitive_snapshot(&self) -> PrimitiveSnapshot {
        PrimitiveSnapshot {
            mutex: self.ring.semaphore().value(),
            empty_slots: self.empty_slots.value(),
            full_slots: self.full_slots.value(),
        }
    }

    /// Racy by nature: the buffer may drain before the producer blocks.
    fn note_backpressure(&self, job: &J) {
        self.stats.record_backpressure();
        log::info!("{}, but buffer full", job);
    }

    /// Writes the job at `head`; the caller holds one free-slot unit.
    fn place(&self, mut job: J, waited: bool) -> Result<Offer<J>> {
        let mut ring = self.ring.lock()?;
        if ring.closed {
            ring.unlock()?;
            self.empty_slots.release()?;
            return Ok(Offer::Closed(job));
        }
        if ring.is_full() {
            let message = format!(
                "free slot granted but all {} slots are taken (head {}, tail {})",
                self.capacity, ring.head, ring.tail
            );
            ring.unlock()?;
            return Err(SpoolError::consistency(message));
        }

        let slot = ring.head;
        job.assign_slot(slot);
        ring.push(job);
        let placement = Placement {
            slot,
            tail: ring.tail,
            head: ring.head,
            queued: ring.len(),
            waited,
        };
        ring.unlock()?;

        self.stats.record_enqueue(placement.queued);
        self.full_slots.release()?;
        Ok(Offer::Placed(placement))
    }

    /// Removes the job at `tail`; the caller holds one queued-job unit.
    fn take(&self) -> Result<Dequeued<J>> {
        let mut ring = self.ring.lock()?;
        match ring.pop()? {
            Some(job) => {
                ring.unlock()?;
                self.stats.record_dequeue();
                self.empty_slots.release()?;
                Ok(Dequeued::Job(job))
            }
            None if ring.closed => {
                ring.unlock()?;
                Ok(Dequeued::Shutdown)
            }
            None => {
                ring.unlock()?;
                Err(SpoolError::consistency(
                    "queued-job unit granted but the buffer is empty",
                ))
            }
        }
    }
}

/// Milliseconds in `timeout`, saturating at `u64::MAX`.
pub(crate) fn millis(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
}
