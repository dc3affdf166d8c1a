//! Persistent worker threads, one packet slot per thread.
//!
//! Each worker owns a mutex/condvar pair guarding its packet slot. The
//! dispatching thread fills a slot, clears `done` and signals; the worker
//! runs the packet, sets `done` and signals back. A pool of one thread
//! spawns nothing and runs packets inline.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::error::{Result, SoftFilterError};
use crate::packet::WorkPacket;

type Job = Box<dyn FnOnce() + Send + 'static>;

struct Slot {
    job: Option<Job>,
    done: bool,
    die: bool,
    panicked: bool,
}

struct Shared {
    slot: Mutex<Slot>,
    cond: Condvar,
}

struct Worker {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    fn spawn(index: usize) -> Result<Self> {
        let shared = Arc::new(Shared {
            slot: Mutex::new(Slot {
                job: None,
                done: true,
                die: false,
                panicked: false,
            }),
            cond: Condvar::new(),
        });

        let thread_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name(format!("softfilter-{index}"))
            .spawn(move || worker_loop(&thread_shared))
            .map_err(SoftFilterError::WorkerSpawn)?;

        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    fn dispatch(&self, job: Job) {
        let mut slot = self.shared.slot.lock();
        slot.job = Some(job);
        slot.done = false;
        self.shared.cond.notify_all();
    }

    /// Block until the current packet is done. Returns whether it panicked.
    fn wait_idle(&self) -> bool {
        let mut slot = self.shared.slot.lock();
        while !slot.done {
            self.shared.cond.wait(&mut slot);
        }
        std::mem::take(&mut slot.panicked)
    }

    fn stop(&mut self) {
        {
            let mut slot = self.shared.slot.lock();
            slot.die = true;
            self.shared.cond.notify_all();
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Worker thread exited abnormally");
            }
        }
    }
}

fn worker_loop(shared: &Shared) {
    let mut slot = shared.slot.lock();
    loop {
        if slot.die {
            break;
        }
        if let Some(job) = slot.job.take() {
            let ok = MutexGuard::unlocked(&mut slot, || panic::catch_unwind(AssertUnwindSafe(job)).is_ok());
            slot.panicked |= !ok;
            slot.done = true;
            shared.cond.notify_all();
            continue;
        }
        shared.cond.wait(&mut slot);
    }
}

/// Waits for every dispatched worker, also when unwinding.
struct Dispatched<'p> {
    workers: &'p [Worker],
    panicked: bool,
}

impl Dispatched<'_> {
    fn wait_all(&mut self) -> bool {
        for worker in std::mem::take(&mut self.workers) {
            self.panicked |= worker.wait_idle();
        }
        self.panicked
    }
}

impl Drop for Dispatched<'_> {
    fn drop(&mut self) {
        self.wait_all();
    }
}

/// Fixed set of persistent worker threads.
pub struct WorkerPool {
    threads: usize,
    workers: Vec<Worker>,
}

impl WorkerPool {
    /// Create a pool for `threads` concurrent packets.
    ///
    /// With `threads <= 1` no OS thread is created.
    pub fn new(threads: usize) -> Result<Self> {
        let threads = threads.max(1);
        let mut pool = Self {
            threads,
            workers: Vec::new(),
        };
        if threads > 1 {
            pool.workers.reserve_exact(threads);
            for index in 0..threads {
                pool.workers.push(Worker::spawn(index)?);
            }
        }
        debug!(threads, spawned = pool.workers.len(), "Worker pool started");
        Ok(pool)
    }

    /// Packets that can run concurrently.
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// OS threads owned by the pool.
    pub fn spawned_threads(&self) -> usize {
        self.workers.len()
    }

    /// Run one cycle of packets and wait for all of them.
    ///
    /// Packet `i` goes to worker `i`. Packets beyond the worker count, and
    /// all packets of an inline pool, run on the calling thread in order.
    pub fn run(&self, packets: Vec<WorkPacket<'_>>) -> Result<()> {
        if self.workers.is_empty() || packets.len() <= 1 {
            packets.into_iter().for_each(WorkPacket::run);
            return Ok(());
        }

        let mut packets = packets.into_iter();
        let dispatched = self.workers.len().min(packets.len());
        let mut guard = Dispatched {
            workers: &self.workers[..dispatched],
            panicked: false,
        };
        for (worker, packet) in guard.workers.iter().zip(packets.by_ref()) {
            let job = packet.into_inner();
            // SAFETY: the job borrows data that outlives this call. `guard`
            // waits for every dispatched job before `run` returns or unwinds,
            // so the erased lifetime is never exceeded.
            let job: Job = unsafe { std::mem::transmute::<Box<dyn FnOnce() + Send + '_>, Job>(job) };
            worker.dispatch(job);
        }
        packets.for_each(WorkPacket::run);

        if guard.wait_all() {
            return Err(SoftFilterError::WorkerPanicked);
        }
        Ok(())
    }

    /// Signal every worker to exit and join it. Idempotent.
    pub fn shutdown(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        for worker in &mut self.workers {
            worker.stop();
        }
        debug!(threads = self.workers.len(), "Worker pool stopped");
        self.workers.clear();
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
