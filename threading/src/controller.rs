//! # Thread-Count Controller
//!
//! Decides how many workers a parallel region uses.
//!
//! The controller holds the requested count (the register) and the worker
//! pool. The pool launches once, on the first top-level region entry, sized
//! by the register at that instant; afterwards the register can only mask
//! the pool down. `set_num_threads` from inside a region only affects
//! regions nested in it on the calling thread.

use crate::fork::Owner;
use crate::pool::{self, WorkerPool};
use crate::region::{self, Frame};
use parajit_errors::ThreadingError;
use parking_lot::Mutex;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

static NEXT_CONTROLLER_ID: AtomicUsize = AtomicUsize::new(1);

enum PoolState {
    Uninitialized,
    Active { pool: Arc<WorkerPool>, owner: Owner },
}

/// Outcome of one [`ThreadCountController::parallel_for`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionReport {
    /// Workers the region was allowed to use.
    pub effective: usize,
    /// Chunks dispatched, never more than `effective`.
    pub chunks: usize,
    pub iterations: usize,
}

pub struct ThreadCountController {
    id: usize,
    register: AtomicUsize,
    state: Mutex<PoolState>,
}

impl fmt::Debug for ThreadCountController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadCountController")
            .field("id", &self.id)
            .field("register", &self.register.load(Ordering::SeqCst))
            .field("physical", &self.physical_pool_size())
            .finish()
    }
}

fn validate(requested: i64) -> Result<usize, ThreadingError> {
    if requested < 1 {
        return Err(ThreadingError::InvalidThreadCount { requested });
    }
    usize::try_from(requested).map_err(|_| ThreadingError::InvalidThreadCount { requested })
}

impl ThreadCountController {
    /// Create an uninitialized controller with the register set to `initial`.
    pub fn new(initial: i64) -> Result<Self, ThreadingError> {
        let initial = validate(initial)?;
        Ok(Self {
            id: NEXT_CONTROLLER_ID.fetch_add(1, Ordering::Relaxed),
            register: AtomicUsize::new(initial),
            state: Mutex::new(PoolState::Uninitialized),
        })
    }

    /// Request `n` workers.
    ///
    /// Outside any region this updates the register for future top-level
    /// regions; a launched pool is never resized. Inside a region it only
    /// changes what regions nested in the current one (on this thread)
    /// request.
    pub fn set_num_threads(&self, n: i64) -> Result<(), ThreadingError> {
        let n = validate(n)?;
        self.check_fork();

        if region::set_override(self.id, n) {
            debug!("Thread count set to {} for the current region", n);
            return Ok(());
        }

        self.register.store(n, Ordering::SeqCst);
        debug!("Thread count register set to {}", n);
        Ok(())
    }

    /// Thread count a region entered now, at the current nesting depth,
    /// would use.
    pub fn get_num_threads(&self) -> usize {
        let physical = self.physical_pool_size();
        let requested = region::innermost(self.id)
            .map_or_else(|| self.register.load(Ordering::SeqCst), |f| f.requested());
        physical.map_or(requested, |p| requested.min(p))
    }

    /// Replace the register while the pool has not launched yet.
    pub fn reseed(&self, n: i64) -> Result<(), ThreadingError> {
        let n = validate(n)?;
        if let Some(physical) = self.physical_pool_size() {
            return Err(ThreadingError::AlreadyLaunched { physical });
        }
        self.register.store(n, Ordering::SeqCst);
        debug!("Thread count register reseeded to {}", n);
        Ok(())
    }

    /// Launch the pool now instead of at the first region entry.
    ///
    /// Returns the physical pool size. Launching twice is harmless.
    pub fn launch(&self) -> Result<usize, ThreadingError> {
        Ok(self.ensure_launched()?.size())
    }

    pub fn is_initialized(&self) -> bool {
        self.physical_pool_size().is_some()
    }

    /// Size of the launched pool, `None` before launch (or after a fork).
    pub fn physical_pool_size(&self) -> Option<usize> {
        let mut state = self.state.lock();
        self.reset_if_forked(&mut state);
        match &*state {
            PoolState::Active { pool, .. } => Some(pool.size()),
            PoolState::Uninitialized => None,
        }
    }

    /// Raw register value, unmasked.
    pub fn register(&self) -> usize {
        self.register.load(Ordering::SeqCst)
    }

    /// Regions of this controller the calling thread is currently inside.
    pub fn nesting_depth(&self) -> usize {
        region::depth(self.id)
    }

    /// Enter a parallel region on the calling thread.
    ///
    /// A top-level entry launches the pool if needed. The region's effective
    /// count is fixed at entry.
    pub fn enter_region(&self) -> Result<RegionGuard<'_>, ThreadingError> {
        let (_, frame, effective) = self.enter()?;
        Ok(RegionGuard {
            controller: self,
            effective,
            _frame: frame,
            _not_send: PhantomData,
        })
    }

    /// Run `body` for every index of `range` inside a new region.
    ///
    /// The range is split into at most `effective` contiguous chunks run on
    /// the pool. Each chunk runs inside a region frame carrying the parent's
    /// effective count, so regions nested in `body` inherit it.
    pub fn parallel_for<F>(&self, range: Range<usize>, body: F) -> Result<RegionReport, ThreadingError>
    where
        F: Fn(usize) + Send + Sync,
    {
        let (pool, _region, effective) = self.enter()?;

        let start = range.start;
        let bounds = pool::chunk_bounds(range.len(), effective);
        let id = self.id;
        let body = &body;

        pool.scope(|s| {
            for &(lo, hi) in &bounds {
                s.spawn(move |_| {
                    let _frame = FrameGuard::push(id, effective);
                    for i in (start + lo)..(start + hi) {
                        body(i);
                    }
                });
            }
        });

        Ok(RegionReport {
            effective,
            chunks: bounds.len(),
            iterations: range.len(),
        })
    }

    fn enter(&self) -> Result<(Arc<WorkerPool>, FrameGuard, usize), ThreadingError> {
        let pool = self.ensure_launched()?;
        let parent = region::innermost(self.id);
        let requested = parent.map_or_else(|| self.register.load(Ordering::SeqCst), |f| f.requested());
        let effective = requested.min(pool.size());

        let frame = FrameGuard::push(self.id, effective);
        debug!(
            "Entered parallel region (depth {}, {} threads)",
            region::depth(self.id),
            effective
        );
        Ok((pool, frame, effective))
    }

    fn ensure_launched(&self) -> Result<Arc<WorkerPool>, ThreadingError> {
        let mut state = self.state.lock();
        self.reset_if_forked(&mut state);

        if let PoolState::Active { pool, .. } = &*state {
            return Ok(pool.clone());
        }

        let size = self.register.load(Ordering::SeqCst);
        let pool = Arc::new(WorkerPool::launch(size)?);
        *state = PoolState::Active {
            pool: pool.clone(),
            owner: Owner::current(),
        };
        info!("Thread-count controller active with {} workers", size);
        Ok(pool)
    }

    fn check_fork(&self) {
        let mut state = self.state.lock();
        self.reset_if_forked(&mut state);
    }

    /// A pool launched by a parent process has no threads here: forget it
    /// without dropping and fall back to `Uninitialized`. The register is
    /// kept.
    fn reset_if_forked(&self, state: &mut PoolState) {
        let PoolState::Active { owner, .. } = &*state else {
            return;
        };
        if !owner.is_forked() {
            return;
        }

        let parent = owner.pid();
        let stale = std::mem::replace(state, PoolState::Uninitialized);
        std::mem::forget(stale);
        region::clear(self.id);
        warn!(
            "Worker pool was launched by process {}; relaunching on next region entry",
            parent
        );
    }
}

/// Pops one region frame of a controller when dropped.
struct FrameGuard {
    controller: usize,
    seq: u64,
}

impl FrameGuard {
    fn push(controller: usize, effective: usize) -> Self {
        let seq = region::push(Frame::new(controller, effective));
        Self { controller, seq }
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        region::pop(self.controller, self.seq);
    }
}

/// An entered region. Exits when dropped.
///
/// Bound to the thread that entered it.
pub struct RegionGuard<'a> {
    controller: &'a ThreadCountController,
    effective: usize,
    _frame: FrameGuard,
    _not_send: PhantomData<*const ()>,
}

impl RegionGuard<'_> {
    /// Effective thread count fixed at entry.
    pub fn effective(&self) -> usize {
        self.effective
    }

    pub fn depth(&self) -> usize {
        self.controller.nesting_depth()
    }

    pub fn exit(self) {}
}

impl fmt::Debug for RegionGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegionGuard")
            .field("effective", &self.effective)
            .finish_non_exhaustive()
    }
}
