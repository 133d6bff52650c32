//! # Thread-Count Control
//!
//! Sizing of the worker pool that runs parallel regions.
//!
//! - [`ThreadCountController`]: requested count, pool launch, region entry
//! - Region nesting context: thread-local stack of entered regions
//! - Fork detection: a pool launched by a parent process is discarded
//!
//! ```rust,no_run
//! use parajit_threading::ThreadCountController;
//!
//! let controller = ThreadCountController::new(4)?;
//! controller.set_num_threads(2)?;
//! let report = controller.parallel_for(0..1000, |i| {
//!     let _ = i * 2;
//! })?;
//! assert_eq!(report.effective, 2);
//! # Ok::<(), parajit_errors::ThreadingError>(())
//! ```

pub mod controller;
pub mod fork;
pub mod pool;
mod region;

pub use controller::{RegionGuard, RegionReport, ThreadCountController};
pub use parajit_errors::ThreadingError;
pub use pool::WorkerPool;
