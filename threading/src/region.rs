//! # Region Nesting Context
//!
//! Per-thread stack of entered parallel regions. Frames from several
//! controllers may interleave on one thread; every lookup only considers the
//! frames of the asking controller.

use std::cell::{Cell, RefCell};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Frame {
    pub controller: usize,
    /// Assigned by [`push`]; unique per thread.
    pub seq: u64,
    /// Effective thread count when the region was entered.
    pub effective: usize,
    /// Set by `set_num_threads` from inside this region.
    pub override_count: Option<usize>,
}

impl Frame {
    pub fn new(controller: usize, effective: usize) -> Self {
        Self {
            controller,
            seq: 0,
            effective,
            override_count: None,
        }
    }

    /// Count a region nested in this one would request, before masking.
    pub fn requested(&self) -> usize {
        self.override_count.unwrap_or(self.effective)
    }
}

thread_local! {
    static FRAMES: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
    static NEXT_SEQ: Cell<u64> = const { Cell::new(0) };
}

/// Push a frame and return the sequence number that pops it.
pub(crate) fn push(mut frame: Frame) -> u64 {
    let seq = NEXT_SEQ.with(|next| {
        let seq = next.get();
        next.set(seq.wrapping_add(1));
        seq
    });
    frame.seq = seq;
    FRAMES.with(|frames| frames.borrow_mut().push(frame));
    seq
}

/// Remove the frame pushed as `seq`. A frame already cleared stays gone.
pub(crate) fn pop(controller: usize, seq: u64) -> Option<Frame> {
    FRAMES.with(|frames| {
        let mut frames = frames.borrow_mut();
        let index = frames
            .iter()
            .rposition(|f| f.controller == controller && f.seq == seq)?;
        Some(frames.remove(index))
    })
}

pub(crate) fn innermost(controller: usize) -> Option<Frame> {
    FRAMES.with(|frames| {
        frames
            .borrow()
            .iter()
            .rev()
            .find(|f| f.controller == controller)
            .copied()
    })
}

/// Record an in-region override on the innermost frame.
///
/// Returns `false` when the thread is not inside a region of `controller`.
pub(crate) fn set_override(controller: usize, count: usize) -> bool {
    FRAMES.with(|frames| {
        let mut frames = frames.borrow_mut();
        match frames.iter_mut().rev().find(|f| f.controller == controller) {
            Some(frame) => {
                frame.override_count = Some(count);
                true
            }
            None => false,
        }
    })
}

pub(crate) fn depth(controller: usize) -> usize {
    FRAMES.with(|frames| {
        frames
            .borrow()
            .iter()
            .filter(|f| f.controller == controller)
            .count()
    })
}

pub(crate) fn clear(controller: usize) {
    FRAMES.with(|frames| frames.borrow_mut().retain(|f| f.controller != controller));
}
