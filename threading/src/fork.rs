//! Fork detection.
//!
//! Worker threads do not survive `fork()`. A pool is only usable in the
//! process that launched it, so every pool remembers its owner pid and
//! callers compare it with the current one.

/// Process that launched a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner {
    pid: u32,
}

impl Owner {
    pub fn current() -> Self {
        Self {
            pid: std::process::id(),
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// `true` when running in a process forked after this owner was taken.
    pub fn is_forked(&self) -> bool {
        self.pid != std::process::id()
    }

    #[cfg(test)]
    pub(crate) fn with_pid(pid: u32) -> Self {
        Self { pid }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_owner_is_not_forked() {
        let owner = Owner::current();
        assert_eq!(owner.pid(), std::process::id());
        assert!(!owner.is_forked());
    }

    #[test]
    fn test_foreign_owner_is_forked() {
        let owner = Owner::with_pid(std::process::id().wrapping_add(1));
        assert!(owner.is_forked());
    }
}
