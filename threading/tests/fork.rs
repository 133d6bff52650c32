#![cfg(unix)]

use parajit_threading::ThreadCountController;
use std::panic::{AssertUnwindSafe, catch_unwind};

#[test]
fn test_forked_child_starts_uninitialized() {
    let controller = ThreadCountController::new(3).unwrap();
    controller.parallel_for(0..16, |_| {}).unwrap();
    assert_eq!(controller.physical_pool_size(), Some(3));

    let pid = unsafe { libc::fork() };
    assert!(pid >= 0, "fork failed");

    if pid == 0 {
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            assert!(!controller.is_initialized());
            assert_eq!(controller.register(), 3);

            controller.set_num_threads(2).unwrap();
            let report = controller.parallel_for(0..8, |_| {}).unwrap();
            assert_eq!(report.effective, 2);
            assert_eq!(controller.physical_pool_size(), Some(2));
        }));
        let code = if outcome.is_ok() { 0 } else { 1 };
        unsafe { libc::_exit(code) };
    }

    let mut status = 0;
    let waited = unsafe { libc::waitpid(pid, &mut status, 0) };
    assert_eq!(waited, pid);
    assert!(libc::WIFEXITED(status));
    assert_eq!(libc::WEXITSTATUS(status), 0, "child assertions failed");

    // the child's changes stay in the child
    assert!(controller.is_initialized());
    assert_eq!(controller.physical_pool_size(), Some(3));
    assert_eq!(controller.register(), 3);
}
