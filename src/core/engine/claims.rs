//! Exclusive claims on folder trees.

use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex};

/// Roots of passes currently running.
///
/// A root conflicts with itself, its ancestors and its descendants, so
/// two passes that could see the same file never run at once.
#[derive(Debug, Default)]
pub(super) struct ScopeClaims {
    active: Mutex<Vec<PathBuf>>,
    released: Condvar,
}

impl ScopeClaims {
    /// Block until no running pass overlaps `root`, then claim it
    pub(super) fn acquire(&self, root: &Path) -> ScopeClaim<'_> {
        let root = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        while active.iter().any(|other| overlaps(other, &root)) {
            active = self
                .released
                .wait(active)
                .unwrap_or_else(|e| e.into_inner());
        }
        active.push(root.clone());
        ScopeClaim { claims: self, root }
    }

    fn release(&self, root: &Path) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(index) = active.iter().position(|r| r == root) {
            active.swap_remove(index);
        }
        drop(active);
        self.released.notify_all();
    }
}

/// Released on drop
pub(super) struct ScopeClaim<'a> {
    claims: &'a ScopeClaims,
    root: PathBuf,
}

impl Drop for ScopeClaim<'_> {
    fn drop(&mut self) {
        self.claims.release(&self.root);
    }
}

fn overlaps(a: &Path, b: &Path) -> bool {
    a.starts_with(b) || b.starts_with(a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn nested_roots_wait_for_each_other() {
        let claims = Arc::new(ScopeClaims::default());
        let outer = claims.acquire(Path::new("/tidy-test/in"));

        let entered = Arc::new(AtomicBool::new(false));
        let waiter = {
            let claims = Arc::clone(&claims);
            let entered = Arc::clone(&entered);
            thread::spawn(move || {
                let _inner = claims.acquire(Path::new("/tidy-test/in/sub"));
                entered.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(150));
        assert!(!entered.load(Ordering::SeqCst));

        drop(outer);
        waiter.join().unwrap();
        assert!(entered.load(Ordering::SeqCst));
    }

    #[test]
    fn sibling_roots_do_not_block() {
        let claims = ScopeClaims::default();
        let _a = claims.acquire(Path::new("/tidy-test/a"));
        let _b = claims.acquire(Path::new("/tidy-test/ab"));
        let _c = claims.acquire(Path::new("/tidy-test/c/d"));
    }

    #[test]
    fn released_root_can_be_claimed_again() {
        let claims = ScopeClaims::default();
        drop(claims.acquire(Path::new("/tidy-test/x")));
        let _again = claims.acquire(Path::new("/tidy-test/x"));
    }
}
