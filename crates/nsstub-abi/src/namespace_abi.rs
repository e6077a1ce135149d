//! Priming entry point invoked inside a freshly created namespace.
//!
//! Some runtime facilities (TLS setup, the allocator) misbehave on first use in
//! a new `dlmopen` namespace. The loader calls `namespace_init` in the
//! namespaced copy of this image right after creating the namespace, so such
//! failures show up at one known point instead of deep inside a later call.

use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};

// Each namespaced copy of the image has its own counter.
static NAMESPACE_INIT_CALLS: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static PRIMED: Cell<bool> = const { Cell::new(false) };
}

#[unsafe(no_mangle)]
pub extern "C" fn namespace_init() {
    PRIMED.with(|primed| primed.set(true));
    std::hint::black_box(Vec::<u8>::with_capacity(64));
    NAMESPACE_INIT_CALLS.fetch_add(1, Ordering::Relaxed);
}

/// Number of `namespace_init` calls made in this copy of the image.
#[unsafe(no_mangle)]
pub extern "C" fn nsstub_namespace_init_calls() -> usize {
    NAMESPACE_INIT_CALLS.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priming_counts_calls_and_marks_thread() {
        let before = nsstub_namespace_init_calls();
        namespace_init();
        namespace_init();
        assert!(nsstub_namespace_init_calls() >= before + 2);
        assert!(PRIMED.with(Cell::get));
    }
}
