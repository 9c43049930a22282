//! Scoped impersonation of the acting identity
//!
//! The acting identity lives on a thread-local stack. [`impersonate`] pushes
//! an identity and returns a guard; dropping the guard pops it again, also
//! when the scope unwinds.

use std::cell::RefCell;
use std::marker::PhantomData;

use crate::identity::Identity;

thread_local! {
    static ACTING: RefCell<Vec<Identity>> = const { RefCell::new(Vec::new()) };
}

/// Restores the previously acting identity on drop
#[must_use = "the identity is restored as soon as the guard is dropped"]
pub struct ImpersonationGuard {
    depth: usize,
    // Guards restore the stack of the thread that created them
    _not_send: PhantomData<*const ()>,
}

impl Drop for ImpersonationGuard {
    fn drop(&mut self) {
        ACTING.with(|stack| {
            let mut stack = stack.borrow_mut();
            // Guards dropped out of order still leave the stack consistent
            stack.truncate(self.depth);
        });
        tracing::trace!(depth = self.depth, "impersonation ended");
    }
}

/// Act as `identity` until the returned guard is dropped
pub fn impersonate(identity: Identity) -> ImpersonationGuard {
    tracing::trace!(identity = %identity.name, "impersonating");
    let depth = ACTING.with(|stack| {
        let mut stack = stack.borrow_mut();
        let depth = stack.len();
        stack.push(identity);
        depth
    });
    ImpersonationGuard {
        depth,
        _not_send: PhantomData,
    }
}

/// The acting identity on this thread, anonymous when none was pushed
pub fn current() -> Identity {
    ACTING.with(|stack| stack.borrow().last().cloned().unwrap_or_default())
}

/// Run `f` while acting as `identity`
pub fn with_identity<T>(identity: Identity, f: impl FnOnce() -> T) -> T {
    let _guard = impersonate(identity);
    f()
}
