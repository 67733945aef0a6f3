//! Cloneable handle to a session.
//!
//! Other threads block until the session is free. A call re-entering from the
//! thread that already holds it (a host native invoked by the remote firing
//! another callback) cannot be served without interleaving two round trips on
//! one channel, so it is refused.

use std::cell::RefCell;
use std::sync::Arc;

use parking_lot::ReentrantMutex;

use super::Session;
use crate::handler::CallbackParam;
use crate::host::Host;
use crate::transport::Channel;

pub struct SharedSession<C: Channel, H: Host> {
    inner: Arc<ReentrantMutex<RefCell<Session<C, H>>>>,
}

impl<C: Channel, H: Host> SharedSession<C, H> {
    pub fn new(session: Session<C, H>) -> Self {
        Self {
            inner: Arc::new(ReentrantMutex::new(RefCell::new(session))),
        }
    }

    /// Run `f` with exclusive access; `None` on same-thread reentry.
    pub fn with<R>(&self, f: impl FnOnce(&mut Session<C, H>) -> R) -> Option<R> {
        let guard = self.inner.lock();
        let mut session = guard.try_borrow_mut().ok()?;
        Some(f(&mut session))
    }

    /// Returns `false` when skipped because the session is busy on this thread.
    pub fn tick(&self) -> bool {
        let ran = self.with(|session| session.tick()).is_some();
        if !ran {
            tracing::debug!("Skipping reentrant tick");
        }
        ran
    }

    pub fn public_call(&self, caller: u16, name: &str, params: &[CallbackParam]) -> Option<i32> {
        match self.with(|session| session.public_call(caller, name, params)) {
            Some(value) => value,
            None => {
                tracing::warn!("Refusing reentrant call to {}", name);
                None
            }
        }
    }

    pub fn terminate(&self, context: &str) {
        if self.with(|session| session.terminate(context)).is_none() {
            tracing::warn!("Refusing reentrant terminate");
        }
    }
}

impl<C: Channel, H: Host> Clone for SharedSession<C, H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
