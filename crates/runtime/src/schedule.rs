use std::cell::Cell;

/// Coalesces invalidation into a single pending update pass.
///
/// Invalidation callbacks must never re-enter a running priority pass, so
/// they only set this flag; the host drains it between turns and runs one
/// pass no matter how many invalidations arrived. A new invalidation during
/// a pass schedules a future pass, superseding rather than interrupting.
///
/// Interior mutability on purpose: listeners hold `Rc<UpdateScheduler>`
/// clones and request updates through a shared reference.
#[derive(Debug, Default)]
pub struct UpdateScheduler {
    scheduled: Cell<bool>,
    requests: Cell<u64>,
}

impl UpdateScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests an update pass.
    ///
    /// Returns `true` if this request newly scheduled a pass; `false` if it
    /// coalesced into an already-pending one.
    pub fn request(&self) -> bool {
        self.requests.set(self.requests.get() + 1);
        if self.scheduled.get() {
            return false;
        }
        self.scheduled.set(true);
        true
    }

    /// Takes the pending flag.
    ///
    /// Returns `true` if a pass was scheduled since the last take; the host
    /// runs exactly one pass per `true`.
    pub fn take(&self) -> bool {
        let was = self.scheduled.get();
        self.scheduled.set(false);
        was
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled.get()
    }

    /// Total `request` calls observed, coalesced or not.
    pub fn requests_seen(&self) -> u64 {
        self.requests.get()
    }
}
