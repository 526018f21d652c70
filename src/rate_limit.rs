use crate::scheduler::{Scheduler, TimerHandle};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

type Callback<A> = Rc<RefCell<dyn FnMut(A)>>;

/// Trailing-edge debounce: only the last call in a burst runs, `wait` after it.
pub struct Debounced<A> {
    scheduler: Scheduler,
    wait: Duration,
    callback: Callback<A>,
    pending: Rc<RefCell<Option<(TimerHandle, Rc<Cell<Option<A>>>)>>>,
}

impl<A: 'static> Debounced<A> {
    pub fn new(scheduler: Scheduler, wait: Duration, callback: impl FnMut(A) + 'static) -> Self {
        let callback: Callback<A> = Rc::new(RefCell::new(callback));
        Self {
            scheduler,
            wait,
            callback,
            pending: Rc::new(RefCell::new(None)),
        }
    }

    pub fn call(&self, args: A) {
        self.cancel();

        let slot = Rc::new(Cell::new(Some(args)));
        let callback = Rc::clone(&self.callback);
        let pending = Rc::clone(&self.pending);
        let fire_slot = Rc::clone(&slot);
        let timer = self.scheduler.set_timeout(self.wait, move || {
            pending.borrow_mut().take();
            if let Some(args) = fire_slot.take() {
                let mut callback = callback.borrow_mut();
                (&mut *callback)(args);
            }
        });
        *self.pending.borrow_mut() = Some((timer, slot));
    }

    pub fn is_pending(&self) -> bool {
        self.pending.borrow().is_some()
    }

    pub fn cancel(&self) {
        let pending = self.pending.borrow_mut().take();
        if let Some((timer, _)) = pending {
            self.scheduler.clear_timer(timer);
        }
    }

    pub fn flush(&self) -> bool {
        let pending = self.pending.borrow_mut().take();
        let Some((timer, slot)) = pending else {
            return false;
        };
        self.scheduler.clear_timer(timer);
        match slot.take() {
            Some(args) => {
                let mut callback = self.callback.borrow_mut();
                (&mut *callback)(args);
                true
            }
            None => false,
        }
    }
}

/// Leading-edge throttle: runs at once, then drops calls for `limit`.
pub struct Throttled<A> {
    scheduler: Scheduler,
    limit: Duration,
    callback: Callback<A>,
    suppressed: Rc<Cell<bool>>,
}

impl<A: 'static> Throttled<A> {
    pub fn new(scheduler: Scheduler, limit: Duration, callback: impl FnMut(A) + 'static) -> Self {
        let callback: Callback<A> = Rc::new(RefCell::new(callback));
        Self {
            scheduler,
            limit,
            callback,
            suppressed: Rc::new(Cell::new(false)),
        }
    }

    /// Returns whether the call ran; calls inside the window are discarded.
    pub fn call(&self, args: A) -> bool {
        if self.suppressed.get() {
            return false;
        }
        self.suppressed.set(true);
        let reopen = Rc::clone(&self.suppressed);
        self.scheduler
            .set_timeout(self.limit, move || reopen.set(false));

        let mut callback = self.callback.borrow_mut();
        (&mut *callback)(args);
        true
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppressed.get()
    }
}
