//! Time is virtual: nothing happens until the owner calls [`Scheduler::advance`]
//! (directly, or through [`crate::driver`] against a real clock). Callbacks run
//! with no internal borrow held, so they may schedule or cancel work freely.

use crate::config::SiteConfig;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;
use tracing::trace;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(u64);

type FrameCallback = Box<dyn FnOnce(Duration)>;

enum Task {
    Once(Box<dyn FnOnce()>),
    Repeat {
        every: Duration,
        callback: Rc<RefCell<dyn FnMut()>>,
    },
}

enum Job {
    Once(Box<dyn FnOnce()>),
    Repeat(Rc<RefCell<dyn FnMut()>>),
    Frames(Duration, Vec<(u64, FrameCallback)>),
}

struct Queue {
    now: Duration,
    next_id: u64,
    frame_interval: Duration,
    timers: BTreeMap<(Duration, u64), Task>,
    frames: Vec<(u64, FrameCallback)>,
    batch: Vec<u64>,
    batch_cancelled: Vec<u64>,
}

impl Queue {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// First frame boundary strictly after `now`.
    fn next_frame_at(&self) -> Duration {
        let interval = self.frame_interval.as_nanos().max(1);
        let ticks = self.now.as_nanos() / interval + 1;
        Duration::from_nanos((ticks * interval) as u64)
    }

    fn next_event_at(&self) -> Option<Duration> {
        let timer_at = self.timers.keys().next().map(|(at, _)| *at);
        let frame_at = (!self.frames.is_empty()).then(|| self.next_frame_at());
        match (timer_at, frame_at) {
            (Some(timer), Some(frame)) => Some(timer.min(frame)),
            (timer, frame) => timer.or(frame),
        }
    }
}

#[derive(Clone)]
pub struct Scheduler {
    queue: Rc<RefCell<Queue>>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let queue = self.queue.borrow();
        f.debug_struct("Scheduler")
            .field("now", &queue.now)
            .field("timers", &queue.timers.len())
            .field("frames", &queue.frames.len())
            .finish()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self::with_frame_rate(60)
    }

    pub fn with_frame_rate(frames_per_second: u32) -> Self {
        let frame_interval = Duration::from_secs(1) / frames_per_second.max(1);
        Self {
            queue: Rc::new(RefCell::new(Queue {
                now: Duration::ZERO,
                next_id: 0,
                frame_interval,
                timers: BTreeMap::new(),
                frames: Vec::new(),
                batch: Vec::new(),
                batch_cancelled: Vec::new(),
            })),
        }
    }

    pub fn from_config(config: &SiteConfig) -> Self {
        Self::with_frame_rate(config.frame_rate)
    }

    /// Time since the loop started, the equivalent of `performance.now()`.
    pub fn now(&self) -> Duration {
        self.queue.borrow().now
    }

    pub fn frame_interval(&self) -> Duration {
        self.queue.borrow().frame_interval
    }

    pub fn set_timeout(&self, delay: Duration, callback: impl FnOnce() + 'static) -> TimerHandle {
        let mut queue = self.queue.borrow_mut();
        let id = queue.next_id();
        let at = queue.now + delay;
        queue.timers.insert((at, id), Task::Once(Box::new(callback)));
        TimerHandle(id)
    }

    /// Repeats every `every` (at least 1 ms), first run one period from now.
    pub fn set_interval(&self, every: Duration, callback: impl FnMut() + 'static) -> TimerHandle {
        let every = every.max(MIN_INTERVAL);
        let callback: Rc<RefCell<dyn FnMut()>> = Rc::new(RefCell::new(callback));
        let mut queue = self.queue.borrow_mut();
        let id = queue.next_id();
        let at = queue.now + every;
        queue.timers.insert((at, id), Task::Repeat { every, callback });
        TimerHandle(id)
    }

    pub fn clear_timer(&self, handle: TimerHandle) -> bool {
        let mut queue = self.queue.borrow_mut();
        let before = queue.timers.len();
        queue.timers.retain(|(_, id), _| *id != handle.0);
        queue.timers.len() != before
    }

    pub fn is_scheduled(&self, handle: TimerHandle) -> bool {
        self.queue
            .borrow()
            .timers
            .keys()
            .any(|(_, id)| *id == handle.0)
    }

    pub fn request_animation_frame(
        &self,
        callback: impl FnOnce(Duration) + 'static,
    ) -> FrameHandle {
        let mut queue = self.queue.borrow_mut();
        let id = queue.next_id();
        queue.frames.push((id, Box::new(callback)));
        FrameHandle(id)
    }

    pub fn cancel_frame(&self, handle: FrameHandle) -> bool {
        let mut queue = self.queue.borrow_mut();
        let before = queue.frames.len();
        queue.frames.retain(|(id, _)| *id != handle.0);
        if queue.frames.len() != before {
            return true;
        }
        if queue.batch.contains(&handle.0) && !queue.batch_cancelled.contains(&handle.0) {
            queue.batch_cancelled.push(handle.0);
            return true;
        }
        false
    }

    pub fn pending(&self) -> usize {
        let queue = self.queue.borrow();
        queue.timers.len() + queue.frames.len()
    }

    pub fn next_event_at(&self) -> Option<Duration> {
        self.queue.borrow().next_event_at()
    }

    /// Runs everything due within `by`, then leaves the clock at `now + by`.
    /// Returns the number of callbacks run.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.now() + by;
        self.advance_to(target)
    }

    pub fn advance_to(&self, target: Duration) -> usize {
        let mut ran = 0;
        while let Some(count) = self.step(target) {
            ran += count;
        }
        let mut queue = self.queue.borrow_mut();
        queue.now = queue.now.max(target);
        ran
    }

    /// Runs events until nothing is pending or the next event lies beyond
    /// `max_span`; the clock stops at the last event run.
    pub fn run_until_idle(&self, max_span: Duration) -> usize {
        let limit = self.now() + max_span;
        let mut ran = 0;
        while let Some(count) = self.step(limit) {
            ran += count;
        }
        ran
    }

    fn step(&self, limit: Duration) -> Option<usize> {
        let job = {
            let mut queue = self.queue.borrow_mut();
            let timer_at = queue.timers.keys().next().map(|(at, _)| *at);
            let frame_at = (!queue.frames.is_empty()).then(|| queue.next_frame_at());
            let run_frames = match (timer_at, frame_at) {
                (Some(timer), Some(frame)) => frame < timer,
                (Some(_), None) => false,
                (None, Some(_)) => true,
                (None, None) => return None,
            };

            if run_frames {
                let at = frame_at?;
                if at > limit {
                    return None;
                }
                queue.now = at;
                let frames = std::mem::take(&mut queue.frames);
                queue.batch = frames.iter().map(|(id, _)| *id).collect();
                Job::Frames(at, frames)
            } else {
                let ((at, id), task) = queue.timers.pop_first()?;
                if at > limit {
                    queue.timers.insert((at, id), task);
                    return None;
                }
                queue.now = queue.now.max(at);
                match task {
                    Task::Once(callback) => Job::Once(callback),
                    Task::Repeat { every, callback } => {
                        queue.timers.insert(
                            (at + every, id),
                            Task::Repeat {
                                every,
                                callback: Rc::clone(&callback),
                            },
                        );
                        Job::Repeat(callback)
                    }
                }
            }
        };

        Some(self.run(job))
    }

    fn run(&self, job: Job) -> usize {
        match job {
            Job::Once(callback) => {
                trace!(now = ?self.now(), "timeout fired");
                callback();
                1
            }
            Job::Repeat(callback) => {
                trace!(now = ?self.now(), "interval fired");
                let mut callback = callback.borrow_mut();
                (&mut *callback)();
                1
            }
            Job::Frames(at, frames) => {
                let mut ran = 0;
                for (id, callback) in frames {
                    let cancelled = self.queue.borrow().batch_cancelled.contains(&id);
                    if cancelled {
                        continue;
                    }
                    callback(at);
                    ran += 1;
                }
                let mut queue = self.queue.borrow_mut();
                queue.batch.clear();
                queue.batch_cancelled.clear();
                ran
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn timeouts_run_in_deadline_then_schedule_order() {
        let scheduler = Scheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for (delay, label) in [(30, "c"), (10, "a"), (10, "b")] {
            let log = Rc::clone(&log);
            scheduler.set_timeout(ms(delay), move || log.borrow_mut().push(label));
        }
        assert_eq!(scheduler.advance(ms(30)), 3);
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
        assert_eq!(scheduler.now(), ms(30));
    }

    #[test]
    fn cleared_timeout_never_runs() {
        let scheduler = Scheduler::new();
        let fired = Rc::new(Cell::new(false));
        let flag = Rc::clone(&fired);
        let handle = scheduler.set_timeout(ms(5), move || flag.set(true));
        assert!(scheduler.clear_timer(handle));
        assert!(!scheduler.clear_timer(handle));
        scheduler.advance(ms(10));
        assert!(!fired.get());
    }

    #[test]
    fn interval_repeats_until_cleared_from_inside() {
        let scheduler = Scheduler::new();
        let count = Rc::new(Cell::new(0));
        let handle_slot: Rc<Cell<Option<TimerHandle>>> = Rc::new(Cell::new(None));
        let handle = {
            let count = Rc::clone(&count);
            let slot = Rc::clone(&handle_slot);
            let inner = scheduler.clone();
            scheduler.set_interval(ms(100), move || {
                count.set(count.get() + 1);
                if count.get() == 3 {
                    if let Some(handle) = slot.get() {
                        inner.clear_timer(handle);
                    }
                }
            })
        };
        handle_slot.set(Some(handle));
        scheduler.advance(ms(1_000));
        assert_eq!(count.get(), 3);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn frames_batch_on_boundaries() {
        let scheduler = Scheduler::with_frame_rate(50);
        let stamps = Rc::new(RefCell::new(Vec::new()));
        for _ in 0..2 {
            let stamps = Rc::clone(&stamps);
            scheduler.request_animation_frame(move |at| stamps.borrow_mut().push(at));
        }
        scheduler.advance(ms(100));
        assert_eq!(*stamps.borrow(), vec![ms(20), ms(20)]);
    }

    #[test]
    fn frame_requested_from_frame_runs_next_boundary() {
        let scheduler = Scheduler::with_frame_rate(50);
        let stamps = Rc::new(RefCell::new(Vec::new()));
        let inner = scheduler.clone();
        let outer_stamps = Rc::clone(&stamps);
        scheduler.request_animation_frame(move |at| {
            outer_stamps.borrow_mut().push(at);
            let stamps = Rc::clone(&outer_stamps);
            inner.request_animation_frame(move |at| stamps.borrow_mut().push(at));
        });
        scheduler.advance(ms(100));
        assert_eq!(*stamps.borrow(), vec![ms(20), ms(40)]);
    }

    #[test]
    fn frame_cancelled_within_batch_is_skipped() {
        let scheduler = Scheduler::with_frame_rate(50);
        let ran = Rc::new(Cell::new(0));
        let second: Rc<Cell<Option<FrameHandle>>> = Rc::new(Cell::new(None));
        {
            let inner = scheduler.clone();
            let second = Rc::clone(&second);
            let ran = Rc::clone(&ran);
            scheduler.request_animation_frame(move |_| {
                ran.set(ran.get() + 1);
                if let Some(handle) = second.get() {
                    inner.cancel_frame(handle);
                }
            });
        }
        let ran_second = Rc::clone(&ran);
        let handle =
            scheduler.request_animation_frame(move |_| ran_second.set(ran_second.get() + 10));
        second.set(Some(handle));
        scheduler.advance(ms(40));
        assert_eq!(ran.get(), 1);
    }

    #[test]
    fn frame_rate_comes_from_config() {
        let config = SiteConfig {
            frame_rate: 50,
            ..SiteConfig::default()
        };
        let scheduler = Scheduler::from_config(&config);
        assert_eq!(scheduler.frame_interval(), ms(20));
        assert_eq!(scheduler.frame_interval(), config.frame_interval());

        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        scheduler.request_animation_frame(move |at| log.borrow_mut().push(at));
        scheduler.advance(ms(25));
        assert_eq!(*seen.borrow(), vec![ms(20)]);
    }

    #[test]
    fn run_until_idle_stops_at_last_event() {
        let scheduler = Scheduler::new();
        scheduler.set_timeout(ms(250), || {});
        assert_eq!(scheduler.run_until_idle(ms(10_000)), 1);
        assert_eq!(scheduler.now(), ms(250));
        assert_eq!(scheduler.next_event_at(), None);
    }
}
