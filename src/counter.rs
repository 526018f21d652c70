use crate::dom::Dom;
use crate::easing::{interpolate, progress};
use crate::models::{AnimationTask, ElementId};
use crate::scheduler::{FrameHandle, Scheduler};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::time::Duration;
use tracing::{debug, trace};

pub const COUNTING_CLASS: &str = "count-animation";

#[derive(Debug)]
struct RunState {
    scheduler: Scheduler,
    cancelled: Cell<bool>,
    finished: Cell<bool>,
    frame: Cell<Option<FrameHandle>>,
}

#[derive(Debug, Clone)]
pub struct AnimationHandle {
    id: u64,
    element: ElementId,
    state: Rc<RunState>,
}

impl AnimationHandle {
    pub fn element(&self) -> ElementId {
        self.element
    }

    pub fn is_running(&self) -> bool {
        !self.state.cancelled.get() && !self.state.finished.get()
    }

    /// Stops the animation and releases its pending frame. The element keeps
    /// whatever value was last written.
    pub fn cancel(&self) {
        if self.state.cancelled.replace(true) {
            return;
        }
        if let Some(frame) = self.state.frame.take() {
            self.state.scheduler.cancel_frame(frame);
        }
    }
}

type ActiveMap = RefCell<HashMap<ElementId, AnimationHandle>>;

struct Run {
    id: u64,
    task: AnimationTask,
    started_at: Duration,
    dom: Rc<dyn Dom>,
    state: Rc<RunState>,
    active: Weak<ActiveMap>,
}

impl Run {
    fn schedule(run: Rc<Run>) {
        let next = Rc::clone(&run);
        let frame = run
            .state
            .scheduler
            .request_animation_frame(move |at| Run::on_frame(next, at));
        run.state.frame.set(Some(frame));
    }

    fn on_frame(run: Rc<Run>, at: Duration) {
        run.state.frame.set(None);
        if run.state.cancelled.get() {
            return;
        }

        let elapsed = at.saturating_sub(run.started_at);
        let progress = progress(elapsed, run.task.duration);
        let value = interpolate(run.task.start, run.task.end, progress);
        let element = run.task.element;
        let text = format!("{value}{}", run.task.suffix);
        run.dom.set_text(element, &text);
        run.dom.add_class(element, COUNTING_CLASS);
        trace!(?element, value, progress, "counter frame");

        if progress < 1.0 {
            Run::schedule(run);
            return;
        }

        run.state.finished.set(true);
        if let Some(active) = run.active.upgrade() {
            let mut active = active.borrow_mut();
            if active.get(&element).is_some_and(|handle| handle.id == run.id) {
                active.remove(&element);
            }
        }
        debug!(?element, end = run.task.end, "counter finished");
    }
}

pub struct CounterAnimator {
    dom: Rc<dyn Dom>,
    scheduler: Scheduler,
    active: Rc<ActiveMap>,
    next_id: Cell<u64>,
}

impl CounterAnimator {
    pub fn new(dom: Rc<dyn Dom>, scheduler: Scheduler) -> Self {
        Self {
            dom,
            scheduler,
            active: Rc::new(RefCell::new(HashMap::new())),
            next_id: Cell::new(0),
        }
    }

    /// Starts counting on the next animation frame, replacing any animation
    /// already running on the same element.
    pub fn animate(&self, task: AnimationTask) -> AnimationHandle {
        let element = task.element;
        let prior = self.active.borrow_mut().remove(&element);
        if let Some(prior) = prior {
            if prior.is_running() {
                debug!(?element, "replacing running counter");
            }
            prior.cancel();
        }

        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        let state = Rc::new(RunState {
            scheduler: self.scheduler.clone(),
            cancelled: Cell::new(false),
            finished: Cell::new(false),
            frame: Cell::new(None),
        });
        let handle = AnimationHandle {
            id,
            element,
            state: Rc::clone(&state),
        };

        let run = Rc::new(Run {
            id,
            task,
            started_at: self.scheduler.now(),
            dom: Rc::clone(&self.dom),
            state,
            active: Rc::downgrade(&self.active),
        });
        self.active.borrow_mut().insert(element, handle.clone());
        Run::schedule(run);
        handle
    }

    pub fn is_animating(&self, element: ElementId) -> bool {
        self.active
            .borrow()
            .get(&element)
            .is_some_and(AnimationHandle::is_running)
    }

    pub fn active_count(&self) -> usize {
        self.active
            .borrow()
            .values()
            .filter(|handle| handle.is_running())
            .count()
    }

    pub fn cancel(&self, element: ElementId) -> bool {
        let handle = self.active.borrow_mut().remove(&element);
        match handle {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        let handles: Vec<AnimationHandle> =
            self.active.borrow_mut().drain().map(|(_, h)| h).collect();
        for handle in handles {
            handle.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::MemoryDom;

    fn setup() -> (Rc<MemoryDom>, Scheduler, CounterAnimator, ElementId) {
        let dom = Rc::new(MemoryDom::default());
        let el = dom.element_with_id(dom.root(), "span", "patients-count");
        let scheduler = Scheduler::new();
        let animator = CounterAnimator::new(dom.clone(), scheduler.clone());
        (dom, scheduler, animator, el)
    }

    fn frames(dom: &MemoryDom, scheduler: &Scheduler, el: ElementId, limit: usize) -> Vec<String> {
        let mut seen = Vec::new();
        for _ in 0..limit {
            if scheduler.pending() == 0 {
                break;
            }
            scheduler.advance(scheduler.frame_interval());
            seen.push(dom.text(el));
        }
        seen
    }

    #[test]
    fn counts_up_to_end_without_going_backwards() {
        let (dom, scheduler, animator, el) = setup();
        let handle = animator.animate(AnimationTask::new(el, 0, 47, Duration::from_millis(2000)));

        let seen = frames(&dom, &scheduler, el, 500);
        let values: Vec<i64> = seen.iter().map(|text| text.parse().unwrap()).collect();

        assert_eq!(values.last(), Some(&47));
        assert!(values.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(!handle.is_running());
        assert!(dom.has_class(el, COUNTING_CLASS));
        assert_eq!(animator.active_count(), 0);
    }

    #[test]
    fn suffix_is_appended_every_frame() {
        let (dom, scheduler, animator, el) = setup();
        animator.animate(
            AnimationTask::new(el, 0, 96, Duration::from_millis(100)).with_suffix("%"),
        );
        let seen = frames(&dom, &scheduler, el, 100);
        assert!(seen.iter().all(|text| text.ends_with('%')));
        assert_eq!(seen.last().map(String::as_str), Some("96%"));
    }

    #[test]
    fn restarting_cancels_the_previous_run() {
        let (dom, scheduler, animator, el) = setup();
        let first = animator.animate(AnimationTask::new(el, 0, 1000, Duration::from_millis(2000)));
        scheduler.advance(Duration::from_millis(200));

        let second = animator.animate(AnimationTask::new(el, 500, 510, Duration::from_millis(100)));
        assert!(!first.is_running());
        assert!(second.is_running());

        scheduler.advance(Duration::from_secs(5));
        assert_eq!(dom.text(el), "510");
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn cancel_all_stops_every_counter() {
        let (dom, scheduler, animator, el) = setup();
        let other = dom.element(dom.root(), "span");
        animator.animate(AnimationTask::new(el, 0, 10, Duration::from_secs(1)));
        animator.animate(AnimationTask::new(other, 0, 10, Duration::from_secs(1)));
        assert_eq!(animator.active_count(), 2);

        animator.cancel_all();
        scheduler.advance(Duration::from_secs(2));
        assert_eq!(dom.text(el), "");
        assert!(!animator.is_animating(other));
    }

    #[test]
    fn counting_down_lands_on_end() {
        let (dom, scheduler, animator, el) = setup();
        animator.animate(AnimationTask::new(el, 49, 45, Duration::from_millis(1000)));
        scheduler.advance(Duration::from_secs(2));
        assert_eq!(dom.text(el), "45");
    }
}
