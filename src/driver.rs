use crate::scheduler::Scheduler;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

/// Sleeps until each pending deadline within `span` and advances the scheduler
/// to it. Returns the number of callbacks run.
pub async fn run_for(scheduler: &Scheduler, span: Duration) -> usize {
    let origin = Instant::now();
    let base = scheduler.now();
    let end = base + span;
    let mut ran = 0;

    while let Some(at) = scheduler.next_event_at() {
        if at > end {
            break;
        }
        sleep_until(origin + at.saturating_sub(base)).await;
        ran += scheduler.advance_to(at);
    }

    sleep_until(origin + span).await;
    ran += scheduler.advance_to(end);
    debug!(ran, ?span, "event loop slice finished");
    ran
}

pub fn block_on_for(scheduler: &Scheduler, span: Duration) -> std::io::Result<usize> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    Ok(runtime.block_on(run_for(scheduler, span)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[tokio::test(start_paused = true)]
    async fn callbacks_fire_at_their_wall_clock_offsets() {
        let scheduler = Scheduler::new();
        let started = Instant::now();
        let seen = Rc::new(RefCell::new(Vec::new()));
        for delay in [300u64, 100] {
            let seen = Rc::clone(&seen);
            scheduler.set_timeout(Duration::from_millis(delay), move || {
                seen.borrow_mut().push(Instant::now() - started);
            });
        }

        let ran = run_for(&scheduler, Duration::from_secs(1)).await;

        assert_eq!(ran, 2);
        assert_eq!(
            *seen.borrow(),
            vec![Duration::from_millis(100), Duration::from_millis(300)]
        );
        assert_eq!(scheduler.now(), Duration::from_secs(1));
        assert!(Instant::now() - started >= Duration::from_secs(1));
    }

    #[test]
    fn block_on_for_runs_due_callbacks_on_its_own_runtime() {
        let scheduler = Scheduler::new();
        let fired = Rc::new(RefCell::new(Vec::new()));
        for delay in [10u64, 500] {
            let fired = Rc::clone(&fired);
            scheduler.set_timeout(Duration::from_millis(delay), move || {
                fired.borrow_mut().push(delay);
            });
        }

        let ran = block_on_for(&scheduler, Duration::from_millis(40)).unwrap();

        assert_eq!(ran, 1);
        assert_eq!(*fired.borrow(), vec![10]);
        assert_eq!(scheduler.now(), Duration::from_millis(40));
        assert_eq!(scheduler.pending(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn events_beyond_the_slice_stay_pending() {
        let scheduler = Scheduler::new();
        scheduler.set_timeout(Duration::from_secs(5), || {});
        assert_eq!(run_for(&scheduler, Duration::from_secs(1)).await, 0);
        assert_eq!(scheduler.pending(), 1);
    }
}
