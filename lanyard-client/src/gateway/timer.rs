//! Cancellable timers that report back to the event loop.
//!
//! A timer is a spawned task that posts an event carrying the timer's id.
//! Dropping the [`Timer`] aborts the task, but an event it already queued can
//! still arrive, so the loop compares the id against the timer it currently
//! holds before acting.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};

pub(crate) struct Timer {
    id: u64,
    task: JoinHandle<()>,
}

impl Timer {
    /// Post `event` once after `delay`.
    pub fn once<E: Send + 'static>(
        id: u64,
        delay: Duration,
        events: mpsc::UnboundedSender<E>,
        event: E,
    ) -> Self {
        let task = tokio::spawn(async move {
            sleep(delay).await;
            let _ = events.send(event);
        });
        Self { id, task }
    }

    /// Post `make()` every `period`, first after one full period.
    pub fn repeating<E, F>(id: u64, period: Duration, events: mpsc::UnboundedSender<E>, make: F) -> Self
    where
        E: Send + 'static,
        F: Fn() -> E + Send + 'static,
    {
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if events.send(make()).is_err() {
                    break;
                }
            }
        });
        Self { id, task }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Whether `slot` holds the timer with `id`.
pub(crate) fn is_current(slot: &Option<Timer>, id: u64) -> bool {
    slot.as_ref().is_some_and(|timer| timer.id() == id)
}
