//! The periodic production clock.
//!
//! A single tokio task sleeps for the armed period and then invokes its tick
//! callback. Re-arming through [`ClockControl`] restarts the period from the
//! moment of the change; disarming parks the task until it is armed again.
//! The task ends when the callback returns `false` or the control is dropped.

use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Debug)]
pub struct ClockControl {
    period: watch::Sender<Option<Duration>>,
}

impl Default for ClockControl {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockControl {
    /// A disarmed clock.
    pub fn new() -> Self {
        let (period, _) = watch::channel(None);
        Self { period }
    }

    /// (Re)start the clock with `period`. A zero period disarms it.
    pub fn arm(&self, period: Duration) {
        let period = (!period.is_zero()).then_some(period);
        self.period.send_replace(period);
    }

    pub fn disarm(&self) {
        self.period.send_replace(None);
    }

    pub fn period(&self) -> Option<Duration> {
        *self.period.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Duration>> {
        self.period.subscribe()
    }
}

/// Run `on_tick` once per armed period until it returns `false` or the
/// control side is dropped. Must be called from within a tokio runtime.
pub fn spawn<F>(mut period: watch::Receiver<Option<Duration>>, mut on_tick: F) -> JoinHandle<()>
where
    F: FnMut() -> bool + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            let armed = *period.borrow_and_update();
            match armed {
                None => {
                    if period.changed().await.is_err() {
                        break;
                    }
                }
                Some(every) => {
                    tokio::select! {
                        _ = tokio::time::sleep(every) => {
                            if !on_tick() {
                                break;
                            }
                        }
                        changed = period.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                    }
                }
            }
        }
        tracing::debug!("station clock stopped");
    })
}
