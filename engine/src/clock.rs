use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Named period of the in-game day, derived from the hour counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Midnight,
    LateNight,
    Dawn,
    Morning,
    Afternoon,
    Dusk,
    Evening,
    Night,
}

/// Maps an hour (0-23) to its named period.
pub fn period_for_hour(hour: u32) -> Period {
    match hour % 24 {
        0 => Period::Midnight,
        1..=4 => Period::LateNight,
        5..=6 => Period::Dawn,
        7..=11 => Period::Morning,
        12..=16 => Period::Afternoon,
        17..=18 => Period::Dusk,
        19..=21 => Period::Evening,
        _ => Period::Night,
    }
}

/// A single goroutine-equivalent that increments a 0-23 hour counter every
/// wall-clock interval and fans the new value out to subscribers. A full
/// subscriber receiver drops that tick rather than blocking the clock.
pub struct GameClock {
    hour: AtomicU32,
    subscribers: Arc<DashMap<u64, mpsc::Sender<u32>>>,
    next_subscriber_id: AtomicU32,
    stopped: Arc<AtomicBool>,
    handle: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl GameClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            hour: AtomicU32::new(0),
            subscribers: Arc::new(DashMap::new()),
            next_subscriber_id: AtomicU32::new(0),
            stopped: Arc::new(AtomicBool::new(false)),
            handle: std::sync::Mutex::new(None),
        })
    }

    pub fn current_hour(&self) -> u32 {
        self.hour.load(Ordering::SeqCst)
    }

    pub fn current_period(&self) -> Period {
        period_for_hour(self.current_hour())
    }

    /// Subscribes a new receiver, returning its id (for later
    /// unsubscription) and the receiving end. Capacity 1: subscribers only
    /// care about the latest tick, not a backlog of missed hours.
    pub fn subscribe(self: &Arc<Self>) -> (u64, mpsc::Receiver<u32>) {
        let (tx, rx) = mpsc::channel(1);
        let id = self.next_subscriber_id.fetch_add(1, Ordering::SeqCst) as u64;
        self.subscribers.insert(id, tx);
        (id, rx)
    }

    pub fn unsubscribe(&self, id: u64) {
        self.subscribers.remove(&id);
    }

    /// Launches the tick loop and returns an idempotent stop function.
    pub fn start(self: &Arc<Self>, tick_interval: Duration) {
        let mut guard = self.handle.lock().expect("clock handle lock");
        if guard.is_some() {
            return;
        }
        let clock = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick_interval);
            loop {
                interval.tick().await;
                if clock.stopped.load(Ordering::SeqCst) {
                    break;
                }
                let prev = clock
                    .hour
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |h| Some((h + 1) % 24))
                    .expect("closure always returns Some");
                let new_hour = (prev + 1) % 24;
                debug!(hour = new_hour, "game clock ticked");
                for entry in clock.subscribers.iter() {
                    if entry.value().try_send(new_hour).is_err() {
                        warn!(subscriber = entry.key(), "game clock subscriber full, dropping tick");
                    }
                }
            }
        });
        *guard = Some(handle);
    }

    /// Idempotent stop: safe to call multiple times or before `start`.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.lock().expect("clock handle lock").take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_mapping_covers_all_named_periods() {
        assert_eq!(period_for_hour(0), Period::Midnight);
        assert_eq!(period_for_hour(3), Period::LateNight);
        assert_eq!(period_for_hour(5), Period::Dawn);
        assert_eq!(period_for_hour(9), Period::Morning);
        assert_eq!(period_for_hour(14), Period::Afternoon);
        assert_eq!(period_for_hour(17), Period::Dusk);
        assert_eq!(period_for_hour(20), Period::Evening);
        assert_eq!(period_for_hour(23), Period::Night);
    }

    #[tokio::test]
    async fn start_increments_hour_and_notifies_subscribers() {
        let clock = GameClock::new();
        let (_, mut rx) = clock.subscribe();
        clock.start(Duration::from_millis(5));
        let hour = tokio::time::timeout(Duration::from_millis(200), rx.recv())
            .await
            .expect("should receive a tick")
            .unwrap();
        assert_eq!(hour, 1);
        clock.stop();
    }

    #[test]
    fn stop_before_start_does_not_panic() {
        let clock = GameClock::new();
        clock.stop();
        clock.stop();
    }
}
