use crate::domain::models::SessionEvent;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;

/// Launch countdown reporting ticks to session listeners.
///
/// `start(5, 1s)` publishes 5 right away, then 4, 3, 2, 1 and finally 0 one
/// period apart.
pub struct Countdown {
    events: broadcast::Sender<SessionEvent>,
    task: Option<JoinHandle<()>>,
}

impl Countdown {
    pub fn new(events: broadcast::Sender<SessionEvent>) -> Self {
        Self { events, task: None }
    }

    /// Start counting down, cancelling any countdown already running
    pub fn start(&mut self, from: u32, period: Duration) {
        self.stop();
        debug!("Countdown started from {}", from);

        let events = self.events.clone();
        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            for value in (0..=from).rev() {
                ticker.tick().await;
                let _ = events.send(SessionEvent::CountdownTick(value));
            }
        }));
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            if !task.is_finished() {
                debug!("Countdown stopped");
            }
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.stop();
    }
}
