use std::time::Duration;

use chrono::{DateTime, Local, Timelike};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// Greeting for an hour of the day (0-23).
pub fn greeting_for(hour: u32) -> &'static str {
    match hour {
        0..=11 => "Good Morning",
        12..=17 => "Good Afternoon",
        _ => "Good Evening",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClockReading {
    pub now: DateTime<Local>,
    pub greeting: &'static str,
}

impl ClockReading {
    pub fn at(now: DateTime<Local>) -> Self {
        ClockReading {
            greeting: greeting_for(now.hour()),
            now,
        }
    }
}

/// Refreshes the displayed time and greeting on a fixed interval.
///
/// The refresh task lives exactly as long as the ticker: `stop` or drop aborts it.
pub struct ClockTicker {
    readings: watch::Receiver<ClockReading>,
    task: Option<JoinHandle<()>>,
}

impl ClockTicker {
    /// Must be called from within a tokio runtime.
    pub fn start(period: Duration) -> Self {
        let (tx, readings) = watch::channel(ClockReading::at(Local::now()));
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick completes immediately; the initial reading is already set.
            interval.tick().await;
            loop {
                interval.tick().await;
                tx.send_replace(ClockReading::at(Local::now()));
            }
        });
        debug!(period_ms = period.as_millis() as u64, "Clock ticker started");
        ClockTicker {
            readings,
            task: Some(task),
        }
    }

    pub fn current(&self) -> ClockReading {
        self.readings.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<ClockReading> {
        self.readings.clone()
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Clock ticker stopped");
        }
    }
}

impl Drop for ClockTicker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[test]
    fn greeting_boundaries() {
        assert_eq!(greeting_for(0), "Good Morning");
        assert_eq!(greeting_for(11), "Good Morning");
        assert_eq!(greeting_for(12), "Good Afternoon");
        assert_eq!(greeting_for(17), "Good Afternoon");
        assert_eq!(greeting_for(18), "Good Evening");
        assert_eq!(greeting_for(23), "Good Evening");
    }

    #[tokio::test]
    async fn ticker_publishes_until_stopped() {
        let mut ticker = ClockTicker::start(Duration::from_millis(10));
        let mut rx = ticker.watch();
        timeout(Duration::from_secs(2), rx.changed())
            .await
            .expect("no tick")
            .unwrap();
        assert_eq!(
            ticker.current().greeting,
            greeting_for(ticker.current().now.hour())
        );

        ticker.stop();
        ticker.stop();
        // The sender is dropped with the aborted task.
        let closed = timeout(Duration::from_secs(2), async {
            while rx.changed().await.is_ok() {}
        })
        .await;
        assert!(closed.is_ok());
    }
}
