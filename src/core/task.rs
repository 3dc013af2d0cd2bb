//! Background polling task lifecycle.
//!
//! Every sampler owns one `PollTask`: a dedicated OS thread hosting a
//! current-thread Tokio runtime that drives a fixed-interval ticker until the
//! task is stopped.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::error::Result;

/// Handle to a running polling thread.
///
/// Dropping the handle stops the thread and waits for it to exit.
pub struct PollTask {
    name: String,
    shutdown_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl PollTask {
    /// Spawn a thread that calls `tick` once per `period`, starting one period
    /// after this call.
    pub fn start<F>(name: &str, period: Duration, tick: F) -> Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let thread_name = name.to_string();

        let handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        log::error!("{}: failed to build runtime: {}", thread_name, e);
                        return;
                    }
                };

                runtime.block_on(run_ticker(period, shutdown_rx, tick));
                log::debug!("{} stopped", thread_name);
            })?;

        log::debug!("{} started ({:?} interval)", name, period);

        Ok(Self {
            name: name.to_string(),
            shutdown_tx,
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Signal the ticker to exit and join the thread.
    pub fn stop(&mut self) {
        // send() only fails when the loop already exited
        let _ = self.shutdown_tx.send(true);

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("{} panicked", self.name);
            }
        }
    }
}

impl Drop for PollTask {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Call `tick` every `period` until `shutdown` flips to `true` or its sender
/// is dropped. The first tick fires one full period after the call.
pub async fn run_ticker<F>(period: Duration, mut shutdown: watch::Receiver<bool>, mut tick: F)
where
    F: FnMut(),
{
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                tick();
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}
