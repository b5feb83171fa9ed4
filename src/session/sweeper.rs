//! Background task that resolves abandoned synchronous turns.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

use crate::engine::Engine;

/// Handle to a running sweeper. Dropping it leaves the task running.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stops the loop after the current sweep and waits for it.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Spawns the sweep loop on the current tokio runtime.
///
/// The first sweep runs immediately, later ones every `period`.
pub fn spawn_sweeper(engine: Arc<Engine>, period: Duration) -> SweeperHandle {
    let (shutdown, mut shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        info!("turn sweeper started, interval {:?}", period);
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let resolved = engine.sweep();
                    if resolved > 0 {
                        debug!("sweep resolved {} idle turns", resolved);
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("turn sweeper stopping");
                        break;
                    }
                }
            }
        }
    });

    SweeperHandle { shutdown, task }
}
