use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::controller::AgentController;

const ENABLE_LOGS: bool = true;
use crate::{log_debug, log_info};

/// Running context poll loop.
pub(crate) struct PollerHandle {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

impl PollerHandle {
    pub(crate) fn spawn(controller: AgentController) -> Self {
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(context_loop(controller, cancel_token.clone()));
        Self {
            handle,
            cancel_token,
        }
    }

    pub(crate) async fn stop(self) -> Result<()> {
        self.cancel_token.cancel();
        self.handle
            .await
            .context("context poll loop failed to join")
    }
}

async fn context_loop(controller: AgentController, cancel_token: CancellationToken) {
    let mut ticker = tokio::time::interval(controller.config().poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut tick: u64 = 0;

    log_info!(
        "context polling started every {}ms",
        controller.config().poll_interval().as_millis()
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                tick = tick.wrapping_add(1);
                controller.poll_once(tick).await;
            }
            _ = cancel_token.cancelled() => {
                log_info!("context poll loop shutting down after {tick} ticks");
                break;
            }
        }
    }
    log_debug!("context poll loop exited");
}
