//! The bot event loop.

use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};
use trufa_core::channel::{Channel, InboundEvent};
use trufa_core::error::ChannelError;

use crate::dispatcher::Dispatcher;

/// Counters reported when the loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub messages: u64,
    pub callbacks: u64,
    pub channel_errors: u64,
}

/// Pulls events from a channel and feeds them to the dispatcher, one at a
/// time, each processed to completion before the next is read.
pub struct BotLoop {
    channel: Arc<dyn Channel>,
    dispatcher: Dispatcher,
}

impl BotLoop {
    pub fn new(channel: Arc<dyn Channel>, dispatcher: Dispatcher) -> Self {
        Self {
            channel,
            dispatcher,
        }
    }

    /// Run until the channel closes.
    pub async fn run(self) -> Result<LoopStats, ChannelError> {
        self.run_until(std::future::pending()).await
    }

    /// Run until the channel closes or `shutdown` resolves.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<LoopStats, ChannelError>
    where
        F: Future<Output = ()>,
    {
        let mut events = self.channel.start().await?;
        info!(channel = self.channel.name(), "Bot loop started");

        let mut stats = LoopStats::default();
        tokio::pin!(shutdown);

        loop {
            let next = tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                next = events.recv() => next,
            };

            match next {
                Some(Ok(event)) => {
                    match &event {
                        InboundEvent::Message(_) => stats.messages += 1,
                        InboundEvent::Callback(_) => stats.callbacks += 1,
                    }
                    self.dispatcher.handle_event(&event).await;
                }
                Some(Err(e)) => {
                    stats.channel_errors += 1;
                    warn!(channel = self.channel.name(), error = %e, "Channel error");
                }
                None => {
                    debug!("Event stream closed");
                    break;
                }
            }
        }

        self.channel.stop().await?;
        info!(
            messages = stats.messages,
            callbacks = stats.callbacks,
            channel_errors = stats.channel_errors,
            "Bot loop stopped"
        );
        Ok(stats)
    }
}
