use crate::handlers::Handlers;
use crate::types::Intent;
use interfaces::defs::InboundEvent;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Runs every intent of an event as its own task.
///
/// Tasks are independent: nothing orders them, and a failing task only
/// answers its own sender.
pub struct TaskLauncher {
    handlers: Arc<Handlers>,
    limiter: Option<Arc<Semaphore>>,
}

impl TaskLauncher {
    pub fn new(handlers: Arc<Handlers>, max_concurrent_tasks: Option<usize>) -> Self {
        Self {
            handlers,
            limiter: max_concurrent_tasks.map(|n| Arc::new(Semaphore::new(n))),
        }
    }

    /// Start one task per intent and return without waiting for them.
    pub fn dispatch(&self, event: &InboundEvent, intents: Vec<Intent>) -> Vec<JoinHandle<()>> {
        intents
            .into_iter()
            .map(|intent| self.launch(event.clone(), intent))
            .collect()
    }

    fn launch(&self, event: InboundEvent, intent: Intent) -> JoinHandle<()> {
        let handlers = self.handlers.clone();
        let limiter = self.limiter.clone();

        tokio::spawn(async move {
            let _permit = match limiter {
                Some(semaphore) => match semaphore.acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(_) => return,
                },
                None => None,
            };

            let kind = intent.kind();
            debug!("Running {} task for {} in {}", kind, event.sender, event.channel);

            if let Err(e) = handlers.handle(&event, intent).await {
                error!("{} task for {} in {} failed: {}", kind, event.sender, event.channel, e);
                if let Err(e) = handlers.report_failure(&event).await {
                    warn!("Could not report failure to {}: {}", event.sender, e);
                }
            }
        })
    }
}
