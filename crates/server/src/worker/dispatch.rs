//! The single event queue feeding lifecycle transitions and control messages.
//!
//! Each event runs as its own task tracked by the dispatcher, so a disable
//! can land while an earlier enable is still precaching. An event counts as
//! complete when its task finishes; submitters may await that through the
//! returned receiver. When every handle is dropped the dispatcher waits for
//! outstanding tasks before exiting.

use std::sync::Arc;

use lantern_core::ControlMessage;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};

use super::WorkerContext;
use super::control::ControlChannel;
use super::lifecycle::Lifecycle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Install,
    Activate,
    Control(ControlMessage),
}

struct Envelope {
    event: Event,
    done: oneshot::Sender<()>,
}

/// Sending side of the event queue.
#[derive(Clone)]
pub struct DispatchHandle {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl DispatchHandle {
    /// Queue an event. The receiver resolves once its handler has finished;
    /// it errors if the dispatcher is gone.
    pub fn submit(&self, event: Event) -> oneshot::Receiver<()> {
        let (done, rx) = oneshot::channel();
        if self.tx.send(Envelope { event, done }).is_err() {
            tracing::warn!("dispatcher stopped, event dropped");
        }
        rx
    }

    /// Decode and queue a raw control message.
    ///
    /// Returns `None` for malformed input, which is dropped.
    pub fn submit_raw(&self, raw: &str) -> Option<oneshot::Receiver<()>> {
        ControlMessage::parse(raw).map(|message| self.submit(Event::Control(message)))
    }
}

/// Start the dispatcher task.
pub fn spawn(ctx: Arc<WorkerContext>) -> (DispatchHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let lifecycle = Lifecycle::new(ctx.clone());
    let control = ControlChannel::new(ctx);
    let task = tokio::spawn(run(rx, lifecycle, control));
    (DispatchHandle { tx }, task)
}

async fn run(mut rx: mpsc::UnboundedReceiver<Envelope>, lifecycle: Lifecycle, control: ControlChannel) {
    let mut tasks = JoinSet::new();

    loop {
        tokio::select! {
            envelope = rx.recv() => {
                let Some(Envelope { event, done }) = envelope else { break };
                tracing::debug!(?event, "dispatching");
                let lifecycle = lifecycle.clone();
                let control = control.clone();
                tasks.spawn(async move {
                    match event {
                        Event::Install => lifecycle.install().await,
                        Event::Activate => lifecycle.activate().await,
                        Event::Control(message) => control.dispatch(message).await,
                    }
                    let _ = done.send(());
                });
            }
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    tracing::error!(error = %e, "event handler panicked");
                }
            }
        }
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            tracing::error!(error = %e, "event handler panicked");
        }
    }
    tracing::debug!("dispatcher stopped");
}
