//! The command-processing thread.
//!
//! The broker lives on one dedicated thread and receives everything
//! through a single queue: client requests, presence events and the
//! monitor timer's triggers. Each wake-up drains every queued message,
//! handling one to completion before starting the next, so PHY register
//! waits delay later requests but never interleave with them.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::broker::{Broker, Notification};
use crate::error::{Result, SfpdError};
use crate::monitor::{MonitorMessage, MonitorTimer};
use crate::platform::Platform;
use crate::state::PresenceEvent;

/// Everything the command thread acts on.
#[derive(Debug)]
pub enum BrokerMessage {
    /// A request and where its single reply goes
    Command {
        request: Value,
        reply: oneshot::Sender<Value>,
    },
    Presence(PresenceEvent),
    Shutdown,
}

/// Cloneable access to a running broker.
#[derive(Debug, Clone)]
pub struct BrokerHandle {
    commands: mpsc::UnboundedSender<BrokerMessage>,
    notifications: broadcast::Sender<Notification>,
    monitor: broadcast::Sender<MonitorMessage>,
}

impl BrokerHandle {
    /// Sends a request and waits for its reply.
    pub async fn request(&self, request: Value) -> Result<Value> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(BrokerMessage::Command { request, reply })
            .map_err(|_| SfpdError::Stopped)?;
        response.await.map_err(|_| SfpdError::Stopped)
    }

    /// Queues a presence event.
    pub fn presence(&self, event: PresenceEvent) -> Result<()> {
        self.commands
            .send(BrokerMessage::Presence(event))
            .map_err(|_| SfpdError::Stopped)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    pub fn subscribe_monitor(&self) -> broadcast::Receiver<MonitorMessage> {
        self.monitor.subscribe()
    }

    /// Asks the command thread to exit after the messages already queued.
    pub fn shutdown(&self) {
        let _ = self.commands.send(BrokerMessage::Shutdown);
    }
}

/// A broker running on its own thread.
#[derive(Debug)]
pub struct BrokerService {
    handle: BrokerHandle,
    thread: JoinHandle<()>,
}

impl BrokerService {
    /// Moves `broker` onto the command thread.
    ///
    /// The monitor timer runs on `runtime` and starts at `monitor_interval`
    /// (zero leaves it stopped).
    pub fn spawn<P>(mut broker: Broker<P>, runtime: Handle, monitor_interval: Duration) -> Result<Self>
    where
        P: Platform + Send + 'static,
    {
        let (commands, queue) = mpsc::unbounded_channel();

        let mut timer = MonitorTimer::new(runtime, commands.downgrade());
        timer.set_interval(monitor_interval);
        broker.set_timer(timer);

        let handle = BrokerHandle {
            commands,
            notifications: broker.notification_sender(),
            monitor: broker.monitor_sender(),
        };

        let thread = thread::Builder::new()
            .name("sfpd-cmd".to_string())
            .spawn(move || command_loop(broker, queue))?;

        Ok(Self { handle, thread })
    }

    pub fn handle(&self) -> BrokerHandle {
        self.handle.clone()
    }

    /// Stops the command thread and waits for it.
    pub fn shutdown(self) {
        self.handle.shutdown();
        if self.thread.join().is_err() {
            warn!("command thread panicked");
        }
    }
}

fn command_loop<P: Platform>(mut broker: Broker<P>, mut queue: mpsc::UnboundedReceiver<BrokerMessage>) {
    info!("command loop started");

    while let Some(first) = queue.blocking_recv() {
        let mut next = Some(first);
        while let Some(message) = next.take() {
            match message {
                BrokerMessage::Command { request, reply } => {
                    let response = broker.handle_request(&request);
                    if reply.send(response).is_err() {
                        debug!("requester went away before the reply");
                    }
                }
                BrokerMessage::Presence(event) => {
                    if let Err(e) = broker.on_presence_change(event) {
                        warn!(error = %e, "presence event rejected");
                    }
                }
                BrokerMessage::Shutdown => {
                    info!("command loop stopping");
                    return;
                }
            }
            next = queue.try_recv().ok();
        }
    }

    info!("command queue closed");
}
