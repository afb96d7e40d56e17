//! Monitor snapshots and the timer that requests them.
//!
//! # Frame format
//!
//! All integers big-endian:
//!
//! ```text
//! "SFPM" | version u8 | count u16 | entry * count
//! entry: name_len u8 | name | port_type u8 | offset u16 | length u16 | data
//! ```
//!
//! # Timer
//!
//! [`MonitorTimer`] never touches broker state. Each tick it enqueues an
//! `SFPMONITORTRIGGER` command on the broker's command channel, exactly as
//! an external client would, and the pass runs on the command thread.

use std::io::{Cursor, Read, Write};
use std::time::Duration;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use serde_json::json;
use sfp_eeprom::PortType;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::{Result, SfpdError};
use crate::service::BrokerMessage;

/// Frame magic.
pub const FRAME_MAGIC: &[u8; 4] = b"SFPM";
/// Frame format version.
pub const FRAME_VERSION: u8 = 1;
/// Topic carried alongside each frame.
pub const MONITOR_TOPIC: &str = "sfpmonitor";

/// Raw EEPROM window of one port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorEntry {
    pub name: String,
    pub port_type: PortType,
    pub offset: u16,
    pub data: Vec<u8>,
}

/// One monitoring pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorFrame {
    pub entries: Vec<MonitorEntry>,
}

impl MonitorFrame {
    pub fn encode(&self) -> Result<Vec<u8>> {
        let count = u16::try_from(self.entries.len())
            .map_err(|_| SfpdError::Frame(format!("{} entries", self.entries.len())))?;

        let mut out = Vec::new();
        out.write_all(FRAME_MAGIC)?;
        out.write_u8(FRAME_VERSION)?;
        out.write_u16::<BigEndian>(count)?;

        for entry in &self.entries {
            let name_len = u8::try_from(entry.name.len())
                .map_err(|_| SfpdError::Frame(format!("port name {} too long", entry.name)))?;
            let length = u16::try_from(entry.data.len())
                .map_err(|_| SfpdError::Frame(format!("{} bytes for {}", entry.data.len(), entry.name)))?;

            out.write_u8(name_len)?;
            out.write_all(entry.name.as_bytes())?;
            out.write_u8(entry.port_type.code())?;
            out.write_u16::<BigEndian>(entry.offset)?;
            out.write_u16::<BigEndian>(length)?;
            out.write_all(&entry.data)?;
        }

        Ok(out)
    }

    pub fn decode(payload: &[u8]) -> Result<Self> {
        Self::read_from(&mut Cursor::new(payload)).map_err(|e| match e {
            SfpdError::Io(io) => SfpdError::Frame(format!("truncated frame: {io}")),
            other => other,
        })
    }

    fn read_from(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        let mut magic = [0u8; 4];
        cursor.read_exact(&mut magic)?;
        if &magic != FRAME_MAGIC {
            return Err(SfpdError::Frame("bad magic".to_string()));
        }

        let version = cursor.read_u8()?;
        if version != FRAME_VERSION {
            return Err(SfpdError::Frame(format!("unsupported version {version}")));
        }

        let count = cursor.read_u16::<BigEndian>()?;
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let mut name = vec![0u8; cursor.read_u8()? as usize];
            cursor.read_exact(&mut name)?;
            let name = String::from_utf8(name)
                .map_err(|_| SfpdError::Frame("port name is not UTF-8".to_string()))?;

            let code = cursor.read_u8()?;
            let port_type = PortType::from_code(code)
                .ok_or_else(|| SfpdError::Frame(format!("unknown port type {code}")))?;

            let offset = cursor.read_u16::<BigEndian>()?;
            let mut data = vec![0u8; cursor.read_u16::<BigEndian>()? as usize];
            cursor.read_exact(&mut data)?;

            entries.push(MonitorEntry {
                name,
                port_type,
                offset,
                data,
            });
        }

        Ok(Self { entries })
    }
}

/// Message on the monitor channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorMessage {
    pub topic: &'static str,
    pub payload: Vec<u8>,
}

impl MonitorMessage {
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            topic: MONITOR_TOPIC,
            payload,
        }
    }
}

/// Periodic monitor trigger.
///
/// At most one tick task exists. A nonzero interval starts it or retimes
/// it in place; zero stops it.
#[derive(Debug)]
pub struct MonitorTimer {
    runtime: Handle,
    commands: mpsc::WeakUnboundedSender<BrokerMessage>,
    running: Option<(JoinHandle<()>, watch::Sender<Duration>)>,
}

impl MonitorTimer {
    /// Creates a stopped timer that will enqueue on `commands`.
    pub fn new(runtime: Handle, commands: mpsc::WeakUnboundedSender<BrokerMessage>) -> Self {
        Self {
            runtime,
            commands,
            running: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|(task, _)| !task.is_finished())
    }

    pub fn interval(&self) -> Option<Duration> {
        self.running.as_ref().map(|(_, period)| *period.borrow())
    }

    pub fn set_interval(&mut self, interval: Duration) {
        if interval.is_zero() {
            if let Some((task, _)) = self.running.take() {
                task.abort();
                info!("monitor timer stopped");
            }
            return;
        }

        if let Some((task, period)) = &self.running {
            if !task.is_finished() {
                period.send_replace(interval);
                info!(interval_ms = interval.as_millis() as u64, "monitor timer retimed");
                return;
            }
        }

        let (period_tx, period_rx) = watch::channel(interval);
        let task = self.runtime.spawn(run_timer(self.commands.clone(), period_rx));
        self.running = Some((task, period_tx));
        info!(interval_ms = interval.as_millis() as u64, "monitor timer started");
    }
}

impl Drop for MonitorTimer {
    fn drop(&mut self) {
        if let Some((task, _)) = self.running.take() {
            task.abort();
        }
    }
}

fn ticker(period: Duration) -> time::Interval {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

async fn run_timer(
    commands: mpsc::WeakUnboundedSender<BrokerMessage>,
    mut period: watch::Receiver<Duration>,
) {
    let mut ticks = ticker(*period.borrow_and_update());

    loop {
        tokio::select! {
            _ = ticks.tick() => {
                let Some(sender) = commands.upgrade() else {
                    debug!("broker gone, monitor timer exiting");
                    return;
                };

                let (reply_tx, reply_rx) = oneshot::channel();
                let message = BrokerMessage::Command {
                    request: json!({"command": "SFPMONITORTRIGGER"}),
                    reply: reply_tx,
                };
                if sender.send(message).is_err() {
                    return;
                }
                drop(sender);

                // The pass runs on the command thread; the timer keeps ticking.
                tokio::spawn(async move {
                    if let Ok(reply) = reply_rx.await {
                        if reply["result"] != "OK" {
                            warn!(%reply, "monitor pass failed");
                        }
                    }
                });
            }
            changed = period.changed() => {
                if changed.is_err() {
                    return;
                }
                ticks = ticker(*period.borrow_and_update());
            }
        }
    }
}
