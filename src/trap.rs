//! Trap receiver: an engine surfacing inbound notifications.
//!
//! Binds UDP port 162 by default and delivers decoded v1 traps, v2c
//! traps, and informs through a bounded channel. Informs are not
//! acknowledged; retransmission handling is the sender's concern.

use std::net::SocketAddr;

use bytes::Bytes;
use tokio::sync::{mpsc, Mutex};

use crate::engine::stats::{StatKind, StatsBin};
use crate::engine::{Engine, EngineConfig, Role};
use crate::error::Result;
use crate::pdu::{Pdu, TrapV1Pdu};
use crate::version::Version;

/// Default trap receiver port.
const DEFAULT_TRAP_PORT: u16 = 162;

/// An unsolicited event delivered to a trap receiver.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Sender of the datagram.
    pub peer: SocketAddr,
    /// SNMP version of the enclosing message.
    pub version: Version,
    /// Community string of the enclosing message.
    pub community: Bytes,
    /// The notification body.
    pub kind: NotificationKind,
}

/// The notification PDU variants.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationKind {
    /// SNMPv1 trap.
    TrapV1(TrapV1Pdu),
    /// SNMPv2c trap.
    TrapV2(Pdu),
    /// SNMPv2c inform (delivered, not acknowledged).
    Inform(Pdu),
}

/// Builder for [`TrapReceiver`].
pub struct TrapReceiverBuilder {
    name: String,
    bind_addr: SocketAddr,
    queue_depth: usize,
    log_decode_errors: bool,
}

impl TrapReceiverBuilder {
    /// Create a builder bound to `0.0.0.0:162` with room for 100 queued
    /// notifications.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_TRAP_PORT)),
            queue_depth: 100,
            log_decode_errors: false,
        }
    }

    /// Set the UDP bind address (default `0.0.0.0:162`).
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Notification queue depth; the listener waits when the application
    /// falls behind.
    pub fn queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth;
        self
    }

    /// Log undecodable datagrams at debug level.
    pub fn log_decode_errors(mut self, enabled: bool) -> Self {
        self.log_decode_errors = enabled;
        self
    }

    /// Bind the socket and start the receiver.
    pub async fn build(self) -> Result<TrapReceiver> {
        let (tx, rx) = mpsc::channel(self.queue_depth.max(1));
        let config = EngineConfig {
            name: self.name,
            bind_addr: self.bind_addr,
            max_targets: self.queue_depth,
            log_decode_errors: self.log_decode_errors,
            ..EngineConfig::default()
        };
        let engine = Engine::start(config, Role::TrapReceiver(tx)).await?;
        Ok(TrapReceiver {
            engine,
            notifications: Mutex::new(rx),
        })
    }
}

/// An engine in trap-receiver role.
pub struct TrapReceiver {
    engine: Engine,
    notifications: Mutex<mpsc::Receiver<Notification>>,
}

impl TrapReceiver {
    /// Create a builder.
    pub fn builder(name: impl Into<String>) -> TrapReceiverBuilder {
        TrapReceiverBuilder::new(name)
    }

    /// The receiver's name, as used in log events.
    pub fn name(&self) -> &str {
        self.engine.name()
    }

    /// The bound local address.
    pub fn local_addr(&self) -> SocketAddr {
        self.engine.local_addr()
    }

    /// Wait for the next notification. Returns `None` after shutdown once
    /// the queue is drained.
    pub async fn recv(&self) -> Option<Notification> {
        self.notifications.lock().await.recv().await
    }

    /// Snapshot one statistic from a bin (0 = current, 1..=96 history).
    pub async fn get_stat(&self, kind: StatKind, bin: u8) -> Result<u64> {
        self.engine.get_stat(kind, bin).await
    }

    /// Snapshot a whole stats bin.
    pub async fn get_stats_bin(&self, bin: u8) -> Result<StatsBin> {
        self.engine.get_stats_bin(bin).await
    }

    /// Shut the receiver down. Idempotent.
    pub async fn shutdown(&self) {
        self.engine.shutdown().await;
    }
}
