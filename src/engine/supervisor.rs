//! Socket workers and their supervisor.
//!
//! Each engine incarnation runs two workers over one UDP socket: the
//! listener (receive, decode, dispatch) and the outbound writer (encode,
//! send). The supervisor watches both; when one dies outside of shutdown
//! it stops the other, waits out a rate limit, rebinds the socket, and
//! restarts the pair. The outbound queue receiver survives restarts
//! because the writer task hands it back when it exits.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::stats::{StatKind, StatsHandle};
use super::{bind_udp_socket, Dispatch, OutboundMessage};
use crate::ber::EncoderFactory;
use crate::engine::tracker::TrackerEvent;
use crate::message::Message;
use crate::pdu::PduType;
use crate::trap::{Notification, NotificationKind};

pub(crate) struct SupervisorArgs {
    pub name: String,
    pub bind_addr: SocketAddr,
    pub socket: Arc<UdpSocket>,
    pub outbound_rx: mpsc::Receiver<OutboundMessage>,
    pub dispatch: Dispatch,
    pub stats: StatsHandle,
    pub encoder_factory: EncoderFactory,
    pub cancel: CancellationToken,
    pub done: CancellationToken,
    pub restart_delay: Duration,
    pub log_decode_errors: bool,
    pub max_datagram_size: usize,
}

/// Spawn the supervisor task owning the socket worker pair.
pub(crate) fn spawn_supervisor(args: SupervisorArgs) {
    tokio::spawn(supervise(args));
}

async fn supervise(args: SupervisorArgs) {
    let SupervisorArgs {
        name,
        bind_addr,
        socket,
        outbound_rx,
        dispatch,
        stats,
        encoder_factory,
        cancel,
        done,
        restart_delay,
        log_decode_errors,
        max_datagram_size,
    } = args;

    let mut socket = Some(socket);
    let mut outbound_rx = outbound_rx;
    let mut last_start = Instant::now();

    loop {
        let sock = match socket.take() {
            Some(sock) => sock,
            None => {
                match rebind(&name, bind_addr, restart_delay, &cancel, &mut last_start).await {
                    Some(sock) => sock,
                    None => {
                        // Shutdown requested while waiting to rebind.
                        done.cancel();
                        return;
                    }
                }
            }
        };

        let incarnation = CancellationToken::new();
        let mut listener = tokio::spawn(listener_task(
            name.clone(),
            Arc::clone(&sock),
            dispatch.clone(),
            stats.clone(),
            incarnation.clone(),
            log_decode_errors,
            max_datagram_size,
        ));
        let mut writer = tokio::spawn(writer_task(
            name.clone(),
            Arc::clone(&sock),
            outbound_rx,
            encoder_factory.clone(),
            stats.clone(),
            incarnation.clone(),
        ));

        enum Exit {
            Shutdown,
            ListenerDied,
            WriterDied(std::result::Result<mpsc::Receiver<OutboundMessage>, tokio::task::JoinError>),
        }

        let exit = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(target: "snmp_engine::engine", engine = %name, "shutdown requested");
                Exit::Shutdown
            }
            _ = &mut listener => Exit::ListenerDied,
            result = &mut writer => Exit::WriterDied(result),
        };

        // Stop whichever side is still running, then collect the queue
        // receiver for the next incarnation. A join handle that already
        // completed inside the select must not be awaited again.
        incarnation.cancel();
        let (shutting_down, writer_result) = match exit {
            Exit::Shutdown => {
                let _ = listener.await;
                (true, writer.await)
            }
            Exit::ListenerDied => (false, writer.await),
            Exit::WriterDied(result) => {
                let _ = listener.await;
                (false, result)
            }
        };
        outbound_rx = match writer_result {
            Ok(rx) => rx,
            Err(join_error) => {
                tracing::error!(
                    target: "snmp_engine::engine",
                    engine = %name,
                    error = %join_error,
                    "outbound writer task failed; engine cannot continue"
                );
                done.cancel();
                return;
            }
        };
        drop(sock);

        if shutting_down {
            tracing::debug!(target: "snmp_engine::engine", engine = %name, "shutdown complete");
            done.cancel();
            return;
        }
        // Fall through to the rebind path with rate limiting.
    }
}

/// Wait out the restart rate limit and rebind the socket. Returns `None`
/// when shutdown is requested first.
async fn rebind(
    name: &str,
    bind_addr: SocketAddr,
    restart_delay: Duration,
    cancel: &CancellationToken,
    last_start: &mut Instant,
) -> Option<Arc<UdpSocket>> {
    loop {
        let wait = restart_delay.saturating_sub(last_start.elapsed());
        tracing::debug!(
            target: "snmp_engine::engine",
            engine = %name,
            wait_secs = wait.as_secs(),
            "scheduling worker restart"
        );
        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(wait) => {}
        }

        *last_start = Instant::now();
        match bind_udp_socket(bind_addr) {
            Ok(sock) => {
                tracing::info!(
                    target: "snmp_engine::engine",
                    engine = %name,
                    addr = %bind_addr,
                    "workers restarted"
                );
                return Some(Arc::new(sock));
            }
            Err(error) => {
                tracing::error!(
                    target: "snmp_engine::engine",
                    engine = %name,
                    addr = %bind_addr,
                    %error,
                    "rebind failed, will retry"
                );
            }
        }
    }
}

async fn listener_task(
    name: String,
    socket: Arc<UdpSocket>,
    dispatch: Dispatch,
    stats: StatsHandle,
    cancel: CancellationToken,
    log_decode_errors: bool,
    max_datagram_size: usize,
) {
    tracing::debug!(target: "snmp_engine::engine", engine = %name, "listener initializing");
    let mut buf = vec![0u8; max_datagram_size];

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(target: "snmp_engine::engine", engine = %name, "listener shutting down");
                stats.increment(StatKind::InboundConnectionClose).await;
                return;
            }
            result = socket.recv_from(&mut buf) => match result {
                Ok((len, peer)) => {
                    stats.increment(StatKind::InboundMessagesReceived).await;
                    let data = Bytes::copy_from_slice(&buf[..len]);
                    dispatch_datagram(&name, data, peer, &dispatch, &stats, log_decode_errors).await;
                }
                Err(error) => {
                    tracing::error!(
                        target: "snmp_engine::engine",
                        engine = %name,
                        %error,
                        "UDP read failed, listener exiting"
                    );
                    stats.increment(StatKind::InboundConnectionDeath).await;
                    return;
                }
            }
        }
    }
}

/// Decode one datagram and route it by PDU type. Undecodable input is
/// counted and dropped; it never terminates the listener.
async fn dispatch_datagram(
    name: &str,
    data: Bytes,
    peer: SocketAddr,
    dispatch: &Dispatch,
    stats: &StatsHandle,
    log_decode_errors: bool,
) {
    let message = match Message::decode(data.clone()) {
        Ok(message) => message,
        Err(error) => {
            stats
                .increment(StatKind::UndecodableMessagesReceived)
                .await;
            if log_decode_errors {
                tracing::debug!(
                    target: "snmp_engine::engine",
                    engine = %name,
                    %peer,
                    %error,
                    raw = ?data,
                    "undecodable datagram dropped"
                );
            }
            return;
        }
    };

    match message {
        Message::Community(msg) => match msg.pdu.pdu_type {
            PduType::GetRequest
            | PduType::GetNextRequest
            | PduType::GetBulkRequest
            | PduType::SetRequest => {
                let kind = match msg.pdu.pdu_type {
                    PduType::GetRequest => StatKind::GetRequestsReceived,
                    PduType::GetNextRequest => StatKind::GetNextRequestsReceived,
                    PduType::GetBulkRequest => StatKind::GetBulkRequestsReceived,
                    _ => StatKind::SetRequestsReceived,
                };
                stats.increment(kind).await;
                if let Dispatch::Agent { processor } = dispatch {
                    Arc::clone(processor).process(msg, peer).await;
                } else {
                    tracing::debug!(
                        target: "snmp_engine::engine",
                        engine = %name,
                        %peer,
                        pdu = %msg.pdu.pdu_type,
                        "request received outside agent role, dropped"
                    );
                }
            }
            PduType::Response => {
                stats.increment(StatKind::GetResponsesReceived).await;
                if let Dispatch::Client { tracker } = dispatch {
                    let _ = tracker.send(TrackerEvent::Response(msg.pdu)).await;
                } else {
                    tracing::debug!(
                        target: "snmp_engine::engine",
                        engine = %name,
                        %peer,
                        "response received outside client role, dropped"
                    );
                }
            }
            PduType::TrapV2 | PduType::InformRequest => {
                if let Dispatch::TrapReceiver { notifications } = dispatch {
                    let kind = if msg.pdu.pdu_type == PduType::TrapV2 {
                        NotificationKind::TrapV2(msg.pdu)
                    } else {
                        NotificationKind::Inform(msg.pdu)
                    };
                    let _ = notifications
                        .send(Notification {
                            peer,
                            version: msg.version,
                            community: msg.community,
                            kind,
                        })
                        .await;
                }
            }
            PduType::Report => {
                tracing::debug!(
                    target: "snmp_engine::engine",
                    engine = %name,
                    %peer,
                    "REPORT PDU dropped"
                );
            }
            // Message::decode routes 0xA4 to the TrapV1 variant.
            PduType::TrapV1 => unreachable!("v1 traps decode as Message::TrapV1"),
        },
        Message::TrapV1(msg) => {
            if let Dispatch::TrapReceiver { notifications } = dispatch {
                let _ = notifications
                    .send(Notification {
                        peer,
                        version: crate::version::Version::V1,
                        community: msg.community,
                        kind: NotificationKind::TrapV1(msg.trap),
                    })
                    .await;
            }
        }
    }
}

/// The writer owns the queue receiver for its lifetime and returns it on
/// exit so the supervisor can hand it to the next incarnation.
async fn writer_task(
    name: String,
    socket: Arc<UdpSocket>,
    mut outbound_rx: mpsc::Receiver<OutboundMessage>,
    encoder_factory: EncoderFactory,
    stats: StatsHandle,
    cancel: CancellationToken,
) -> mpsc::Receiver<OutboundMessage> {
    tracing::debug!(target: "snmp_engine::engine", engine = %name, "outbound writer initializing");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(target: "snmp_engine::engine", engine = %name, "outbound writer shutting down");
                stats.increment(StatKind::OutboundConnectionClose).await;
                return outbound_rx;
            }
            item = outbound_rx.recv() => {
                let Some(OutboundMessage { target, message }) = item else {
                    // Every sender dropped: the engine itself is gone.
                    return outbound_rx;
                };
                let data = match message.encode(&encoder_factory) {
                    Ok(data) => data,
                    Err(error) => {
                        tracing::debug!(
                            target: "snmp_engine::engine",
                            engine = %name,
                            %target,
                            %error,
                            "failed to encode outbound message, dropped"
                        );
                        continue;
                    }
                };
                match socket.send_to(&data, target).await {
                    Ok(_) => {
                        stats.increment(StatKind::OutboundMessagesSent).await;
                    }
                    Err(error) => {
                        tracing::error!(
                            target: "snmp_engine::engine",
                            engine = %name,
                            %target,
                            %error,
                            "UDP write failed, outbound writer exiting"
                        );
                        stats.increment(StatKind::OutboundConnectionDeath).await;
                        return outbound_rx;
                    }
                }
            }
        }
    }
}
