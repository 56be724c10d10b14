//! Client request tracker.
//!
//! One task owns the map of outstanding requests; everything reaches it
//! as an event over a single channel, so the map needs no lock and the
//! response/timeout race has a single authority. Timers are abortable
//! sleep tasks feeding `Timeout` events back into the same channel.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::stats::{StatKind, StatsHandle};
use super::OutboundMessage;
use crate::client::CommunityRequest;
use crate::error::TransportError;
use crate::message::Message;
use crate::pdu::Pdu;

/// Events processed by the tracker task.
pub(crate) enum TrackerEvent {
    /// A client submits a request; the completed request flows back
    /// through `done`.
    Submit {
        request: CommunityRequest,
        done: oneshot::Sender<CommunityRequest>,
    },
    /// A response PDU arrived from the listener.
    Response(Pdu),
    /// The timer for a request id fired.
    Timeout(u32),
}

struct Pending {
    request: CommunityRequest,
    done: oneshot::Sender<CommunityRequest>,
    timer: JoinHandle<()>,
    flight_start: Instant,
}

impl Pending {
    fn complete(mut self, outcome: Outcome) {
        self.timer.abort();
        self.request.flight_time = Some(self.flight_start.elapsed());
        match outcome {
            Outcome::Response(pdu) => self.request.response = Some(pdu),
            Outcome::Failed(err) => self.request.transport_error = Some(err),
        }
        // A dropped waiter just discards the completed request.
        let _ = self.done.send(self.request);
    }
}

enum Outcome {
    Response(Pdu),
    Failed(TransportError),
}

/// Spawn the request tracker task.
pub(crate) fn spawn_request_tracker(
    name: String,
    mut events: mpsc::Receiver<TrackerEvent>,
    events_tx: mpsc::Sender<TrackerEvent>,
    outbound: mpsc::Sender<OutboundMessage>,
    stats: StatsHandle,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        let mut tracker = Tracker {
            outstanding: HashMap::new(),
            next_request_id: 0,
            events_tx,
            outbound,
            stats,
        };
        tracing::debug!(target: "snmp_engine::tracker", engine = %name, "request tracker initializing");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => tracker.handle(event).await,
                    None => break,
                },
            }
        }

        // Drain: everything outstanding, plus submits still queued in the
        // channel, completes with a shutdown error.
        for (_, pending) in tracker.outstanding.drain() {
            pending.complete(Outcome::Failed(TransportError::Shutdown));
        }
        events.close();
        while let Ok(event) = events.try_recv() {
            if let TrackerEvent::Submit { mut request, done } = event {
                request.transport_error = Some(TransportError::Shutdown);
                let _ = done.send(request);
            }
        }
        tracing::debug!(target: "snmp_engine::tracker", engine = %name, "request tracker shutting down");
    });
}

struct Tracker {
    outstanding: HashMap<u32, Pending>,
    next_request_id: u32,
    events_tx: mpsc::Sender<TrackerEvent>,
    outbound: mpsc::Sender<OutboundMessage>,
    stats: StatsHandle,
}

impl Tracker {
    async fn handle(&mut self, event: TrackerEvent) {
        match event {
            TrackerEvent::Submit { request, done } => self.submit(request, done).await,
            TrackerEvent::Response(pdu) => self.response(pdu).await,
            TrackerEvent::Timeout(id) => self.timeout(id).await,
        }
    }

    async fn submit(&mut self, mut request: CommunityRequest, done: oneshot::Sender<CommunityRequest>) {
        self.next_request_id = self.next_request_id.wrapping_add(1);
        let id = self.next_request_id;
        request.pdu.request_id = id;

        let target = request
            .target
            .expect("client stamps the target before submitting");
        let message = Message::Community(request.to_message());

        let pending = Pending {
            timer: arm_timer(self.events_tx.clone(), id, request.timeout),
            flight_start: Instant::now(),
            request,
            done,
        };
        self.outstanding.insert(id, pending);

        self.stats
            .increment(StatKind::RequestsForwardedToFlowControl)
            .await;
        // Intentionally blocks when the queue is full: flow control.
        if self
            .outbound
            .send(OutboundMessage { target, message })
            .await
            .is_err()
        {
            if let Some(pending) = self.outstanding.remove(&id) {
                pending.complete(Outcome::Failed(TransportError::Shutdown));
            }
        }
    }

    async fn response(&mut self, pdu: Pdu) {
        match self.outstanding.remove(&pdu.request_id) {
            None => {
                // The request most likely already timed out.
                self.stats
                    .increment(StatKind::ResponsesReceivedAfterTimeout)
                    .await;
            }
            Some(pending) => {
                self.stats.increment(StatKind::ResponsesReceived).await;
                pending.complete(Outcome::Response(pdu));
            }
        }
    }

    async fn timeout(&mut self, id: u32) {
        let Some(mut pending) = self.outstanding.remove(&id) else {
            self.stats
                .increment(StatKind::RequestsTimedOutAfterResponse)
                .await;
            return;
        };

        if pending.request.retries_remaining > 0 {
            pending.request.retries_remaining -= 1;
            pending.timer.abort();
            pending.timer = arm_timer(self.events_tx.clone(), id, pending.request.timeout);
            pending.flight_start = Instant::now();

            let target = pending
                .request
                .target
                .expect("tracked requests always carry a target");
            let message = Message::Community(pending.request.to_message());
            self.outstanding.insert(id, pending);

            self.stats.increment(StatKind::RequestsTimedOut).await;
            self.stats
                .increment(StatKind::RequestsForwardedToFlowControl)
                .await;
            if self
                .outbound
                .send(OutboundMessage { target, message })
                .await
                .is_err()
            {
                if let Some(pending) = self.outstanding.remove(&id) {
                    pending.complete(Outcome::Failed(TransportError::Shutdown));
                }
            }
        } else {
            tracing::debug!(
                target: "snmp_engine::tracker",
                request_id = id,
                "final timeout for request"
            );
            self.stats
                .increment(StatKind::RequestRetriesExhausted)
                .await;
            pending.complete(Outcome::Failed(TransportError::Timeout));
        }
    }
}

fn arm_timer(events: mpsc::Sender<TrackerEvent>, id: u32, timeout: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        let _ = events.send(TrackerEvent::Timeout(id)).await;
    })
}
