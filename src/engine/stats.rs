//! Rolling engine statistics.
//!
//! A 24-hour window in fifteen-minute bins: bin 0 is the current bin and
//! bins 1..=96 are history. One task owns the ring; increments and
//! queries arrive over channels, and a one-second tick drives bin
//! rotation aligned to wall-clock quarter hours.

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, Result};

/// Number of bins: the current one plus 96 fifteen-minute history bins.
pub const STATS_BINS: usize = 97;

/// Seconds per bin.
const ROLLOVER_SECONDS: u32 = 900;

/// Buffering on the increment channel so bursts do not stall workers.
const INCREMENT_QUEUE_DEPTH: usize = 100;

/// Engine statistic counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum StatKind {
    /// Listener terminated by a socket error.
    InboundConnectionDeath,
    /// Listener terminated by engine shutdown.
    InboundConnectionClose,
    /// Outbound writer terminated by a socket error.
    OutboundConnectionDeath,
    /// Outbound writer terminated by engine shutdown.
    OutboundConnectionClose,
    /// Datagrams received.
    InboundMessagesReceived,
    /// Datagrams that failed to decode.
    UndecodableMessagesReceived,
    /// Datagrams written to the socket.
    OutboundMessagesSent,
    /// Responses matched to an outstanding request.
    ResponsesReceived,
    /// Responses arriving after their request already timed out.
    ResponsesReceivedAfterTimeout,
    /// Completed responses handed back to the caller.
    ResponsesReleasedToClient,
    /// Requests submitted by clients.
    RequestsSent,
    /// Requests (including retries) handed to the outbound queue.
    RequestsForwardedToFlowControl,
    /// Timer firings answered with a retry.
    RequestsTimedOut,
    /// Timer firings that lost the race against a processed response.
    RequestsTimedOutAfterResponse,
    /// Requests that exhausted their retries.
    RequestRetriesExhausted,
    /// GET requests received (agent role).
    GetRequestsReceived,
    /// GETNEXT requests received (agent role).
    GetNextRequestsReceived,
    /// GETBULK requests received (agent role).
    GetBulkRequestsReceived,
    /// SET requests received (agent role).
    SetRequestsReceived,
    /// RESPONSE PDUs received (client role).
    GetResponsesReceived,
}

/// One fifteen-minute statistics bin.
#[derive(Debug, Clone, Default)]
pub struct StatsBin {
    /// Counter values by kind; absent kinds are zero.
    pub counts: HashMap<StatKind, u64>,
    /// Seconds this bin has been (or was) current.
    pub num_seconds: u32,
}

impl StatsBin {
    /// Counter value for `kind` (zero when never incremented).
    pub fn get(&self, kind: StatKind) -> u64 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }
}

/// The bin ring itself; pure state so rotation is unit-testable.
pub(crate) struct StatsRing {
    bins: Vec<Option<StatsBin>>,
    next_rollover: u32,
}

impl StatsRing {
    /// Create a ring whose first rotation happens after
    /// `seconds_until_rollover` ticks (wall alignment), then every 900.
    pub(crate) fn new(seconds_until_rollover: u32) -> Self {
        let mut bins = vec![None; STATS_BINS];
        bins[0] = Some(StatsBin::default());
        Self {
            bins,
            next_rollover: seconds_until_rollover.clamp(1, ROLLOVER_SECONDS),
        }
    }

    pub(crate) fn increment(&mut self, kind: StatKind) {
        let bin = self.bins[0].as_mut().expect("current bin always present");
        *bin.counts.entry(kind).or_insert(0) += 1;
    }

    /// Advance one second; on the rollover boundary shift bins
    /// [0..=95] to [1..=96] and start a fresh current bin.
    pub(crate) fn tick(&mut self) {
        let bin = self.bins[0].as_mut().expect("current bin always present");
        bin.num_seconds += 1;
        if bin.num_seconds >= self.next_rollover {
            for idx in (1..STATS_BINS).rev() {
                self.bins[idx] = self.bins[idx - 1].take();
            }
            self.bins[0] = Some(StatsBin::default());
            self.next_rollover = ROLLOVER_SECONDS;
        }
    }

    pub(crate) fn bin(&self, index: u8) -> Option<&StatsBin> {
        self.bins.get(index as usize).and_then(|b| b.as_ref())
    }
}

enum StatsQuery {
    Single {
        kind: StatKind,
        bin: u8,
        reply: oneshot::Sender<Option<u64>>,
    },
    Bin {
        bin: u8,
        reply: oneshot::Sender<Option<StatsBin>>,
    },
}

/// Cloneable handle to the stats task.
#[derive(Clone)]
pub(crate) struct StatsHandle {
    increments: mpsc::Sender<StatKind>,
    queries: mpsc::Sender<StatsQuery>,
}

impl StatsHandle {
    /// Record one event. Lost without error if the engine is gone.
    pub(crate) async fn increment(&self, kind: StatKind) {
        let _ = self.increments.send(kind).await;
    }

    /// Snapshot a single counter from a bin.
    pub(crate) async fn get_stat(&self, kind: StatKind, bin: u8) -> Result<u64> {
        let (reply, rx) = oneshot::channel();
        self.queries
            .send(StatsQuery::Single { kind, bin, reply })
            .await
            .map_err(|_| Error::EngineShutdown)?;
        rx.await
            .map_err(|_| Error::EngineShutdown)?
            .ok_or(Error::StatsBinUnavailable { bin })
    }

    /// Snapshot a whole bin.
    pub(crate) async fn get_bin(&self, bin: u8) -> Result<StatsBin> {
        let (reply, rx) = oneshot::channel();
        self.queries
            .send(StatsQuery::Bin { bin, reply })
            .await
            .map_err(|_| Error::EngineShutdown)?;
        rx.await
            .map_err(|_| Error::EngineShutdown)?
            .ok_or(Error::StatsBinUnavailable { bin })
    }
}

/// Seconds until the next wall-clock quarter hour.
fn seconds_until_quarter_hour() -> u32 {
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs();
    (ROLLOVER_SECONDS as u64 - since_epoch % ROLLOVER_SECONDS as u64) as u32
}

/// Spawn the stats tracker task.
///
/// The task runs until every handle clone is dropped, so counters stay
/// queryable through and after engine shutdown.
pub(crate) fn spawn_stats_tracker(name: String) -> StatsHandle {
    let (inc_tx, mut inc_rx) = mpsc::channel(INCREMENT_QUEUE_DEPTH);
    let (query_tx, mut query_rx) = mpsc::channel(16);

    tokio::spawn(async move {
        let mut ring = StatsRing::new(seconds_until_quarter_hour());
        let start = tokio::time::Instant::now() + Duration::from_secs(1);
        let mut ticker = tokio::time::interval_at(start, Duration::from_secs(1));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        tracing::debug!(target: "snmp_engine::stats", engine = %name, "stats tracker initializing");

        loop {
            tokio::select! {
                inc = inc_rx.recv() => match inc {
                    Some(kind) => ring.increment(kind),
                    None => break,
                },
                query = query_rx.recv() => match query {
                    Some(StatsQuery::Single { kind, bin, reply }) => {
                        let _ = reply.send(ring.bin(bin).map(|b| b.get(kind)));
                    }
                    Some(StatsQuery::Bin { bin, reply }) => {
                        let _ = reply.send(ring.bin(bin).cloned());
                    }
                    None => break,
                },
                _ = ticker.tick() => ring.tick(),
            }
        }
        tracing::debug!(target: "snmp_engine::stats", engine = %name, "stats tracker shutting down");
    });

    StatsHandle {
        increments: inc_tx,
        queries: query_tx,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_lands_in_current_bin() {
        let mut ring = StatsRing::new(900);
        ring.increment(StatKind::RequestsSent);
        ring.increment(StatKind::RequestsSent);
        ring.increment(StatKind::ResponsesReceived);
        let bin = ring.bin(0).unwrap();
        assert_eq!(bin.get(StatKind::RequestsSent), 2);
        assert_eq!(bin.get(StatKind::ResponsesReceived), 1);
        assert_eq!(bin.get(StatKind::RequestsTimedOut), 0);
    }

    #[test]
    fn test_rotation_after_full_interval() {
        let mut ring = StatsRing::new(900);
        ring.increment(StatKind::RequestsSent);
        for _ in 0..899 {
            ring.tick();
        }
        // Not yet rotated
        assert_eq!(ring.bin(0).unwrap().get(StatKind::RequestsSent), 1);
        assert!(ring.bin(1).is_none());

        ring.tick();
        // Old bin shifted to index 1, fresh current bin
        assert_eq!(ring.bin(0).unwrap().get(StatKind::RequestsSent), 0);
        assert_eq!(ring.bin(0).unwrap().num_seconds, 0);
        let old = ring.bin(1).unwrap();
        assert_eq!(old.get(StatKind::RequestsSent), 1);
        assert_eq!(old.num_seconds, 900);
    }

    #[test]
    fn test_first_rotation_is_wall_aligned() {
        // A ring started 880 seconds into the quarter rotates after 20
        let mut ring = StatsRing::new(20);
        ring.increment(StatKind::OutboundMessagesSent);
        for _ in 0..20 {
            ring.tick();
        }
        assert_eq!(ring.bin(1).unwrap().get(StatKind::OutboundMessagesSent), 1);
        assert_eq!(ring.bin(1).unwrap().num_seconds, 20);

        // The next rotation takes a full interval
        for _ in 0..900 {
            ring.tick();
        }
        assert_eq!(ring.bin(2).unwrap().num_seconds, 20);
        assert_eq!(ring.bin(1).unwrap().num_seconds, 900);
    }

    #[test]
    fn test_history_capped_at_96_bins() {
        let mut ring = StatsRing::new(900);
        for _ in 0..98 {
            ring.increment(StatKind::RequestsSent);
            for _ in 0..900 {
                ring.tick();
            }
        }
        // Every history slot populated, none beyond the ring
        assert!(ring.bin(96).is_some());
        assert!(ring.bin(97).is_none());
        assert!(ring.bin(255).is_none());
    }

    #[test]
    fn test_out_of_range_bin_is_none() {
        let ring = StatsRing::new(900);
        assert!(ring.bin(0).is_some());
        assert!(ring.bin(1).is_none());
        assert!(ring.bin(96).is_none());
        assert!(ring.bin(97).is_none());
    }

    #[tokio::test]
    async fn test_tracker_task_counts_and_queries() {
        let handle = spawn_stats_tracker("test".into());
        handle.increment(StatKind::RequestsSent).await;
        handle.increment(StatKind::RequestsSent).await;

        // Give the task a moment to drain the increment queue
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(handle.get_stat(StatKind::RequestsSent, 0).await.unwrap(), 2);
        assert_eq!(
            handle.get_stat(StatKind::ResponsesReceived, 0).await.unwrap(),
            0
        );
        let bin = handle.get_bin(0).await.unwrap();
        assert_eq!(bin.get(StatKind::RequestsSent), 2);

        // Historical bins are unavailable until a rotation happens
        assert!(matches!(
            handle.get_stat(StatKind::RequestsSent, 1).await,
            Err(Error::StatsBinUnavailable { bin: 1 })
        ));
        assert!(matches!(
            handle.get_bin(200).await,
            Err(Error::StatsBinUnavailable { bin: 200 })
        ));
    }
}
