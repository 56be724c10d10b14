//! Client context and per-target v2c client.
//!
//! A [`ClientContext`] is an engine in client role: it owns the UDP
//! socket, the request tracker, and a bounded free list of request
//! objects. A [`V2cClient`] is a lightweight per-target handle; it
//! serializes its own requests (one in flight at a time per client) while
//! different clients on the same context proceed concurrently.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{oneshot, Mutex};

use crate::engine::pool::RequestPool;
use crate::engine::stats::{StatKind, StatsBin, StatsHandle};
use crate::engine::tracker::TrackerEvent;
use crate::engine::{Engine, EngineConfig, Role};
use crate::error::{Result, TransportError};
use crate::message::CommunityMessage;
use crate::oid::Oid;
use crate::pdu::{Pdu, PduType};
use crate::varbind::VarBind;
use crate::version::Version;

/// Default per-attempt timeout for new clients.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default retry count for new clients (three sends in total).
const DEFAULT_RETRIES: u32 = 2;

/// A pooled v1/v2c request being prepared, tracked, or completed.
///
/// Allocate through the [`ClientContext`] `allocate_*` methods, add OIDs
/// or varbinds, pass to [`V2cClient::send_request`], then inspect
/// [`response`](Self::response) or
/// [`transport_error`](Self::transport_error). Return it with
/// [`ClientContext::free_request`] when done.
#[derive(Debug)]
pub struct CommunityRequest {
    pub(crate) version: Version,
    pub(crate) community: Bytes,
    pub(crate) pdu: Pdu,
    pub(crate) target: Option<SocketAddr>,
    pub(crate) timeout: Duration,
    pub(crate) retries_remaining: u32,
    pub(crate) response: Option<Pdu>,
    pub(crate) transport_error: Option<TransportError>,
    pub(crate) flight_time: Option<Duration>,
}

impl CommunityRequest {
    pub(crate) fn new(pdu_type: PduType) -> Self {
        Self {
            version: Version::V2c,
            community: Bytes::new(),
            pdu: Pdu {
                pdu_type,
                request_id: 0,
                error_status: 0,
                error_index: 0,
                varbinds: Vec::new(),
            },
            target: None,
            timeout: DEFAULT_TIMEOUT,
            retries_remaining: DEFAULT_RETRIES,
            response: None,
            transport_error: None,
            flight_time: None,
        }
    }

    /// Clear all state for reuse from the pool.
    pub(crate) fn reset(&mut self, pdu_type: PduType) {
        self.version = Version::V2c;
        self.community = Bytes::new();
        self.pdu.pdu_type = pdu_type;
        self.pdu.request_id = 0;
        self.pdu.error_status = 0;
        self.pdu.error_index = 0;
        self.pdu.varbinds.clear();
        self.target = None;
        self.timeout = DEFAULT_TIMEOUT;
        self.retries_remaining = DEFAULT_RETRIES;
        self.response = None;
        self.transport_error = None;
        self.flight_time = None;
    }

    /// Add an OID with a NULL value (GET/GETNEXT/GETBULK).
    pub fn add_oid(&mut self, oid: Oid) {
        self.pdu.varbinds.push(VarBind::null(oid));
    }

    /// Add several OIDs with NULL values.
    pub fn add_oids(&mut self, oids: &[Oid]) {
        for oid in oids {
            self.add_oid(oid.clone());
        }
    }

    /// Add a full varbind (SET).
    pub fn add_varbind(&mut self, varbind: VarBind) {
        self.pdu.varbinds.push(varbind);
    }

    /// Set non-repeaters and max-repetitions on a GETBULK request.
    pub fn set_bulk_params(&mut self, non_repeaters: i32, max_repetitions: i32) {
        self.pdu.error_status = non_repeaters;
        self.pdu.error_index = max_repetitions;
    }

    /// The request's PDU type.
    pub fn request_type(&self) -> PduType {
        self.pdu.pdu_type
    }

    /// The id assigned by the tracker (0 before submission).
    pub fn request_id(&self) -> u32 {
        self.pdu.request_id
    }

    /// The request varbinds.
    pub fn varbinds(&self) -> &[VarBind] {
        &self.pdu.varbinds
    }

    /// The response PDU, when one arrived.
    pub fn response(&self) -> Option<&Pdu> {
        self.response.as_ref()
    }

    /// The terminal transport error, when the request failed.
    pub fn transport_error(&self) -> Option<TransportError> {
        self.transport_error
    }

    /// Time from the last (re)send to completion.
    pub fn flight_time(&self) -> Option<Duration> {
        self.flight_time
    }

    /// Build the wire message for this request.
    pub(crate) fn to_message(&self) -> CommunityMessage {
        CommunityMessage {
            version: self.version,
            community: self.community.clone(),
            pdu: self.pdu.clone(),
        }
    }
}

/// Builder for [`ClientContext`].
pub struct ClientContextBuilder {
    name: String,
    max_targets: usize,
    bind_addr: SocketAddr,
    log_decode_errors: bool,
}

impl ClientContextBuilder {
    /// Create a builder with an ephemeral bind address and room for 1000
    /// concurrent targets.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_targets: 1000,
            bind_addr: "0.0.0.0:0".parse().unwrap(),
            log_decode_errors: false,
        }
    }

    /// Bound on concurrently outstanding requests; also sizes the
    /// outbound flow-control queue and the request pool.
    pub fn max_targets(mut self, max_targets: usize) -> Self {
        self.max_targets = max_targets;
        self
    }

    /// Local bind address (default ephemeral).
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Log undecodable datagrams at debug level.
    pub fn log_decode_errors(mut self, enabled: bool) -> Self {
        self.log_decode_errors = enabled;
        self
    }

    /// Bind the socket and start the engine.
    pub async fn build(self) -> Result<ClientContext> {
        let config = EngineConfig {
            name: self.name,
            bind_addr: self.bind_addr,
            max_targets: self.max_targets,
            log_decode_errors: self.log_decode_errors,
            ..EngineConfig::default()
        };
        let pool = Arc::new(RequestPool::new(self.max_targets));
        let engine = Engine::start(config, Role::Client).await?;
        Ok(ClientContext { engine, pool })
    }
}

/// An engine in client role.
#[derive(Clone)]
pub struct ClientContext {
    engine: Engine,
    pool: Arc<RequestPool>,
}

impl ClientContext {
    /// Start a client context with default settings.
    pub async fn new(name: impl Into<String>) -> Result<Self> {
        ClientContextBuilder::new(name).build().await
    }

    /// Create a builder.
    pub fn builder(name: impl Into<String>) -> ClientContextBuilder {
        ClientContextBuilder::new(name)
    }

    /// The context's name, as used in log events.
    pub fn name(&self) -> &str {
        self.engine.name()
    }

    /// The bound local address.
    pub fn local_addr(&self) -> SocketAddr {
        self.engine.local_addr()
    }

    /// Allocate a GET request from the pool.
    pub fn allocate_get_request(&self) -> CommunityRequest {
        self.pool.get(PduType::GetRequest)
    }

    /// Allocate a GET request pre-populated with OIDs.
    pub fn allocate_get_request_with_oids(&self, oids: &[Oid]) -> CommunityRequest {
        let mut req = self.allocate_get_request();
        req.add_oids(oids);
        req
    }

    /// Allocate a GETNEXT request from the pool.
    pub fn allocate_get_next_request(&self) -> CommunityRequest {
        self.pool.get(PduType::GetNextRequest)
    }

    /// Allocate a GETBULK request from the pool.
    pub fn allocate_get_bulk_request(&self) -> CommunityRequest {
        self.pool.get(PduType::GetBulkRequest)
    }

    /// Allocate a SET request from the pool.
    pub fn allocate_set_request(&self) -> CommunityRequest {
        self.pool.get(PduType::SetRequest)
    }

    /// Return a request to the pool. Dropped when the pool is full.
    pub fn free_request(&self, request: CommunityRequest) {
        self.pool.put(request);
    }

    /// Create a per-target v2c client with default timeout (10 s) and
    /// retries (2).
    pub fn v2c_client(
        &self,
        community: impl Into<Bytes>,
        address: SocketAddr,
    ) -> V2cClient {
        V2cClient {
            context: self.clone(),
            address,
            community: community.into(),
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
            serial: Arc::new(Mutex::new(())),
        }
    }

    /// Snapshot one statistic from a bin (0 = current, 1..=96 history).
    pub async fn get_stat(&self, kind: StatKind, bin: u8) -> Result<u64> {
        self.engine.get_stat(kind, bin).await
    }

    /// Snapshot a whole stats bin.
    pub async fn get_stats_bin(&self, bin: u8) -> Result<StatsBin> {
        self.engine.get_stats_bin(bin).await
    }

    /// Shut the engine down, draining outstanding requests with
    /// [`TransportError::Shutdown`]. Idempotent.
    pub async fn shutdown(&self) {
        self.engine.shutdown().await;
    }

    fn stats(&self) -> &StatsHandle {
        self.engine.stats()
    }
}

/// A per-target SNMPv2c client handle.
///
/// Requests through one client are serialized; clone-free sharing across
/// tasks works because the handle itself is cheaply cloneable.
#[derive(Clone)]
pub struct V2cClient {
    context: ClientContext,
    /// Target address.
    pub address: SocketAddr,
    /// Community attached to every request.
    pub community: Bytes,
    /// Per-attempt timeout applied to requests.
    pub timeout: Duration,
    /// Retries after the first send.
    pub retries: u32,
    serial: Arc<Mutex<()>>,
}

impl V2cClient {
    /// Send one request and wait for its completion.
    ///
    /// The client's target, community, timeout, and retry settings are
    /// stamped onto the request. On return the request carries either a
    /// response or a transport error.
    pub async fn send_request(&self, mut request: CommunityRequest) -> CommunityRequest {
        let _serial = self.serial.lock().await;

        request.version = Version::V2c;
        request.target = Some(self.address);
        request.community = self.community.clone();
        request.timeout = self.timeout;
        request.retries_remaining = self.retries;
        request.response = None;
        request.transport_error = None;
        request.flight_time = None;

        self.context.stats().increment(StatKind::RequestsSent).await;

        let (done, completed) = oneshot::channel();
        let submit = TrackerEvent::Submit { request, done };
        let tracker = match self.context.engine.tracker() {
            Some(tracker) => tracker,
            None => unreachable!("client context always starts a tracker"),
        };

        match tracker.send(submit).await {
            Ok(()) => {}
            Err(tokio::sync::mpsc::error::SendError(event)) => {
                // Tracker already gone: hand the request back untracked.
                if let TrackerEvent::Submit { mut request, .. } = event {
                    request.transport_error = Some(TransportError::Shutdown);
                    return request;
                }
                unreachable!("submit events carry the request back on failure");
            }
        }

        match completed.await {
            Ok(request) => {
                if request.response.is_some() {
                    self.context
                        .stats()
                        .increment(StatKind::ResponsesReleasedToClient)
                        .await;
                }
                request
            }
            Err(_) => {
                // The tracker drains on shutdown, so a dropped completion
                // means the submit never reached the map. The request
                // itself is gone; return a fresh one marked shut down.
                let mut request = CommunityRequest::new(PduType::GetRequest);
                request.transport_error = Some(TransportError::Shutdown);
                request
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;
    use crate::value::Value;

    #[test]
    fn test_request_accumulates_oids() {
        let mut req = CommunityRequest::new(PduType::GetRequest);
        req.add_oid(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0));
        req.add_oids(&[oid!(1, 3, 6, 1, 2, 1, 1, 2, 0), oid!(1, 3, 6, 1, 2, 1, 1, 3, 0)]);
        assert_eq!(req.varbinds().len(), 3);
        assert!(req
            .varbinds()
            .iter()
            .all(|vb| vb.value == Value::Null));
    }

    #[test]
    fn test_request_reset_clears_state() {
        let mut req = CommunityRequest::new(PduType::SetRequest);
        req.add_varbind(VarBind::new(oid!(1, 3, 6, 1), Value::Integer(5)));
        req.community = Bytes::from_static(b"private");
        req.response = Some(Pdu::get_request(9, &[]));
        req.transport_error = Some(TransportError::Timeout);

        req.reset(PduType::GetRequest);
        assert_eq!(req.request_type(), PduType::GetRequest);
        assert!(req.varbinds().is_empty());
        assert!(req.response().is_none());
        assert!(req.transport_error().is_none());
        assert!(req.community.is_empty());
    }

    #[test]
    fn test_bulk_params() {
        let mut req = CommunityRequest::new(PduType::GetBulkRequest);
        req.set_bulk_params(1, 20);
        assert_eq!(req.pdu.non_repeaters(), 1);
        assert_eq!(req.pdu.max_repetitions(), 20);
    }

    #[test]
    fn test_to_message_carries_fields() {
        let mut req = CommunityRequest::new(PduType::GetRequest);
        req.community = Bytes::from_static(b"public");
        req.add_oid(oid!(1, 3, 6, 1));
        let msg = req.to_message();
        assert_eq!(msg.version, Version::V2c);
        assert_eq!(msg.community.as_ref(), b"public");
        assert_eq!(msg.pdu.varbinds.len(), 1);
    }
}
