//! SNMP agent: an engine answering GET, GETNEXT, GETBULK, and SET.
//!
//! Each inbound request runs as its own task (bounded by a concurrency
//! limit) through one application transaction: start, per-varbind handler
//! invocations, then commit or abort. Handlers are resolved through the
//! longest-prefix [`registry`].
//!
//! # Example
//!
//! ```rust,no_run
//! use snmp_engine::agent::Agent;
//! use snmp_engine::handler::scalar::OctetStringOidHandler;
//! use snmp_engine::oid;
//! use std::sync::Arc;
//!
//! # async fn example() -> snmp_engine::Result<()> {
//! let agent = Agent::builder("edge-agent")
//!     .bind("0.0.0.0:1161".parse().unwrap())
//!     .community(b"public")
//!     .single_var_handler(
//!         oid!(1, 3, 6, 1, 2, 1, 1, 1, 0),
//!         Arc::new(OctetStringOidHandler::from_str("My Agent", false)),
//!     )
//!     .build()
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub(crate) mod registry;

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use subtle::ConstantTimeEq;
use tokio::sync::Semaphore;

use crate::engine::stats::{StatKind, StatsBin};
use crate::engine::{Engine, EngineConfig, EngineLinks, OutboundMessage, RequestProcessor, Role};
use crate::error::{Error, ErrorStatus, Result};
use crate::handler::{BoxFuture, NoopTransactionProvider, OidHandler, TransactionProvider, TxnHandle};
use crate::message::{CommunityMessage, Message, V1TrapMessage};
use crate::oid::Oid;
use crate::pdu::{Pdu, PduType, TrapV1Pdu};
use crate::varbind::VarBind;
use registry::{HandlerEntry, OidRegistry};

/// Upper bound on GETBULK repetitions, keeping responses within one
/// datagram for realistic varbind sizes.
const MAX_BULK_REPETITIONS: usize = 256;

/// Default agent port.
const DEFAULT_AGENT_PORT: u16 = 161;

/// Builder for [`Agent`].
pub struct AgentBuilder {
    name: String,
    bind_addr: SocketAddr,
    max_targets: usize,
    max_concurrent_requests: usize,
    communities: Vec<Vec<u8>>,
    txn_provider: Arc<dyn TransactionProvider>,
    handlers: Vec<(Oid, bool, Arc<dyn OidHandler>)>,
    log_decode_errors: bool,
}

impl AgentBuilder {
    /// Create a builder bound to `0.0.0.0:161` with a no-op transaction
    /// provider and no community filter (all communities accepted).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_AGENT_PORT)),
            max_targets: 100,
            max_concurrent_requests: 1000,
            communities: Vec::new(),
            txn_provider: Arc::new(NoopTransactionProvider),
            handlers: Vec::new(),
            log_decode_errors: false,
        }
    }

    /// Set the UDP bind address (default `0.0.0.0:161`).
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Sizes the outbound response queue.
    pub fn max_targets(mut self, max_targets: usize) -> Self {
        self.max_targets = max_targets;
        self
    }

    /// Bound on concurrently processed requests (default 1000).
    pub fn max_concurrent_requests(mut self, limit: usize) -> Self {
        self.max_concurrent_requests = limit;
        self
    }

    /// Accept this community. With no communities configured, every
    /// community is accepted; with at least one, validation is enforced
    /// in constant time.
    pub fn community(mut self, community: &[u8]) -> Self {
        self.communities.push(community.to_vec());
        self
    }

    /// Install the application transaction provider.
    pub fn transaction_provider(mut self, provider: Arc<dyn TransactionProvider>) -> Self {
        self.txn_provider = provider;
        self
    }

    /// Register a single-variable handler at an exact instance OID.
    pub fn single_var_handler(mut self, oid: Oid, handler: Arc<dyn OidHandler>) -> Self {
        self.handlers.push((oid, false, handler));
        self
    }

    /// Register a subtree handler (e.g. a table) at a prefix.
    pub fn subtree_handler(mut self, prefix: Oid, handler: Arc<dyn OidHandler>) -> Self {
        self.handlers.push((prefix, true, handler));
        self
    }

    /// Log undecodable datagrams at debug level.
    pub fn log_decode_errors(mut self, enabled: bool) -> Self {
        self.log_decode_errors = enabled;
        self
    }

    /// Bind the socket and start the agent.
    pub async fn build(self) -> Result<Agent> {
        let registry = OidRegistry::new();
        for (prefix, is_multi, handler) in self.handlers {
            registry.register(prefix, is_multi, handler)?;
        }

        let config = EngineConfig {
            name: self.name,
            bind_addr: self.bind_addr,
            max_targets: self.max_targets,
            log_decode_errors: self.log_decode_errors,
            ..EngineConfig::default()
        };

        let communities = self.communities;
        let txn_provider = self.txn_provider;
        let max_concurrent = self.max_concurrent_requests;
        let core_slot: Arc<std::sync::OnceLock<Arc<AgentCore>>> = Arc::new(std::sync::OnceLock::new());
        let slot = Arc::clone(&core_slot);

        let engine = Engine::start(
            config,
            Role::Agent(Box::new(move |links: &EngineLinks| {
                let core = Arc::new(AgentCore {
                    registry,
                    txn_provider,
                    communities,
                    outbound: links.outbound.clone(),
                    limiter: Arc::new(Semaphore::new(max_concurrent)),
                });
                let _ = slot.set(Arc::clone(&core));
                let processor: Arc<dyn RequestProcessor> = core;
                processor
            })),
        )
        .await?;

        let core = core_slot
            .get()
            .expect("engine start invokes the processor factory")
            .clone();

        Ok(Agent { engine, core })
    }
}

/// A running SNMP agent.
#[derive(Clone)]
pub struct Agent {
    engine: Engine,
    core: Arc<AgentCore>,
}

impl Agent {
    /// Create a builder.
    pub fn builder(name: impl Into<String>) -> AgentBuilder {
        AgentBuilder::new(name)
    }

    /// The agent's name, as used in log events.
    pub fn name(&self) -> &str {
        self.engine.name()
    }

    /// The bound local address.
    pub fn local_addr(&self) -> SocketAddr {
        self.engine.local_addr()
    }

    /// Register a single-variable handler on the running agent.
    ///
    /// Safe under concurrent dispatch: requests observe the registry
    /// before or after the insertion, never a torn state.
    pub fn register_single_var_handler(
        &self,
        oid: Oid,
        handler: Arc<dyn OidHandler>,
    ) -> Result<()> {
        self.core.registry.register(oid, false, handler)
    }

    /// Register a subtree handler on the running agent.
    pub fn register_subtree_handler(
        &self,
        prefix: Oid,
        handler: Arc<dyn OidHandler>,
    ) -> Result<()> {
        self.core.registry.register(prefix, true, handler)
    }

    /// Queue a v1 trap to `target` (trap receivers listen on port 162).
    pub async fn send_v1_trap(
        &self,
        target: SocketAddr,
        community: impl Into<Bytes>,
        trap: TrapV1Pdu,
    ) -> Result<()> {
        let message = Message::TrapV1(V1TrapMessage::new(community, trap));
        self.engine
            .outbound()
            .send(OutboundMessage { target, message })
            .await
            .map_err(|_| Error::EngineShutdown)
    }

    /// Queue a v2c trap carrying `varbinds` to `target`.
    pub async fn send_v2_trap(
        &self,
        target: SocketAddr,
        community: impl Into<Bytes>,
        varbinds: Vec<VarBind>,
    ) -> Result<()> {
        let pdu = Pdu {
            pdu_type: PduType::TrapV2,
            request_id: 0,
            error_status: 0,
            error_index: 0,
            varbinds,
        };
        let message = Message::Community(CommunityMessage::v2c(community.into(), pdu));
        self.engine
            .outbound()
            .send(OutboundMessage { target, message })
            .await
            .map_err(|_| Error::EngineShutdown)
    }

    /// Snapshot one statistic from a bin (0 = current, 1..=96 history).
    pub async fn get_stat(&self, kind: StatKind, bin: u8) -> Result<u64> {
        self.engine.get_stat(kind, bin).await
    }

    /// Snapshot a whole stats bin.
    pub async fn get_stats_bin(&self, bin: u8) -> Result<StatsBin> {
        self.engine.get_stats_bin(bin).await
    }

    /// Shut the agent down. Idempotent.
    pub async fn shutdown(&self) {
        self.engine.shutdown().await;
    }
}

struct AgentCore {
    registry: OidRegistry,
    txn_provider: Arc<dyn TransactionProvider>,
    communities: Vec<Vec<u8>>,
    outbound: tokio::sync::mpsc::Sender<OutboundMessage>,
    limiter: Arc<Semaphore>,
}

impl RequestProcessor for AgentCore {
    fn process(
        self: Arc<Self>,
        message: CommunityMessage,
        peer: SocketAddr,
    ) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            if !self.validate_community(&message.community) {
                tracing::debug!(
                    target: "snmp_engine::agent",
                    %peer,
                    "request with unknown community dropped"
                );
                return;
            }
            // Waiting for a permit here back-pressures the listener.
            let permit = match Arc::clone(&self.limiter).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            let core = Arc::clone(&self);
            tokio::spawn(async move {
                core.handle_request(message, peer).await;
                drop(permit);
            });
        })
    }
}

impl AgentCore {
    /// Constant-time community validation. No configured communities
    /// means accept all.
    fn validate_community(&self, community: &[u8]) -> bool {
        if self.communities.is_empty() {
            return true;
        }
        let mut valid = false;
        for configured in &self.communities {
            if configured.len() == community.len()
                && bool::from(configured.as_slice().ct_eq(community))
            {
                valid = true;
            }
        }
        valid
    }

    async fn handle_request(&self, message: CommunityMessage, peer: SocketAddr) {
        let txn = self.txn_provider.start_txn();
        let mut response = message.pdu.to_response();
        if txn.is_none() {
            response.error_status = ErrorStatus::ResourceUnavailable.as_i32();
            response.error_index = 1;
        }

        let mut set_failed = false;
        match message.pdu.pdu_type {
            PduType::GetRequest => {
                for vb in &message.pdu.varbinds {
                    self.get_one(vb, txn.as_ref(), &mut response).await;
                }
            }
            PduType::GetNextRequest => {
                for vb in &message.pdu.varbinds {
                    match self.next_varbind(&vb.oid, txn.as_ref()).await {
                        Some(next) => response.varbinds.push(next),
                        None => response
                            .varbinds
                            .push(VarBind::end_of_mib_view(vb.oid.clone())),
                    }
                }
            }
            PduType::GetBulkRequest => {
                self.get_bulk(&message.pdu, txn.as_ref(), &mut response).await;
            }
            PduType::SetRequest => {
                for vb in &message.pdu.varbinds {
                    self.set_one(vb, txn.as_ref(), &mut response, &mut set_failed)
                        .await;
                }
            }
            other => {
                tracing::debug!(
                    target: "snmp_engine::agent",
                    %peer,
                    pdu = %other,
                    "unexpected PDU type in request processor"
                );
                return;
            }
        }

        if let Some(txn) = txn {
            if message.pdu.pdu_type == PduType::SetRequest {
                if set_failed {
                    self.txn_provider.abort_txn(txn);
                } else if !self.txn_provider.commit_txn(txn) {
                    response.error_status = ErrorStatus::CommitFailed.as_i32();
                    response.error_index = 0;
                }
            } else {
                self.txn_provider.commit_txn(txn);
            }
        }

        let message = Message::Community(CommunityMessage {
            version: message.version,
            community: message.community,
            pdu: response,
        });
        if self
            .outbound
            .send(OutboundMessage {
                target: peer,
                message,
            })
            .await
            .is_err()
        {
            tracing::debug!(
                target: "snmp_engine::agent",
                %peer,
                "engine shut down before the response could be queued"
            );
        }
    }

    async fn get_one(&self, vb: &VarBind, txn: Option<&TxnHandle>, response: &mut Pdu) {
        match self.registry.lookup(&vb.oid) {
            None => response
                .varbinds
                .push(VarBind::no_such_object(vb.oid.clone())),
            Some(entry) => match entry.handler.get(&vb.oid, txn).await {
                Ok(result) => response.varbinds.push(result),
                Err(error) => {
                    tracing::debug!(
                        target: "snmp_engine::agent",
                        oid = %vb.oid,
                        %error,
                        "GET handler failed, varbind skipped"
                    );
                }
            },
        }
    }

    async fn set_one(
        &self,
        vb: &VarBind,
        txn: Option<&TxnHandle>,
        response: &mut Pdu,
        set_failed: &mut bool,
    ) {
        match self.registry.lookup(&vb.oid) {
            None => response
                .varbinds
                .push(VarBind::no_such_object(vb.oid.clone())),
            Some(entry) => match entry.handler.set(vb, txn).await {
                Ok(result) => response.varbinds.push(result),
                Err(error) => {
                    tracing::debug!(
                        target: "snmp_engine::agent",
                        oid = %vb.oid,
                        %error,
                        "SET handler failed, varbind skipped"
                    );
                    *set_failed = true;
                }
            },
        }
    }

    /// The varbind lexicographically after `oid`, across all registered
    /// handlers.
    async fn next_varbind(&self, oid: &Oid, txn: Option<&TxnHandle>) -> Option<VarBind> {
        // The entry containing the query may hold the successor itself.
        if let Some(entry) = self.registry.lookup(oid) {
            if entry.is_multi {
                if let Some(vb) = entry.handler.get_next(oid, txn).await {
                    if vb.oid > *oid {
                        return Some(vb);
                    }
                }
            }
        }

        // Otherwise walk forward through registered entries.
        let mut cursor = oid.clone();
        loop {
            let entry: HandlerEntry = self.registry.entry_after(&cursor)?;
            if entry.is_multi {
                if let Some(vb) = entry.handler.get_next(&entry.prefix, txn).await {
                    if vb.oid > *oid {
                        return Some(vb);
                    }
                }
            } else {
                match entry.handler.get(&entry.prefix, txn).await {
                    Ok(vb) => return Some(vb),
                    Err(error) => {
                        tracing::debug!(
                            target: "snmp_engine::agent",
                            oid = %entry.prefix,
                            %error,
                            "GETNEXT handler failed, entry skipped"
                        );
                    }
                }
            }
            cursor = entry.prefix;
        }
    }

    async fn get_bulk(&self, request: &Pdu, txn: Option<&TxnHandle>, response: &mut Pdu) {
        let non_repeaters = request.non_repeaters().min(request.varbinds.len());
        let max_repetitions = request.max_repetitions().min(MAX_BULK_REPETITIONS);

        for vb in &request.varbinds[..non_repeaters] {
            match self.next_varbind(&vb.oid, txn).await {
                Some(next) => response.varbinds.push(next),
                None => response
                    .varbinds
                    .push(VarBind::end_of_mib_view(vb.oid.clone())),
            }
        }

        let repeaters = &request.varbinds[non_repeaters..];
        if repeaters.is_empty() {
            return;
        }
        let mut cursors: Vec<Oid> = repeaters.iter().map(|vb| vb.oid.clone()).collect();
        let mut exhausted = vec![false; repeaters.len()];

        for _ in 0..max_repetitions {
            let mut progressed = false;
            for (i, cursor) in cursors.iter_mut().enumerate() {
                if exhausted[i] {
                    response
                        .varbinds
                        .push(VarBind::end_of_mib_view(cursor.clone()));
                    continue;
                }
                match self.next_varbind(cursor, txn).await {
                    Some(next) => {
                        *cursor = next.oid.clone();
                        response.varbinds.push(next);
                        progressed = true;
                    }
                    None => {
                        exhausted[i] = true;
                        response
                            .varbinds
                            .push(VarBind::end_of_mib_view(cursor.clone()));
                    }
                }
            }
            if !progressed {
                break;
            }
        }
    }
}
