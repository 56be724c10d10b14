//! Bounded free list of request objects.
//!
//! Client workloads allocate and release one request per poll; the pool
//! keeps varbind vectors and community buffers warm instead of paying
//! allocation churn. Empty pool allocates fresh; full pool drops the
//! returned request.

use crossbeam::queue::ArrayQueue;

use crate::client::CommunityRequest;
use crate::pdu::PduType;

/// Bounded request free list.
pub(crate) struct RequestPool {
    free: ArrayQueue<CommunityRequest>,
}

impl RequestPool {
    /// Create a pool retaining at most `capacity` requests.
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            free: ArrayQueue::new(capacity.max(1)),
        }
    }

    /// Take a request configured for `pdu_type`.
    pub(crate) fn get(&self, pdu_type: PduType) -> CommunityRequest {
        match self.free.pop() {
            Some(mut request) => {
                request.reset(pdu_type);
                request
            }
            None => CommunityRequest::new(pdu_type),
        }
    }

    /// Return a request to the free list.
    pub(crate) fn put(&self, request: CommunityRequest) {
        if self.free.push(request).is_err() {
            tracing::debug!(
                target: "snmp_engine::client",
                "request pool full, dropping request"
            );
        }
    }

    /// Number of requests currently retained.
    #[cfg(test)]
    pub(crate) fn retained(&self) -> usize {
        self.free.len()
    }
}
