//! Agent extension points: OID handlers and the transaction provider.

pub mod scalar;

use std::future::Future;
use std::pin::Pin;

use crate::oid::Oid;
use crate::varbind::VarBind;

/// Boxed future type used by the async handler traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Failure from an OID handler, isolated to its varbind.
///
/// The agent skips the varbind and, on SET, aborts the enclosing
/// transaction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum HandlerError {
    /// The object exists but the addressed instance does not.
    #[error("no such instance")]
    NoSuchInstance,
    /// The object does not support SET.
    #[error("object not writable")]
    NotWritable,
    /// The SET value has the wrong type for the object.
    #[error("incorrect varbind type")]
    WrongType,
    /// Handler-specific failure.
    #[error("handler failed: {0}")]
    Failed(String),
}

/// Result of a handler Get/Set invocation.
pub type HandlerResult = std::result::Result<VarBind, HandlerError>;

/// Opaque token identifying an application transaction.
///
/// Produced by [`TransactionProvider::start_txn`]; the engine passes it
/// through to handlers and hands it back on commit/abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxnHandle {
    token: u64,
}

impl TxnHandle {
    /// Wrap a provider-chosen token.
    pub fn new(token: u64) -> Self {
        Self { token }
    }

    /// The provider's token.
    pub fn token(&self) -> u64 {
        self.token
    }
}

/// Application-supplied commit/abort oracle grouping the varbinds of one
/// request into a transaction.
pub trait TransactionProvider: Send + Sync {
    /// Open a transaction; `None` means the application is currently
    /// unavailable (the request is answered with resourceUnavailable).
    fn start_txn(&self) -> Option<TxnHandle>;

    /// Commit; `false` rejects the commit and the engine treats a SET as
    /// failed.
    fn commit_txn(&self, txn: TxnHandle) -> bool;

    /// Roll back. Infallible.
    fn abort_txn(&self, txn: TxnHandle);
}

/// Transaction provider for agents that don't group operations: every
/// transaction opens and commits trivially.
pub struct NoopTransactionProvider;

impl TransactionProvider for NoopTransactionProvider {
    fn start_txn(&self) -> Option<TxnHandle> {
        Some(TxnHandle::new(0))
    }

    fn commit_txn(&self, _txn: TxnHandle) -> bool {
        true
    }

    fn abort_txn(&self, _txn: TxnHandle) {}
}

/// Handler serving one registered OID prefix.
///
/// `txn` is `None` when the transaction provider reported unavailable;
/// the request still runs so the response can carry per-varbind results.
pub trait OidHandler: Send + Sync {
    /// Read the value at `oid`.
    fn get<'a>(&'a self, oid: &'a Oid, txn: Option<&'a TxnHandle>) -> BoxFuture<'a, HandlerResult>;

    /// Write `varbind` and return the varbind to echo in the response.
    fn set<'a>(
        &'a self,
        varbind: &'a VarBind,
        txn: Option<&'a TxnHandle>,
    ) -> BoxFuture<'a, HandlerResult>;

    /// For subtree ("multi") handlers: the first varbind strictly after
    /// `oid` within this handler's subtree, or `None` at the subtree end.
    ///
    /// Single-variable handlers keep the default; the registry walks to
    /// the next registered entry instead.
    fn get_next<'a>(
        &'a self,
        oid: &'a Oid,
        txn: Option<&'a TxnHandle>,
    ) -> BoxFuture<'a, Option<VarBind>> {
        let _ = (oid, txn);
        Box::pin(async { None })
    }
}
