//! Basic single-variable handlers.
//!
//! Each serves one scalar value registered at an exact instance OID and
//! supports non-transactional updates of that value when writable.

use std::sync::RwLock;

use bytes::Bytes;

use super::{BoxFuture, HandlerError, HandlerResult, OidHandler, TxnHandle};
use crate::oid::Oid;
use crate::value::Value;
use crate::varbind::VarBind;

/// Handler serving a single INTEGER variable.
pub struct IntOidHandler {
    value: RwLock<i32>,
    writable: bool,
}

impl IntOidHandler {
    pub fn new(value: i32, writable: bool) -> Self {
        Self {
            value: RwLock::new(value),
            writable,
        }
    }
}

impl OidHandler for IntOidHandler {
    fn get<'a>(&'a self, oid: &'a Oid, _txn: Option<&'a TxnHandle>) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let value = *self.value.read().unwrap();
            Ok(VarBind::new(oid.clone(), Value::Integer(value)))
        })
    }

    fn set<'a>(
        &'a self,
        varbind: &'a VarBind,
        _txn: Option<&'a TxnHandle>,
    ) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            if !self.writable {
                return Err(HandlerError::NotWritable);
            }
            match varbind.value {
                Value::Integer(new_value) => {
                    *self.value.write().unwrap() = new_value;
                    Ok(varbind.clone())
                }
                _ => Err(HandlerError::WrongType),
            }
        })
    }
}

/// Handler serving a single OCTET STRING variable. Also the right simple
/// handler for string values.
pub struct OctetStringOidHandler {
    value: RwLock<Bytes>,
    writable: bool,
}

impl OctetStringOidHandler {
    pub fn new(value: impl Into<Bytes>, writable: bool) -> Self {
        Self {
            value: RwLock::new(value.into()),
            writable,
        }
    }

    /// Convenience constructor for string values.
    pub fn from_str(value: &str, writable: bool) -> Self {
        Self::new(Bytes::copy_from_slice(value.as_bytes()), writable)
    }
}

impl OidHandler for OctetStringOidHandler {
    fn get<'a>(&'a self, oid: &'a Oid, _txn: Option<&'a TxnHandle>) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let value = self.value.read().unwrap().clone();
            Ok(VarBind::new(oid.clone(), Value::OctetString(value)))
        })
    }

    fn set<'a>(
        &'a self,
        varbind: &'a VarBind,
        _txn: Option<&'a TxnHandle>,
    ) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            if !self.writable {
                return Err(HandlerError::NotWritable);
            }
            match &varbind.value {
                Value::OctetString(new_value) => {
                    *self.value.write().unwrap() = new_value.clone();
                    Ok(varbind.clone())
                }
                _ => Err(HandlerError::WrongType),
            }
        })
    }
}

/// Handler serving a single OBJECT IDENTIFIER variable.
pub struct ObjectIdentifierOidHandler {
    value: RwLock<Oid>,
    writable: bool,
}

impl ObjectIdentifierOidHandler {
    pub fn new(value: Oid, writable: bool) -> Self {
        Self {
            value: RwLock::new(value),
            writable,
        }
    }
}

impl OidHandler for ObjectIdentifierOidHandler {
    fn get<'a>(&'a self, oid: &'a Oid, _txn: Option<&'a TxnHandle>) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let value = self.value.read().unwrap().clone();
            Ok(VarBind::new(oid.clone(), Value::ObjectIdentifier(value)))
        })
    }

    fn set<'a>(
        &'a self,
        varbind: &'a VarBind,
        _txn: Option<&'a TxnHandle>,
    ) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            if !self.writable {
                return Err(HandlerError::NotWritable);
            }
            match &varbind.value {
                Value::ObjectIdentifier(new_value) => {
                    *self.value.write().unwrap() = new_value.clone();
                    Ok(varbind.clone())
                }
                _ => Err(HandlerError::WrongType),
            }
        })
    }
}
