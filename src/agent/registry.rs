//! Ordered OID handler registry.
//!
//! Entries are keyed by OID prefix in lexicographic order. Lookup scans
//! backward from the largest key not greater than the query until it
//! finds a key that is a prefix of the query, so the longest registered
//! prefix wins. A short critical section guards the map; handlers are
//! never invoked under the lock.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::handler::OidHandler;
use crate::oid::Oid;

/// One registered handler.
#[derive(Clone)]
pub(crate) struct HandlerEntry {
    pub(crate) prefix: Oid,
    pub(crate) is_multi: bool,
    pub(crate) handler: Arc<dyn OidHandler>,
}

/// The agent's handler map.
pub(crate) struct OidRegistry {
    entries: Mutex<BTreeMap<Oid, HandlerEntry>>,
}

impl OidRegistry {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Register a handler; prefixes must be unique.
    pub(crate) fn register(
        &self,
        prefix: Oid,
        is_multi: bool,
        handler: Arc<dyn OidHandler>,
    ) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        if entries.contains_key(&prefix) {
            return Err(Error::DuplicateHandler(prefix));
        }
        entries.insert(
            prefix.clone(),
            HandlerEntry {
                prefix,
                is_multi,
                handler,
            },
        );
        Ok(())
    }

    /// Longest registered prefix of `query`, if any.
    pub(crate) fn lookup(&self, query: &Oid) -> Option<HandlerEntry> {
        let entries = self.entries.lock().unwrap();
        entries
            .range::<Oid, _>((Bound::Unbounded, Bound::Included(query)))
            .rev()
            .find(|(key, _)| query.starts_with(key))
            .map(|(_, entry)| entry.clone())
    }

    /// The entry with the smallest key strictly greater than `after`.
    pub(crate) fn entry_after(&self, after: &Oid) -> Option<HandlerEntry> {
        let entries = self.entries.lock().unwrap();
        entries
            .range::<Oid, _>((Bound::Excluded(after), Bound::Unbounded))
            .next()
            .map(|(_, entry)| entry.clone())
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{BoxFuture, HandlerResult, TxnHandle};
    use crate::oid;
    use crate::value::Value;
    use crate::varbind::VarBind;

    struct DummyHandler(i32);

    impl OidHandler for DummyHandler {
        fn get<'a>(
            &'a self,
            oid: &'a Oid,
            _txn: Option<&'a TxnHandle>,
        ) -> BoxFuture<'a, HandlerResult> {
            let marker = self.0;
            Box::pin(async move { Ok(VarBind::new(oid.clone(), Value::Integer(marker))) })
        }

        fn set<'a>(
            &'a self,
            varbind: &'a VarBind,
            _txn: Option<&'a TxnHandle>,
        ) -> BoxFuture<'a, HandlerResult> {
            Box::pin(async move { Ok(varbind.clone()) })
        }
    }

    fn registry_with(prefixes: &[(Oid, i32)]) -> OidRegistry {
        let registry = OidRegistry::new();
        for (prefix, marker) in prefixes {
            registry
                .register(prefix.clone(), false, Arc::new(DummyHandler(*marker)))
                .unwrap();
        }
        registry
    }

    async fn marker_of(registry: &OidRegistry, query: &Oid) -> Option<i32> {
        let entry = registry.lookup(query)?;
        let vb = entry.handler.get(query, None).await.ok()?;
        vb.value.as_i32()
    }

    #[tokio::test]
    async fn test_longest_prefix_wins() {
        // H1 at 1.3.6, H2 at 1.3.6.1.2: the longer registered prefix
        // answers anything beneath it, the shorter one the rest.
        let registry = registry_with(&[(oid!(1, 3, 6), 1), (oid!(1, 3, 6, 1, 2), 2)]);

        assert_eq!(marker_of(&registry, &oid!(1, 3, 6, 1, 2, 0, 5)).await, Some(2));
        assert_eq!(marker_of(&registry, &oid!(1, 3, 6, 4)).await, Some(1));
        assert!(registry.lookup(&oid!(1, 3)).is_none());
    }

    #[tokio::test]
    async fn test_exact_match_is_a_prefix() {
        let registry = registry_with(&[(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), 7)]);
        assert_eq!(
            marker_of(&registry, &oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)).await,
            Some(7)
        );
        assert!(registry.lookup(&oid!(1, 3, 6, 1, 2, 1, 1, 1)).is_none());
    }

    #[test]
    fn test_lookup_between_unrelated_entries() {
        let registry = registry_with(&[(oid!(1, 3, 5), 1), (oid!(1, 3, 7), 2)]);
        // 1.3.6.x falls between the entries and matches neither
        assert!(registry.lookup(&oid!(1, 3, 6, 1)).is_none());
    }

    #[test]
    fn test_duplicate_prefix_rejected() {
        let registry = registry_with(&[(oid!(1, 3, 6), 1)]);
        let result = registry.register(oid!(1, 3, 6), false, Arc::new(DummyHandler(2)));
        assert!(matches!(result, Err(Error::DuplicateHandler(_))));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_entry_after_walks_in_order() {
        let registry = registry_with(&[
            (oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), 1),
            (oid!(1, 3, 6, 1, 2, 1, 1, 2, 0), 2),
            (oid!(1, 3, 6, 1, 4, 1), 3),
        ]);

        let first = registry.entry_after(&oid!(1, 3)).unwrap();
        assert_eq!(first.prefix, oid!(1, 3, 6, 1, 2, 1, 1, 1, 0));

        let second = registry.entry_after(&first.prefix).unwrap();
        assert_eq!(second.prefix, oid!(1, 3, 6, 1, 2, 1, 1, 2, 0));

        let third = registry.entry_after(&second.prefix).unwrap();
        assert_eq!(third.prefix, oid!(1, 3, 6, 1, 4, 1));

        assert!(registry.entry_after(&third.prefix).is_none());
    }
}
