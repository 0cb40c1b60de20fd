use crate::domain::account::OwnerId;
use crate::domain::ports::IdentityResolver;
use crate::error::{Result, WalletError};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Resolves external identities from a registry held in memory.
///
/// Stands in for the user directory of the surrounding system: callers are
/// registered up front and anything unknown is refused. Owner ids are
/// derived from the identity string, so a restarted process that registers
/// the same callers finds their persisted accounts again.
#[derive(Default)]
pub struct StaticIdentityResolver {
    owners: RwLock<BTreeMap<String, OwnerId>>,
}

impl StaticIdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, identity: &str) -> OwnerId {
        *self
            .owners
            .write()
            .entry(identity.to_string())
            .or_insert_with(|| {
                OwnerId::from_uuid(Uuid::new_v5(&Uuid::NAMESPACE_OID, identity.as_bytes()))
            })
    }

    /// Registered identities in lexical order.
    pub fn identities(&self) -> Vec<String> {
        self.owners.read().keys().cloned().collect()
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentityResolver {
    async fn resolve(&self, identity: &str) -> Result<OwnerId> {
        self.owners
            .read()
            .get(identity)
            .copied()
            .ok_or_else(|| WalletError::Forbidden(format!("unknown caller `{identity}`")))
    }
}
