//! Identity resolution: maps an opaque identifier to a display name.
//!
//! The mapping is data held by an [`IdentityRegistry`] built once at startup.
//! An identifier that is empty or not in the registry resolves to an empty
//! name; that is a normal reply, not a failure.

use async_trait::async_trait;
use std::{collections::HashMap, sync::Arc};
use tracing::{info, warn};

use crate::services::greeter::{server::GreeterHandler, IdentityReply, IdentityRequest};
use crate::Status;

/// Read-only lookup from identifier to display name.
pub trait IdentityRegistry: Send + Sync + 'static {
    fn lookup(&self, id: &str) -> Option<&str>;
}

/// In-memory registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticRegistry {
    entries: HashMap<String, String>,
}

impl StaticRegistry {
    /// Builds a registry from `(id, name)` pairs. Entries with an empty id
    /// are dropped; a repeated id keeps its last name.
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let entries = entries
            .into_iter()
            .map(|(id, name)| (id.into(), name.into()))
            .filter(|(id, _)| !id.is_empty())
            .collect();
        Self { entries }
    }

    /// The reference directory: `123`, `456` and `789`.
    pub fn builtin() -> Self {
        Self::new([("123", "John"), ("456", "Mary"), ("789", "Sebina")])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IdentityRegistry for StaticRegistry {
    fn lookup(&self, id: &str) -> Option<&str> {
        self.entries.get(id).map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StaticRegistry {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self::new(iter)
    }
}

/// Parses a registry entry of the form `id=name`.
///
/// The name may be empty or contain `=`; the id may not be empty.
pub fn parse_identity_entry(raw: &str) -> Result<(String, String), String> {
    let (id, name) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected ID=NAME, got `{raw}`"))?;
    let id = id.trim();
    if id.is_empty() {
        return Err(format!("identity entry `{raw}` has an empty id"));
    }
    Ok((id.to_string(), name.trim().to_string()))
}

/// `Greeter` handler backed by an [`IdentityRegistry`].
#[derive(Debug)]
pub struct IdentityResolver<R = StaticRegistry> {
    registry: Arc<R>,
}

impl<R> Clone for IdentityResolver<R> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
        }
    }
}

impl Default for IdentityResolver {
    fn default() -> Self {
        Self::new(StaticRegistry::builtin())
    }
}

impl<R: IdentityRegistry> IdentityResolver<R> {
    pub fn new(registry: R) -> Self {
        Self::shared(Arc::new(registry))
    }

    pub fn shared(registry: Arc<R>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Resolves `id` to a greeting. Never fails.
    pub fn resolve(&self, id: &str) -> IdentityReply {
        info!(id = %id, "Received ID");

        let name = match id {
            "" => None,
            id => self.registry.lookup(id),
        };

        match name {
            Some(name) => IdentityReply::greeting(name),
            None => {
                warn!(id = %id, "unrecognized identifier");
                IdentityReply::greeting("")
            }
        }
    }
}

#[async_trait]
impl<R: IdentityRegistry> GreeterHandler for IdentityResolver<R> {
    async fn say_hello(&self, request: IdentityRequest) -> Result<IdentityReply, Status> {
        Ok(self.resolve(&request.id))
    }
}
