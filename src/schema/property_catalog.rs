//! Property-definition catalog.
//!
//! The catalog is an external oracle mapping `(owner, name, tenant)` to a
//! declared property type; a missing entry means String. Lookups may be
//! remote in production deployments, so the coercion transform memoizes
//! within a single compile.

use std::collections::HashMap;

use super::types::{PropertyKind, PropertyOwner};

pub trait PropertyCatalog: Send + Sync {
    /// Declared type for a property, or `None` when the catalog has no
    /// definition (treated as String by the coercion transform).
    fn property_type(
        &self,
        owner: PropertyOwner,
        name: &str,
        tenant_id: u64,
    ) -> Option<PropertyKind>;
}

/// In-memory catalog, keyed per tenant.
#[derive(Debug, Default, Clone)]
pub struct MemoryPropertyCatalog {
    entries: HashMap<(u64, PropertyOwner, String), PropertyKind>,
}

impl MemoryPropertyCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(
        mut self,
        tenant_id: u64,
        owner: PropertyOwner,
        name: &str,
        kind: PropertyKind,
    ) -> Self {
        self.entries
            .insert((tenant_id, owner, name.to_string()), kind);
        self
    }
}

impl PropertyCatalog for MemoryPropertyCatalog {
    fn property_type(
        &self,
        owner: PropertyOwner,
        name: &str,
        tenant_id: u64,
    ) -> Option<PropertyKind> {
        self.entries
            .get(&(tenant_id, owner, name.to_string()))
            .copied()
    }
}

/// Per-compile memo over an arbitrary catalog. Repeated lookups of the same
/// property within one compilation hit the oracle once.
pub struct CachedPropertyLookup<'a> {
    catalog: &'a dyn PropertyCatalog,
    tenant_id: u64,
    cache: HashMap<(PropertyOwner, String), Option<PropertyKind>>,
}

impl<'a> CachedPropertyLookup<'a> {
    pub fn new(catalog: &'a dyn PropertyCatalog, tenant_id: u64) -> Self {
        CachedPropertyLookup {
            catalog,
            tenant_id,
            cache: HashMap::new(),
        }
    }

    pub fn lookup(&mut self, owner: PropertyOwner, name: &str) -> Option<PropertyKind> {
        if let Some(cached) = self.cache.get(&(owner, name.to_string())) {
            return *cached;
        }
        let kind = self.catalog.property_type(owner, name, self.tenant_id);
        self.cache.insert((owner, name.to_string()), kind);
        kind
    }

    pub fn has_definition(&mut self, owner: PropertyOwner, name: &str) -> bool {
        self.lookup(owner, name).is_some()
    }
}
