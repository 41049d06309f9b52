//! Versioned mapping registry
//!
//! Mappings are keyed by endpoint configuration. Per endpoint there is at
//! most one active mapping per (name, version); requests may pin a version,
//! otherwise the highest-priority active version applies.

use crate::types::{MappingDirection, PayloadSchemaMapping};
use crate::{Error, Result};
use dashmap::DashMap;
use uuid::Uuid;

/// In-process registry of payload schema mappings
pub struct MappingRegistry {
    mappings: DashMap<Uuid, Vec<PayloadSchemaMapping>>,
}

impl MappingRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            mappings: DashMap::new(),
        }
    }

    /// Register or replace a mapping.
    ///
    /// A mapping with the same (name, version) for the endpoint is replaced,
    /// keeping the at-most-one-active invariant per version.
    pub fn upsert(&self, mapping: PayloadSchemaMapping) {
        let mut entry = self.mappings.entry(mapping.endpoint_config_id).or_default();
        entry.retain(|m| {
            !(m.mapping_name == mapping.mapping_name && m.version == mapping.version)
        });
        entry.push(mapping);
    }

    /// Resolve a mapping for execution.
    ///
    /// `version` pins an exact version; otherwise the active version with
    /// the highest (priority, version) wins.
    pub fn resolve(
        &self,
        endpoint_config_id: Uuid,
        mapping_name: &str,
        direction: MappingDirection,
        version: Option<u32>,
    ) -> Result<PayloadSchemaMapping> {
        self.mappings
            .get(&endpoint_config_id)
            .and_then(|mappings| {
                mappings
                    .iter()
                    .filter(|m| {
                        m.active
                            && m.mapping_name == mapping_name
                            && m.direction.covers(direction)
                            && version.map(|v| m.version == v).unwrap_or(true)
                    })
                    .max_by_key(|m| (m.priority, m.version))
                    .cloned()
            })
            .ok_or_else(|| Error::MappingNotFound {
                mapping_name: mapping_name.to_string(),
                endpoint_config_id,
            })
    }

    /// All mappings registered for an endpoint
    pub fn list(&self, endpoint_config_id: Uuid) -> Vec<PayloadSchemaMapping> {
        self.mappings
            .get(&endpoint_config_id)
            .map(|m| m.clone())
            .unwrap_or_default()
    }
}

impl Default for MappingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MappingType;

    fn mapping(endpoint: Uuid, name: &str, version: u32, priority: i32) -> PayloadSchemaMapping {
        let mut m = PayloadSchemaMapping::new(
            endpoint,
            name,
            MappingType::Object,
            MappingDirection::Bidirectional,
            version,
        );
        m.priority = priority;
        m
    }

    #[test]
    fn test_highest_priority_active_version_wins() {
        let registry = MappingRegistry::new();
        let endpoint = Uuid::new_v4();

        registry.upsert(mapping(endpoint, "debit-request", 1, 0));
        registry.upsert(mapping(endpoint, "debit-request", 2, 5));
        registry.upsert(mapping(endpoint, "debit-request", 3, 1));

        let resolved = registry
            .resolve(endpoint, "debit-request", MappingDirection::Request, None)
            .unwrap();
        assert_eq!(resolved.version, 2);
    }

    #[test]
    fn test_pinned_version() {
        let registry = MappingRegistry::new();
        let endpoint = Uuid::new_v4();

        registry.upsert(mapping(endpoint, "debit-request", 1, 0));
        registry.upsert(mapping(endpoint, "debit-request", 2, 5));

        let resolved = registry
            .resolve(endpoint, "debit-request", MappingDirection::Request, Some(1))
            .unwrap();
        assert_eq!(resolved.version, 1);
    }

    #[test]
    fn test_upsert_replaces_same_name_and_version() {
        let registry = MappingRegistry::new();
        let endpoint = Uuid::new_v4();

        registry.upsert(mapping(endpoint, "debit-request", 1, 0));
        registry.upsert(mapping(endpoint, "debit-request", 1, 9));

        assert_eq!(registry.list(endpoint).len(), 1);
        let resolved = registry
            .resolve(endpoint, "debit-request", MappingDirection::Request, None)
            .unwrap();
        assert_eq!(resolved.priority, 9);
    }

    #[test]
    fn test_inactive_and_wrong_direction_excluded() {
        let registry = MappingRegistry::new();
        let endpoint = Uuid::new_v4();

        let mut inactive = mapping(endpoint, "debit-request", 1, 0);
        inactive.active = false;
        registry.upsert(inactive);

        let mut response_only = mapping(endpoint, "debit-request", 2, 0);
        response_only.direction = MappingDirection::Response;
        registry.upsert(response_only);

        assert!(registry
            .resolve(endpoint, "debit-request", MappingDirection::Request, None)
            .is_err());
    }
}
