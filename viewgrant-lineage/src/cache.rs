//! Call-scoped catalog cache.
//!
//! A [`ResolverCache`] is created by the resolver at the start of one
//! top-level resolution and dropped when it returns. It is never shared
//! across resolutions.

use std::collections::HashMap;

use tracing::{error, warn};
use viewgrant_core::{CatalogObject, CatalogObjectRef, GatewayError};
use viewgrant_gateway::CatalogGateway;

/// Memoized `get_object` responses for one resolution.
///
/// "Not found" is stored as an [`ObjectKind::Unknown`](viewgrant_core::ObjectKind)
/// object; gateway failures are stored as errors so a failing object is
/// fetched at most once per resolution.
#[derive(Debug, Default)]
pub(crate) struct ResolverCache {
    entries: HashMap<CatalogObjectRef, Result<CatalogObject, GatewayError>>,
    hits: usize,
}

impl ResolverCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fetch through the cache.
    pub(crate) async fn fetch(
        &mut self,
        catalog: &dyn CatalogGateway,
        object: &CatalogObjectRef,
    ) -> Result<CatalogObject, GatewayError> {
        if let Some(entry) = self.entries.get(object) {
            self.hits += 1;
            return entry.clone();
        }

        let entry = match catalog.get_object(object).await {
            Ok(Some(found)) => Ok(found),
            Ok(None) => {
                warn!(
                    object = %object,
                    catalog_id = %object.catalog_id,
                    "Referenced object is neither a view nor a table, likely a parsing artifact"
                );
                Ok(CatalogObject::unknown(object.clone()))
            }
            Err(err) => {
                error!(object = %object, error = %err, "Catalog lookup failed");
                Err(err)
            }
        };
        self.entries.insert(object.clone(), entry.clone());
        entry
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn hits(&self) -> usize {
        self.hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use viewgrant_core::ObjectKind;
    use viewgrant_gateway::MockCatalog;

    fn obj(name: &str) -> CatalogObjectRef {
        CatalogObjectRef::new("111111111111", "sales", name)
    }

    #[tokio::test]
    async fn test_fetch_memoizes_found_missing_and_failed() {
        let catalog = MockCatalog::new();
        catalog.insert_table(obj("orders"));
        catalog.fail_on(obj("broken"));

        let mut cache = ResolverCache::new();
        for _ in 0..3 {
            let found = cache.fetch(&catalog, &obj("orders")).await.expect("found");
            assert_eq!(found.kind, ObjectKind::Table);
            let missing = cache.fetch(&catalog, &obj("ghost")).await.expect("leaf");
            assert_eq!(missing.kind, ObjectKind::Unknown);
            assert!(cache.fetch(&catalog, &obj("broken")).await.is_err());
        }

        assert_eq!(catalog.get_count(&obj("orders")), 1);
        assert_eq!(catalog.get_count(&obj("ghost")), 1);
        assert_eq!(catalog.get_count(&obj("broken")), 1);
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.hits(), 6);
    }
}
