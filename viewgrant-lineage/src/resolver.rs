//! Lineage resolver.
//!
//! Depth-first expansion of a view's SQL into the set of catalog objects it
//! transitively references. The traversal runs on an explicit stack so depth
//! is bounded by heap, not by the call stack, and an object already on the
//! current expansion path is never expanded again, so circular view
//! definitions terminate.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use viewgrant_core::{CatalogObjectRef, LineageSet, ObjectKind, ResolutionError};
use viewgrant_gateway::CatalogGateway;

use crate::cache::ResolverCache;
use crate::definition::decode_view_definition;
use crate::sql::extract_table_references;

/// What one catalog object contributes to the traversal.
enum Expansion {
    /// Missing from the catalog, or the lookup failed. Excluded, not expanded.
    Unresolved,
    /// A table: included, nothing to expand.
    Leaf,
    /// A view: included, and these references are expanded next.
    View(Vec<CatalogObjectRef>),
}

struct Frame {
    object: CatalogObjectRef,
    pending: Vec<CatalogObjectRef>,
}

/// Resolves the dependency closure of tables and views.
#[derive(Clone)]
pub struct LineageResolver {
    catalog: Arc<dyn CatalogGateway>,
}

impl std::fmt::Debug for LineageResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineageResolver").finish_non_exhaustive()
    }
}

impl LineageResolver {
    pub fn new(catalog: Arc<dyn CatalogGateway>) -> Self {
        Self { catalog }
    }

    /// Resolve every object `root` depends on, excluding `root` itself.
    ///
    /// Tables, missing objects and failed lookups resolve to the empty set.
    /// A view whose stored definition cannot be decoded anywhere in the
    /// closure aborts the whole call. Decoded SQL that does not even tokenize
    /// only stops expansion below that view.
    #[instrument(skip(self), fields(root = %root))]
    pub async fn resolve(&self, root: &CatalogObjectRef) -> Result<LineageSet, ResolutionError> {
        let mut cache = ResolverCache::new();
        let mut lineage = LineageSet::new();

        let root_refs = match self.expand(&mut cache, root).await? {
            Expansion::View(refs) => refs,
            Expansion::Leaf | Expansion::Unresolved => {
                debug!("Root is not a view, no dependencies");
                return Ok(lineage);
            }
        };

        let mut on_path: HashSet<CatalogObjectRef> = HashSet::new();
        let mut expanded: HashSet<CatalogObjectRef> = HashSet::new();
        let mut stack = vec![Frame {
            object: root.clone(),
            pending: root_refs,
        }];
        on_path.insert(root.clone());

        loop {
            let next = match stack.last_mut() {
                Some(frame) => frame.pending.pop(),
                None => break,
            };

            let Some(next) = next else {
                if let Some(done) = stack.pop() {
                    on_path.remove(&done.object);
                    expanded.insert(done.object);
                }
                continue;
            };

            if on_path.contains(&next) {
                debug!(object = %next, "Circular reference, branch terminated");
                continue;
            }
            if expanded.contains(&next) {
                continue;
            }

            match self.expand(&mut cache, &next).await? {
                Expansion::Unresolved => {}
                Expansion::Leaf => {
                    lineage.insert(next);
                }
                Expansion::View(refs) => {
                    lineage.insert(next.clone());
                    on_path.insert(next.clone());
                    stack.push(Frame {
                        object: next,
                        pending: refs,
                    });
                }
            }
        }

        info!(
            dependencies = lineage.len(),
            fetched = cache.len(),
            cache_hits = cache.hits(),
            "Lineage resolved"
        );
        Ok(lineage)
    }

    async fn expand(
        &self,
        cache: &mut ResolverCache,
        object: &CatalogObjectRef,
    ) -> Result<Expansion, ResolutionError> {
        let fetched = match cache.fetch(self.catalog.as_ref(), object).await {
            Ok(fetched) => fetched,
            Err(_) => return Ok(Expansion::Unresolved),
        };

        match fetched.kind {
            ObjectKind::Unknown => Ok(Expansion::Unresolved),
            ObjectKind::Table => Ok(Expansion::Leaf),
            ObjectKind::View => {
                let stored = fetched.definition.as_deref().ok_or_else(|| {
                    ResolutionError::MalformedDefinition {
                        object: object.clone(),
                        reason: "view has no stored definition".to_string(),
                    }
                })?;
                let sql = decode_view_definition(object, stored)?;
                let references = match extract_table_references(&sql) {
                    Ok(references) => references,
                    Err(reason) => {
                        // Included, but its dependencies are unknown.
                        warn!(object = %object, %reason, "View SQL does not parse, not expanding");
                        return Ok(Expansion::View(Vec::new()));
                    }
                };

                // Reverse so the stack pops references in sorted order.
                Ok(Expansion::View(
                    references
                        .iter()
                        .rev()
                        .map(|reference| reference.resolve(object))
                        .collect(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::encode_view_definition;
    use viewgrant_gateway::MockCatalog;

    const CATALOG: &str = "111111111111";

    fn obj(db: &str, name: &str) -> CatalogObjectRef {
        CatalogObjectRef::new(CATALOG, db, name)
    }

    fn resolver(catalog: &Arc<MockCatalog>) -> LineageResolver {
        LineageResolver::new(catalog.clone())
    }

    #[tokio::test]
    async fn test_table_root_has_no_dependencies() {
        let catalog = Arc::new(MockCatalog::new());
        catalog.insert_table(obj("sales", "orders"));
        let lineage = resolver(&catalog).resolve(&obj("sales", "orders")).await.expect("ok");
        assert!(lineage.is_empty());
    }

    #[tokio::test]
    async fn test_missing_root_has_no_dependencies() {
        let catalog = Arc::new(MockCatalog::new());
        let lineage = resolver(&catalog).resolve(&obj("sales", "ghost")).await.expect("ok");
        assert!(lineage.is_empty());
    }

    #[tokio::test]
    async fn test_missing_reference_is_excluded() {
        let catalog = Arc::new(MockCatalog::new());
        catalog.insert_view(
            obj("sales", "v"),
            encode_view_definition("SELECT * FROM orders JOIN ghost ON orders.id = ghost.id"),
        );
        catalog.insert_table(obj("sales", "orders"));

        let lineage = resolver(&catalog).resolve(&obj("sales", "v")).await.expect("ok");
        assert_eq!(lineage.into_vec(), vec![obj("sales", "orders")]);
    }

    #[tokio::test]
    async fn test_failed_lookup_excludes_only_that_branch() {
        let catalog = Arc::new(MockCatalog::new());
        catalog.insert_view(
            obj("sales", "v"),
            encode_view_definition("SELECT * FROM a JOIN b ON a.id = b.id"),
        );
        catalog.insert_table(obj("sales", "a"));
        catalog.insert_table(obj("sales", "b"));
        catalog.fail_on(obj("sales", "a"));

        let lineage = resolver(&catalog).resolve(&obj("sales", "v")).await.expect("ok");
        assert_eq!(lineage.into_vec(), vec![obj("sales", "b")]);
    }

    #[tokio::test]
    async fn test_view_without_definition_is_malformed() {
        let catalog = Arc::new(MockCatalog::new());
        catalog.insert(viewgrant_core::CatalogObject {
            reference: obj("sales", "v"),
            kind: ObjectKind::View,
            definition: None,
        });
        let err = resolver(&catalog).resolve(&obj("sales", "v")).await.unwrap_err();
        assert!(matches!(err, ResolutionError::MalformedDefinition { .. }));
    }

    #[tokio::test]
    async fn test_self_referencing_view_terminates() {
        let catalog = Arc::new(MockCatalog::new());
        catalog.insert_view(
            obj("sales", "v"),
            encode_view_definition("SELECT * FROM v UNION ALL SELECT * FROM orders"),
        );
        catalog.insert_table(obj("sales", "orders"));

        let lineage = resolver(&catalog).resolve(&obj("sales", "v")).await.expect("ok");
        assert_eq!(lineage.into_vec(), vec![obj("sales", "orders")]);
        assert_eq!(catalog.get_count(&obj("sales", "v")), 1);
    }
}
