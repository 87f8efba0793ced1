//! Hot-swappable holder of the active catalog snapshot.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use super::{fetch_with_timeout, CatalogProvider, CatalogResult, CatalogSnapshot};

/// Holds the active snapshot.
///
/// Readers clone the `Arc` and keep working against that snapshot for the
/// whole request; a reload builds the replacement off to the side and swaps
/// it in with a single pointer write.
#[derive(Debug)]
pub struct CatalogStore {
    current: RwLock<Arc<CatalogSnapshot>>,
}

impl CatalogStore {
    /// Create a new store around an initial snapshot.
    pub fn new(initial: CatalogSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    /// The snapshot in effect right now.
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        let guard = self.current.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    /// Replace the active snapshot.
    pub fn publish(&self, snapshot: CatalogSnapshot) -> Arc<CatalogSnapshot> {
        let next = Arc::new(snapshot);
        let mut guard = self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::clone(&next);
        next
    }

    /// Fetch from `provider`, validate, and publish with the next version.
    ///
    /// On any failure the previous snapshot stays active and the error is
    /// returned.
    pub fn reload(
        &self,
        provider: Arc<dyn CatalogProvider>,
        timeout: Duration,
    ) -> CatalogResult<Arc<CatalogSnapshot>> {
        let description = provider.describe();
        let previous = self.snapshot();

        let loaded = fetch_with_timeout(provider, timeout)
            .and_then(|source| CatalogSnapshot::load_versioned(&source, previous.version() + 1));

        match loaded {
            Ok(snapshot) => {
                let published = self.publish(snapshot);
                tracing::info!(
                    provider = %description,
                    version = published.version(),
                    fingerprint = %published.fingerprint(),
                    drugs = published.drug_count(),
                    "Catalog reloaded"
                );
                Ok(published)
            }
            Err(e) => {
                tracing::warn!(
                    provider = %description,
                    version = previous.version(),
                    error = %e,
                    "Catalog reload failed, keeping previous snapshot"
                );
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogLoadError, CatalogSource, DrugRecord, InteractionRecord, StaticProvider};
    use crate::models::Severity;

    fn source(severity: &str) -> CatalogSource {
        CatalogSource {
            drugs: vec![
                DrugRecord::new("warfarin", "Warfarin", "anticoagulant"),
                DrugRecord::new("aspirin", "Aspirin", "nsaid"),
            ],
            interactions: vec![InteractionRecord::new("warfarin", "aspirin", severity, "bleeding")],
            dosage_rules: vec![],
        }
    }

    #[test]
    fn test_reload_increments_version() {
        let store = CatalogStore::new(CatalogSnapshot::load(&source("moderate")).unwrap());
        assert_eq!(store.snapshot().version(), 0);

        let provider = Arc::new(StaticProvider::new("test", source("severe")));
        let published = store.reload(provider, Duration::from_secs(1)).unwrap();

        assert_eq!(published.version(), 1);
        assert_eq!(store.snapshot().severity("aspirin", "warfarin"), Severity::Severe);
    }

    #[test]
    fn test_failed_reload_keeps_previous() {
        let store = CatalogStore::new(CatalogSnapshot::load(&source("moderate")).unwrap());
        let before = store.snapshot();

        let provider = Arc::new(StaticProvider::new("bad", source("apocalyptic")));
        let err = store.reload(provider, Duration::from_secs(1)).unwrap_err();

        assert!(matches!(err, CatalogLoadError::InvalidSeverity { .. }));
        let after = store.snapshot();
        assert!(Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn test_held_snapshot_survives_swap() {
        let store = CatalogStore::new(CatalogSnapshot::load(&source("moderate")).unwrap());
        let held = store.snapshot();

        store.publish(CatalogSnapshot::load_versioned(&source("severe"), 7).unwrap());

        assert_eq!(held.severity("aspirin", "warfarin"), Severity::Moderate);
        assert_eq!(store.snapshot().version(), 7);
    }
}
