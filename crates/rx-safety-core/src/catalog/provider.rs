//! Catalog providers.
//!
//! A provider fetches a raw [`CatalogSource`]; validation and indexing stay
//! with [`CatalogSnapshot::load`](super::CatalogSnapshot::load).

use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use super::{CatalogLoadError, CatalogResult, CatalogSource};
use crate::db::Database;

/// Source of catalog data.
pub trait CatalogProvider: Send + Sync + Debug {
    /// Fetch the full catalog source.
    fn fetch(&self) -> CatalogResult<CatalogSource>;

    /// Human-readable provider description for logs and errors.
    fn describe(&self) -> String;
}

/// Reads a JSON catalog document from disk.
#[derive(Debug, Clone)]
pub struct JsonFileProvider {
    path: PathBuf,
}

impl JsonFileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CatalogProvider for JsonFileProvider {
    fn fetch(&self) -> CatalogResult<CatalogSource> {
        let text = std::fs::read_to_string(&self.path)?;
        Ok(CatalogSource::from_json(&text)?)
    }

    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }
}

/// Reads the catalog tables of a SQLite database.
///
/// A fresh connection is opened per fetch so the provider can be shared
/// across threads.
#[derive(Debug, Clone)]
pub struct SqliteProvider {
    path: PathBuf,
}

impl SqliteProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CatalogProvider for SqliteProvider {
    fn fetch(&self) -> CatalogResult<CatalogSource> {
        if !self.path.exists() {
            return Err(CatalogLoadError::Unavailable {
                provider: self.describe(),
                reason: "database file does not exist".to_string(),
            });
        }
        let db = Database::open_read_only(&self.path)?;
        Ok(db.load_catalog_source()?)
    }

    fn describe(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }
}

/// In-memory provider, mainly for embedding and tests.
#[derive(Debug, Clone)]
pub struct StaticProvider {
    name: String,
    source: CatalogSource,
    delay: Option<Duration>,
}

impl StaticProvider {
    pub fn new(name: &str, source: CatalogSource) -> Self {
        Self {
            name: name.to_string(),
            source,
            delay: None,
        }
    }

    /// Simulate a slow upstream.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl CatalogProvider for StaticProvider {
    fn fetch(&self) -> CatalogResult<CatalogSource> {
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        Ok(self.source.clone())
    }

    fn describe(&self) -> String {
        format!("static:{}", self.name)
    }
}

/// Run `provider.fetch()` on a worker thread and give up after `timeout`.
///
/// A timed-out worker is detached; its result is discarded when it finishes.
pub fn fetch_with_timeout(
    provider: Arc<dyn CatalogProvider>,
    timeout: Duration,
) -> CatalogResult<CatalogSource> {
    let description = provider.describe();
    let (tx, rx) = mpsc::channel();

    thread::Builder::new()
        .name("catalog-fetch".to_string())
        .spawn(move || {
            // Receiver may be gone after a timeout.
            let _ = tx.send(provider.fetch());
        })?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => Err(CatalogLoadError::Timeout {
            provider: description,
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(CatalogLoadError::Unavailable {
            provider: description,
            reason: "fetch worker exited without a result".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DrugRecord;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn one_drug() -> CatalogSource {
        CatalogSource {
            drugs: vec![DrugRecord::new("aspirin", "Aspirin", "nsaid")],
            ..Default::default()
        }
    }

    #[test]
    fn test_json_file_provider() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"drugs": [{{"id": "aspirin", "name": "Aspirin", "class": "nsaid"}}]}}"#
        )
        .unwrap();

        let provider = JsonFileProvider::new(file.path());
        let source = provider.fetch().unwrap();
        assert_eq!(source.drugs.len(), 1);
        assert!(provider.describe().starts_with("json:"));
    }

    #[test]
    fn test_json_file_provider_missing_file() {
        let provider = JsonFileProvider::new("/nonexistent/catalog.json");
        assert!(matches!(provider.fetch().unwrap_err(), CatalogLoadError::Io(_)));
    }

    #[test]
    fn test_json_file_provider_malformed() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();

        let provider = JsonFileProvider::new(file.path());
        assert!(matches!(provider.fetch().unwrap_err(), CatalogLoadError::Parse(_)));
    }

    #[test]
    fn test_sqlite_provider_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let provider = SqliteProvider::new(dir.path().join("missing.db"));
        assert!(matches!(
            provider.fetch().unwrap_err(),
            CatalogLoadError::Unavailable { .. }
        ));
    }

    #[test]
    fn test_fetch_with_timeout_ok() {
        let provider: Arc<dyn CatalogProvider> = Arc::new(StaticProvider::new("fast", one_drug()));
        let source = fetch_with_timeout(provider, Duration::from_secs(2)).unwrap();
        assert_eq!(source, one_drug());
    }

    #[test]
    fn test_fetch_with_timeout_expires() {
        let provider: Arc<dyn CatalogProvider> =
            Arc::new(StaticProvider::new("slow", one_drug()).with_delay(Duration::from_millis(500)));
        let err = fetch_with_timeout(provider, Duration::from_millis(20)).unwrap_err();
        assert!(matches!(err, CatalogLoadError::Timeout { timeout_ms: 20, .. }));
    }
}
