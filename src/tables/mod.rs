pub mod ingest;
pub mod types;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use types::Table;

/// Tabs of the USITTEL operations workbook, by gid.
const SHEET_TABS: &[(&str, &str)] = &[
    ("naps", "443573341"),
    ("clientes_naps", "443573341"),
    ("clientes_cuentas", "101720087"),
    ("clientes_datos", "1694258191"),
    ("tickets", "0"),
    ("clientes_olts", "819538991"),
    ("dashboards", "44575307"),
];

const DEFAULT_TTL_SECS: u64 = 60;

/// A named remote CSV endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetSource {
    pub name: String,
    pub url: String,
}

/// Parse `name=url;name=url` into sources.
pub fn parse_sources(spec: &str) -> Result<Vec<SheetSource>> {
    let mut sources = Vec::new();
    for entry in spec.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let Some((name, url)) = entry.split_once('=') else {
            bail!("Invalid sheet source '{}', expected name=url", entry);
        };
        let (name, url) = (name.trim(), url.trim());
        if name.is_empty() || url.is_empty() {
            bail!("Invalid sheet source '{}', expected name=url", entry);
        }
        sources.push(SheetSource {
            name: name.to_string(),
            url: url.to_string(),
        });
    }
    Ok(sources)
}

/// CSV export URLs for every known tab of a Google Sheets document.
pub fn google_sheet_sources(document_id: &str) -> Vec<SheetSource> {
    SHEET_TABS
        .iter()
        .map(|(name, gid)| SheetSource {
            name: name.to_string(),
            url: format!(
                "https://docs.google.com/spreadsheets/d/{}/export?format=csv&gid={}",
                document_id, gid
            ),
        })
        .collect()
}

/// A source that could not be loaded on the last refresh.
#[derive(Debug, Clone)]
pub struct SourceFailure {
    pub name: String,
    pub error: String,
}

/// Immutable snapshot of every table that loaded successfully.
#[derive(Debug, Default)]
pub struct Catalog {
    tables: BTreeMap<String, Arc<Table>>,
    failures: Vec<SourceFailure>,
    refreshed_at: Option<DateTime<Utc>>,
}

impl Catalog {
    pub fn new(tables: Vec<Table>) -> Self {
        Self {
            tables: tables
                .into_iter()
                .map(|t| (t.name().to_string(), Arc::new(t)))
                .collect(),
            failures: Vec::new(),
            refreshed_at: Some(Utc::now()),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<Table>> {
        self.tables.get(name).cloned()
    }

    pub fn tables(&self) -> impl Iterator<Item = &Arc<Table>> {
        self.tables.values()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }

    pub fn failures(&self) -> &[SourceFailure] {
        &self.failures
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

struct Loaded {
    at: Instant,
    catalog: Arc<Catalog>,
}

/// Periodically refreshed, in-memory copy of the remote sheets.
pub struct TableStore {
    client: reqwest::Client,
    sources: Vec<SheetSource>,
    ttl: Duration,
    current: RwLock<Option<Loaded>>,
    refresh_lock: Mutex<()>,
}

impl TableStore {
    pub fn from_env() -> Result<Self> {
        let sources = match dotenv::var("SHEET_SOURCES").ok().filter(|s| !s.trim().is_empty()) {
            Some(spec) => parse_sources(&spec)?,
            None => {
                let doc_id = dotenv::var("SHEETS_DOCUMENT_ID")
                    .context("Set SHEET_SOURCES or SHEETS_DOCUMENT_ID")?;
                google_sheet_sources(doc_id.trim())
            }
        };
        let ttl_secs = dotenv::var("SHEETS_TTL_SECS")
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_TTL_SECS);

        Self::new(sources, Duration::from_secs(ttl_secs))
    }

    pub fn new(sources: Vec<SheetSource>, ttl: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            sources,
            ttl,
            current: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        })
    }

    /// A store serving a fixed set of tables that never expires.
    #[cfg(test)]
    pub fn with_tables(tables: Vec<Table>) -> Self {
        Self {
            client: reqwest::Client::new(),
            sources: Vec::new(),
            ttl: Duration::MAX,
            current: RwLock::new(Some(Loaded {
                at: Instant::now(),
                catalog: Arc::new(Catalog::new(tables)),
            })),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn sources(&self) -> &[SheetSource] {
        &self.sources
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Current catalog, reloading first if the last load has expired.
    pub async fn catalog(&self) -> Arc<Catalog> {
        if let Some(catalog) = self.fresh().await {
            return catalog;
        }

        let _guard = self.refresh_lock.lock().await;
        // Another task may have refreshed while we waited
        if let Some(catalog) = self.fresh().await {
            return catalog;
        }
        self.load().await
    }

    /// Reload every source now, regardless of expiry.
    pub async fn refresh(&self) -> Arc<Catalog> {
        let _guard = self.refresh_lock.lock().await;
        self.load().await
    }

    async fn fresh(&self) -> Option<Arc<Catalog>> {
        let current = self.current.read().await;
        current
            .as_ref()
            .filter(|l| l.at.elapsed() < self.ttl)
            .map(|l| l.catalog.clone())
    }

    async fn load(&self) -> Arc<Catalog> {
        info!(sources = self.sources.len(), "Loading sheets");

        let results = join_all(self.sources.iter().map(|source| async move {
            let result = ingest::fetch_table(&self.client, &source.name, &source.url).await;
            (source, result)
        }))
        .await;

        let previous = self.current.read().await.as_ref().map(|l| l.catalog.clone());

        let mut loaded = Vec::new();
        let mut failures = Vec::new();
        for (source, result) in results {
            match result {
                Ok(table) => {
                    let unchanged = previous
                        .as_ref()
                        .and_then(|p| p.get(&source.name))
                        .is_some_and(|old| old.digest() == table.digest());
                    if unchanged {
                        debug!(table = %source.name, "sheet unchanged since last load");
                    }
                    info!(table = %source.name, rows = table.row_count(), "sheet loaded");
                    loaded.push(table);
                }
                Err(e) => {
                    warn!(table = %source.name, "sheet failed to load: {:#}", e);
                    failures.push(SourceFailure {
                        name: source.name.clone(),
                        error: format!("{:#}", e),
                    });
                }
            }
        }
        let catalog = Catalog {
            failures,
            ..Catalog::new(loaded)
        };

        info!(
            loaded = catalog.len(),
            failed = catalog.failures.len(),
            "Sheets refreshed"
        );

        let catalog = Arc::new(catalog);
        *self.current.write().await = Some(Loaded {
            at: Instant::now(),
            catalog: catalog.clone(),
        });
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::types::{Column, ColumnKind};
    use super::*;

    #[test]
    fn test_parse_sources() {
        let sources =
            parse_sources("tickets=https://example.com/t.csv; naps = https://example.com/n.csv;")
                .unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].name, "tickets");
        assert_eq!(sources[1].name, "naps");
        assert_eq!(sources[1].url, "https://example.com/n.csv");
    }

    #[test]
    fn test_parse_sources_keeps_query_string() {
        let sources = parse_sources("t=https://x.test/export?format=csv&gid=0").unwrap();
        assert_eq!(sources[0].url, "https://x.test/export?format=csv&gid=0");
    }

    #[test]
    fn test_parse_sources_rejects_missing_url() {
        assert!(parse_sources("tickets").is_err());
        assert!(parse_sources("tickets=").is_err());
    }

    #[test]
    fn test_google_sheet_sources() {
        let sources = google_sheet_sources("DOC");
        assert_eq!(sources.len(), SHEET_TABS.len());
        let tickets = sources.iter().find(|s| s.name == "tickets").unwrap();
        assert_eq!(
            tickets.url,
            "https://docs.google.com/spreadsheets/d/DOC/export?format=csv&gid=0"
        );
    }

    #[tokio::test]
    async fn test_static_store_serves_tables() {
        let store = TableStore::with_tables(vec![Table::new(
            "tickets",
            vec![Column::new("Estado", ColumnKind::Text)],
            vec![],
        )]);
        let catalog = store.catalog().await;
        assert_eq!(catalog.names(), vec!["tickets"]);
        assert!(catalog.get("naps").is_none());
    }

    #[tokio::test]
    async fn test_unreachable_source_is_absent_from_catalog() {
        let store = TableStore::new(
            vec![SheetSource {
                name: "tickets".into(),
                url: "http://127.0.0.1:9/tickets.csv".into(),
            }],
            Duration::from_secs(60),
        )
        .unwrap();
        let catalog = store.catalog().await;
        assert!(catalog.is_empty());
        assert_eq!(catalog.failures().len(), 1);
        assert_eq!(catalog.failures()[0].name, "tickets");
    }
}
