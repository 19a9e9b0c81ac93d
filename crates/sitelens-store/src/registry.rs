//! Per-tenant store registry.
//!
//! Each tracked domain owns a pair of database files under the data
//! directory, both named by the domain's deterministic storage key:
//! `<key>.db` (`SQLite`, authoritative) and `<key>.duckdb` (analytical).
//! Handles are opened lazily on first access and cached; the map is sharded
//! so initializing one tenant never blocks reads of another.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use sitelens_core::identity::storage_key;

use crate::analytic::AnalyticStore;
use crate::errors::Result;
use crate::sqlite::{self, ConnectionConfig, ConnectionPool};

/// One tenant's pair of store handles.
pub struct TenantStore {
    domain: String,
    pool: ConnectionPool,
    analytic: AnalyticStore,
}

impl TenantStore {
    /// Open (or create) both databases for a domain and run migrations.
    pub fn open(data_dir: &Path, domain: &str) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let key = storage_key(domain);

        let sqlite_path = data_dir.join(format!("{key}.db"));
        let pool = sqlite::new_file(&sqlite_path, &ConnectionConfig::default())?;
        let conn = pool.get()?;
        let _ = sqlite::run_migrations(&conn)?;
        drop(conn);

        let duckdb_path = data_dir.join(format!("{key}.duckdb"));
        let analytic = AnalyticStore::open(&duckdb_path)?;

        info!(domain, ?sqlite_path, ?duckdb_path, "tenant stores opened");
        Ok(Self {
            domain: domain.to_string(),
            pool,
            analytic,
        })
    }

    /// In-memory tenant for testing.
    pub fn open_in_memory(domain: &str) -> Result<Self> {
        let pool = sqlite::new_in_memory(&ConnectionConfig::default())?;
        let conn = pool.get()?;
        let _ = sqlite::run_migrations(&conn)?;
        drop(conn);
        Ok(Self {
            domain: domain.to_string(),
            pool,
            analytic: AnalyticStore::open_in_memory()?,
        })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Authoritative store connection pool.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Analytical store handle.
    pub fn analytic(&self) -> &AnalyticStore {
        &self.analytic
    }
}

/// Lazily-opening registry of tenant stores, keyed by domain.
pub struct StoreRegistry {
    data_dir: PathBuf,
    stores: DashMap<String, Arc<TenantStore>>,
}

impl StoreRegistry {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            stores: DashMap::new(),
        }
    }

    /// The cached handle for a domain, opening it on first access.
    ///
    /// Two threads racing on a cold domain may both open a handle; the
    /// first registration wins and the loser is dropped.
    pub fn get_or_open(&self, domain: &str) -> Result<Arc<TenantStore>> {
        if let Some(store) = self.stores.get(domain) {
            return Ok(Arc::clone(&store));
        }
        let opened = Arc::new(TenantStore::open(&self.data_dir, domain)?);
        let entry = self
            .stores
            .entry(domain.to_string())
            .or_insert_with(|| Arc::clone(&opened));
        Ok(Arc::clone(&entry))
    }
}
