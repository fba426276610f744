// Data Repository - load both tables once, then serve aggregations
//
// The repository owns its CsvSource and a single cache slot. The first
// successful `ensure_loaded` parses both tables; every later call returns the
// cached Dataset without touching the source again. A failed load leaves the
// slot retryable.

use crate::error::{DataError, DataResult};
use crate::loader::{parse_companies, parse_transactions, CsvSource, Table};
use crate::metrics::{
    dashboard_metrics, monthly_trend, revenue_by_type, sector_aggregates, top_companies,
    DashboardMetrics, ExpenseEstimator, MonthlyBucket, SectorAggregate, TypeRevenue,
};
use crate::network::{company_flows, CompanyFlows, NetworkSummary};
use crate::records::{Company, Transaction};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{error, info};

// ============================================================================
// DATASET
// ============================================================================

/// Both tables, parsed
#[derive(Debug, Clone, Serialize)]
pub struct Dataset {
    pub companies: Vec<Company>,
    pub transactions: Vec<Transaction>,
    /// When the tables were parsed
    pub loaded_at: DateTime<Utc>,
    /// SHA-256 over the raw bytes of Base 1 followed by Base 2
    pub fingerprint: String,
}

impl Dataset {
    /// Build a dataset from already-parsed records (fingerprint left empty)
    pub fn from_records(companies: Vec<Company>, transactions: Vec<Transaction>) -> Self {
        Dataset {
            companies,
            transactions,
            loaded_at: Utc::now(),
            fingerprint: String::new(),
        }
    }

    /// Parse raw table bytes into a dataset
    pub fn parse(companies_raw: &[u8], transactions_raw: &[u8]) -> DataResult<Self> {
        let companies = parse_companies(companies_raw)?;
        let transactions = parse_transactions(transactions_raw)?;

        let mut hasher = Sha256::new();
        for raw in [companies_raw, transactions_raw] {
            hasher.update((raw.len() as u64).to_le_bytes());
            hasher.update(raw);
        }

        Ok(Dataset {
            companies,
            transactions,
            loaded_at: Utc::now(),
            fingerprint: format!("{:x}", hasher.finalize()),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.companies.is_empty() && self.transactions.is_empty()
    }

    pub fn find_company(&self, id: &str) -> Option<&Company> {
        self.companies.iter().find(|c| c.id == id)
    }
}

// ============================================================================
// LOAD STATE
// ============================================================================

/// What the repository currently holds
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LoadState {
    /// No load attempted yet
    NotLoaded,
    /// Loaded (possibly with zero rows)
    Loaded { companies: usize, transactions: usize },
    /// Last attempt failed; the next `ensure_loaded` retries
    Failed(String),
}

impl LoadState {
    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadState::Loaded { .. })
    }
}

enum CacheSlot {
    Empty,
    Ready(Arc<Dataset>),
    Failed(String),
}

// ============================================================================
// REPOSITORY
// ============================================================================

pub struct DataRepository<S: CsvSource> {
    source: S,
    cache: Mutex<CacheSlot>,
}

impl<S: CsvSource> DataRepository<S> {
    pub fn new(source: S) -> Self {
        DataRepository {
            source,
            cache: Mutex::new(CacheSlot::Empty),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Load both tables if not already loaded
    ///
    /// The cache lock is held for the whole load, so concurrent callers wait
    /// for the first fetch instead of fetching again.
    pub fn ensure_loaded(&self) -> DataResult<Arc<Dataset>> {
        let mut slot = self.lock();
        if let CacheSlot::Ready(dataset) = &*slot {
            return Ok(Arc::clone(dataset));
        }

        match self.load() {
            Ok(dataset) => {
                info!(
                    source = %self.source.describe(),
                    companies = dataset.companies.len(),
                    transactions = dataset.transactions.len(),
                    "dataset loaded"
                );
                let dataset = Arc::new(dataset);
                *slot = CacheSlot::Ready(Arc::clone(&dataset));
                Ok(dataset)
            }
            Err(err) => {
                error!(source = %self.source.describe(), error = %err, "dataset load failed");
                *slot = CacheSlot::Failed(err.to_string());
                Err(err)
            }
        }
    }

    /// Cached dataset, without triggering a load
    pub fn dataset(&self) -> DataResult<Arc<Dataset>> {
        match &*self.lock() {
            CacheSlot::Ready(dataset) => Ok(Arc::clone(dataset)),
            _ => Err(DataError::NotLoaded),
        }
    }

    pub fn state(&self) -> LoadState {
        match &*self.lock() {
            CacheSlot::Empty => LoadState::NotLoaded,
            CacheSlot::Ready(dataset) => LoadState::Loaded {
                companies: dataset.companies.len(),
                transactions: dataset.transactions.len(),
            },
            CacheSlot::Failed(reason) => LoadState::Failed(reason.clone()),
        }
    }

    fn load(&self) -> DataResult<Dataset> {
        let companies_raw = self.source.fetch(Table::Companies)?;
        let transactions_raw = self.source.fetch(Table::Transactions)?;
        Dataset::parse(&companies_raw, &transactions_raw)
    }

    fn lock(&self) -> MutexGuard<'_, CacheSlot> {
        // A panic while holding the lock cannot leave the slot half-written
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ========================================================================
    // AGGREGATIONS (load on demand)
    // ========================================================================

    pub fn dashboard_metrics<E>(&self, estimator: &mut E) -> DataResult<DashboardMetrics>
    where
        E: ExpenseEstimator + ?Sized,
    {
        let dataset = self.ensure_loaded()?;
        Ok(dashboard_metrics(&dataset.companies, estimator))
    }

    pub fn sector_aggregates(&self) -> DataResult<Vec<SectorAggregate>> {
        let dataset = self.ensure_loaded()?;
        Ok(sector_aggregates(&dataset.companies))
    }

    pub fn revenue_by_type(&self) -> DataResult<Vec<TypeRevenue>> {
        let dataset = self.ensure_loaded()?;
        Ok(revenue_by_type(&dataset.transactions))
    }

    pub fn monthly_trend(&self) -> DataResult<Vec<MonthlyBucket>> {
        let dataset = self.ensure_loaded()?;
        Ok(monthly_trend(&dataset.transactions))
    }

    pub fn top_companies(&self, limit: usize) -> DataResult<Vec<Company>> {
        let dataset = self.ensure_loaded()?;
        Ok(top_companies(&dataset.companies, limit))
    }

    pub fn network_summary(&self) -> DataResult<NetworkSummary> {
        let dataset = self.ensure_loaded()?;
        Ok(NetworkSummary::from_dataset(&dataset))
    }

    pub fn company_flows(&self, company_id: &str) -> DataResult<CompanyFlows> {
        let dataset = self.ensure_loaded()?;
        Ok(company_flows(&dataset.transactions, company_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{FileSource, MemorySource};
    use crate::metrics::FixedExpenseRatio;

    const COMPANIES: &str = "\
ID;VL_FATU;VL_SLDO;DT_ABRT;DS_CNAE;DT_REFE
CNPJ_00001;1000;50;2010-05-12;Comércio;2024-01-31
CNPJ_00002;3000;150;2018-02-01;Indústria;2024-01-31
";

    const TRANSACTIONS: &str = "\
ID_PGTO;ID_RCBE;VL;DS_TRAN;DT_REFE
CNPJ_00001;CNPJ_00002;100;PIX;2024-01-05
CNPJ_00002;CNPJ_00001;300;TED;2024-02-10
";

    const EMPTY_COMPANIES: &str = "ID;VL_FATU;VL_SLDO;DT_ABRT;DS_CNAE;DT_REFE\n";
    const EMPTY_TRANSACTIONS: &str = "ID_PGTO;ID_RCBE;VL;DS_TRAN;DT_REFE\n";

    #[test]
    fn test_load_is_idempotent() {
        let repo = DataRepository::new(MemorySource::new(COMPANIES, TRANSACTIONS));

        let first = repo.ensure_loaded().unwrap();
        let second = repo.ensure_loaded().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        // One fetch per table, only on the first call
        assert_eq!(repo.source().fetch_count(), 2);
    }

    #[test]
    fn test_aggregations_share_one_load() {
        let repo = DataRepository::new(MemorySource::new(COMPANIES, TRANSACTIONS));

        repo.sector_aggregates().unwrap();
        repo.revenue_by_type().unwrap();
        repo.monthly_trend().unwrap();
        repo.network_summary().unwrap();

        assert_eq!(repo.source().fetch_count(), 2);
    }

    #[test]
    fn test_state_transitions() {
        let repo = DataRepository::new(MemorySource::new(COMPANIES, TRANSACTIONS));
        assert_eq!(repo.state(), LoadState::NotLoaded);
        assert!(matches!(repo.dataset(), Err(DataError::NotLoaded)));

        repo.ensure_loaded().unwrap();
        assert_eq!(
            repo.state(),
            LoadState::Loaded {
                companies: 2,
                transactions: 2
            }
        );
        assert!(repo.dataset().is_ok());
    }

    #[test]
    fn test_loaded_with_zero_rows_is_distinct() {
        let repo = DataRepository::new(MemorySource::new(EMPTY_COMPANIES, EMPTY_TRANSACTIONS));

        let dataset = repo.ensure_loaded().unwrap();
        assert!(dataset.is_empty());
        assert_eq!(
            repo.state(),
            LoadState::Loaded {
                companies: 0,
                transactions: 0
            }
        );

        let metrics = repo.dashboard_metrics(&mut FixedExpenseRatio::new(0.8)).unwrap();
        assert_eq!(metrics, DashboardMetrics::default());
        assert!(repo.revenue_by_type().unwrap().is_empty());
    }

    #[test]
    fn test_failed_load_reports_and_retries() {
        let dir = tempfile::tempdir().unwrap();
        let repo = DataRepository::new(FileSource::new(dir.path()));

        let result = repo.ensure_loaded();
        assert!(matches!(result, Err(DataError::Io { .. })));
        assert!(matches!(repo.state(), LoadState::Failed(_)));

        // Files appear later: the next call retries and succeeds
        std::fs::write(dir.path().join("base1.csv"), COMPANIES).unwrap();
        std::fs::write(dir.path().join("base2.csv"), TRANSACTIONS).unwrap();

        let dataset = repo.ensure_loaded().unwrap();
        assert_eq!(dataset.companies.len(), 2);
        assert!(repo.state().is_loaded());
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = Dataset::parse(COMPANIES.as_bytes(), TRANSACTIONS.as_bytes()).unwrap();
        let b = Dataset::parse(COMPANIES.as_bytes(), TRANSACTIONS.as_bytes()).unwrap();
        let c = Dataset::parse(COMPANIES.as_bytes(), EMPTY_TRANSACTIONS.as_bytes()).unwrap();

        assert_eq!(a.fingerprint.len(), 64);
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_ne!(a.fingerprint, c.fingerprint);
    }

    #[test]
    fn test_fingerprint_separates_tables() {
        // Same concatenated bytes, different split
        let a = Dataset::parse(b"X\n", b"Y\n").unwrap();
        let b = Dataset::parse(b"X\nY\n", b"").unwrap();

        assert_ne!(a.fingerprint, b.fingerprint);
    }

    #[test]
    fn test_find_company() {
        let dataset = Dataset::parse(COMPANIES.as_bytes(), TRANSACTIONS.as_bytes()).unwrap();
        assert_eq!(dataset.find_company("CNPJ_00002").map(|c| c.revenue), Some(3000.0));
        assert!(dataset.find_company("CNPJ_99999").is_none());
    }

    #[test]
    fn test_company_flows_through_repository() {
        let repo = DataRepository::new(MemorySource::new(COMPANIES, TRANSACTIONS));
        let flows = repo.company_flows("CNPJ_00001").unwrap();

        assert_eq!(flows.sent, 100.0);
        assert_eq!(flows.received, 300.0);
    }

    #[test]
    fn test_bundled_sample_data() {
        let repo = DataRepository::new(FileSource::new("data"));
        let dataset = repo.ensure_loaded().unwrap();

        assert_eq!(dataset.companies.len(), 8);
        assert_eq!(dataset.transactions.len(), 16);

        let sector_total: f64 = repo.sector_aggregates().unwrap().iter().map(|s| s.revenue).sum();
        let company_total: f64 = dataset.companies.iter().map(|c| c.revenue).sum();
        assert!((sector_total - company_total).abs() < 1e-6);

        let summary = repo.network_summary().unwrap();
        // CNPJ_00009 only appears as a payee
        assert_eq!(summary.active_participants, 9);
        assert_eq!(repo.monthly_trend().unwrap().len(), 3);
    }
}
