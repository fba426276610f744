// Financial Network Analytics - Core Library
// Exposes all modules for use in the CLI, the dashboard and tests

pub mod config;
pub mod error;
pub mod export;
pub mod loader;
pub mod metrics;
pub mod network;
pub mod records;
pub mod repository;

// Re-export commonly used types
pub use config::{check_top_limit, Config, ExpenseRatioConfig, DATA_DIR_ENV, DEFAULT_CONFIG_FILE};
pub use error::{DataError, DataResult};
pub use export::{export_csv, export_to_path, export_to_string};
pub use loader::{
    parse_companies, parse_transactions,
    CsvSource, FileSource, MemorySource, Table,
};
pub use metrics::{
    dashboard_metrics, monthly_trend, profit_margin, revenue_by_type, sector_aggregates,
    top_companies,
    DashboardMetrics, ExpenseEstimator, FixedExpenseRatio, MonthlyBucket, RandomExpenseRatio,
    SectorAggregate, TypeRevenue,
};
pub use network::{company_flows, CompanyFlows, FinancialNetwork, NetworkSummary};
pub use records::{Company, Transaction, TransactionKind};
pub use repository::{DataRepository, Dataset, LoadState};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
