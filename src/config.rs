// Configuration - where the tables live and how expenses are estimated
//
// Resolution order: defaults → TOML file → FINNET_DATA_DIR → CLI flags.

use crate::error::{DataError, DataResult};
use crate::loader::{FileSource, Table};
use crate::metrics::{
    ExpenseEstimator, FixedExpenseRatio, RandomExpenseRatio, MAX_EXPENSE_RATIO, MIN_EXPENSE_RATIO,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "finnet.toml";

/// Environment variable overriding `data_dir`
pub const DATA_DIR_ENV: &str = "FINNET_DATA_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: PathBuf,
    pub companies_file: String,
    pub transactions_file: String,
    pub expense_ratio: ExpenseRatioConfig,
    /// Default row count for the `top` report
    pub top_limit: usize,
}

/// How the expense ratio is chosen
///
/// ```toml
/// [expense_ratio]
/// mode = "fixed"
/// ratio = 0.8
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ExpenseRatioConfig {
    Random {
        #[serde(default)]
        seed: Option<u64>,
    },
    Fixed {
        ratio: f64,
    },
}

impl Default for ExpenseRatioConfig {
    fn default() -> Self {
        ExpenseRatioConfig::Random { seed: None }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from("data"),
            companies_file: Table::Companies.default_file_name().to_string(),
            transactions_file: Table::Transactions.default_file_name().to_string(),
            expense_ratio: ExpenseRatioConfig::default(),
            top_limit: 10,
        }
    }
}

impl Config {
    pub fn from_toml_str(text: &str, origin: &Path) -> DataResult<Self> {
        let config: Config = toml::from_str(text).map_err(|source| DataError::ConfigParse {
            path: origin.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> DataResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| DataError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded config file");
        Self::from_toml_str(&text, path)
    }

    /// Load an explicit config file, else `finnet.toml` if present, else defaults
    pub fn discover(explicit: Option<&Path>) -> DataResult<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    Self::load(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Apply environment overrides from the process environment
    pub fn with_env(self) -> Self {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    /// Apply environment overrides from an arbitrary lookup
    pub fn with_env_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(DATA_DIR_ENV).filter(|d| !d.trim().is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
        self
    }

    pub fn validate(&self) -> DataResult<()> {
        if self.companies_file.trim().is_empty() || self.transactions_file.trim().is_empty() {
            return Err(DataError::Config("table file names must not be empty".to_string()));
        }
        check_top_limit(self.top_limit)?;
        if let ExpenseRatioConfig::Fixed { ratio } = self.expense_ratio {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(DataError::Config(format!(
                    "fixed expense ratio {} is outside [0, 1]",
                    ratio
                )));
            }
        }
        Ok(())
    }

    pub fn file_source(&self) -> FileSource {
        FileSource::new(self.data_dir.clone()).with_file_names(&self.companies_file, &self.transactions_file)
    }

    pub fn estimator(&self) -> Box<dyn ExpenseEstimator> {
        match self.expense_ratio {
            ExpenseRatioConfig::Random { seed: Some(seed) } => {
                Box::new(RandomExpenseRatio::seeded(seed))
            }
            ExpenseRatioConfig::Random { seed: None } => Box::new(RandomExpenseRatio::new()),
            ExpenseRatioConfig::Fixed { ratio } => Box::new(FixedExpenseRatio::new(ratio)),
        }
    }

    /// Short description of the expense model for reports
    pub fn expense_model(&self) -> String {
        match self.expense_ratio {
            ExpenseRatioConfig::Random { seed: Some(seed) } => format!(
                "random {:.0}-{:.0}% (seed {})",
                MIN_EXPENSE_RATIO * 100.0,
                MAX_EXPENSE_RATIO * 100.0,
                seed
            ),
            ExpenseRatioConfig::Random { seed: None } => format!(
                "random {:.0}-{:.0}%",
                MIN_EXPENSE_RATIO * 100.0,
                MAX_EXPENSE_RATIO * 100.0
            ),
            ExpenseRatioConfig::Fixed { ratio } => format!("fixed {:.1}%", ratio * 100.0),
        }
    }
}

/// Row count for the `top` report, from the config file or the command line
pub fn check_top_limit(limit: usize) -> DataResult<usize> {
    if limit == 0 {
        return Err(DataError::Config("top_limit must be at least 1".to_string()));
    }
    Ok(limit)
}
