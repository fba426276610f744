// Aggregations over the loaded tables
//
// Every function here is pure over slices of records. Empty input yields
// zeroed or empty results, never an error.

use crate::records::{Company, Transaction};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

// ============================================================================
// EXPENSE ESTIMATION
// ============================================================================

/// Lower bound of the mock expense ratio
pub const MIN_EXPENSE_RATIO: f64 = 0.7;
/// Upper bound (exclusive) of the mock expense ratio
pub const MAX_EXPENSE_RATIO: f64 = 0.9;

/// ExpenseEstimator - share of a company's revenue counted as expenses
///
/// The source tables carry no expense column, so expenses are always an
/// estimate. Implementations decide how the ratio is chosen.
pub trait ExpenseEstimator {
    fn expense_ratio(&mut self, company: &Company) -> f64;
}

/// Uniform random ratio in `[0.7, 0.9)` per company
///
/// Unseeded instances give different metrics on every call.
pub struct RandomExpenseRatio {
    rng: StdRng,
}

impl RandomExpenseRatio {
    pub fn new() -> Self {
        RandomExpenseRatio {
            rng: StdRng::from_entropy(),
        }
    }

    /// Reproducible sequence of ratios
    pub fn seeded(seed: u64) -> Self {
        RandomExpenseRatio {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomExpenseRatio {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpenseEstimator for RandomExpenseRatio {
    fn expense_ratio(&mut self, _company: &Company) -> f64 {
        self.rng.gen_range(MIN_EXPENSE_RATIO..MAX_EXPENSE_RATIO)
    }
}

/// Same ratio for every company
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedExpenseRatio(f64);

impl FixedExpenseRatio {
    pub fn new(ratio: f64) -> Self {
        FixedExpenseRatio(ratio)
    }

    pub fn ratio(&self) -> f64 {
        self.0
    }
}

impl ExpenseEstimator for FixedExpenseRatio {
    fn expense_ratio(&mut self, _company: &Company) -> f64 {
        self.0
    }
}

// ============================================================================
// DASHBOARD METRICS
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardMetrics {
    pub total_revenue: f64,
    pub total_expenses: f64,
    pub total_profit: f64,
    pub company_count: usize,
    /// Profit as a percentage of revenue (0 when revenue is 0)
    pub profit_margin: f64,
}

/// Revenue, estimated expenses, profit and margin over all companies
pub fn dashboard_metrics<E>(companies: &[Company], estimator: &mut E) -> DashboardMetrics
where
    E: ExpenseEstimator + ?Sized,
{
    let mut total_revenue = 0.0;
    let mut total_expenses = 0.0;

    for company in companies {
        total_revenue += company.revenue;
        total_expenses += company.revenue * estimator.expense_ratio(company);
    }

    let total_profit = total_revenue - total_expenses;

    DashboardMetrics {
        total_revenue,
        total_expenses,
        total_profit,
        company_count: companies.len(),
        profit_margin: profit_margin(total_profit, total_revenue),
    }
}

/// `profit / revenue × 100`, guarded against zero revenue
pub fn profit_margin(profit: f64, revenue: f64) -> f64 {
    if revenue == 0.0 {
        0.0
    } else {
        profit / revenue * 100.0
    }
}

// ============================================================================
// SECTORS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorAggregate {
    pub sector: String,
    pub revenue: f64,
    pub balance: f64,
    pub companies: usize,
}

/// Group companies by classification code, summing revenue and balance
///
/// Sorted by revenue, largest first.
pub fn sector_aggregates(companies: &[Company]) -> Vec<SectorAggregate> {
    let mut by_sector: HashMap<&str, SectorAggregate> = HashMap::new();

    for company in companies {
        let entry = by_sector
            .entry(company.sector_code.as_str())
            .or_insert_with(|| SectorAggregate {
                sector: company.sector_code.clone(),
                revenue: 0.0,
                balance: 0.0,
                companies: 0,
            });
        entry.revenue += company.revenue;
        entry.balance += company.balance;
        entry.companies += 1;
    }

    let mut sectors: Vec<SectorAggregate> = by_sector.into_values().collect();
    sectors.sort_by(|a, b| {
        revenue_desc_nan_last(a.revenue, b.revenue).then_with(|| a.sector.cmp(&b.sector))
    });
    sectors
}

// ============================================================================
// REVENUE BY TRANSACTION TYPE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeRevenue {
    /// Transaction type tag (PIX, TED, ...)
    pub name: String,
    pub value: f64,
    /// Share of the grand total, rounded to a whole percent
    pub percentage: f64,
}

/// Sum transaction amounts per type and each type's share of the total
///
/// Groups keep the order in which their type first appears.
pub fn revenue_by_type(transactions: &[Transaction]) -> Vec<TypeRevenue> {
    let mut groups: Vec<TypeRevenue> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for tx in transactions {
        let tag = tx.kind.tag();
        let slot = *index.entry(tag).or_insert_with(|| {
            groups.push(TypeRevenue {
                name: tag.to_string(),
                value: 0.0,
                percentage: 0.0,
            });
            groups.len() - 1
        });
        groups[slot].value += tx.amount;
    }

    let total: f64 = groups.iter().map(|g| g.value).sum();
    for group in &mut groups {
        group.percentage = if total == 0.0 {
            0.0
        } else {
            (group.value / total * 100.0).round()
        };
    }

    groups
}

// ============================================================================
// MONTHLY TREND
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyBucket {
    /// `YYYY-MM`
    pub month: String,
    pub transactions: usize,
    pub amount: f64,
}

/// Count (and sum) transactions per year-month of their reference date
///
/// Buckets are in ascending key order and every transaction lands in one,
/// so a blank date gets the empty-key bucket.
pub fn monthly_trend(transactions: &[Transaction]) -> Vec<MonthlyBucket> {
    let mut buckets: BTreeMap<String, (usize, f64)> = BTreeMap::new();

    for tx in transactions {
        let entry = buckets.entry(month_key(tx)).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += tx.amount;
    }

    buckets
        .into_iter()
        .map(|(month, (transactions, amount))| MonthlyBucket {
            month,
            transactions,
            amount,
        })
        .collect()
}

/// Year-month bucket key: the first seven characters of the reference date
pub fn month_key(tx: &Transaction) -> String {
    tx.reference_date.trim().chars().take(7).collect()
}

// ============================================================================
// TOP COMPANIES
// ============================================================================

/// Companies by revenue, largest first; NaN revenue sorts last
pub fn top_companies(companies: &[Company], limit: usize) -> Vec<Company> {
    let mut ranked: Vec<&Company> = companies.iter().collect();
    ranked.sort_by(|a, b| revenue_desc_nan_last(a.revenue, b.revenue));

    ranked.into_iter().take(limit).cloned().collect()
}

/// Descending order with NaN after every number
fn revenue_desc_nan_last(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (false, false) => b.total_cmp(&a),
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (true, true) => Ordering::Equal,
    }
}
