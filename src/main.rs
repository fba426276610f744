// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use finnet::{
    check_top_limit, export_to_path, top_companies, Config, DataRepository, ExpenseRatioConfig,
    FileSource, LoadState,
};

/// Dashboard metrics from the company (Base 1) and transaction (Base 2) tables
#[derive(Parser, Debug)]
#[command(name = "finnet", version, about)]
struct Cli {
    /// Directory containing base1.csv and base2.csv
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Config file (defaults to ./finnet.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    /// Seed for the random expense ratio
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Use a fixed expense ratio (0-1) instead of a random one
    #[arg(long, global = true, conflicts_with = "seed")]
    expense_ratio: Option<f64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Load both tables and show what was loaded
    Info,
    /// Revenue, expenses, profit and margin
    Metrics,
    /// Revenue and balance per sector
    Sectors,
    /// Transaction value per type with percentage of total
    Types,
    /// Transactions per month
    Trend,
    /// Counts and totals over all transactions
    Network,
    /// Companies with the highest revenue
    Top {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Money in and out of one company
    Company { id: String },
    /// Write a report as comma-delimited CSV
    Export { report: ReportKind, output: PathBuf },
    /// Interactive terminal dashboard (default)
    Dashboard,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum ReportKind {
    Metrics,
    Sectors,
    Types,
    Trend,
    Companies,
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    let repo = DataRepository::new(config.file_source());

    match cli.command.clone().unwrap_or(Command::Dashboard) {
        Command::Info => run_info(&repo, &config, cli.json)?,
        Command::Metrics => run_metrics(&repo, &config, cli.json)?,
        Command::Sectors => run_sectors(&repo, cli.json)?,
        Command::Types => run_types(&repo, cli.json)?,
        Command::Trend => run_trend(&repo, cli.json)?,
        Command::Network => run_network(&repo, cli.json)?,
        Command::Top { limit } => {
            let limit = check_top_limit(limit.unwrap_or(config.top_limit))?;
            run_top(&repo, limit, cli.json)?
        }
        Command::Company { id } => run_company(&repo, &id, cli.json)?,
        Command::Export { report, output } => run_export(&repo, &config, report, output)?,
        Command::Dashboard => run_dashboard(&repo, &config)?,
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Defaults → config file → environment → command-line flags
fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::discover(cli.config.as_deref())
        .context("Failed to load configuration")?
        .with_env();

    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(seed) = cli.seed {
        config.expense_ratio = ExpenseRatioConfig::Random { seed: Some(seed) };
    }
    if let Some(ratio) = cli.expense_ratio {
        config.expense_ratio = ExpenseRatioConfig::Fixed { ratio };
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn rule() {
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

// ============================================================================
// Commands
// ============================================================================

fn run_info(repo: &DataRepository<FileSource>, config: &Config, json: bool) -> Result<()> {
    let dataset = repo
        .ensure_loaded()
        .with_context(|| format!("Failed to load tables from {}", config.data_dir.display()))?;

    if json {
        #[derive(Serialize)]
        struct Info<'a> {
            data_dir: String,
            state: LoadState,
            loaded_at: String,
            fingerprint: &'a str,
            expense_model: String,
        }
        return print_json(&Info {
            data_dir: config.data_dir.display().to_string(),
            state: repo.state(),
            loaded_at: dataset.loaded_at.to_rfc3339(),
            fingerprint: &dataset.fingerprint,
            expense_model: config.expense_model(),
        });
    }

    println!("📂 Data directory: {}", config.data_dir.display());
    rule();
    println!("✓ Companies:     {}", dataset.companies.len());
    println!("✓ Transactions:  {}", dataset.transactions.len());
    println!("  Loaded at:     {}", dataset.loaded_at.to_rfc3339());
    println!("  Fingerprint:   {}", dataset.fingerprint);
    println!("  Expense model: {}", config.expense_model());
    Ok(())
}

fn run_metrics(repo: &DataRepository<FileSource>, config: &Config, json: bool) -> Result<()> {
    let mut estimator = config.estimator();
    let metrics = repo
        .dashboard_metrics(estimator.as_mut())
        .context("Failed to compute dashboard metrics")?;

    if json {
        return print_json(&metrics);
    }

    println!("📊 Dashboard Metrics ({})", config.expense_model());
    rule();
    println!("  Companies:      {}", metrics.company_count);
    println!("  Total revenue:  {:>18.2}", metrics.total_revenue);
    println!("  Total expenses: {:>18.2}", metrics.total_expenses);
    println!("  Total profit:   {:>18.2}", metrics.total_profit);
    println!("  Profit margin:  {:>17.1}%", metrics.profit_margin);
    Ok(())
}

fn run_sectors(repo: &DataRepository<FileSource>, json: bool) -> Result<()> {
    let sectors = repo
        .sector_aggregates()
        .context("Failed to aggregate sectors")?;

    if json {
        return print_json(&sectors);
    }

    println!("🏭 Sectors ({})", sectors.len());
    rule();
    println!("{:<40} {:>6} {:>18} {:>16}", "Sector", "Cos", "Revenue", "Balance");
    for sector in &sectors {
        println!(
            "{:<40} {:>6} {:>18.2} {:>16.2}",
            truncate(&sector.sector, 40),
            sector.companies,
            sector.revenue,
            sector.balance
        );
    }
    Ok(())
}

fn run_types(repo: &DataRepository<FileSource>, json: bool) -> Result<()> {
    let groups = repo
        .revenue_by_type()
        .context("Failed to group transactions by type")?;

    if json {
        return print_json(&groups);
    }

    println!("💸 Value by Transaction Type");
    rule();
    for group in &groups {
        let bar = "█".repeat((group.percentage.max(0.0) / 2.0) as usize);
        println!(
            "{:<10} {:>18.2} {:>4.0}% {}",
            group.name, group.value, group.percentage, bar
        );
    }
    if groups.is_empty() {
        println!("  (no transactions)");
    }
    Ok(())
}

fn run_trend(repo: &DataRepository<FileSource>, json: bool) -> Result<()> {
    let trend = repo.monthly_trend().context("Failed to build monthly trend")?;

    if json {
        return print_json(&trend);
    }

    println!("📈 Monthly Trend");
    rule();
    println!("{:<10} {:>12} {:>18}", "Month", "Count", "Amount");
    for bucket in &trend {
        println!(
            "{:<10} {:>12} {:>18.2}",
            bucket.month, bucket.transactions, bucket.amount
        );
    }
    Ok(())
}

fn run_network(repo: &DataRepository<FileSource>, json: bool) -> Result<()> {
    let summary = repo
        .network_summary()
        .context("Failed to summarise network")?;

    if json {
        return print_json(&summary);
    }

    println!("🕸️  Financial Network");
    rule();
    println!("  Companies:           {}", summary.companies);
    println!("  Transactions:        {}", summary.transactions);
    println!("  Active participants: {}", summary.active_participants);
    println!("  Total value:         {:.2}", summary.total_value);
    for (kind, count) in &summary.transactions_by_kind {
        println!("    {:<10} {}", kind, count);
    }
    Ok(())
}

fn run_top(repo: &DataRepository<FileSource>, limit: usize, json: bool) -> Result<()> {
    let companies = repo.top_companies(limit).context("Failed to rank companies")?;

    if json {
        return print_json(&companies);
    }

    println!("🏆 Top {} Companies by Revenue", limit);
    rule();
    for (rank, company) in companies.iter().enumerate() {
        println!(
            "{:>3}. {:<16} {:>18.2}  {}",
            rank + 1,
            company.id,
            company.revenue,
            truncate(&company.sector_code, 36)
        );
    }
    Ok(())
}

fn run_company(repo: &DataRepository<FileSource>, id: &str, json: bool) -> Result<()> {
    let flows = repo
        .company_flows(id)
        .with_context(|| format!("Failed to compute flows for {}", id))?;
    let dataset = repo.dataset()?;
    let company = dataset.find_company(id);

    if json {
        #[derive(Serialize)]
        struct CompanyReport<'a> {
            company: Option<&'a finnet::Company>,
            flows: &'a finnet::CompanyFlows,
        }
        return print_json(&CompanyReport {
            company,
            flows: &flows,
        });
    }

    println!("🏢 Company {}", id);
    rule();
    match company {
        Some(c) => {
            println!("  Sector:    {}", c.sector_code);
            println!("  Founded:   {}", c.founded_on);
            println!("  Revenue:   {:.2}", c.revenue);
            println!("  Balance:   {:.2}", c.balance);
        }
        None => println!("  (not present in Base 1)"),
    }
    println!("  Sent:      {:.2} in {} transactions", flows.sent, flows.outgoing);
    println!("  Received:  {:.2} in {} transactions", flows.received, flows.incoming);
    println!("  Net:       {:.2}", flows.net());
    println!("  Counterparties: {}", flows.counterparties);
    Ok(())
}

fn run_export(
    repo: &DataRepository<FileSource>,
    config: &Config,
    report: ReportKind,
    output: PathBuf,
) -> Result<()> {
    let written = match report {
        ReportKind::Metrics => {
            let mut estimator = config.estimator();
            let metrics = repo.dashboard_metrics(estimator.as_mut())?;
            export_to_path(&[metrics], &output)?
        }
        ReportKind::Sectors => export_to_path(&repo.sector_aggregates()?, &output)?,
        ReportKind::Types => export_to_path(&repo.revenue_by_type()?, &output)?,
        ReportKind::Trend => export_to_path(&repo.monthly_trend()?, &output)?,
        ReportKind::Companies => {
            let dataset = repo.ensure_loaded()?;
            let ranked = top_companies(&dataset.companies, dataset.companies.len());
            export_to_path(&ranked, &output)?
        }
    };

    println!("✓ Exported {} rows to {}", written, output.display());
    Ok(())
}

#[cfg(feature = "tui")]
fn run_dashboard(repo: &DataRepository<FileSource>, config: &Config) -> Result<()> {
    println!("🖥️  Loading dashboard...\n");

    let dataset = repo
        .ensure_loaded()
        .with_context(|| format!("Failed to load tables from {}", config.data_dir.display()))?;

    println!(
        "✓ Loaded {} companies and {} transactions\n",
        dataset.companies.len(),
        dataset.transactions.len()
    );
    println!("Starting UI... (Press 'q' to quit)\n");

    let mut app = ui::App::new(dataset, config.estimator());
    ui::run_ui(&mut app)?;

    println!("\n✅ Dashboard closed");
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_dashboard(_repo: &DataRepository<FileSource>, _config: &Config) -> Result<()> {
    eprintln!("❌ Dashboard not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use a report command, e.g.: finnet metrics");
    std::process::exit(1);
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
