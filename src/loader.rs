// CSV Loader - fetch and parse Base 1 / Base 2
//
// Both tables are `;`-delimited with a header row. Columns are matched by
// header name, blank lines are skipped and short rows are tolerated.

use crate::error::{DataError, DataResult};
use crate::records::{Company, Transaction};
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::de::DeserializeOwned;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};

/// Field delimiter for both source tables
pub const DELIMITER: u8 = b';';

// ============================================================================
// TABLES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    /// Base 1
    Companies,
    /// Base 2
    Transactions,
}

impl Table {
    /// Default file name of the table inside the data directory
    pub fn default_file_name(&self) -> &'static str {
        match self {
            Table::Companies => "base1.csv",
            Table::Transactions => "base2.csv",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Table::Companies => f.write_str("companies"),
            Table::Transactions => f.write_str("transactions"),
        }
    }
}

// ============================================================================
// SOURCES
// ============================================================================

/// CsvSource - where the raw bytes of each table come from
///
/// The repository only sees this trait, so a file-backed source, an
/// in-memory fixture or a remote fetcher are interchangeable.
pub trait CsvSource: Send + Sync {
    /// Fetch the raw bytes of one table
    fn fetch(&self, table: Table) -> DataResult<Vec<u8>>;

    /// Human-readable location, used in logs
    fn describe(&self) -> String {
        "csv source".to_string()
    }
}

/// Reads `base1.csv` / `base2.csv` from a data directory
#[derive(Debug, Clone)]
pub struct FileSource {
    data_dir: PathBuf,
    companies_file: String,
    transactions_file: String,
}

impl FileSource {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        FileSource {
            data_dir: data_dir.into(),
            companies_file: Table::Companies.default_file_name().to_string(),
            transactions_file: Table::Transactions.default_file_name().to_string(),
        }
    }

    /// Builder pattern: override the file names
    pub fn with_file_names(mut self, companies: &str, transactions: &str) -> Self {
        self.companies_file = companies.to_string();
        self.transactions_file = transactions.to_string();
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn path_for(&self, table: Table) -> PathBuf {
        match table {
            Table::Companies => self.data_dir.join(&self.companies_file),
            Table::Transactions => self.data_dir.join(&self.transactions_file),
        }
    }
}

impl CsvSource for FileSource {
    fn fetch(&self, table: Table) -> DataResult<Vec<u8>> {
        let path = self.path_for(table);
        debug!(%table, path = %path.display(), "reading table");

        std::fs::read(&path).map_err(|source| DataError::Io {
            table,
            location: path.display().to_string(),
            source,
        })
    }

    fn describe(&self) -> String {
        self.data_dir.display().to_string()
    }
}

/// In-memory tables with a fetch counter
#[derive(Debug, Default)]
pub struct MemorySource {
    companies: Vec<u8>,
    transactions: Vec<u8>,
    fetches: AtomicUsize,
}

impl MemorySource {
    pub fn new(companies: impl Into<Vec<u8>>, transactions: impl Into<Vec<u8>>) -> Self {
        MemorySource {
            companies: companies.into(),
            transactions: transactions.into(),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Number of `fetch` calls served so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl CsvSource for MemorySource {
    fn fetch(&self, table: Table) -> DataResult<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(match table {
            Table::Companies => self.companies.clone(),
            Table::Transactions => self.transactions.clone(),
        })
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

// ============================================================================
// PARSING
// ============================================================================

/// Parse Base 1 (companies)
pub fn parse_companies<R: Read>(reader: R) -> DataResult<Vec<Company>> {
    let companies: Vec<Company> = parse_table(Table::Companies, reader)?;

    let invalid = companies.iter().filter(|c| c.has_invalid_numbers()).count();
    if invalid > 0 {
        warn!(invalid, "company rows with non-numeric revenue or balance");
    }

    Ok(companies)
}

/// Parse Base 2 (transactions)
pub fn parse_transactions<R: Read>(reader: R) -> DataResult<Vec<Transaction>> {
    let transactions: Vec<Transaction> = parse_table(Table::Transactions, reader)?;

    let invalid = transactions.iter().filter(|t| t.has_invalid_numbers()).count();
    if invalid > 0 {
        warn!(invalid, "transaction rows with non-numeric amount");
    }

    let unknown = transactions.iter().filter(|t| !t.kind.is_known()).count();
    if unknown > 0 {
        debug!(unknown, "transaction rows with unrecognised type tag");
    }

    Ok(transactions)
}

fn parse_table<T, R>(table: Table, reader: R) -> DataResult<Vec<T>>
where
    T: DeserializeOwned,
    R: Read,
{
    let mut rdr = ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|source| DataError::Parse { table, source })?
        .clone();

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for result in rdr.records() {
        let mut row = result.map_err(|source| DataError::Parse { table, source })?;
        if is_blank(&row) {
            skipped += 1;
            continue;
        }
        // Missing trailing columns read as empty fields
        while row.len() < headers.len() {
            row.push_field("");
        }
        let record: T = row
            .deserialize(Some(&headers))
            .map_err(|source| DataError::Parse { table, source })?;
        records.push(record);
    }

    debug!(%table, rows = records.len(), skipped, "parsed table");
    Ok(records)
}

/// A whitespace-only line trims down to a single empty field
fn is_blank(row: &StringRecord) -> bool {
    row.len() == 1 && row.get(0).map_or(true, str::is_empty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::TransactionKind;
    use std::io::Write;

    const COMPANIES: &str = "\
ID;VL_FATU;VL_SLDO;DT_ABRT;DS_CNAE;DT_REFE
CNPJ_00001;1500000;32000.5;2010-05-12;Comércio varejista;2024-01-31

CNPJ_00002;850000;-1200;2018-02-01;Transporte rodoviário;2024-01-31
CNPJ_00003;n/a;4500;2020-09-09;Comércio varejista;2024-01-31
";

    const TRANSACTIONS: &str = "\
ID_PGTO;ID_RCBE;VL;DS_TRAN;DT_REFE
CNPJ_00001;CNPJ_00002;2500.75;PIX;2024-01-05
CNPJ_00002;CNPJ_00003;10000;TED;2024-02-10
";

    #[test]
    fn test_table_names() {
        assert_eq!(Table::Companies.default_file_name(), "base1.csv");
        assert_eq!(Table::Transactions.default_file_name(), "base2.csv");
        assert_eq!(Table::Companies.to_string(), "companies");
    }

    #[test]
    fn test_parse_companies_skips_blank_lines() {
        let companies = parse_companies(COMPANIES.as_bytes()).unwrap();

        assert_eq!(companies.len(), 3, "3 data rows after the header");
        assert_eq!(companies[0].id, "CNPJ_00001");
        assert_eq!(companies[0].revenue, 1500000.0);
        assert_eq!(companies[0].balance, 32000.5);
        assert_eq!(companies[1].balance, -1200.0);
        assert_eq!(companies[1].sector_code, "Transporte rodoviário");
    }

    #[test]
    fn test_parse_non_numeric_becomes_nan() {
        let companies = parse_companies(COMPANIES.as_bytes()).unwrap();

        assert!(companies[2].revenue.is_nan());
        assert_eq!(companies[2].balance, 4500.0);
    }

    #[test]
    fn test_parse_transactions() {
        let txs = parse_transactions(TRANSACTIONS.as_bytes()).unwrap();

        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].payer_id, "CNPJ_00001");
        assert_eq!(txs[0].payee_id, "CNPJ_00002");
        assert_eq!(txs[0].amount, 2500.75);
        assert_eq!(txs[0].kind, TransactionKind::Pix);
        assert_eq!(txs[1].kind, TransactionKind::Ted);
        assert_eq!(txs[1].reference_date, "2024-02-10");
    }

    #[test]
    fn test_parse_short_row_fills_defaults() {
        let csv = "ID_PGTO;ID_RCBE;VL;DS_TRAN;DT_REFE\nA;B\n";
        let txs = parse_transactions(csv.as_bytes()).unwrap();

        assert_eq!(txs.len(), 1);
        assert!(txs[0].amount.is_nan());
        assert_eq!(txs[0].reference_date, "");
    }

    #[test]
    fn test_parse_malformed_rows_keep_row_count() {
        let csv = "ID_PGTO;ID_RCBE;VL;DS_TRAN;DT_REFE\n\
                   A;B\n\
                   ;\n\
                   C;D;12.5;TED;2024-03-01\n\
                   E\n";
        let txs = parse_transactions(csv.as_bytes()).unwrap();

        assert_eq!(txs.len(), 4);
        assert_eq!(txs[0].payee_id, "B");
        assert!(txs[0].amount.is_nan());
        assert_eq!(txs[1].payer_id, "");
        assert!(txs[1].amount.is_nan());
        assert_eq!(txs[1].kind, TransactionKind::Other(String::new()));
        assert_eq!(txs[2].amount, 12.5);
        assert_eq!(txs[3].payer_id, "E");
    }

    #[test]
    fn test_parse_whitespace_only_line_is_blank() {
        let csv = "ID;VL_FATU;VL_SLDO;DT_ABRT;DS_CNAE;DT_REFE\n   \nA;1;2;2020-01-01;X\n";
        let companies = parse_companies(csv.as_bytes()).unwrap();

        assert_eq!(companies.len(), 1);
        assert_eq!(companies[0].id, "A");
        assert_eq!(companies[0].revenue, 1.0);
        assert_eq!(companies[0].sector_code, "X");
        assert_eq!(companies[0].reference_date, "");
    }

    #[test]
    fn test_parse_long_row_ignores_extra_fields() {
        let csv = "ID_PGTO;ID_RCBE;VL;DS_TRAN;DT_REFE\nA;B;3;PIX;2024-01-01;extra\n";
        let txs = parse_transactions(csv.as_bytes()).unwrap();

        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].amount, 3.0);
        assert_eq!(txs[0].reference_date, "2024-01-01");
    }

    #[test]
    fn test_parse_header_only() {
        let txs = parse_transactions("ID_PGTO;ID_RCBE;VL;DS_TRAN;DT_REFE\n".as_bytes()).unwrap();
        assert!(txs.is_empty());
    }

    #[test]
    fn test_parse_invalid_utf8_is_error() {
        let mut bytes = b"ID;VL_FATU;VL_SLDO;DT_ABRT;DS_CNAE;DT_REFE\nA;1;2;".to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe]);
        bytes.extend_from_slice(b";x;y\n");

        let result = parse_companies(bytes.as_slice());
        assert!(matches!(
            result,
            Err(DataError::Parse { table: Table::Companies, .. })
        ));
    }

    #[test]
    fn test_file_source_reads_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("base1.csv")).unwrap();
        file.write_all(COMPANIES.as_bytes()).unwrap();

        let source = FileSource::new(dir.path());
        let bytes = source.fetch(Table::Companies).unwrap();
        assert_eq!(bytes, COMPANIES.as_bytes());

        let missing = source.fetch(Table::Transactions);
        assert!(matches!(
            missing,
            Err(DataError::Io { table: Table::Transactions, .. })
        ));
    }

    #[test]
    fn test_file_source_custom_names() {
        let source = FileSource::new("data").with_file_names("empresas.csv", "pagamentos.csv");
        assert_eq!(source.path_for(Table::Companies), Path::new("data/empresas.csv"));
        assert_eq!(
            source.path_for(Table::Transactions),
            Path::new("data/pagamentos.csv")
        );
    }

    #[test]
    fn test_memory_source_counts_fetches() {
        let source = MemorySource::new(COMPANIES, TRANSACTIONS);
        assert_eq!(source.fetch_count(), 0);

        source.fetch(Table::Companies).unwrap();
        source.fetch(Table::Transactions).unwrap();
        assert_eq!(source.fetch_count(), 2);
    }
}
