// Report export - comma-delimited CSV download of any report table
//
// Headers come from the row type's serde field names. Values containing
// commas or quotes are quoted by the csv writer.

use crate::error::{DataError, DataResult};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Write `rows` as CSV with a header row, returning the number of data rows
pub fn export_csv<T, W>(rows: &[T], writer: W) -> DataResult<usize>
where
    T: Serialize,
    W: Write,
{
    let mut wtr = csv::Writer::from_writer(writer);

    for row in rows {
        wtr.serialize(row).map_err(DataError::Export)?;
    }
    wtr.flush()
        .map_err(|err| DataError::Export(csv::Error::from(err)))?;

    Ok(rows.len())
}

/// Export to a file, creating or truncating it
pub fn export_to_path<T: Serialize>(rows: &[T], path: &Path) -> DataResult<usize> {
    let file = std::fs::File::create(path)
        .map_err(|err| DataError::Export(csv::Error::from(err)))?;
    let written = export_csv(rows, file)?;

    info!(rows = written, path = %path.display(), "report exported");
    Ok(written)
}

/// Export to an in-memory string
pub fn export_to_string<T: Serialize>(rows: &[T]) -> DataResult<String> {
    let mut buffer = Vec::new();
    export_csv(rows, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{MonthlyBucket, SectorAggregate, TypeRevenue};
    use crate::records::Company;

    #[test]
    fn test_export_type_revenue() {
        let rows = vec![
            TypeRevenue {
                name: "PIX".to_string(),
                value: 100.0,
                percentage: 25.0,
            },
            TypeRevenue {
                name: "TED".to_string(),
                value: 300.0,
                percentage: 75.0,
            },
        ];

        let text = export_to_string(&rows).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["name,value,percentage", "PIX,100.0,25.0", "TED,300.0,75.0"]);
    }

    #[test]
    fn test_export_quotes_embedded_commas() {
        let rows = vec![SectorAggregate {
            sector: "Comércio, varejo".to_string(),
            revenue: 10.0,
            balance: 1.0,
            companies: 1,
        }];

        let text = export_to_string(&rows).unwrap();
        assert!(text.contains("\"Comércio, varejo\""));
    }

    #[test]
    fn test_export_empty_rows() {
        let rows: Vec<MonthlyBucket> = Vec::new();
        let mut buffer = Vec::new();

        let written = export_csv(&rows, &mut buffer).unwrap();
        assert_eq!(written, 0);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_export_companies_keeps_source_headers() {
        let rows = vec![Company {
            id: "CNPJ_00001".to_string(),
            revenue: 1000.0,
            balance: 5.5,
            founded_on: "2010-01-01".to_string(),
            sector_code: "Indústria".to_string(),
            reference_date: "2024-01-31".to_string(),
        }];

        let text = export_to_string(&rows).unwrap();
        assert!(text.starts_with("ID,VL_FATU,VL_SLDO,DT_ABRT,DS_CNAE,DT_REFE\n"));
        assert!(text.contains("CNPJ_00001,1000.0,5.5,2010-01-01,Indústria,2024-01-31"));
    }

    #[test]
    fn test_export_to_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trend.csv");
        let rows = vec![MonthlyBucket {
            month: "2024-01".to_string(),
            transactions: 3,
            amount: 42.5,
        }];

        let written = export_to_path(&rows, &path).unwrap();
        assert_eq!(written, 1);

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "month,transactions,amount\n2024-01,3,42.5\n");
    }
}
