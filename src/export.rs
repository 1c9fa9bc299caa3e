//! Download lists from a portal results export.
//!
//! The export is a CSV with a header row carrying at least `No` (product
//! number) and `Actives` (active ingredient string). One label is wanted per
//! distinct active-ingredient string, so rows are deduplicated on the trimmed
//! `Actives` value, first row wins.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, instrument};
use url::Url;

use crate::target::DownloadTarget;

/// Errors reading a results export.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The file could not be read.
    #[error("cannot read export {path}: {source}")]
    Read {
        /// Export path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The CSV is malformed.
    #[error("malformed export {path}: {source}")]
    Csv {
        /// Export path.
        path: PathBuf,
        /// The underlying CSV error.
        #[source]
        source: csv::Error,
    },

    /// A required column is absent from the header row.
    #[error("export {path} has no '{column}' column")]
    MissingColumn {
        /// Export path.
        path: PathBuf,
        /// Name of the missing column.
        column: &'static str,
    },
}

/// One product row of the export.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExportProduct {
    /// Product number; the e-label file is `<No>ELBL.pdf`.
    #[serde(rename = "No", default)]
    pub number: String,
    /// Active ingredient string, used as the dedup key.
    #[serde(rename = "Actives", default)]
    pub actives: String,
    /// Product name, informational.
    #[serde(rename = "Name", default)]
    pub name: Option<String>,
}

const REQUIRED_COLUMNS: [&str; 2] = ["No", "Actives"];

/// Reads and parses an export file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not valid CSV, or lacks a
/// required column.
#[instrument(level = "debug", skip(path), fields(path = %path.display()))]
pub async fn read_export(path: &Path) -> Result<Vec<ExportProduct>, ExportError> {
    let content = tokio::fs::read(path).await.map_err(|source| ExportError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_export(&content, path)
}

/// Parses export CSV bytes. Headers and values are trimmed; rows with a blank
/// `No` or `Actives` are skipped. `source` is only used in error messages.
///
/// # Errors
///
/// Returns an error for malformed CSV or a missing required column.
pub fn parse_export(content: &[u8], source: &Path) -> Result<Vec<ExportProduct>, ExportError> {
    let csv_error = |e: csv::Error| ExportError::Csv {
        path: source.to_path_buf(),
        source: e,
    };
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content);

    let headers = reader.headers().map_err(csv_error)?.clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(ExportError::MissingColumn {
                path: source.to_path_buf(),
                column,
            });
        }
    }

    let mut products = Vec::new();
    for row in reader.deserialize::<ExportProduct>() {
        let product = row.map_err(csv_error)?;
        if product.number.is_empty() || product.actives.is_empty() {
            debug!(number = %product.number, "skipping row without product number or actives");
            continue;
        }
        products.push(product);
    }
    Ok(products)
}

/// Keeps the first product for each distinct active-ingredient string,
/// preserving order of first appearance.
#[must_use]
pub fn dedup_by_actives(products: Vec<ExportProduct>) -> Vec<ExportProduct> {
    let mut seen = HashSet::new();
    let unique: Vec<ExportProduct> = products
        .into_iter()
        .filter(|product| seen.insert(product.actives.clone()))
        .collect();
    info!(unique = unique.len(), "deduplicated export by active ingredients");
    unique
}

/// Download targets `<elabel_base><No>ELBL.pdf` for each product.
#[must_use]
pub fn targets_for(products: &[ExportProduct], elabel_base: &Url) -> Vec<DownloadTarget> {
    products
        .iter()
        .filter_map(|product| DownloadTarget::for_product_id(elabel_base, &product.number))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const EXPORT: &str = "\
No,Name,Actives,Holder
51234,Alpha 500,GLYPHOSATE,Acme
51235,Beta 360, GLYPHOSATE ,Other
,Ghost,2 4-D,Acme
60001,Gamma,\"2,4-D; PICLORAM\",Acme
60002,Delta,,Acme
";

    #[test]
    fn test_parse_export_skips_blank_rows_and_trims() {
        let products = parse_export(EXPORT.as_bytes(), Path::new("results.csv")).unwrap();
        let numbers: Vec<&str> = products.iter().map(|p| p.number.as_str()).collect();
        assert_eq!(numbers, ["51234", "51235", "60001"]);
        assert_eq!(products[1].actives, "GLYPHOSATE");
        assert_eq!(products[2].actives, "2,4-D; PICLORAM");
        assert_eq!(products[0].name.as_deref(), Some("Alpha 500"));
    }

    #[test]
    fn test_parse_export_accepts_padded_headers() {
        let products =
            parse_export(b" No , Actives \n51234, GLYPHOSATE\n", Path::new("padded.csv")).unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].number, "51234");
        assert_eq!(products[0].actives, "GLYPHOSATE");
    }

    #[test]
    fn test_parse_export_requires_columns() {
        let err = parse_export(b"No,Name\n1,x\n", Path::new("bad.csv")).unwrap_err();
        assert!(matches!(err, ExportError::MissingColumn { column: "Actives", .. }));
    }

    #[test]
    fn test_dedup_by_actives_first_wins() {
        let products = parse_export(EXPORT.as_bytes(), Path::new("results.csv")).unwrap();
        let unique = dedup_by_actives(products);
        let numbers: Vec<&str> = unique.iter().map(|p| p.number.as_str()).collect();
        assert_eq!(numbers, ["51234", "60001"]);
    }

    #[test]
    fn test_targets_for_builds_elabel_urls() {
        let products = dedup_by_actives(
            parse_export(EXPORT.as_bytes(), Path::new("results.csv")).unwrap(),
        );
        let base = Url::parse("https://elabels.example.gov/").unwrap();
        let targets = targets_for(&products, &base);
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].file_name(), "51234ELBL.pdf");
        assert_eq!(
            targets[0].url().as_str(),
            "https://elabels.example.gov/51234ELBL.pdf"
        );
    }

    #[tokio::test]
    async fn test_read_export_missing_file() {
        let err = read_export(Path::new("/nonexistent/results.csv"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::Read { .. }));
    }
}
