// src/services/artifacts.rs
//
// Flat-file artifacts. Every write replaces the whole file: the content goes
// to `<name>.tmp` first and is renamed into place.

use crate::services::numeric::parse_lenient;
use crate::BoxError;
use log::info;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = tmp_path(path);
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), BoxError> {
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');
    write_atomic(path, text.as_bytes())?;
    info!("wrote {}", path.display());
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, BoxError> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Writes a one-column, one-row CSV such as `pctile\n0.4123\n`. An
/// unresolved value leaves the cell empty so the schema stays intact.
pub fn write_single_value_csv(path: &Path, column: &str, value: Option<f64>) -> Result<(), BoxError> {
    let cell = value.map(|v| v.to_string()).unwrap_or_default();
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record([column])?;
    wtr.write_record([cell.as_str()])?;
    let bytes = wtr.into_inner().map_err(|e| e.to_string())?;
    write_atomic(path, &bytes)?;
    info!("wrote {} with {}={:?}", path.display(), column, value);
    Ok(())
}

/// Value of `column` in the last row of a previous run's artifact.
/// A missing file abstains quietly.
pub fn last_known_value(path: &Path, column: &str) -> Result<Option<f64>, BoxError> {
    if !path.exists() {
        return Ok(None);
    }
    let cells = read_csv_column(path, column)?;
    Ok(cells.last().and_then(|c| parse_lenient(c)))
}

/// All cells of a named column, in file order. Missing cells are empty
/// strings; blank rows are skipped.
pub fn read_csv_column(path: &Path, column: &str) -> Result<Vec<String>, BoxError> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = rdr.headers()?.clone();
    let idx = headers
        .iter()
        .position(|h| h.trim() == column)
        .ok_or_else(|| format!("no '{}' column in {}", column, path.display()))?;

    let mut cells = Vec::new();
    for record in rdr.records() {
        let row = record?;
        // blank lines
        if row.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        cells.push(row.get(idx).unwrap_or("").trim().to_string());
    }
    Ok(cells)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MetricRecord;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_creates_parents_and_leaves_no_tmp() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/out/vix.csv");
        write_single_value_csv(&path, "pctile", Some(0.4123)).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "pctile\n0.4123\n");
        assert!(!dir.path().join("nested/out/vix.csv.tmp").exists());
        assert_eq!(read_csv_column(&path, "pctile").unwrap(), vec!["0.4123"]);
        assert_eq!(last_known_value(&path, "pctile").unwrap(), Some(0.4123));
    }

    #[test]
    fn unresolved_value_keeps_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prob.csv");
        write_single_value_csv(&path, "prob", None).unwrap();
        assert!(fs::read_to_string(&path).unwrap().starts_with("prob\n"));
        assert_eq!(last_known_value(&path, "prob").unwrap(), None);
        assert_eq!(last_known_value(&dir.path().join("missing.csv"), "prob").unwrap(), None);
    }

    #[test]
    fn missing_column_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("p.csv");
        fs::write(&path, "prob\n0.5\n").unwrap();
        assert!(read_csv_column(&path, "pctile").is_err());
    }

    #[test]
    fn metric_record_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metrics.json");
        let record = MetricRecord {
            rate_cut_odds: Some(0.5512),
            vix_pctile: None,
            corr_spx_dxy: Some(-0.4021),
            corr_spx_10y: Some(0.1),
            stance: "Risk-on".to_string(),
        };
        write_json(&path, &record).unwrap();
        let back: MetricRecord = read_json(&path).unwrap();
        assert_eq!(back, record);

        let raw: serde_json::Map<String, serde_json::Value> = read_json(&path).unwrap();
        let keys: Vec<&str> = raw.keys().map(String::as_str).collect();
        let mut expected = crate::models::REQUIRED_METRIC_KEYS.to_vec();
        expected.sort();
        let mut got = keys.clone();
        got.sort();
        assert_eq!(got, expected);
    }
}
