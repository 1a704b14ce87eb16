use crate::error::AnalyzerError;
use analytics::PerformanceReport;
use configuration::Config;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// Vault, hold and difference APY of one run, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApyTriple {
    #[serde(with = "rust_decimal::serde::float")]
    pub vault: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub hold: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub diff: Decimal,
}

/// Range widths the run used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeParams {
    pub wide_threshold: i32,
    pub base_threshold: i32,
}

/// Debt band the run used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebtBandParams {
    #[serde(with = "rust_decimal::serde::float")]
    pub deviation_threshold_above: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub deviation_threshold_below: Decimal,
}

/// One line of a sweep results file.
///
/// `key` identifies the parameter combination so runs of the same combination
/// can be matched across files. Failed runs carry `ok: false` and no APY.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepRecord {
    pub key: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apy: Option<ApyTriple>,
    #[serde(rename = "charm")]
    pub ranges: RangeParams,
    pub dlv: DebtBandParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SweepRecord {
    /// The combination key of `config`: range thresholds then debt band.
    pub fn key_for(config: &Config) -> String {
        format!(
            "w{}-b{}-a{}-b{}",
            config.vault.wide_threshold,
            config.vault.base_threshold,
            config.debt.deviation_threshold_above.normalize(),
            config.debt.deviation_threshold_below.normalize()
        )
    }

    fn params(config: &Config) -> (RangeParams, DebtBandParams) {
        (
            RangeParams { wide_threshold: config.vault.wide_threshold, base_threshold: config.vault.base_threshold },
            DebtBandParams {
                deviation_threshold_above: config.debt.deviation_threshold_above,
                deviation_threshold_below: config.debt.deviation_threshold_below,
            },
        )
    }

    pub fn from_report(config: &Config, report: &PerformanceReport) -> Self {
        let (ranges, dlv) = Self::params(config);
        Self {
            key: Self::key_for(config),
            ok: true,
            apy: Some(ApyTriple {
                vault: report.vault_apy_pct,
                hold: report.hold_apy_pct,
                diff: report.apy_diff_pct,
            }),
            ranges,
            dlv,
            error: None,
        }
    }

    pub fn failed(config: &Config, error: impl ToString) -> Self {
        let (ranges, dlv) = Self::params(config);
        Self { key: Self::key_for(config), ok: false, apy: None, ranges, dlv, error: Some(error.to_string()) }
    }

    /// The APY of a successful run.
    pub fn successful_apy(&self) -> Option<ApyTriple> {
        if self.ok { self.apy } else { None }
    }
}

/// Reads a sweep results file, skipping blank lines.
pub async fn read_records(path: impl AsRef<Path>) -> Result<Vec<SweepRecord>, AnalyzerError> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| AnalyzerError::Io { path: path.to_path_buf(), source })?;
    let mut records = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record = serde_json::from_str(line).map_err(|source| AnalyzerError::Parse {
            path: path.to_path_buf(),
            line: index + 1,
            source,
        })?;
        records.push(record);
    }
    tracing::debug!(path = %path.display(), records = records.len(), "Loaded sweep results");
    Ok(records)
}

/// Appends one record as a JSON line, creating the file if needed.
pub async fn append_record(path: impl AsRef<Path>, record: &SweepRecord) -> Result<(), AnalyzerError> {
    let path = path.as_ref();
    let mut line = serde_json::to_string(record)?;
    line.push('\n');
    let io = |source| AnalyzerError::Io { path: path.to_path_buf(), source };
    let mut file = tokio::fs::OpenOptions::new().create(true).append(true).open(path).await.map_err(io)?;
    file.write_all(line.as_bytes()).await.map_err(io)?;
    file.flush().await.map_err(io)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_sweep_line() {
        let line = r#"{"key":"w12000-b3600-a0.1-b0.1","ok":true,"apy":{"vault":12.5,"hold":4.25,"diff":8.25},"charm":{"wideThreshold":12000,"baseThreshold":3600},"dlv":{"deviationThresholdAbove":0.1,"deviationThresholdBelow":0.1}}"#;
        let record: SweepRecord = serde_json::from_str(line).unwrap();
        assert!(record.ok);
        assert_eq!(record.ranges.base_threshold, 3600);
        assert_eq!(record.dlv.deviation_threshold_above, dec!(0.1));
        let apy = record.successful_apy().unwrap();
        assert_eq!(apy.vault, dec!(12.5));
        assert_eq!(apy.diff, dec!(8.25));
    }

    #[test]
    fn failed_line_has_no_apy() {
        let line = r#"{"key":"k","ok":false,"charm":{"wideThreshold":1,"baseThreshold":1},"dlv":{"deviationThresholdAbove":0.1,"deviationThresholdBelow":0.2},"error":"boom"}"#;
        let record: SweepRecord = serde_json::from_str(line).unwrap();
        assert_eq!(record.successful_apy(), None);
        assert_eq!(record.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn appended_records_read_back() {
        let path = std::env::temp_dir().join(format!("sweep-{}.jsonl", uuid::Uuid::new_v4()));
        let record = SweepRecord {
            key: "k".to_string(),
            ok: true,
            apy: Some(ApyTriple { vault: dec!(3), hold: dec!(1), diff: dec!(2) }),
            ranges: RangeParams { wide_threshold: 12_000, base_threshold: 3_600 },
            dlv: DebtBandParams { deviation_threshold_above: dec!(0.1), deviation_threshold_below: dec!(0.1) },
            error: None,
        };
        append_record(&path, &record).await.unwrap();
        append_record(&path, &record).await.unwrap();
        let records = read_records(&path).await.unwrap();
        tokio::fs::remove_file(&path).await.unwrap();
        assert_eq!(records, vec![record.clone(), record]);
    }
}
