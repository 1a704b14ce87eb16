//! # Vaultsim Analyzer
//!
//! Statistics over parameter-sweep results: one JSON line per run with the
//! vault, hold and difference APY and the parameters that produced them.
//!
//! ## Public API
//!
//! - `SweepRecord`, `read_records`, `append_record`: the results file format.
//! - `SeriesStats`: mean, median, extremes and sample standard deviation.
//! - `Analyzer`: summaries of one file and key-matched comparisons of two.

pub mod error;
pub mod record;
pub mod stats;

pub use error::AnalyzerError;
pub use record::{ApyTriple, DebtBandParams, RangeParams, SweepRecord, append_record, read_records};
pub use stats::SeriesStats;

use rust_decimal::Decimal;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;

/// APY statistics over the successful runs of one file.
#[derive(Debug, Clone, Serialize)]
pub struct SweepSummary {
    pub total: usize,
    pub successful: usize,
    pub vault: SeriesStats,
    pub hold: SeriesStats,
    pub diff: SeriesStats,
}

/// One parameter combination present in both files.
#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    pub key: String,
    pub ranges: RangeParams,
    pub dlv: DebtBandParams,
    pub baseline: ApyTriple,
    pub candidate: ApyTriple,
    pub vault_change: Decimal,
    pub hold_change: Decimal,
    pub diff_change: Decimal,
}

/// Baseline against candidate.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub baseline: SweepSummary,
    pub candidate: SweepSummary,
    /// Matched combinations, ordered by key.
    pub matched: Vec<Comparison>,
    /// `None` when no combination matched.
    pub vault_change: Option<SeriesStats>,
    pub diff_change: Option<SeriesStats>,
    pub positive_vault_changes: usize,
    pub positive_diff_changes: usize,
}

impl ComparisonReport {
    /// The `n` largest vault APY improvements.
    pub fn top_improvements(&self, n: usize) -> Vec<&Comparison> {
        self.ranked(n, |a, b| b.vault_change.cmp(&a.vault_change))
    }

    /// The `n` largest vault APY changes in either direction.
    pub fn top_absolute_changes(&self, n: usize) -> Vec<&Comparison> {
        self.ranked(n, |a, b| b.vault_change.abs().cmp(&a.vault_change.abs()))
    }

    fn ranked(&self, n: usize, order: impl Fn(&Comparison, &Comparison) -> Ordering) -> Vec<&Comparison> {
        let mut ranked: Vec<&Comparison> = self.matched.iter().collect();
        // Stable sort keeps key order among ties.
        ranked.sort_by(|a, b| order(a, b));
        ranked.truncate(n);
        ranked
    }

    /// Share of matched combinations whose vault APY improved, in percent.
    pub fn positive_vault_share_pct(&self) -> Decimal {
        share_pct(self.positive_vault_changes, self.matched.len())
    }

    pub fn positive_diff_share_pct(&self) -> Decimal {
        share_pct(self.positive_diff_changes, self.matched.len())
    }
}

fn share_pct(part: usize, total: usize) -> Decimal {
    if total == 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(part) * Decimal::ONE_HUNDRED / Decimal::from(total)).round_dp(1)
}

fn successful_by_key(records: &[SweepRecord]) -> BTreeMap<&str, (&SweepRecord, ApyTriple)> {
    records
        .iter()
        .filter_map(|r| r.successful_apy().map(|apy| (r.key.as_str(), (r, apy))))
        .collect()
}

/// The main analysis engine.
#[derive(Debug, Default)]
pub struct Analyzer {}

impl Analyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Summarizes the successful runs among `records`.
    pub fn summarize(&self, records: &[SweepRecord]) -> Result<SweepSummary, AnalyzerError> {
        let apys: Vec<ApyTriple> = records.iter().filter_map(SweepRecord::successful_apy).collect();
        let series = |pick: fn(&ApyTriple) -> Decimal| apys.iter().map(pick).collect::<Vec<_>>();
        Ok(SweepSummary {
            total: records.len(),
            successful: apys.len(),
            vault: SeriesStats::from_values(&series(|a| a.vault))?,
            hold: SeriesStats::from_values(&series(|a| a.hold))?,
            diff: SeriesStats::from_values(&series(|a| a.diff))?,
        })
    }

    /// Matches successful runs by key. A key repeated within one file keeps
    /// its last occurrence.
    pub fn compare(
        &self,
        baseline: &[SweepRecord],
        candidate: &[SweepRecord],
    ) -> Result<ComparisonReport, AnalyzerError> {
        let base = successful_by_key(baseline);
        let cand = successful_by_key(candidate);

        let matched: Vec<Comparison> = base
            .iter()
            .filter_map(|(key, (record, before))| {
                cand.get(key).map(|(_, after)| Comparison {
                    key: key.to_string(),
                    ranges: record.ranges,
                    dlv: record.dlv,
                    baseline: *before,
                    candidate: *after,
                    vault_change: after.vault - before.vault,
                    hold_change: after.hold - before.hold,
                    diff_change: after.diff - before.diff,
                })
            })
            .collect();

        let changes = |pick: fn(&Comparison) -> Decimal| -> Result<Option<SeriesStats>, AnalyzerError> {
            if matched.is_empty() {
                return Ok(None);
            }
            SeriesStats::from_values(&matched.iter().map(pick).collect::<Vec<_>>()).map(Some)
        };

        let report = ComparisonReport {
            baseline: self.summarize(baseline)?,
            candidate: self.summarize(candidate)?,
            vault_change: changes(|c| c.vault_change)?,
            diff_change: changes(|c| c.diff_change)?,
            positive_vault_changes: matched.iter().filter(|c| c.vault_change > Decimal::ZERO).count(),
            positive_diff_changes: matched.iter().filter(|c| c.diff_change > Decimal::ZERO).count(),
            matched,
        };
        tracing::info!(
            baseline = report.baseline.successful,
            candidate = report.candidate.successful,
            matched = report.matched.len(),
            "Sweep comparison complete"
        );
        Ok(report)
    }

    pub async fn summarize_file(&self, path: impl AsRef<Path>) -> Result<SweepSummary, AnalyzerError> {
        self.summarize(&read_records(path).await?)
    }

    pub async fn compare_files(
        &self,
        baseline: impl AsRef<Path>,
        candidate: impl AsRef<Path>,
    ) -> Result<ComparisonReport, AnalyzerError> {
        let baseline = read_records(baseline).await?;
        let candidate = read_records(candidate).await?;
        self.compare(&baseline, &candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn record(key: &str, vault: Decimal, hold: Decimal) -> SweepRecord {
        SweepRecord {
            key: key.to_string(),
            ok: true,
            apy: Some(ApyTriple { vault, hold, diff: vault - hold }),
            ranges: RangeParams { wide_threshold: 12_000, base_threshold: 3_600 },
            dlv: DebtBandParams { deviation_threshold_above: dec!(0.1), deviation_threshold_below: dec!(0.1) },
            error: None,
        }
    }

    fn failed(key: &str) -> SweepRecord {
        SweepRecord { ok: false, apy: None, error: Some("diverged".to_string()), ..record(key, dec!(0), dec!(0)) }
    }

    #[test]
    fn summary_ignores_failed_runs() {
        let records = vec![record("a", dec!(10), dec!(4)), failed("b"), record("c", dec!(20), dec!(4))];
        let summary = Analyzer::new().summarize(&records).unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.successful, 2);
        assert_eq!(summary.vault.mean, dec!(15));
        assert_eq!(summary.diff.min, dec!(6));
        assert_eq!(summary.hold.stddev, Decimal::ZERO);
    }

    #[test]
    fn summary_of_only_failures_is_an_error() {
        assert!(matches!(Analyzer::new().summarize(&[failed("a")]), Err(AnalyzerError::NoRunsFound)));
    }

    #[test]
    fn comparison_matches_by_key() {
        let baseline = vec![record("a", dec!(10), dec!(4)), record("b", dec!(8), dec!(4)), record("c", dec!(5), dec!(4))];
        let candidate = vec![record("a", dec!(12), dec!(4)), record("b", dec!(7), dec!(4)), failed("c"), record("d", dec!(1), dec!(1))];
        let report = Analyzer::new().compare(&baseline, &candidate).unwrap();

        let keys: Vec<&str> = report.matched.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(report.matched[0].vault_change, dec!(2));
        assert_eq!(report.matched[1].diff_change, dec!(-1));
        assert_eq!(report.positive_vault_changes, 1);
        assert_eq!(report.positive_vault_share_pct(), dec!(50));
        assert_eq!(report.vault_change.unwrap().mean, dec!(0.5));

        assert_eq!(report.top_improvements(1)[0].key, "a");
        assert_eq!(report.top_absolute_changes(2)[0].key, "a");
    }

    #[test]
    fn comparison_without_overlap_has_no_change_stats() {
        let report =
            Analyzer::new().compare(&[record("a", dec!(1), dec!(1))], &[record("b", dec!(2), dec!(1))]).unwrap();
        assert!(report.matched.is_empty());
        assert!(report.vault_change.is_none());
        assert_eq!(report.positive_vault_share_pct(), Decimal::ZERO);
    }
}
