use crate::error::AnalyzerError;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::Serialize;

/// Location and spread of one series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeriesStats {
    pub count: usize,
    pub mean: Decimal,
    pub median: Decimal,
    pub min: Decimal,
    pub max: Decimal,
    /// Sample standard deviation; zero for a single value.
    pub stddev: Decimal,
}

impl SeriesStats {
    pub fn from_values(values: &[Decimal]) -> Result<Self, AnalyzerError> {
        if values.is_empty() {
            return Err(AnalyzerError::NoRunsFound);
        }
        let mut sorted = values.to_vec();
        sorted.sort();

        let count = Decimal::from(sorted.len());
        let sum = sorted
            .iter()
            .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(*v))
            .ok_or_else(|| AnalyzerError::Calculation("sum overflowed".to_string()))?;
        let mean = sum / count;

        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 { (sorted[mid - 1] + sorted[mid]) / Decimal::TWO } else { sorted[mid] };

        let stddev = if sorted.len() > 1 {
            let squares: Decimal = sorted.iter().map(|v| (*v - mean) * (*v - mean)).sum();
            let variance = squares / (count - Decimal::ONE);
            variance
                .sqrt()
                .ok_or_else(|| AnalyzerError::Calculation("negative variance".to_string()))?
        } else {
            Decimal::ZERO
        };

        Ok(Self {
            count: sorted.len(),
            mean,
            median,
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            stddev,
        })
    }
}
