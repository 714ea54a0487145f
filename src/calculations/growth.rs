//! Revenue and earnings growth consistency over annual statements.

use crate::statements::{IncomeField, IncomeStatement};
use serde::{Deserialize, Serialize};

/// Consecutive year-over-year increases counted back from the most recent
/// value. `values` is ordered oldest first.
///
/// A step counts only when the earlier value is positive and the later one
/// is strictly larger; the first failing step ends the streak.
pub fn growth_streak(values: &[f64]) -> u32 {
    let mut streak = 0;
    for pair in values.windows(2).rev() {
        let (previous, current) = (pair[0], pair[1]);
        if previous > 0.0 && current > previous {
            streak += 1;
        } else {
            break;
        }
    }
    streak
}

/// Compound annual growth rate between the value `years` periods before the
/// most recent one and the most recent one. `values` is ordered oldest first.
pub fn compound_growth(values: &[f64], years: usize) -> Option<f64> {
    if years == 0 || values.len() < years + 1 {
        return None;
    }
    let end = *values.last()?;
    let start = values[values.len() - 1 - years];
    if start <= 0.0 || end <= 0.0 {
        return None;
    }
    Some((end / start).powf(1.0 / years as f64) - 1.0)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GrowthSummary {
    pub revenue_growth_years: u32,
    pub earnings_growth_years: u32,
    pub revenue_consistent: bool,
    pub earnings_consistent: bool,
    pub both_consistent: bool,
    pub revenue_cagr: Option<f64>,
    pub earnings_cagr: Option<f64>,
}

pub struct GrowthAnalyzer<'a> {
    /// Annual income statements, newest first as parsed.
    annual: &'a [IncomeStatement],
}

impl<'a> GrowthAnalyzer<'a> {
    pub fn new(annual: &'a [IncomeStatement]) -> Self {
        Self { annual }
    }

    /// Observed values of `field`, oldest first. Periods not reporting the
    /// field are skipped.
    fn series(&self, field: IncomeField) -> Vec<f64> {
        self.annual.iter().rev().filter_map(|s| field.value(s)).collect()
    }

    pub fn count_consecutive_growth_years(&self, field: IncomeField) -> u32 {
        growth_streak(&self.series(field))
    }

    pub fn revenue_growth_years(&self) -> u32 {
        self.count_consecutive_growth_years(IncomeField::TotalRevenue)
    }

    pub fn earnings_growth_years(&self) -> u32 {
        self.count_consecutive_growth_years(IncomeField::NetIncome)
    }

    pub fn calculate_cagr(&self, field: IncomeField, years: usize) -> Option<f64> {
        compound_growth(&self.series(field), years)
    }

    pub fn has_consistent_growth(&self, min_years: u32) -> GrowthSummary {
        let revenue_years = self.revenue_growth_years();
        let earnings_years = self.earnings_growth_years();
        let revenue_consistent = revenue_years >= min_years;
        let earnings_consistent = earnings_years >= min_years;

        GrowthSummary {
            revenue_growth_years: revenue_years,
            earnings_growth_years: earnings_years,
            revenue_consistent,
            earnings_consistent,
            both_consistent: revenue_consistent && earnings_consistent,
            revenue_cagr: self.calculate_cagr(IncomeField::TotalRevenue, min_years as usize),
            earnings_cagr: self.calculate_cagr(IncomeField::NetIncome, min_years as usize),
        }
    }
}
