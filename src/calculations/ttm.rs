//! Trailing-twelve-month aggregates over quarterly statements.

use crate::statements::{CashFlowStatement, IncomeStatement};

/// Quarters in a trailing-twelve-month window.
pub const TTM_QUARTERS: usize = 4;

/// Sum `field` over the most recent `window` records (newest first).
///
/// Every one of the `window` periods must report the field: a gap yields
/// `None` rather than a partial sum, as does a series shorter than `window`.
pub fn sum_trailing<T>(records: &[T], window: usize, field: impl Fn(&T) -> Option<f64>) -> Option<f64> {
    if window == 0 || records.len() < window {
        return None;
    }
    records[..window].iter().map(field).sum()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TtmMetrics {
    pub revenue: Option<f64>,
    pub net_income: Option<f64>,
    pub operating_income: Option<f64>,
    pub operating_cash_flow: Option<f64>,
    pub capex: Option<f64>,
    pub free_cash_flow: Option<f64>,
}

pub struct TtmCalculator<'a> {
    income: &'a [IncomeStatement],
    cash_flow: &'a [CashFlowStatement],
    window: usize,
}

impl<'a> TtmCalculator<'a> {
    /// Both slices newest first.
    pub fn new(income: &'a [IncomeStatement], cash_flow: &'a [CashFlowStatement]) -> Self {
        Self::with_window(income, cash_flow, TTM_QUARTERS)
    }

    pub fn with_window(
        income: &'a [IncomeStatement],
        cash_flow: &'a [CashFlowStatement],
        window: usize,
    ) -> Self {
        Self { income, cash_flow, window }
    }

    pub fn revenue(&self) -> Option<f64> {
        sum_trailing(self.income, self.window, |s| s.total_revenue)
    }

    pub fn net_income(&self) -> Option<f64> {
        sum_trailing(self.income, self.window, |s| s.net_income)
    }

    /// Operating income, else EBIT.
    pub fn operating_income(&self) -> Option<f64> {
        sum_trailing(self.income, self.window, |s| s.operating_income)
            .or_else(|| sum_trailing(self.income, self.window, |s| s.ebit))
    }

    pub fn operating_cash_flow(&self) -> Option<f64> {
        sum_trailing(self.cash_flow, self.window, |s| s.operating_cash_flow)
    }

    pub fn capex(&self) -> Option<f64> {
        sum_trailing(self.cash_flow, self.window, |s| s.capital_expenditure)
    }

    /// Reported free cash flow if every quarter has it, else operating cash
    /// flow net of capex. Capex reported as an outflow (negative) is added,
    /// a positive figure is subtracted. Unreported capex counts as zero.
    pub fn free_cash_flow(&self) -> Option<f64> {
        if let Some(direct) = sum_trailing(self.cash_flow, self.window, |s| s.free_cash_flow) {
            return Some(direct);
        }

        let ocf = self.operating_cash_flow()?;
        match self.capex() {
            None => Some(ocf),
            Some(capex) if capex < 0.0 => Some(ocf + capex),
            Some(capex) => Some(ocf - capex),
        }
    }

    pub fn all(&self) -> TtmMetrics {
        TtmMetrics {
            revenue: self.revenue(),
            net_income: self.net_income(),
            operating_income: self.operating_income(),
            operating_cash_flow: self.operating_cash_flow(),
            capex: self.capex(),
            free_cash_flow: self.free_cash_flow(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn quarter(i: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 12, 31).unwrap() - chrono::Days::new(91 * i as u64)
    }

    fn income(revenue: &[Option<f64>]) -> Vec<IncomeStatement> {
        revenue
            .iter()
            .enumerate()
            .map(|(i, r)| IncomeStatement {
                period_end: quarter(i as u32),
                total_revenue: *r,
                ..Default::default()
            })
            .collect()
    }

    fn cash(rows: &[(Option<f64>, Option<f64>, Option<f64>)]) -> Vec<CashFlowStatement> {
        rows.iter()
            .enumerate()
            .map(|(i, (ocf, capex, fcf))| CashFlowStatement {
                period_end: quarter(i as u32),
                operating_cash_flow: *ocf,
                capital_expenditure: *capex,
                free_cash_flow: *fcf,
            })
            .collect()
    }

    #[test]
    fn test_sum_of_four_known_quarters() {
        let inc = income(&[Some(10.0), Some(20.0), Some(30.0), Some(40.0)]);
        let ttm = TtmCalculator::new(&inc, &[]);
        assert_eq!(ttm.revenue(), Some(100.0));
    }

    #[test]
    fn test_missing_quarter_is_unknown() {
        let inc = income(&[Some(10.0), None, Some(30.0), Some(40.0)]);
        assert_eq!(TtmCalculator::new(&inc, &[]).revenue(), None);
    }

    #[test]
    fn test_short_series_is_unknown() {
        let inc = income(&[Some(10.0), Some(20.0), Some(30.0)]);
        assert_eq!(TtmCalculator::new(&inc, &[]).revenue(), None);
    }

    #[test]
    fn test_only_most_recent_window_is_summed() {
        let inc = income(&[Some(1.0), Some(2.0), Some(3.0), Some(4.0), None, Some(100.0)]);
        assert_eq!(TtmCalculator::new(&inc, &[]).revenue(), Some(10.0));
    }

    #[test]
    fn test_custom_window() {
        let inc = income(&[Some(1.0), Some(2.0)]);
        assert_eq!(TtmCalculator::with_window(&inc, &[], 2).revenue(), Some(3.0));
        assert_eq!(sum_trailing(&inc, 0, |s| s.total_revenue), None);
    }

    #[test]
    fn test_fcf_prefers_direct_figure() {
        let cf = cash(&[(Some(50.0), Some(-10.0), Some(5.0)); 4]);
        assert_eq!(TtmCalculator::new(&[], &cf).free_cash_flow(), Some(20.0));
    }

    #[test]
    fn test_fcf_negative_capex_is_added() {
        let cf = cash(&[(Some(50.0), Some(-10.0), None); 4]);
        assert_eq!(TtmCalculator::new(&[], &cf).free_cash_flow(), Some(160.0));
    }

    #[test]
    fn test_fcf_positive_capex_is_subtracted() {
        let cf = cash(&[(Some(50.0), Some(10.0), None); 4]);
        assert_eq!(TtmCalculator::new(&[], &cf).free_cash_flow(), Some(160.0));
    }

    #[test]
    fn test_fcf_without_capex_is_operating_cash_flow() {
        let cf = cash(&[(Some(25.0), None, None); 4]);
        assert_eq!(TtmCalculator::new(&[], &cf).free_cash_flow(), Some(100.0));
    }

    #[test]
    fn test_fcf_unknown_without_operating_cash_flow() {
        let cf = cash(&[(None, Some(-10.0), None); 4]);
        assert_eq!(TtmCalculator::new(&[], &cf).free_cash_flow(), None);
    }

    #[test]
    fn test_operating_income_falls_back_to_ebit() {
        let inc: Vec<IncomeStatement> = (0..4)
            .map(|i| IncomeStatement {
                period_end: quarter(i),
                ebit: Some(7.0),
                ..Default::default()
            })
            .collect();
        let all = TtmCalculator::new(&inc, &[]).all();
        assert_eq!(all.operating_income, Some(28.0));
        assert_eq!(all.net_income, None);
    }
}
