//! Valuation, profitability and leverage metrics for one company.
//!
//! ROIC = NOPAT / invested capital, where
//!   NOPAT            = EBIT × (1 − effective tax rate)
//!   invested capital = total debt + total equity − cash
//!
//! Annual periods are addressed by offset from the most recent (0).

use super::ttm::TtmCalculator;
use crate::models::{Company, FinancialMetrics};
use crate::statements::{resolve_total_debt, BalanceSheet, FinancialStatements, IncomeStatement};

/// Used when the effective rate cannot be derived; typical Nordic corporate rate.
pub const DEFAULT_TAX_RATE: f64 = 0.25;
pub const MAX_TAX_RATE: f64 = 0.5;
pub const DEFAULT_ROIC_YEARS: usize = 6;

pub struct MetricsCalculator<'a> {
    statements: &'a FinancialStatements,
    company: &'a Company,
    ttm: TtmCalculator<'a>,
    roic_years: usize,
}

impl<'a> MetricsCalculator<'a> {
    pub fn new(statements: &'a FinancialStatements, company: &'a Company) -> Self {
        Self {
            statements,
            company,
            ttm: TtmCalculator::new(&statements.income.quarterly, &statements.cash_flow.quarterly),
            roic_years: DEFAULT_ROIC_YEARS,
        }
    }

    pub fn with_roic_years(mut self, years: usize) -> Self {
        self.roic_years = years;
        self
    }

    /// Reported trailing PE if positive, else market cap over positive TTM net income.
    pub fn pe_ratio(&self) -> Option<f64> {
        let info = &self.statements.info;
        if let Some(pe) = info.trailing_pe.filter(|pe| *pe > 0.0) {
            return Some(pe);
        }

        let market_cap = info.market_cap.filter(|m| *m > 0.0)?;
        let earnings = self.ttm.net_income().filter(|e| *e > 0.0)?;
        Some(market_cap / earnings)
    }

    pub fn roic(&self, year_offset: usize) -> Option<f64> {
        let fin = self.statements.income.annual.get(year_offset)?;
        let bal = self.statements.balance.annual.get(year_offset)?;

        let ebit = fin.ebit.or(fin.operating_income)?;
        let nopat = ebit * (1.0 - effective_tax_rate(fin));

        let invested = invested_capital(bal)?;
        if invested <= 0.0 {
            return None;
        }
        Some(nopat / invested)
    }

    /// ROIC for the `years` most recent annual periods, newest first,
    /// truncated at the first year that cannot be computed.
    pub fn roic_history(&self, years: usize) -> Vec<f64> {
        (0..years).map_while(|offset| self.roic(offset)).collect()
    }

    /// Most recent annual balance sheet; debt counts as zero when unreported.
    pub fn debt_to_equity(&self) -> Option<f64> {
        let bal = self.statements.balance.annual.first()?;
        let equity = bal.total_equity.filter(|e| *e > 0.0)?;
        let debt = resolve_total_debt(bal).unwrap_or(0.0);
        Some(debt / equity)
    }

    /// TTM free cash flow over TTM revenue.
    pub fn cf_yield(&self) -> Option<f64> {
        let fcf = self.ttm.free_cash_flow()?;
        let revenue = self.ttm.revenue().filter(|r| *r > 0.0)?;
        Some(fcf / revenue)
    }

    pub fn calculate_all(&self) -> FinancialMetrics {
        let info = &self.statements.info;

        let ttm_earnings = self.ttm.net_income();
        let roic_history = self.roic_history(self.roic_years);

        let name = Some(self.company.name.trim())
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .or_else(|| info.short_name.clone())
            .or_else(|| info.long_name.clone())
            .unwrap_or_default();

        let mut metrics = FinancialMetrics {
            ticker: self.company.ticker.clone(),
            name,
            exchange: self.company.exchange.clone(),
            sector: info.sector.clone().or_else(|| self.company.sector.clone()),
            industry: info.industry.clone().or_else(|| self.company.industry.clone()),
            pe_ratio: self.pe_ratio(),
            market_cap: info.market_cap,
            roic: roic_history.first().copied(),
            roic_history,
            revenue_growth_years: None,
            earnings_growth_years: None,
            debt_to_equity: self.debt_to_equity(),
            free_cash_flow: self.ttm.free_cash_flow(),
            cf_yield: self.cf_yield(),
            ttm_revenue: self.ttm.revenue(),
            ttm_earnings,
            has_positive_earnings: ttm_earnings.is_some_and(|e| e > 0.0),
            data_complete: false,
        };

        // Growth fields are filled in later by screening and do not count here.
        metrics.data_complete = metrics.pe_ratio.is_some()
            && metrics.roic.is_some()
            && metrics.debt_to_equity.is_some()
            && metrics.free_cash_flow.is_some();

        metrics
    }
}

/// |tax| / pretax income, clamped to [0, 0.5], when pretax income is positive.
pub fn effective_tax_rate(fin: &IncomeStatement) -> f64 {
    match (fin.pretax_income, fin.tax_provision) {
        (Some(pretax), Some(tax)) if pretax > 0.0 => (tax.abs() / pretax).clamp(0.0, MAX_TAX_RATE),
        _ => DEFAULT_TAX_RATE,
    }
}

/// Total debt + total equity − cash. Unknown without reported equity.
pub fn invested_capital(bal: &BalanceSheet) -> Option<f64> {
    let equity = bal.total_equity?;
    let debt = resolve_total_debt(bal).unwrap_or(0.0);
    let cash = bal.cash.unwrap_or(0.0);
    Some(debt + equity - cash)
}
