use serde::{Deserialize, Serialize};
use std::fmt;

// ── Company ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Company {
    pub symbol: String,
    pub name: String,
    pub exchange: String, // oslo, stockholm, copenhagen
    pub ticker: String,   // symbol + exchange suffix, e.g. "EQNR.OL"
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
}

impl Company {
    pub fn new(symbol: &str, name: &str, exchange: &str, suffix: &str) -> Self {
        let symbol = symbol.trim().to_string();
        Self {
            ticker: format!("{}{}", symbol, suffix),
            symbol,
            name: name.trim().to_string(),
            exchange: exchange.to_string(),
            sector: None,
            industry: None,
        }
    }
}

// ── Derived metrics ───────────────────────────────────────────────────────────

/// Per-company derived snapshot. `None` means the source data was missing,
/// which is distinct from a computed zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FinancialMetrics {
    pub ticker: String,
    pub name: String,
    pub exchange: String,
    pub sector: Option<String>,
    pub industry: Option<String>,

    // Valuation
    pub pe_ratio: Option<f64>,
    pub market_cap: Option<f64>,

    // Profitability
    pub roic: Option<f64>,
    /// Newest first, a prefix of consecutive known years.
    pub roic_history: Vec<f64>,

    // Growth, back-filled once screening has the growth summary
    pub revenue_growth_years: Option<u32>,
    pub earnings_growth_years: Option<u32>,

    // Financial health
    pub debt_to_equity: Option<f64>,
    pub free_cash_flow: Option<f64>,
    /// TTM free cash flow / TTM revenue
    pub cf_yield: Option<f64>,

    pub ttm_revenue: Option<f64>,
    pub ttm_earnings: Option<f64>,

    pub has_positive_earnings: bool,
    pub data_complete: bool,
}

impl FinancialMetrics {
    pub fn with_growth(mut self, revenue_years: u32, earnings_years: u32) -> Self {
        self.revenue_growth_years = Some(revenue_years);
        self.earnings_growth_years = Some(earnings_years);
        self
    }
}

// ── Filters ───────────────────────────────────────────────────────────────────

/// The fixed screening criteria, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    PeBelowPeer,
    RoicConsistent,
    RevenueGrowth,
    EarningsGrowth,
    DebtToEquity,
    PositiveFcf,
    CfYield,
    PositiveEarnings,
}

impl FilterKind {
    pub const ALL: [FilterKind; 8] = [
        FilterKind::PeBelowPeer,
        FilterKind::RoicConsistent,
        FilterKind::RevenueGrowth,
        FilterKind::EarningsGrowth,
        FilterKind::DebtToEquity,
        FilterKind::PositiveFcf,
        FilterKind::CfYield,
        FilterKind::PositiveEarnings,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::PeBelowPeer => "pe_below_peer",
            Self::RoicConsistent => "roic_consistent",
            Self::RevenueGrowth => "revenue_growth",
            Self::EarningsGrowth => "earnings_growth",
            Self::DebtToEquity => "debt_to_equity",
            Self::PositiveFcf => "positive_fcf",
            Self::CfYield => "cf_yield",
            Self::PositiveEarnings => "positive_earnings",
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Number of screening criteria; the default pass gate requires all of them.
pub const FILTER_COUNT: usize = FilterKind::ALL.len();

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FilterResult {
    pub passed: bool,
    pub reason: String,
    pub value: Option<f64>,
    pub threshold: Option<f64>,
}

impl FilterResult {
    /// Fail-closed result for a criterion whose input is unknown.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            passed: false,
            reason: reason.into(),
            value: None,
            threshold: None,
        }
    }
}

// ── Screening output ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningResult {
    pub metrics: FinancialMetrics,
    /// Evaluation order, one entry per `FilterKind`.
    pub filter_results: Vec<(FilterKind, FilterResult)>,
    pub passed_all: bool,
    pub score: f64,
}

impl ScreeningResult {
    pub fn passed_count(&self) -> usize {
        self.filter_results.iter().filter(|(_, r)| r.passed).count()
    }

    pub fn total_filters(&self) -> usize {
        self.filter_results.len()
    }

    pub fn filter(&self, kind: FilterKind) -> Option<&FilterResult> {
        self.filter_results
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, r)| r)
    }
}

/// What the report layer receives: ranked passing companies plus universe size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenOutcome {
    pub results: Vec<ScreeningResult>,
    pub total_considered: usize,
}
