//! Financial statement data: the raw bundle handed over by a data source and
//! the typed per-period records the calculations work on.
//!
//! Line-item name fallbacks ("Total Equity" or "Stockholders Equity", ...)
//! are resolved here, once, at the parse boundary. Downstream code only sees
//! named optional fields.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

/// Period date string → line item name → value, as delivered by the source.
pub type RawSeries = BTreeMap<String, BTreeMap<String, Value>>;

#[derive(Debug, Error)]
pub enum StatementError {
    #[error("{series}: unparseable period date {value:?}")]
    InvalidPeriod { series: &'static str, value: String },

    #[error("{series}: duplicate period {date}")]
    DuplicatePeriod { series: &'static str, date: NaiveDate },

    #[error("invalid statement bundle: {0}")]
    Json(#[from] serde_json::Error),
}

// ── Raw bundle ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StatementBundle {
    #[serde(default)]
    pub ticker: Option<String>,
    #[serde(default)]
    pub info: BTreeMap<String, Value>,
    #[serde(default)]
    pub quarterly_financials: Option<RawSeries>,
    #[serde(default)]
    pub annual_financials: Option<RawSeries>,
    #[serde(default)]
    pub quarterly_balance: Option<RawSeries>,
    #[serde(default)]
    pub annual_balance: Option<RawSeries>,
    #[serde(default)]
    pub quarterly_cashflow: Option<RawSeries>,
    #[serde(default)]
    pub annual_cashflow: Option<RawSeries>,
}

impl StatementBundle {
    pub fn from_json(s: &str) -> Result<Self, StatementError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Worth screening: company info plus at least one income statement series.
    pub fn has_meaningful_data(&self) -> bool {
        let non_empty = |s: &Option<RawSeries>| s.as_ref().is_some_and(|m| !m.is_empty());
        !self.info.is_empty()
            && (non_empty(&self.annual_financials) || non_empty(&self.quarterly_financials))
    }
}

// ── Company info ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompanyInfo {
    pub short_name: Option<String>,
    pub long_name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub market_cap: Option<f64>,
    pub trailing_pe: Option<f64>,
    pub currency: Option<String>,
}

impl CompanyInfo {
    pub fn from_map(info: &BTreeMap<String, Value>) -> Self {
        let text = |key: &str| {
            info.get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let number = |key: &str| info.get(key).and_then(as_number);

        Self {
            short_name: text("shortName"),
            long_name: text("longName"),
            sector: text("sector"),
            industry: text("industry"),
            market_cap: number("marketCap"),
            trailing_pe: number("trailingPE"),
            currency: text("currency"),
        }
    }
}

// ── Typed statements ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncomeStatement {
    pub period_end: NaiveDate,
    pub total_revenue: Option<f64>,
    pub net_income: Option<f64>,
    pub ebit: Option<f64>,
    pub operating_income: Option<f64>,
    pub pretax_income: Option<f64>,
    pub tax_provision: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BalanceSheet {
    pub period_end: NaiveDate,
    pub total_debt: Option<f64>,
    pub long_term_debt: Option<f64>,
    pub current_debt: Option<f64>,
    pub total_equity: Option<f64>,
    pub cash: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CashFlowStatement {
    pub period_end: NaiveDate,
    pub operating_cash_flow: Option<f64>,
    pub capital_expenditure: Option<f64>,
    pub free_cash_flow: Option<f64>,
}

/// Built from one period's line items.
pub trait StatementRecord: Sized {
    const SERIES: &'static str;

    fn from_items(period_end: NaiveDate, items: &BTreeMap<String, Value>) -> Self;
    fn period_end(&self) -> NaiveDate;
}

impl StatementRecord for IncomeStatement {
    const SERIES: &'static str = "income";

    fn from_items(period_end: NaiveDate, items: &BTreeMap<String, Value>) -> Self {
        Self {
            period_end,
            total_revenue: line_item(items, &["Total Revenue"]),
            net_income: line_item(items, &["Net Income"]),
            ebit: line_item(items, &["EBIT"]),
            operating_income: line_item(items, &["Operating Income"]),
            pretax_income: line_item(items, &["Pretax Income"]),
            tax_provision: line_item(items, &["Tax Provision", "Income Tax Expense"]),
        }
    }

    fn period_end(&self) -> NaiveDate {
        self.period_end
    }
}

impl StatementRecord for BalanceSheet {
    const SERIES: &'static str = "balance";

    fn from_items(period_end: NaiveDate, items: &BTreeMap<String, Value>) -> Self {
        Self {
            period_end,
            total_debt: line_item(items, &["Total Debt"]),
            long_term_debt: line_item(items, &["Long Term Debt"]),
            current_debt: line_item(items, &["Current Debt"]),
            total_equity: line_item(items, &["Total Equity", "Stockholders Equity"]),
            cash: line_item(
                items,
                &["Cash And Cash Equivalents", "Cash Cash Equivalents And Short Term Investments"],
            ),
        }
    }

    fn period_end(&self) -> NaiveDate {
        self.period_end
    }
}

impl StatementRecord for CashFlowStatement {
    const SERIES: &'static str = "cashflow";

    fn from_items(period_end: NaiveDate, items: &BTreeMap<String, Value>) -> Self {
        Self {
            period_end,
            operating_cash_flow: line_item(
                items,
                &["Operating Cash Flow", "Cash Flow From Continuing Operating Activities"],
            ),
            capital_expenditure: line_item(items, &["Capital Expenditure"]),
            free_cash_flow: line_item(items, &["Free Cash Flow"]),
        }
    }

    fn period_end(&self) -> NaiveDate {
        self.period_end
    }
}

/// Total debt as reported, else long-term + current debt with a missing
/// component counted as zero. `None` when none of the three is reported.
pub fn resolve_total_debt(balance: &BalanceSheet) -> Option<f64> {
    if let Some(total) = balance.total_debt {
        return Some(total);
    }
    match (balance.long_term_debt, balance.current_debt) {
        (None, None) => None,
        (lt, cur) => Some(lt.unwrap_or(0.0) + cur.unwrap_or(0.0)),
    }
}

/// Income line items used for growth analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncomeField {
    TotalRevenue,
    NetIncome,
}

impl IncomeField {
    pub fn value(&self, stmt: &IncomeStatement) -> Option<f64> {
        match self {
            Self::TotalRevenue => stmt.total_revenue,
            Self::NetIncome => stmt.net_income,
        }
    }
}

// ── Parsed bundle ─────────────────────────────────────────────────────────────

/// Quarterly and annual records of one statement kind, both newest first.
#[derive(Debug, Clone, PartialEq)]
pub struct Statements<T> {
    pub quarterly: Vec<T>,
    pub annual: Vec<T>,
}

impl<T> Default for Statements<T> {
    fn default() -> Self {
        Self {
            quarterly: Vec::new(),
            annual: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FinancialStatements {
    pub info: CompanyInfo,
    pub income: Statements<IncomeStatement>,
    pub balance: Statements<BalanceSheet>,
    pub cash_flow: Statements<CashFlowStatement>,
}

impl FinancialStatements {
    pub fn from_bundle(bundle: &StatementBundle) -> Result<Self, StatementError> {
        Ok(Self {
            info: CompanyInfo::from_map(&bundle.info),
            income: Statements {
                quarterly: parse_series(bundle.quarterly_financials.as_ref())?,
                annual: parse_series(bundle.annual_financials.as_ref())?,
            },
            balance: Statements {
                quarterly: parse_series(bundle.quarterly_balance.as_ref())?,
                annual: parse_series(bundle.annual_balance.as_ref())?,
            },
            cash_flow: Statements {
                quarterly: parse_series(bundle.quarterly_cashflow.as_ref())?,
                annual: parse_series(bundle.annual_cashflow.as_ref())?,
            },
        })
    }
}

/// Parse one raw series into records sorted newest first.
pub fn parse_series<T: StatementRecord>(raw: Option<&RawSeries>) -> Result<Vec<T>, StatementError> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };

    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(raw.len());

    for (period, items) in raw {
        let date = parse_period(period).ok_or_else(|| StatementError::InvalidPeriod {
            series: T::SERIES,
            value: period.clone(),
        })?;
        if !seen.insert(date) {
            return Err(StatementError::DuplicatePeriod {
                series: T::SERIES,
                date,
            });
        }
        records.push(T::from_items(date, items));
    }

    records.sort_by_key(|r| std::cmp::Reverse(r.period_end()));
    Ok(records)
}

/// "2024-12-31", optionally followed by a time part ("2024-12-31 00:00:00").
fn parse_period(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let date_part = s.split(|c: char| c == ' ' || c == 'T').next()?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

fn line_item(items: &BTreeMap<String, Value>, names: &[&str]) -> Option<f64> {
    names.iter().find_map(|n| items.get(*n).and_then(as_number))
}

fn as_number(v: &Value) -> Option<f64> {
    v.as_f64().filter(|x| x.is_finite())
}
