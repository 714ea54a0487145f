//! Applies the filters to each company, scores it, and ranks the survivors.
//!
//! ## Composite score (max 100)
//!
//! | term       | points                                  | cap  |
//! |------------|-----------------------------------------|------|
//! | ROIC       | roic × 100                              | 30   |
//! | PE discount| (peer − pe) / peer × 40                 | 0–20 |
//! | CF yield   | cf_yield × 100                          | 20   |
//! | low debt   | 15 − d/e × 30                           | 0–15 |
//! | growth     | (revenue years + earnings years) × 1.5  | 15   |
//!
//! Each term is clamped on its own before summing; unknown inputs score 0.

pub mod filters;

use crate::calculations::{GrowthSummary, PeerAverages};
use crate::config::ScreeningThresholds;
use crate::models::{FilterKind, FilterResult, FinancialMetrics, ScreeningResult};
use std::cmp::Ordering;

use self::filters::StockFilters;

pub struct Screener<'a> {
    filters: StockFilters<'a>,
}

impl<'a> Screener<'a> {
    pub fn new(peers: &'a PeerAverages, thresholds: &'a ScreeningThresholds) -> Self {
        Self {
            filters: StockFilters::new(peers, thresholds),
        }
    }

    /// Evaluate every filter in order, score, and back-fill the growth fields.
    pub fn screen_company(&self, metrics: FinancialMetrics, growth: &GrowthSummary) -> ScreeningResult {
        let f = &self.filters;
        let filter_results: Vec<(FilterKind, FilterResult)> = FilterKind::ALL
            .iter()
            .map(|kind| {
                let result = match kind {
                    FilterKind::PeBelowPeer => f.pe_below_peer(&metrics),
                    FilterKind::RoicConsistent => f.roic_consistent(&metrics),
                    FilterKind::RevenueGrowth => f.revenue_growth(Some(growth.revenue_growth_years)),
                    FilterKind::EarningsGrowth => f.earnings_growth(Some(growth.earnings_growth_years)),
                    FilterKind::DebtToEquity => f.debt_to_equity(&metrics),
                    FilterKind::PositiveFcf => f.positive_fcf(&metrics),
                    FilterKind::CfYield => f.cf_yield(&metrics),
                    FilterKind::PositiveEarnings => f.positive_earnings(&metrics),
                };
                (*kind, result)
            })
            .collect();

        let passed_all = filter_results.iter().all(|(_, r)| r.passed);
        let score = calculate_score(&metrics, growth, &filter_results);
        let metrics = metrics.with_growth(growth.revenue_growth_years, growth.earnings_growth_years);

        ScreeningResult {
            metrics,
            filter_results,
            passed_all,
            score,
        }
    }
}

pub fn calculate_score(
    metrics: &FinancialMetrics,
    growth: &GrowthSummary,
    filter_results: &[(FilterKind, FilterResult)],
) -> f64 {
    let pe = filter_results
        .iter()
        .find(|(k, _)| *k == FilterKind::PeBelowPeer)
        .map(|(_, r)| r);

    roic_points(metrics.roic)
        + pe.map_or(0.0, |r| pe_discount_points(r.value, r.threshold))
        + cf_yield_points(metrics.cf_yield)
        + low_debt_points(metrics.debt_to_equity)
        + growth_points(growth.revenue_growth_years, growth.earnings_growth_years)
}

fn roic_points(roic: Option<f64>) -> f64 {
    roic.map_or(0.0, |r| (r * 100.0).min(30.0))
}

fn pe_discount_points(pe: Option<f64>, peer: Option<f64>) -> f64 {
    match (pe, peer) {
        (Some(pe), Some(peer)) if peer != 0.0 => {
            let discount = (peer - pe) / peer;
            (discount * 40.0).clamp(0.0, 20.0)
        }
        _ => 0.0,
    }
}

fn cf_yield_points(cf_yield: Option<f64>) -> f64 {
    cf_yield.map_or(0.0, |y| (y * 100.0).min(20.0))
}

fn low_debt_points(debt_to_equity: Option<f64>) -> f64 {
    debt_to_equity.map_or(0.0, |de| (15.0 - de * 30.0).max(0.0))
}

fn growth_points(revenue_years: u32, earnings_years: u32) -> f64 {
    (f64::from(revenue_years + earnings_years) * 1.5).min(15.0)
}

/// Keep results passing at least `min_filters` criteria, best score first.
/// Equal scores are ordered by ticker.
pub fn rank(results: Vec<ScreeningResult>, min_filters: usize) -> Vec<ScreeningResult> {
    let mut passed: Vec<ScreeningResult> = results
        .into_iter()
        .filter(|r| r.passed_count() >= min_filters)
        .collect();
    passed.sort_by(by_score_then_ticker);
    passed
}

/// The `n` highest-scoring results.
pub fn top_n(results: &[ScreeningResult], n: usize) -> Vec<ScreeningResult> {
    let mut sorted = results.to_vec();
    sorted.sort_by(by_score_then_ticker);
    sorted.truncate(n);
    sorted
}

fn by_score_then_ticker(a: &ScreeningResult, b: &ScreeningResult) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.metrics.ticker.cmp(&b.metrics.ticker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculations::PeerPool;
    use crate::models::FILTER_COUNT;

    fn reference_metrics() -> FinancialMetrics {
        FinancialMetrics {
            ticker: "KOG.OL".into(),
            name: "Kongsberg Gruppen".into(),
            exchange: "oslo".into(),
            industry: Some("Aerospace & Defense".into()),
            sector: Some("Industrials".into()),
            pe_ratio: Some(10.0),
            roic: Some(0.12),
            roic_history: vec![0.12, 0.12, 0.12],
            debt_to_equity: Some(0.5),
            free_cash_flow: Some(60_000_000.0),
            cf_yield: Some(0.06),
            ttm_revenue: Some(1_000_000_000.0),
            ttm_earnings: Some(40_000_000.0),
            has_positive_earnings: true,
            data_complete: true,
            ..Default::default()
        }
    }

    fn growth(revenue: u32, earnings: u32) -> GrowthSummary {
        GrowthSummary {
            revenue_growth_years: revenue,
            earnings_growth_years: earnings,
            ..Default::default()
        }
    }

    fn peers() -> PeerAverages {
        let mut pool = PeerPool::new();
        pool.add_company(Some("Aerospace & Defense"), Some("Industrials"), Some(20.0));
        pool.finalize()
    }

    fn scored(ticker: &str, score: f64, passed: usize) -> ScreeningResult {
        let filter_results = FilterKind::ALL
            .iter()
            .enumerate()
            .map(|(i, k)| {
                let r = if i < passed {
                    FilterResult {
                        passed: true,
                        reason: "ok".into(),
                        value: None,
                        threshold: None,
                    }
                } else {
                    FilterResult::unavailable("n/a")
                };
                (*k, r)
            })
            .collect();
        ScreeningResult {
            metrics: FinancialMetrics {
                ticker: ticker.into(),
                ..Default::default()
            },
            filter_results,
            passed_all: passed == FILTER_COUNT,
            score,
        }
    }

    #[test]
    fn test_reference_company_passes_all_and_scores() {
        let (p, t) = (peers(), ScreeningThresholds::default());
        let result = Screener::new(&p, &t).screen_company(reference_metrics(), &growth(3, 3));

        assert!(result.passed_all);
        assert_eq!(result.passed_count(), 8);
        assert_eq!(result.total_filters(), 8);

        // ROIC 12 + PE discount 20 + CF yield 6 + debt 0 + growth 9
        assert!((result.score - 47.0).abs() < 1e-9, "score {}", result.score);
    }

    #[test]
    fn test_filter_order_is_fixed() {
        let (p, t) = (peers(), ScreeningThresholds::default());
        let result = Screener::new(&p, &t).screen_company(reference_metrics(), &growth(3, 3));
        let order: Vec<FilterKind> = result.filter_results.iter().map(|(k, _)| *k).collect();
        assert_eq!(order, FilterKind::ALL);
    }

    #[test]
    fn test_growth_fields_back_filled() {
        let (p, t) = (peers(), ScreeningThresholds::default());
        let result = Screener::new(&p, &t).screen_company(reference_metrics(), &growth(4, 1));
        assert_eq!(result.metrics.revenue_growth_years, Some(4));
        assert_eq!(result.metrics.earnings_growth_years, Some(1));
        assert!(!result.passed_all);
        assert!(!result.filter(FilterKind::EarningsGrowth).unwrap().passed);
    }

    #[test]
    fn test_missing_balance_sheet_fails_debt_filter() {
        let (p, t) = (peers(), ScreeningThresholds::default());
        let mut m = reference_metrics();
        m.debt_to_equity = None;
        let result = Screener::new(&p, &t).screen_company(m, &growth(3, 3));
        let de = result.filter(FilterKind::DebtToEquity).unwrap();
        assert!(!de.passed);
        assert_eq!(de.reason, "D/E ratio not available");
        // the low-debt term is 0 at d/e 0.5 and when unknown
        assert!((result.score - 47.0).abs() < 1e-9);
    }

    #[test]
    fn test_score_terms_are_clamped() {
        assert_eq!(roic_points(Some(0.45)), 30.0);
        assert_eq!(roic_points(None), 0.0);
        assert_eq!(pe_discount_points(Some(5.0), Some(20.0)), 20.0);
        assert_eq!(pe_discount_points(Some(30.0), Some(20.0)), 0.0);
        assert_eq!(pe_discount_points(Some(10.0), Some(0.0)), 0.0);
        assert_eq!(pe_discount_points(None, Some(20.0)), 0.0);
        assert_eq!(cf_yield_points(Some(0.35)), 20.0);
        assert_eq!(low_debt_points(Some(0.0)), 15.0);
        assert_eq!(low_debt_points(Some(2.0)), 0.0);
        assert_eq!(growth_points(6, 6), 15.0);
    }

    #[test]
    fn test_max_score_is_100() {
        let m = FinancialMetrics {
            roic: Some(0.5),
            cf_yield: Some(0.5),
            debt_to_equity: Some(0.0),
            ..Default::default()
        };
        let pe = FilterResult {
            passed: true,
            reason: String::new(),
            value: Some(1.0),
            threshold: Some(20.0),
        };
        let score = calculate_score(&m, &growth(10, 10), &[(FilterKind::PeBelowPeer, pe)]);
        assert!((score - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_rank_filters_and_orders() {
        let results = vec![
            scored("B.ST", 40.0, 8),
            scored("A.OL", 55.0, 8),
            scored("C.CO", 90.0, 6),
            scored("D.OL", 40.0, 8),
        ];

        let all = rank(results.clone(), FILTER_COUNT);
        let tickers: Vec<&str> = all.iter().map(|r| r.metrics.ticker.as_str()).collect();
        assert_eq!(tickers, ["A.OL", "B.ST", "D.OL"]);

        let partial = rank(results, 6);
        assert_eq!(partial[0].metrics.ticker, "C.CO");
        assert_eq!(partial.len(), 4);
    }

    #[test]
    fn test_ties_break_on_ticker() {
        let ranked = rank(vec![scored("Z.ST", 50.0, 8), scored("M.OL", 50.0, 8)], 8);
        assert_eq!(ranked[0].metrics.ticker, "M.OL");
        assert_eq!(ranked[1].metrics.ticker, "Z.ST");
    }

    #[test]
    fn test_top_n() {
        let results = vec![scored("A", 10.0, 8), scored("B", 30.0, 8), scored("C", 20.0, 8)];
        let top = top_n(&results, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].metrics.ticker, "B");
        assert_eq!(top[1].metrics.ticker, "C");
        assert_eq!(top_n(&results, 10).len(), 3);
    }
}
