//! The eight screening criteria. Each one fails closed: an unknown input is a
//! failed criterion with a "not available" reason, never a numeric comparison.

use crate::calculations::PeerAverages;
use crate::config::ScreeningThresholds;
use crate::models::{FilterResult, FinancialMetrics};
use crate::utils::fmt_millions;

/// Benchmark PE when neither the industry nor the sector has a peer median.
pub const MARKET_PE_FALLBACK: f64 = 20.0;

pub struct StockFilters<'a> {
    peers: &'a PeerAverages,
    thresholds: &'a ScreeningThresholds,
}

impl<'a> StockFilters<'a> {
    pub fn new(peers: &'a PeerAverages, thresholds: &'a ScreeningThresholds) -> Self {
        Self { peers, thresholds }
    }

    pub fn pe_below_peer(&self, m: &FinancialMetrics) -> FilterResult {
        let Some(pe) = m.pe_ratio else {
            return FilterResult::unavailable("PE ratio not available");
        };

        let peer = self
            .peers
            .get_peer_average(m.industry.as_deref(), m.sector.as_deref())
            .unwrap_or(MARKET_PE_FALLBACK);
        let passed = pe < peer;

        FilterResult {
            passed,
            reason: format!("PE {:.1} {} industry avg {:.1}", pe, if passed { "<" } else { ">=" }, peer),
            value: Some(pe),
            threshold: Some(peer),
        }
    }

    pub fn roic_consistent(&self, m: &FinancialMetrics) -> FilterResult {
        if m.roic_history.is_empty() {
            return FilterResult::unavailable("ROIC history not available");
        }

        let min_roic = self.thresholds.min_roic;
        let required = self.thresholds.roic_years;
        let years_above = m.roic_history.iter().filter(|r| **r >= min_roic).count();

        FilterResult {
            passed: years_above >= required,
            reason: format!("ROIC>{:.0}% for {}/{} years", min_roic * 100.0, years_above, required),
            value: m.roic,
            threshold: Some(min_roic),
        }
    }

    pub fn revenue_growth(&self, growth_years: Option<u32>) -> FilterResult {
        self.growth("Revenue", growth_years)
    }

    pub fn earnings_growth(&self, growth_years: Option<u32>) -> FilterResult {
        self.growth("Earnings", growth_years)
    }

    fn growth(&self, label: &str, growth_years: Option<u32>) -> FilterResult {
        let Some(years) = growth_years else {
            return FilterResult::unavailable(format!("{} growth data not available", label));
        };
        let required = self.thresholds.growth_years;

        FilterResult {
            passed: years >= required,
            reason: format!("{} growth: {}/{} consecutive years", label, years, required),
            value: Some(f64::from(years)),
            threshold: Some(f64::from(required)),
        }
    }

    pub fn debt_to_equity(&self, m: &FinancialMetrics) -> FilterResult {
        let Some(de) = m.debt_to_equity else {
            return FilterResult::unavailable("D/E ratio not available");
        };
        let max_de = self.thresholds.max_debt_to_equity;
        let passed = de < max_de;

        FilterResult {
            passed,
            reason: format!("D/E {:.2} {} {}", de, if passed { "<" } else { ">=" }, max_de),
            value: Some(de),
            threshold: Some(max_de),
        }
    }

    pub fn positive_fcf(&self, m: &FinancialMetrics) -> FilterResult {
        let Some(fcf) = m.free_cash_flow else {
            return FilterResult::unavailable("FCF not available");
        };
        let passed = fcf > 0.0;

        FilterResult {
            passed,
            reason: format!(
                "FCF: {} {}",
                fmt_millions(fcf),
                if passed { "(positive)" } else { "(negative)" }
            ),
            value: Some(fcf),
            threshold: Some(0.0),
        }
    }

    pub fn cf_yield(&self, m: &FinancialMetrics) -> FilterResult {
        let Some(cf_yield) = m.cf_yield else {
            return FilterResult::unavailable("CF yield not available");
        };
        let min_yield = self.thresholds.min_cf_yield;
        let passed = cf_yield >= min_yield;

        FilterResult {
            passed,
            reason: format!(
                "CF yield {:.1}% {} {:.0}%",
                cf_yield * 100.0,
                if passed { ">=" } else { "<" },
                min_yield * 100.0
            ),
            value: Some(cf_yield),
            threshold: Some(min_yield),
        }
    }

    pub fn positive_earnings(&self, m: &FinancialMetrics) -> FilterResult {
        let Some(earnings) = m.ttm_earnings else {
            return FilterResult::unavailable("TTM earnings not available");
        };
        let passed = m.has_positive_earnings;

        FilterResult {
            passed,
            reason: format!(
                "TTM Earnings: {} {}",
                fmt_millions(earnings),
                if passed { "(profitable)" } else { "(loss-maker)" }
            ),
            value: Some(earnings),
            threshold: Some(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculations::PeerPool;

    fn metrics() -> FinancialMetrics {
        FinancialMetrics {
            ticker: "SAAB-B.ST".into(),
            industry: Some("Aerospace & Defense".into()),
            sector: Some("Industrials".into()),
            pe_ratio: Some(10.0),
            roic: Some(0.12),
            roic_history: vec![0.12, 0.12, 0.12],
            debt_to_equity: Some(0.5),
            free_cash_flow: Some(60_000_000.0),
            cf_yield: Some(0.06),
            ttm_earnings: Some(40_000_000.0),
            has_positive_earnings: true,
            ..Default::default()
        }
    }

    fn peers() -> PeerAverages {
        let mut pool = PeerPool::new();
        pool.add_company(Some("Aerospace & Defense"), Some("Industrials"), Some(20.0));
        pool.add_company(None, Some("Energy"), Some(7.0));
        pool.finalize()
    }

    #[test]
    fn test_pe_below_peer() {
        let (p, t) = (peers(), ScreeningThresholds::default());
        let f = StockFilters::new(&p, &t);

        let r = f.pe_below_peer(&metrics());
        assert!(r.passed);
        assert_eq!(r.threshold, Some(20.0));
        assert_eq!(r.reason, "PE 10.0 < industry avg 20.0");

        let mut m = metrics();
        m.industry = None;
        m.sector = Some("Energy".into());
        let r = f.pe_below_peer(&m);
        assert!(!r.passed);
        assert_eq!(r.threshold, Some(7.0));
    }

    #[test]
    fn test_pe_market_fallback() {
        let (p, t) = (PeerAverages::default(), ScreeningThresholds::default());
        let r = StockFilters::new(&p, &t).pe_below_peer(&metrics());
        assert_eq!(r.threshold, Some(MARKET_PE_FALLBACK));
        assert!(r.passed);
    }

    #[test]
    fn test_unknown_inputs_fail_closed() {
        let (p, t) = (peers(), ScreeningThresholds::default());
        let f = StockFilters::new(&p, &t);
        let m = FinancialMetrics::default();

        for r in [
            f.pe_below_peer(&m),
            f.roic_consistent(&m),
            f.revenue_growth(None),
            f.earnings_growth(None),
            f.debt_to_equity(&m),
            f.positive_fcf(&m),
            f.cf_yield(&m),
            f.positive_earnings(&m),
        ] {
            assert!(!r.passed);
            assert!(r.reason.contains("not available"), "{}", r.reason);
            assert_eq!(r.value, None);
        }
    }

    #[test]
    fn test_roic_consistent() {
        let (p, t) = (peers(), ScreeningThresholds::default());
        let f = StockFilters::new(&p, &t);

        let r = f.roic_consistent(&metrics());
        assert!(r.passed);
        assert_eq!(r.reason, "ROIC>10% for 3/3 years");

        let mut m = metrics();
        m.roic_history = vec![0.15, 0.09, 0.11, 0.10];
        assert!(f.roic_consistent(&m).passed);
        m.roic_history = vec![0.15, 0.09];
        assert!(!f.roic_consistent(&m).passed);
    }

    #[test]
    fn test_growth_filters() {
        let (p, t) = (peers(), ScreeningThresholds::default());
        let f = StockFilters::new(&p, &t);

        let r = f.revenue_growth(Some(3));
        assert!(r.passed);
        assert_eq!(r.reason, "Revenue growth: 3/3 consecutive years");
        assert!(!f.earnings_growth(Some(2)).passed);
        assert!(!f.earnings_growth(Some(0)).passed);
    }

    #[test]
    fn test_debt_to_equity_strictly_below() {
        let (p, t) = (peers(), ScreeningThresholds::default());
        let f = StockFilters::new(&p, &t);

        assert!(f.debt_to_equity(&metrics()).passed);
        let mut m = metrics();
        m.debt_to_equity = Some(1.0);
        let r = f.debt_to_equity(&m);
        assert!(!r.passed);
        assert_eq!(r.reason, "D/E 1.00 >= 1");
    }

    #[test]
    fn test_cash_flow_filters() {
        let (p, t) = (peers(), ScreeningThresholds::default());
        let f = StockFilters::new(&p, &t);

        let r = f.positive_fcf(&metrics());
        assert!(r.passed);
        assert_eq!(r.reason, "FCF: 60.0M (positive)");

        let r = f.cf_yield(&metrics());
        assert!(r.passed);
        assert_eq!(r.reason, "CF yield 6.0% >= 5%");

        let mut m = metrics();
        m.free_cash_flow = Some(0.0);
        m.cf_yield = Some(0.049);
        assert!(!f.positive_fcf(&m).passed);
        assert!(!f.cf_yield(&m).passed);

        // the minimum yield itself passes
        m.cf_yield = Some(t.min_cf_yield);
        assert!(f.cf_yield(&m).passed);
    }

    #[test]
    fn test_positive_earnings() {
        let (p, t) = (peers(), ScreeningThresholds::default());
        let f = StockFilters::new(&p, &t);

        assert!(f.positive_earnings(&metrics()).passed);
        let mut m = metrics();
        m.ttm_earnings = Some(-2_500_000.0);
        m.has_positive_earnings = false;
        let r = f.positive_earnings(&m);
        assert!(!r.passed);
        assert_eq!(r.reason, "TTM Earnings: -2.5M (loss-maker)");
    }
}
