//! Ranked results as a terminal table or a CSV file.

use crate::models::{FilterKind, ScreenOutcome, ScreeningResult};
use crate::utils::{fmt_opt, fmt_pct};
use anyhow::{Context, Result};
use chrono::Local;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

const NAME_WIDTH: usize = 26;

/// Borrowed view of a run that renders as the terminal table.
struct Table<'a> {
    outcome: &'a ScreenOutcome,
    results: &'a [ScreeningResult],
}

impl fmt::Display for Table<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "─".repeat(104);

        writeln!(f, "{}", rule)?;
        writeln!(
            f,
            "  {} passing of {} screened",
            self.outcome.results.len(),
            self.outcome.total_considered
        )?;
        writeln!(f, "{}", rule)?;
        writeln!(
            f,
            "{:>4}  {:<w$}  {:<12} {:<11} {:>7} {:>7} {:>6} {:>7} {:>6} {:>6}",
            "#", "Company", "Ticker", "Exchange", "PE", "ROIC", "D/E", "CF%", "Score", "Pass",
            w = NAME_WIDTH
        )?;

        for (i, r) in self.results.iter().enumerate() {
            let m = &r.metrics;
            writeln!(
                f,
                "{:>4}  {:<w$}  {:<12} {:<11} {:>7} {:>7} {:>6} {:>7} {:>6.1} {:>6}",
                i + 1,
                truncate(&m.name, NAME_WIDTH),
                m.ticker,
                m.exchange,
                fmt_opt(m.pe_ratio, 1),
                fmt_pct(m.roic),
                fmt_opt(m.debt_to_equity, 2),
                fmt_pct(m.cf_yield),
                r.score,
                format!("{}/{}", r.passed_count(), r.total_filters()),
                w = NAME_WIDTH
            )?;
        }
        writeln!(f, "{}", rule)
    }
}

pub fn render_table(outcome: &ScreenOutcome, results: &[ScreeningResult]) -> String {
    Table { outcome, results }.to_string()
}

pub fn print_table(outcome: &ScreenOutcome, results: &[ScreeningResult]) {
    if outcome.results.is_empty() {
        println!(
            "No companies passed the screen ({} screened).",
            outcome.total_considered
        );
        return;
    }
    print!("{}", render_table(outcome, results));
}

/// `screening_<timestamp>.csv` under the output directory.
pub fn default_export_path(dir: &Path) -> PathBuf {
    dir.join(format!("screening_{}.csv", Local::now().format("%Y%m%d_%H%M%S")))
}

/// One row per result, metrics first, then every filter outcome with its reason.
pub fn export_csv(results: &[ScreeningResult], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("Could not create dir {:?}", parent))?;
    }
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("Could not create {:?}", path))?;

    let mut header: Vec<String> = [
        "rank", "ticker", "name", "exchange", "sector", "industry", "pe_ratio", "roic",
        "debt_to_equity", "free_cash_flow", "cf_yield", "ttm_revenue", "ttm_earnings",
        "revenue_growth_years", "earnings_growth_years", "score", "filters_passed",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    header.extend(FilterKind::ALL.iter().map(|k| k.name().to_string()));
    writer.write_record(&header)?;

    for (i, r) in results.iter().enumerate() {
        let m = &r.metrics;
        let num = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_default();
        let years = |v: Option<u32>| v.map(|x| x.to_string()).unwrap_or_default();

        let mut row = vec![
            (i + 1).to_string(),
            m.ticker.clone(),
            m.name.clone(),
            m.exchange.clone(),
            m.sector.clone().unwrap_or_default(),
            m.industry.clone().unwrap_or_default(),
            num(m.pe_ratio),
            num(m.roic),
            num(m.debt_to_equity),
            num(m.free_cash_flow),
            num(m.cf_yield),
            num(m.ttm_revenue),
            num(m.ttm_earnings),
            years(m.revenue_growth_years),
            years(m.earnings_growth_years),
            format!("{:.2}", r.score),
            format!("{}/{}", r.passed_count(), r.total_filters()),
        ];
        row.extend(FilterKind::ALL.iter().map(|k| match r.filter(*k) {
            Some(f) => format!("{}: {}", if f.passed { "PASS" } else { "FAIL" }, f.reason),
            None => String::new(),
        }));
        writer.write_record(&row)?;
    }

    writer.flush()?;
    info!("Exported {} results to {:?}", results.len(), path);
    Ok(())
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut t: String = s.chars().take(width - 1).collect();
        t.push('…');
        t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FilterResult, FinancialMetrics};

    fn result(ticker: &str, name: &str, score: f64) -> ScreeningResult {
        let filter_results = FilterKind::ALL
            .iter()
            .map(|k| {
                let r = if *k == FilterKind::DebtToEquity {
                    FilterResult::unavailable("D/E ratio not available")
                } else {
                    FilterResult {
                        passed: true,
                        reason: "ok".into(),
                        value: None,
                        threshold: None,
                    }
                };
                (*k, r)
            })
            .collect();
        ScreeningResult {
            metrics: FinancialMetrics {
                ticker: ticker.into(),
                name: name.into(),
                exchange: "copenhagen".into(),
                pe_ratio: Some(14.25),
                roic: Some(0.183),
                revenue_growth_years: Some(4),
                ..Default::default()
            },
            filter_results,
            passed_all: false,
            score,
        }
    }

    fn outcome() -> ScreenOutcome {
        ScreenOutcome {
            results: vec![
                result("NOVO-B.CO", "Novo Nordisk", 71.5),
                result("DSV.CO", "DSV A/S, a very long transport company name", 40.0),
            ],
            total_considered: 41,
        }
    }

    #[test]
    fn test_render_table() {
        let o = outcome();
        let table = render_table(&o, &o.results);

        assert!(table.contains("2 passing of 41 screened"));
        let novo = table.lines().find(|l| l.contains("NOVO-B.CO")).unwrap();
        assert!(novo.trim_start().starts_with("1  Novo Nordisk"));
        assert!(novo.contains("14.2") || novo.contains("14.3"));
        assert!(novo.contains("18.3%"));
        assert!(novo.contains("N/A"));
        assert!(novo.contains("71.5"));
        assert!(novo.contains("7/8"));
        assert!(table.contains("DSV A/S, a very long tran…"));
    }

    #[test]
    fn test_export_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/screen.csv");
        export_csv(&outcome().results, &path).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.len(), 17 + 8);
        assert_eq!(&headers[24], "positive_earnings");

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], "1");
        assert_eq!(&rows[0][1], "NOVO-B.CO");
        assert_eq!(&rows[0][13], "4");
        assert_eq!(&rows[0][14], "");
        assert_eq!(&rows[0][16], "7/8");
        assert_eq!(&rows[0][21], "FAIL: D/E ratio not available");
        assert_eq!(&rows[0][17], "PASS: ok");
    }

    #[test]
    fn test_default_export_path() {
        let p = default_export_path(Path::new("data/output"));
        let name = p.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("screening_"));
        assert!(name.ends_with(".csv"));
    }
}
