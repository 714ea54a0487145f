//! Screening run orchestrator: source → metrics → peer medians → filters → rank.
//!
//!   1. Fetch the company list of every selected exchange.
//!   2. For each company (bounded concurrency), fetch its statement bundle,
//!      parse it and derive metrics plus the growth summary. A company whose
//!      fetch or parse fails is logged and skipped.
//!   3. Pool every PE into the peer medians, finalize once, and persist the
//!      snapshot as `industry:averages`.
//!   4. Screen, score and rank against the finalized medians.

use crate::calculations::ttm::TtmCalculator;
use crate::calculations::{GrowthAnalyzer, GrowthSummary, MetricsCalculator, PeerAverages, PeerPool};
use crate::config::{AppConfig, ExchangeConfig};
use crate::models::{Company, FinancialMetrics, ScreenOutcome};
use crate::screening::{rank, Screener};
use crate::source::DataSource;
use crate::statements::FinancialStatements;
use crate::storage::{Cache, CacheKey};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// Per-company output of the derivation stage.
#[derive(Debug, Clone)]
pub struct Analyzed {
    pub metrics: FinancialMetrics,
    pub growth: GrowthSummary,
}

#[derive(Debug, Default)]
pub struct PipelineStats {
    pub companies_listed: usize,
    pub analyzed: usize,
    pub without_data: usize,
    pub errors: usize,
}

pub struct Pipeline {
    config: AppConfig,
    source: Arc<dyn DataSource>,
    cache: Option<Arc<Cache>>,
}

impl Pipeline {
    pub fn new(config: AppConfig, source: Arc<dyn DataSource>) -> Self {
        Self {
            config,
            source,
            cache: None,
        }
    }

    /// Persist peer medians and the run log in `cache`.
    pub fn with_cache(mut self, cache: Arc<Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub async fn run(&self, exchanges: &[(String, ExchangeConfig)], min_filters: usize) -> Result<ScreenOutcome> {
        let keys: Vec<&str> = exchanges.iter().map(|(k, _)| k.as_str()).collect();
        let run_id = self
            .cache
            .as_ref()
            .and_then(|c| c.begin_run(&keys.join(",")).ok());

        let mut stats = PipelineStats::default();

        // ── 1. Company universe ───────────────────────────────────────────────
        info!("=== Step 1: Fetching company lists ({}) ===", keys.join(", "));
        let mut companies = Vec::new();
        for (key, exchange) in exchanges {
            match self.source.fetch_companies(key, exchange).await {
                Ok(list) => companies.extend(list),
                Err(e) => {
                    warn!("{}: {:#}", key, e);
                    stats.errors += 1;
                }
            }
        }
        stats.companies_listed = companies.len();
        info!("Found {} companies", companies.len());

        // ── 2. Statements → metrics ───────────────────────────────────────────
        info!("=== Step 2: Fetching financial data ===");
        let analyzed = self.analyze_all(companies, &mut stats).await;
        info!("Retrieved data for {} companies", analyzed.len());

        // ── 3. Peer medians ───────────────────────────────────────────────────
        info!("=== Step 3: Calculating industry averages ===");
        let peers = build_peer_averages(&analyzed);
        info!(
            "{} industries, {} sectors",
            peers.industry.len(),
            peers.sector.len()
        );
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.set(&CacheKey::IndustryAverages, &peers) {
                warn!("Could not store industry averages: {:#}", e);
            }
        }

        // ── 4. Screen and rank ────────────────────────────────────────────────
        info!("=== Step 4: Applying screening criteria ===");
        let outcome = screen(&analyzed, &peers, &self.config, min_filters);

        if min_filters >= crate::models::FILTER_COUNT {
            info!("Found {} companies passing all criteria", outcome.results.len());
        } else {
            info!("Found {} companies passing {}+ filters", outcome.results.len(), min_filters);
        }

        if let (Some(cache), Some(id)) = (&self.cache, run_id) {
            cache
                .finish_run(id, outcome.total_considered, outcome.results.len(), stats.errors)
                .ok();
        }

        info!(
            "=== Done: {} listed | {} analyzed | {} without data | {} errors ===",
            stats.companies_listed, stats.analyzed, stats.without_data, stats.errors
        );
        Ok(outcome)
    }

    async fn analyze_all(&self, companies: Vec<Company>, stats: &mut PipelineStats) -> Vec<Analyzed> {
        let sem = Arc::new(Semaphore::new(self.config.fetch.concurrency.max(1)));
        let roic_years = self.config.screening.roic_history_years;
        let growth_years = self.config.screening.growth_years;
        let mut handles = Vec::with_capacity(companies.len());

        for company in companies {
            let source = Arc::clone(&self.source);
            let sem = Arc::clone(&sem);
            let ticker = company.ticker.clone();

            let handle = tokio::spawn(async move {
                let _permit = sem.acquire().await?;
                let bundle = source
                    .fetch_financials(&company.ticker)
                    .await
                    .with_context(|| format!("fetch_financials({})", company.ticker))?;

                let Some(bundle) = bundle.filter(|b| b.has_meaningful_data()) else {
                    debug!("{}: no financial data", company.ticker);
                    return Ok(None);
                };
                let statements = match FinancialStatements::from_bundle(&bundle) {
                    Ok(s) => s,
                    Err(e) => {
                        warn!("{}: skipping malformed statements: {}", company.ticker, e);
                        return Ok(None);
                    }
                };

                Ok::<_, anyhow::Error>(Some(analyze(&statements, &company, roic_years, growth_years)))
            });

            handles.push((ticker, handle));
        }

        let mut analyzed = Vec::new();
        for (ticker, handle) in handles {
            match handle.await {
                Ok(Ok(Some(a))) => analyzed.push(a),
                Ok(Ok(None)) => stats.without_data += 1,
                Ok(Err(e)) => {
                    warn!("{}: {:#}", ticker, e);
                    stats.errors += 1;
                }
                Err(e) => {
                    error!("Task panic for {}: {}", ticker, e);
                    stats.errors += 1;
                }
            }
        }
        stats.analyzed = analyzed.len();
        analyzed
    }
}

/// Derive metrics and the growth summary for one company.
pub fn analyze(statements: &FinancialStatements, company: &Company, roic_years: usize, growth_years: u32) -> Analyzed {
    let metrics = MetricsCalculator::new(statements, company)
        .with_roic_years(roic_years)
        .calculate_all();
    let growth = GrowthAnalyzer::new(&statements.income.annual).has_consistent_growth(growth_years);
    let ttm = TtmCalculator::new(&statements.income.quarterly, &statements.cash_flow.quarterly).all();
    debug!("{}: ttm {:?}", metrics.ticker, ttm);
    debug!(
        "{}: pe={:?} roic={:?} d/e={:?} growth={}/{}",
        metrics.ticker,
        metrics.pe_ratio,
        metrics.roic,
        metrics.debt_to_equity,
        growth.revenue_growth_years,
        growth.earnings_growth_years
    );
    Analyzed { metrics, growth }
}

/// Every company's PE is pooled before any median is read.
pub fn build_peer_averages(analyzed: &[Analyzed]) -> PeerAverages {
    let mut pool = PeerPool::new();
    for a in analyzed {
        pool.add_company(
            a.metrics.industry.as_deref(),
            a.metrics.sector.as_deref(),
            a.metrics.pe_ratio,
        );
    }
    debug!("{} PE observations pooled", pool.observations());
    pool.finalize()
}

pub fn screen(analyzed: &[Analyzed], peers: &PeerAverages, config: &AppConfig, min_filters: usize) -> ScreenOutcome {
    let screener = Screener::new(peers, &config.screening);
    let results = analyzed
        .iter()
        .map(|a| screener.screen_company(a.metrics.clone(), &a.growth))
        .collect();

    ScreenOutcome {
        results: rank(results, min_filters),
        total_considered: analyzed.len(),
    }
}
