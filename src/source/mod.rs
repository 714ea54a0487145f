pub mod http_client;
pub mod listings;

use crate::config::{ExchangeConfig, FetchConfig, ListingFormat};
use crate::models::Company;
use crate::statements::{FinancialStatements, StatementBundle};
use crate::storage::{Cache, CacheKey};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use self::http_client::HttpClient;
use self::listings::{fallback_companies, nasdaq_instruments_url, parse_euronext_csv, parse_nasdaq_json};

// ── Source trait ──────────────────────────────────────────────────────────────

/// Swappable origin of company lists and statement bundles.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn fetch_companies(&self, exchange: &str, config: &ExchangeConfig) -> Result<Vec<Company>>;

    /// `Ok(None)` when the source has nothing for this ticker.
    async fn fetch_financials(&self, ticker: &str) -> Result<Option<StatementBundle>>;
}

// ── Remote source ─────────────────────────────────────────────────────────────

pub struct RemoteSource {
    client: HttpClient,
    financials_url: String,
}

impl RemoteSource {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let financials_url = config
            .financials_url
            .clone()
            .context("fetch.financials_url is not set; configure it or use fetch.source = \"local\"")?;

        Ok(Self {
            client: HttpClient::new(config)?,
            financials_url,
        })
    }

    fn financials_url(&self, ticker: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(ticker.as_bytes()).collect();
        self.financials_url.replace("{ticker}", &encoded)
    }

    async fn fetch_listing(&self, exchange: &str, config: &ExchangeConfig) -> Result<Vec<Company>> {
        let base = config.url.as_deref().context("no listing url")?;

        match config.listing {
            ListingFormat::EuronextCsv => {
                let text = self.client.get_text(base).await?;
                parse_euronext_csv(&text, exchange, &config.suffix)
            }
            ListingFormat::NasdaqNordic => {
                let market = config.market.as_deref().context("no market code")?;
                let url = nasdaq_instruments_url(base, market)?;
                let text = self.client.get_text(url.as_str()).await?;
                parse_nasdaq_json(&text, exchange, &config.suffix)
            }
        }
    }
}

#[async_trait]
impl DataSource for RemoteSource {
    async fn fetch_companies(&self, exchange: &str, config: &ExchangeConfig) -> Result<Vec<Company>> {
        info!("Fetching {} listing", config.name);

        match self.fetch_listing(exchange, config).await {
            Ok(companies) if !companies.is_empty() => {
                info!("{}: {} companies", exchange, companies.len());
                Ok(companies)
            }
            Ok(_) => {
                warn!("{}: listing was empty, using built-in list", exchange);
                Ok(fallback_companies(exchange, &config.suffix))
            }
            Err(e) => {
                warn!("{}: listing fetch failed ({:#}), using built-in list", exchange, e);
                Ok(fallback_companies(exchange, &config.suffix))
            }
        }
    }

    async fn fetch_financials(&self, ticker: &str) -> Result<Option<StatementBundle>> {
        let url = self.financials_url(ticker);
        let text = match self.client.get_text(&url).await {
            Ok(text) => text,
            Err(e) if e.is_not_found() => {
                debug!("{}: no statements at source", ticker);
                return Ok(None);
            }
            Err(e) => return Err(e).with_context(|| format!("fetch statements for {}", ticker)),
        };

        let mut bundle = StatementBundle::from_json(&text)
            .with_context(|| format!("decode statements for {}", ticker))?;
        bundle.ticker.get_or_insert_with(|| ticker.to_string());
        Ok(Some(bundle))
    }
}

// ── Cache-aside wrapper ───────────────────────────────────────────────────────

/// Serves company lists and statement bundles from the cache while fresh,
/// falling through to `inner` on a miss. Cache failures only cost a refetch.
pub struct CachedSource<S> {
    inner: S,
    cache: Arc<Cache>,
}

impl<S: DataSource> CachedSource<S> {
    pub fn new(inner: S, cache: Arc<Cache>) -> Self {
        Self { inner, cache }
    }

    fn lookup<T: serde::de::DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        self.cache.get(key).unwrap_or_else(|e| {
            warn!("cache read {} failed: {:#}", key, e);
            None
        })
    }

    fn store<T: serde::Serialize>(&self, key: &CacheKey, value: &T) {
        if let Err(e) = self.cache.set(key, value) {
            warn!("cache write {} failed: {:#}", key, e);
        }
    }
}

#[async_trait]
impl<S: DataSource> DataSource for CachedSource<S> {
    async fn fetch_companies(&self, exchange: &str, config: &ExchangeConfig) -> Result<Vec<Company>> {
        let key = CacheKey::Companies(exchange.to_string());
        if let Some(companies) = self.lookup::<Vec<Company>>(&key) {
            debug!("{}: {} companies from cache", exchange, companies.len());
            return Ok(companies);
        }

        let companies = self.inner.fetch_companies(exchange, config).await?;
        if !companies.is_empty() {
            self.store(&key, &companies);
        }
        Ok(companies)
    }

    async fn fetch_financials(&self, ticker: &str) -> Result<Option<StatementBundle>> {
        let key = CacheKey::Financials(ticker.to_string());
        if let Some(bundle) = self.lookup::<StatementBundle>(&key) {
            return Ok(Some(bundle));
        }

        let bundle = self.inner.fetch_financials(ticker).await?;
        if let Some(b) = bundle.as_ref().filter(|b| b.has_meaningful_data()) {
            match FinancialStatements::from_bundle(b) {
                Ok(_) => self.store(&key, b),
                Err(e) => debug!("{}: not caching unparseable statements: {}", ticker, e),
            }
        }
        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSource {
        company_calls: AtomicUsize,
        financial_calls: AtomicUsize,
    }

    #[async_trait]
    impl DataSource for CountingSource {
        async fn fetch_companies(&self, exchange: &str, config: &ExchangeConfig) -> Result<Vec<Company>> {
            self.company_calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![Company::new("EQNR", "Equinor", exchange, &config.suffix)])
        }

        async fn fetch_financials(&self, ticker: &str) -> Result<Option<StatementBundle>> {
            self.financial_calls.fetch_add(1, Ordering::SeqCst);
            let bundle = if ticker == "EQNR.OL" {
                serde_json::from_value(json!({
                    "info": {"shortName": "Equinor"},
                    "annual_financials": {"2024-12-31": {"Total Revenue": 100.0}}
                }))?
            } else if ticker == "BAD.OL" {
                // income present, but the period key is not a date
                serde_json::from_value(json!({
                    "info": {"shortName": "Bad"},
                    "annual_financials": {"FY2024": {"Total Revenue": 100.0}}
                }))?
            } else {
                // info only, not worth caching
                serde_json::from_value(json!({"info": {"shortName": "Thin"}}))?
            };
            Ok(Some(bundle))
        }
    }

    fn cached() -> CachedSource<CountingSource> {
        let cache = Cache::open_in_memory(24).unwrap();
        cache.run_migrations().unwrap();
        CachedSource::new(CountingSource::default(), Arc::new(cache))
    }

    fn oslo() -> ExchangeConfig {
        crate::config::AppConfig::default().exchanges["oslo"].clone()
    }

    #[tokio::test]
    async fn test_company_list_served_from_cache() {
        let source = cached();
        let first = source.fetch_companies("oslo", &oslo()).await.unwrap();
        let second = source.fetch_companies("oslo", &oslo()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first[0].ticker, "EQNR.OL");
        assert_eq!(source.inner.company_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_only_meaningful_bundles_are_cached() {
        let source = cached();
        for _ in 0..2 {
            assert!(source.fetch_financials("EQNR.OL").await.unwrap().is_some());
            assert!(source.fetch_financials("THIN.OL").await.unwrap().is_some());
        }
        // EQNR once, THIN on every call
        assert_eq!(source.inner.financial_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_unparseable_bundle_is_not_cached() {
        let source = cached();
        for _ in 0..2 {
            assert!(source.fetch_financials("BAD.OL").await.unwrap().is_some());
        }
        assert_eq!(source.inner.financial_calls.load(Ordering::SeqCst), 2);
        assert_eq!(source.cache.entry_count().unwrap(), 0);
    }

    #[test]
    fn test_remote_requires_financials_url() {
        assert!(RemoteSource::new(&FetchConfig::default()).is_err());

        let config = FetchConfig {
            financials_url: Some("https://data.example/v1/{ticker}.json".into()),
            ..FetchConfig::default()
        };
        let remote = RemoteSource::new(&config).unwrap();
        assert_eq!(remote.financials_url("HM-B.ST"), "https://data.example/v1/HM-B.ST.json");
        assert_eq!(remote.financials_url("M&A.OL"), "https://data.example/v1/M%26A.OL.json");
    }
}
