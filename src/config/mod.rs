use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub screening: ScreeningThresholds,
    pub cache: CacheConfig,
    pub fetch: FetchConfig,
    pub output: OutputConfig,
    pub exchanges: BTreeMap<String, ExchangeConfig>,
}

/// Thresholds consumed read-only by the filters and the pass/fail gate
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScreeningThresholds {
    pub max_pe: f64,
    pub min_roic: f64,
    /// Years at or above `min_roic` needed to pass the ROIC filter.
    pub roic_years: usize,
    /// How many annual periods of ROIC history to derive.
    pub roic_history_years: usize,
    pub growth_years: u32,
    pub max_debt_to_equity: f64,
    pub min_cf_yield: f64,
    pub min_filters: usize,
}

/// Cache configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    pub db_path: PathBuf,
    pub ttl_hours: i64,
    pub run_migrations: bool,
}

/// Data source configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FetchConfig {
    pub source: SourceKind,
    /// Root of the local source: `companies/<exchange>.csv`, `financials/<ticker>.json`.
    pub data_dir: PathBuf,
    /// Statement bundle endpoint for the remote source, e.g. `https://host/financials/{ticker}.json`.
    pub financials_url: Option<String>,
    pub timeout_secs: u64,
    pub request_delay_ms: u64,
    pub max_retries: usize,
    pub user_agent: String,
    pub concurrency: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Remote,
    Local,
}

/// Report output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

/// One listing venue
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ExchangeConfig {
    pub name: String,
    /// Ticker suffix appended to the listing symbol, e.g. ".OL"
    pub suffix: String,
    pub listing: ListingFormat,
    pub url: Option<String>,
    /// Market identifier code for Nasdaq Nordic queries
    #[serde(default)]
    pub market: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingFormat {
    EuronextCsv,
    NasdaqNordic,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            screening: ScreeningThresholds::default(),
            cache: CacheConfig::default(),
            fetch: FetchConfig::default(),
            output: OutputConfig::default(),
            exchanges: default_exchanges(),
        }
    }
}

impl Default for ScreeningThresholds {
    fn default() -> Self {
        Self {
            max_pe: 15.0,
            min_roic: 0.10,
            roic_years: 3,
            roic_history_years: 6,
            growth_years: 3,
            max_debt_to_equity: 1.0,
            min_cf_yield: 0.05,
            min_filters: crate::models::FILTER_COUNT,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/cache/screener.duckdb"),
            ttl_hours: 24,
            run_migrations: true,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::Remote,
            data_dir: PathBuf::from("data/input"),
            financials_url: None,
            timeout_secs: 30,
            // 30 calls per minute
            request_delay_ms: 2000,
            max_retries: 3,
            user_agent: default_user_agent(),
            concurrency: 4,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data/output"),
        }
    }
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string()
}

fn default_exchanges() -> BTreeMap<String, ExchangeConfig> {
    let mut m = BTreeMap::new();
    m.insert(
        "oslo".to_string(),
        ExchangeConfig {
            name: "Oslo Bors".to_string(),
            suffix: ".OL".to_string(),
            listing: ListingFormat::EuronextCsv,
            url: Some("https://live.euronext.com/pd_es/data/stocks/download?mics=XOSL".to_string()),
            market: None,
        },
    );
    m.insert(
        "stockholm".to_string(),
        ExchangeConfig {
            name: "Nasdaq Stockholm".to_string(),
            suffix: ".ST".to_string(),
            listing: ListingFormat::NasdaqNordic,
            url: Some("https://api.nasdaq.com/api/nordic/instruments".to_string()),
            market: Some("XSTO".to_string()),
        },
    );
    m.insert(
        "copenhagen".to_string(),
        ExchangeConfig {
            name: "Nasdaq Copenhagen".to_string(),
            suffix: ".CO".to_string(),
            listing: ListingFormat::NasdaqNordic,
            url: Some("https://api.nasdaq.com/api/nordic/instruments".to_string()),
            market: Some("XCSE".to_string()),
        },
    );
    m
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("NORDIC").separator("__"))
            .build()?;

        let mut app_cfg: AppConfig = cfg.try_deserialize()?;
        if app_cfg.exchanges.is_empty() {
            app_cfg.exchanges = default_exchanges();
        }
        Ok(app_cfg)
    }

    /// Exchanges to screen; an empty request selects every configured exchange.
    pub fn select_exchanges(&self, requested: &[String]) -> Vec<(String, ExchangeConfig)> {
        if requested.is_empty() {
            return self
                .exchanges
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
        }
        requested
            .iter()
            .filter_map(|key| {
                let key = key.to_lowercase();
                self.exchanges.get(&key).map(|ex| (key, ex.clone()))
            })
            .collect()
    }
}
