//! Local-directory data source for offline runs.
//!
//! ```text
//! <data_dir>/companies/<exchange>.csv     symbol,name[,sector,industry]
//! <data_dir>/financials/<ticker>.json     statement bundle
//! ```

use crate::config::ExchangeConfig;
use crate::models::Company;
use crate::source::listings::fallback_companies;
use crate::source::DataSource;
use crate::statements::StatementBundle;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
struct CompanyRow {
    symbol: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    sector: Option<String>,
    #[serde(default)]
    industry: Option<String>,
}

pub struct LocalSource {
    data_dir: PathBuf,
}

impl LocalSource {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn companies_path(&self, exchange: &str) -> PathBuf {
        self.data_dir.join("companies").join(format!("{}.csv", exchange))
    }

    fn financials_path(&self, ticker: &str) -> PathBuf {
        self.data_dir.join("financials").join(format!("{}.json", ticker))
    }
}

/// Parse a company CSV; malformed rows are skipped with a warning.
pub fn load_companies(path: &Path, exchange: &str, suffix: &str) -> Result<Vec<Company>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("open {:?}", path))?;

    let mut companies = Vec::new();
    for (i, result) in reader.deserialize::<CompanyRow>().enumerate() {
        let row = match result {
            Ok(r) => r,
            Err(e) => {
                warn!("Row {} in {:?}: {}", i + 1, path, e);
                continue;
            }
        };
        if row.symbol.is_empty() {
            continue;
        }

        let mut company = Company::new(&row.symbol, &row.name, exchange, suffix);
        company.sector = row.sector.filter(|s| !s.is_empty());
        company.industry = row.industry.filter(|s| !s.is_empty());
        companies.push(company);
    }

    info!("{}: {} companies loaded from {:?}", exchange, companies.len(), path);
    Ok(companies)
}

#[async_trait]
impl DataSource for LocalSource {
    async fn fetch_companies(&self, exchange: &str, config: &ExchangeConfig) -> Result<Vec<Company>> {
        let path = self.companies_path(exchange);
        if !path.exists() {
            warn!("{:?} not found, using built-in list for {}", path, exchange);
            return Ok(fallback_companies(exchange, &config.suffix));
        }
        load_companies(&path, exchange, &config.suffix)
    }

    async fn fetch_financials(&self, ticker: &str) -> Result<Option<StatementBundle>> {
        let path = self.financials_path(ticker);
        if !path.exists() {
            debug!("{}: no statement file", ticker);
            return Ok(None);
        }

        let text = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("read {:?}", path))?;
        let mut bundle =
            StatementBundle::from_json(&text).with_context(|| format!("decode {:?}", path))?;
        bundle.ticker.get_or_insert_with(|| ticker.to_string());
        Ok(Some(bundle))
    }
}
