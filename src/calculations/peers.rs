//! Industry and sector peer PE medians.
//!
//! Two phases: a `PeerPool` collects PE observations during a run, then
//! `finalize` collapses every bucket to its median once and hands back an
//! immutable `PeerAverages` for the screening phase.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// PE ratios above this are treated as outliers and not pooled.
pub const MAX_POOLED_PE: f64 = 200.0;

#[derive(Debug, Default)]
pub struct PeerPool {
    by_industry: HashMap<String, Vec<f64>>,
    by_sector: HashMap<String, Vec<f64>>,
    observations: usize,
}

impl PeerPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pool a company's PE under its industry and sector. Unknown,
    /// non-positive and outlier PEs are ignored.
    pub fn add_company(&mut self, industry: Option<&str>, sector: Option<&str>, pe: Option<f64>) {
        let Some(pe) = pe.filter(|pe| *pe > 0.0 && *pe <= MAX_POOLED_PE) else {
            return;
        };
        self.observations += 1;

        if let Some(industry) = industry.filter(|s| !s.is_empty()) {
            self.by_industry.entry(industry.to_string()).or_default().push(pe);
        }
        if let Some(sector) = sector.filter(|s| !s.is_empty()) {
            self.by_sector.entry(sector.to_string()).or_default().push(pe);
        }
    }

    /// PE values accepted into the pool so far.
    pub fn observations(&self) -> usize {
        self.observations
    }

    pub fn finalize(self) -> PeerAverages {
        PeerAverages {
            industry: collapse(self.by_industry),
            sector: collapse(self.by_sector),
        }
    }
}

fn collapse(buckets: HashMap<String, Vec<f64>>) -> BTreeMap<String, f64> {
    buckets
        .into_iter()
        .filter_map(|(label, pes)| median(pes).map(|m| (label, m)))
        .collect()
}

/// Middle value; the mean of the two middle values for an even count.
pub fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Read-only peer medians, also the `industry:averages` cache value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeerAverages {
    pub industry: BTreeMap<String, f64>,
    pub sector: BTreeMap<String, f64>,
}

impl PeerAverages {
    pub fn get_industry_average(&self, industry: Option<&str>) -> Option<f64> {
        industry.and_then(|i| self.industry.get(i)).copied()
    }

    pub fn get_sector_average(&self, sector: Option<&str>) -> Option<f64> {
        sector.and_then(|s| self.sector.get(s)).copied()
    }

    /// Industry median if known, else sector median.
    pub fn get_peer_average(&self, industry: Option<&str>, sector: Option<&str>) -> Option<f64> {
        self.get_industry_average(industry)
            .or_else(|| self.get_sector_average(sector))
    }

    /// `None` when the PE is unknown or non-positive, or no peer median exists.
    pub fn is_below_average(&self, pe: Option<f64>, industry: Option<&str>, sector: Option<&str>) -> Option<bool> {
        let pe = pe.filter(|pe| *pe > 0.0)?;
        let peer = self.get_peer_average(industry, sector)?;
        Some(pe < peer)
    }
}
