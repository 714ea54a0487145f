use std::time::Instant;
use tracing::info;

/// A simple wall-clock timer for logging elapsed time.
pub struct Timer {
    label: String,
    start: Instant,
}

impl Timer {
    pub fn start(label: impl Into<String>) -> Self {
        let label = label.into();
        info!("⏱  Starting: {}", label);
        Self {
            label,
            start: Instant::now(),
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        info!(
            "⏱  Finished: {} (took {:.2?})",
            self.label,
            self.start.elapsed()
        );
    }
}

/// Format a large integer with thousands separators.
pub fn fmt_number(n: i64) -> String {
    let s = n.abs().to_string();
    let mut result = String::new();
    for (i, ch) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(ch);
    }
    if n < 0 {
        result.push('-');
    }
    result.chars().rev().collect()
}

/// Amount in millions with one decimal: 60_000_000 → "60.0M".
pub fn fmt_millions(amount: f64) -> String {
    format!("{:.1}M", amount / 1_000_000.0)
}

/// Ratio as a percentage, "N/A" when unknown: 0.123 → "12.3%".
pub fn fmt_pct(ratio: Option<f64>) -> String {
    ratio.map_or_else(|| "N/A".to_string(), |r| format!("{:.1}%", r * 100.0))
}

/// Fixed-decimal value, "N/A" when unknown.
pub fn fmt_opt(value: Option<f64>, decimals: usize) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{:.*}", decimals, v))
}
