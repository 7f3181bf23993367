use serde::{Deserialize, Serialize};

/// One applied price change, simulated or external.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceUpdate {
    pub source_id: i64,
    pub product_id: i64,
    pub old_price: f64,
    pub new_price: f64,
    pub pct_change: f64,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropKind {
    /// A product's minimum across sources fell below its last observed minimum.
    BestPrice,
    /// A single source fell by more than the per-step threshold.
    Source,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceDropAlert {
    pub kind: DropKind,
    pub product_id: i64,
    pub product_name: String,
    pub source_id: i64,
    pub source_name: String,
    pub old_price: f64,
    pub new_price: f64,
    pub currency: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickerState {
    Idle,
    Running,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerStatus {
    pub state: TickerState,
    pub interval_ms: u64,
    pub total_ticks: u64,
    pub total_updates: u64,
}
