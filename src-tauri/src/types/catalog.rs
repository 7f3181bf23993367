use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub category: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSource {
    pub id: i64,
    pub product_id: i64,
    pub source_name: String,
    pub source_url: Option<String>,
    pub price: f64,
    pub currency: String,
    pub in_stock: bool,
    pub updated_at: String,
}

/// A product's cheapest source at the time of query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BestPrice {
    pub source_id: i64,
    pub source_name: String,
    pub price: f64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductWithSources {
    #[serde(flatten)]
    pub product: Product,
    pub sources: Vec<PriceSource>,
    pub best_price: Option<BestPrice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePoint {
    pub price: f64,
    pub recorded_at: String,
}
