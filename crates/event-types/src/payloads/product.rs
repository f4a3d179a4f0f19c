//! Product catalog payloads.

use serde::{Deserialize, Serialize};

/// A product was added to the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductCreated {
    pub product_id: String,
    pub name: String,
    pub sku: String,
    pub price: f64,
    pub currency: String,
    pub category_id: Option<String>,
    pub stock: u32,
}

/// Catalog fields changed. Only the fields that changed are listed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdated {
    pub product_id: String,
    pub changed_fields: Vec<String>,
}

/// A product was removed from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDeleted {
    pub product_id: String,
    pub sku: String,
}

/// Stock dropped to or below the reorder threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductStockLow {
    pub product_id: String,
    pub sku: String,
    pub current_stock: u32,
    pub threshold: u32,
}

/// The list price moved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPriceChanged {
    pub product_id: String,
    pub old_price: f64,
    pub new_price: f64,
    pub currency: String,
}
