use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

/// A product record as stored in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub product_id: String,
    pub name: String,
    pub brand: String,
    pub price: f64,
    pub category: String,
    pub in_stock: bool,
    /// Free-form attributes; the keys present vary per category.
    pub specifications: BTreeMap<String, SpecValue>,
    pub tags: BTreeSet<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A single specification attribute: either a plain value or a list of options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpecValue {
    Text(String),
    List(Vec<String>),
}

impl From<&str> for SpecValue {
    fn from(value: &str) -> Self {
        SpecValue::Text(value.to_string())
    }
}

impl From<&[&str]> for SpecValue {
    fn from(values: &[&str]) -> Self {
        SpecValue::List(values.iter().map(|v| v.to_string()).collect())
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ProductError {
    #[error("Product id must not be empty")]
    EmptyProductId,
    #[error("Product {product_id} has invalid price {price}")]
    InvalidPrice { product_id: String, price: f64 },
    #[error("Product id {0} appears more than once")]
    DuplicateProductId(String),
}

impl Product {
    /// Field holding the unique business identifier.
    pub const ID_FIELD: &'static str = "productId";

    pub fn new(
        product_id: impl Into<String>,
        name: impl Into<String>,
        brand: impl Into<String>,
        price: f64,
        category: impl Into<String>,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            name: name.into(),
            brand: brand.into(),
            price,
            category: category.into(),
            in_stock: true,
            specifications: BTreeMap::new(),
            tags: BTreeSet::new(),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn in_stock(mut self, in_stock: bool) -> Self {
        self.in_stock = in_stock;
        self
    }

    pub fn spec(mut self, key: &str, value: impl Into<SpecValue>) -> Self {
        self.specifications.insert(key.to_string(), value.into());
        self
    }

    pub fn tags<'a>(mut self, tags: impl IntoIterator<Item = &'a str>) -> Self {
        self.tags.extend(tags.into_iter().map(str::to_string));
        self
    }

    pub fn validate(&self) -> Result<(), ProductError> {
        if self.product_id.trim().is_empty() {
            return Err(ProductError::EmptyProductId);
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(ProductError::InvalidPrice {
                product_id: self.product_id.clone(),
                price: self.price,
            });
        }
        Ok(())
    }
}

/// Validates every product and checks that no product id repeats within the batch.
pub fn validate_batch(products: &[Product]) -> Result<(), ProductError> {
    let mut seen = HashSet::new();
    for product in products {
        product.validate()?;
        if !seen.insert(product.product_id.as_str()) {
            return Err(ProductError::DuplicateProductId(product.product_id.clone()));
        }
    }
    Ok(())
}
