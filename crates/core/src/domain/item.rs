use std::collections::BTreeSet;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemId(pub String);

impl ItemId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().trim().to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Catalog reference data for one item, after per-item collapsing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub brand: Option<String>,
    /// Raw comma separated category string as delivered upstream.
    pub category: Option<String>,
    pub audience: Option<String>,
    pub price: Option<Decimal>,
}

impl Item {
    pub fn new(id: impl Into<ItemId>) -> Self {
        Self { id: id.into(), brand: None, category: None, audience: None, price: None }
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    pub fn with_price(mut self, price: Decimal) -> Self {
        self.price = Some(price);
        self
    }
}

/// Parse a comma separated category string into a lower-cased tag set.
///
/// Empty tokens and tokens equal to `discard` are dropped.
pub fn parse_tags(raw: Option<&str>, discard: &str) -> BTreeSet<String> {
    let Some(raw) = raw else {
        return BTreeSet::new();
    };

    raw.split(',')
        .map(|token| token.trim().to_lowercase())
        .filter(|token| !token.is_empty() && token != discard)
        .collect()
}

/// Lower-case and trim a free-text attribute. Missing values become the empty string.
pub fn normalize_attribute(raw: Option<&str>) -> String {
    raw.map(|value| value.trim().to_lowercase()).unwrap_or_default()
}
