use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::item::ItemId;

/// One line of the transactions table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub order_id: String,
    pub item_id: ItemId,
    pub created: DateTime<Utc>,
    pub customer_id: Option<String>,
    pub price: Option<Decimal>,
}

impl OrderLine {
    pub fn new(
        order_id: impl Into<String>,
        item_id: impl Into<ItemId>,
        created: DateTime<Utc>,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            item_id: item_id.into(),
            created,
            customer_id: None,
            price: None,
        }
    }

    pub fn with_customer(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    /// Customer key used for interaction logs; orders stand in for anonymous customers.
    pub fn customer_key(&self) -> &str {
        self.customer_id.as_deref().unwrap_or(&self.order_id)
    }
}

/// Distinct items bought together in one order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Basket {
    pub order_id: String,
    /// Latest `created` timestamp among the order's lines.
    pub created: DateTime<Utc>,
    /// Sorted, deduplicated.
    pub items: Vec<ItemId>,
}

impl Basket {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, item: &ItemId) -> bool {
        self.items.binary_search(item).is_ok()
    }
}
