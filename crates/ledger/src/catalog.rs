//! Product catalog trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{Money, ProductId};

use crate::error::LedgerError;

/// Trait for product price lookups.
///
/// The catalog is an external collaborator. Prices are read once when
/// an order is placed and copied into the order, so later catalog
/// changes never alter an existing order.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Returns the price of a product, or `None` if the catalog does
    /// not know the product.
    async fn price_of(&self, product_id: ProductId) -> Result<Option<Money>, LedgerError>;
}

#[derive(Debug, Default)]
struct InMemoryCatalogState {
    prices: HashMap<ProductId, Money>,
    fail_on_lookup: bool,
}

/// In-memory catalog for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    state: Arc<RwLock<InMemoryCatalogState>>,
}

impl InMemoryCatalog {
    /// Creates a new in-memory catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets or replaces the price of a product.
    pub fn insert(&self, product_id: ProductId, price: Money) {
        self.state.write().unwrap().prices.insert(product_id, price);
    }

    /// Configures the catalog to fail on the next lookup.
    pub fn set_fail_on_lookup(&self, fail: bool) {
        self.state.write().unwrap().fail_on_lookup = fail;
    }

    /// Returns the number of priced products.
    pub fn product_count(&self) -> usize {
        self.state.read().unwrap().prices.len()
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn price_of(&self, product_id: ProductId) -> Result<Option<Money>, LedgerError> {
        let state = self.state.read().unwrap();

        if state.fail_on_lookup {
            return Err(LedgerError::Catalog("Catalog unavailable".to_string()));
        }

        Ok(state.prices.get(&product_id).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_price_lookup() {
        let catalog = InMemoryCatalog::new();
        catalog.insert(ProductId::new(1), Money::from_cents(2_500));

        let price = catalog.price_of(ProductId::new(1)).await.unwrap();
        assert_eq!(price, Some(Money::from_cents(2_500)));
        assert_eq!(catalog.product_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_product_is_none() {
        let catalog = InMemoryCatalog::new();

        let price = catalog.price_of(ProductId::new(99)).await.unwrap();
        assert_eq!(price, None);
    }

    #[tokio::test]
    async fn test_fail_on_lookup() {
        let catalog = InMemoryCatalog::new();
        catalog.insert(ProductId::new(1), Money::from_cents(2_500));
        catalog.set_fail_on_lookup(true);

        let result = catalog.price_of(ProductId::new(1)).await;
        assert!(matches!(result, Err(LedgerError::Catalog(_))));
    }

    #[tokio::test]
    async fn test_insert_replaces_price() {
        let catalog = InMemoryCatalog::new();
        catalog.insert(ProductId::new(1), Money::from_cents(1_000));
        catalog.insert(ProductId::new(1), Money::from_cents(1_500));

        let price = catalog.price_of(ProductId::new(1)).await.unwrap();
        assert_eq!(price, Some(Money::from_cents(1_500)));
        assert_eq!(catalog.product_count(), 1);
    }
}
