use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;

use crate::models::{Alert, Contact, Holding, PriceSample, Stock};

pub mod memory;
pub mod mongo;

pub use memory::MemStore;
pub use mongo::MongoStore;

/// Chat addresses may carry a resource suffix (`user@host/phone`); records
/// are keyed by the bare address.
pub fn bare_address(address: &str) -> &str {
    address.split('/').next().unwrap_or(address)
}

/// The record operations the engine consumes. Every call is a short,
/// self-contained read or write; no transactions. `MongoStore` is the
/// durable implementation, `MemStore` backs the tests.
#[async_trait]
pub trait Store: Send + Sync {
    async fn stock_by_id(&self, id: ObjectId) -> Result<Option<Stock>, String>;
    async fn stock_by_symbol(&self, market: &str, short: &str) -> Result<Option<Stock>, String>;
    async fn all_stocks(&self) -> Result<Vec<Stock>, String>;
    async fn save_stock(&self, stock: &Stock) -> Result<(), String>;
    /// Removes the stock and cascades to its alerts.
    async fn delete_stock(&self, id: ObjectId) -> Result<(), String>;

    async fn insert_sample(&self, sample: &PriceSample) -> Result<(), String>;
    /// Oldest sample strictly newer than `cutoff_ms`, if any.
    async fn sample_since(
        &self,
        stock_id: ObjectId,
        cutoff_ms: i64,
    ) -> Result<Option<PriceSample>, String>;

    async fn alerts_for_stock(&self, stock_id: ObjectId) -> Result<Vec<Alert>, String>;
    async fn alerts_for_contact(&self, contact_id: ObjectId) -> Result<Vec<Alert>, String>;
    async fn save_alert(&self, alert: &Alert) -> Result<(), String>;
    async fn delete_alert(&self, id: ObjectId) -> Result<(), String>;
    async fn delete_alerts_for_pair(
        &self,
        stock_id: ObjectId,
        contact_id: ObjectId,
    ) -> Result<(), String>;

    /// Looks up a contact by bare address, creating it on first sight.
    async fn contact_by_address(&self, address: &str) -> Result<Contact, String>;
    async fn contact_by_id(&self, id: ObjectId) -> Result<Option<Contact>, String>;
    async fn save_contact(&self, contact: &Contact) -> Result<(), String>;
    /// Removes the contact and cascades to its alerts and holdings.
    async fn delete_contact(&self, id: ObjectId) -> Result<(), String>;

    async fn holding_for_pair(
        &self,
        contact_id: ObjectId,
        stock_id: ObjectId,
    ) -> Result<Option<Holding>, String>;
    async fn holdings_for_contact(&self, contact_id: ObjectId) -> Result<Vec<Holding>, String>;
    async fn save_holding(&self, holding: &Holding) -> Result<(), String>;
    async fn delete_holding(&self, id: ObjectId) -> Result<(), String>;

    async fn parameter(&self, name: &str) -> Result<Option<String>, String>;
    async fn set_parameter(&self, name: &str, value: &str) -> Result<(), String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_address_strips_resource() {
        assert_eq!(bare_address("user@example.com/phone"), "user@example.com");
        assert_eq!(bare_address("user@example.com"), "user@example.com");
    }
}
