use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;

use crate::models::{Alert, Contact, Holding, PriceSample, Stock};

use super::{bare_address, Store};

#[derive(Default)]
struct Inner {
    stocks: Vec<Stock>,
    alerts: Vec<Alert>,
    contacts: Vec<Contact>,
    holdings: Vec<Holding>,
    samples: Vec<PriceSample>,
    parameters: Vec<(String, String)>,
}

/// In-memory store with the same semantics as `MongoStore`, used by the
/// test suite. Insertion order is preserved, which gives listings and
/// per-tick alert evaluation a stable iteration order.
#[derive(Default)]
pub struct MemStore {
    inner: Mutex<Inner>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Store for MemStore {
    async fn stock_by_id(&self, id: ObjectId) -> Result<Option<Stock>, String> {
        Ok(self.lock().stocks.iter().find(|s| s.id == id).cloned())
    }

    async fn stock_by_symbol(&self, market: &str, short: &str) -> Result<Option<Stock>, String> {
        Ok(self
            .lock()
            .stocks
            .iter()
            .find(|s| s.market == market && s.short == short)
            .cloned())
    }

    async fn all_stocks(&self) -> Result<Vec<Stock>, String> {
        Ok(self.lock().stocks.clone())
    }

    async fn save_stock(&self, stock: &Stock) -> Result<(), String> {
        let mut inner = self.lock();
        match inner.stocks.iter_mut().find(|s| s.id == stock.id) {
            Some(slot) => *slot = stock.clone(),
            None => inner.stocks.push(stock.clone()),
        }
        Ok(())
    }

    async fn delete_stock(&self, id: ObjectId) -> Result<(), String> {
        let mut inner = self.lock();
        inner.alerts.retain(|a| a.stock_id != id);
        inner.stocks.retain(|s| s.id != id);
        Ok(())
    }

    async fn insert_sample(&self, sample: &PriceSample) -> Result<(), String> {
        self.lock().samples.push(sample.clone());
        Ok(())
    }

    async fn sample_since(
        &self,
        stock_id: ObjectId,
        cutoff_ms: i64,
    ) -> Result<Option<PriceSample>, String> {
        Ok(self
            .lock()
            .samples
            .iter()
            .filter(|s| s.stock_id == stock_id && s.at > cutoff_ms)
            .min_by_key(|s| s.at)
            .cloned())
    }

    async fn alerts_for_stock(&self, stock_id: ObjectId) -> Result<Vec<Alert>, String> {
        Ok(self
            .lock()
            .alerts
            .iter()
            .filter(|a| a.stock_id == stock_id)
            .cloned()
            .collect())
    }

    async fn alerts_for_contact(&self, contact_id: ObjectId) -> Result<Vec<Alert>, String> {
        Ok(self
            .lock()
            .alerts
            .iter()
            .filter(|a| a.contact_id == contact_id)
            .cloned()
            .collect())
    }

    async fn save_alert(&self, alert: &Alert) -> Result<(), String> {
        let mut inner = self.lock();
        match inner.alerts.iter_mut().find(|a| a.id == alert.id) {
            Some(slot) => *slot = alert.clone(),
            None => inner.alerts.push(alert.clone()),
        }
        Ok(())
    }

    async fn delete_alert(&self, id: ObjectId) -> Result<(), String> {
        self.lock().alerts.retain(|a| a.id != id);
        Ok(())
    }

    async fn delete_alerts_for_pair(
        &self,
        stock_id: ObjectId,
        contact_id: ObjectId,
    ) -> Result<(), String> {
        self.lock()
            .alerts
            .retain(|a| !(a.stock_id == stock_id && a.contact_id == contact_id));
        Ok(())
    }

    async fn contact_by_address(&self, address: &str) -> Result<Contact, String> {
        let address = bare_address(address);
        let mut inner = self.lock();
        if let Some(c) = inner.contacts.iter().find(|c| c.address == address) {
            return Ok(c.clone());
        }
        let c = Contact::new(address);
        inner.contacts.push(c.clone());
        Ok(c)
    }

    async fn contact_by_id(&self, id: ObjectId) -> Result<Option<Contact>, String> {
        Ok(self.lock().contacts.iter().find(|c| c.id == id).cloned())
    }

    async fn save_contact(&self, contact: &Contact) -> Result<(), String> {
        let mut inner = self.lock();
        match inner.contacts.iter_mut().find(|c| c.id == contact.id) {
            Some(slot) => *slot = contact.clone(),
            None => inner.contacts.push(contact.clone()),
        }
        Ok(())
    }

    async fn delete_contact(&self, id: ObjectId) -> Result<(), String> {
        let mut inner = self.lock();
        inner.alerts.retain(|a| a.contact_id != id);
        inner.holdings.retain(|h| h.contact_id != id);
        inner.contacts.retain(|c| c.id != id);
        Ok(())
    }

    async fn holding_for_pair(
        &self,
        contact_id: ObjectId,
        stock_id: ObjectId,
    ) -> Result<Option<Holding>, String> {
        Ok(self
            .lock()
            .holdings
            .iter()
            .find(|h| h.contact_id == contact_id && h.stock_id == stock_id)
            .cloned())
    }

    async fn holdings_for_contact(&self, contact_id: ObjectId) -> Result<Vec<Holding>, String> {
        Ok(self
            .lock()
            .holdings
            .iter()
            .filter(|h| h.contact_id == contact_id)
            .cloned()
            .collect())
    }

    async fn save_holding(&self, holding: &Holding) -> Result<(), String> {
        let mut inner = self.lock();
        match inner.holdings.iter_mut().find(|h| h.id == holding.id) {
            Some(slot) => *slot = holding.clone(),
            None => inner.holdings.push(holding.clone()),
        }
        Ok(())
    }

    async fn delete_holding(&self, id: ObjectId) -> Result<(), String> {
        self.lock().holdings.retain(|h| h.id != id);
        Ok(())
    }

    async fn parameter(&self, name: &str) -> Result<Option<String>, String> {
        Ok(self
            .lock()
            .parameters
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone()))
    }

    async fn set_parameter(&self, name: &str, value: &str) -> Result<(), String> {
        let mut inner = self.lock();
        match inner.parameters.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value.to_string(),
            None => inner.parameters.push((name.to_string(), value.to_string())),
        }
        Ok(())
    }
}
