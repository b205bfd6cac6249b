use async_trait::async_trait;
use futures_util::StreamExt;
use mongodb::bson::{doc, oid::ObjectId, Document};
use mongodb::options::{FindOneOptions, IndexOptions, ReplaceOptions};
use mongodb::{Database, IndexModel};

use crate::models::{Alert, Contact, Holding, PriceSample, Stock};

use super::{bare_address, Store};

const SCHEMA_VERSION: i32 = 1;

/// Durable store over MongoDB collections.
#[derive(Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Creates the indexes the watcher scans rely on and stamps the schema
    /// version parameter. Fatal at startup if the server is unreachable.
    pub async fn init(&self) -> Result<(), String> {
        // stocks: unique per (market, short)
        {
            let col = self.db.collection::<Document>("stocks");
            let model = IndexModel::builder()
                .keys(doc! { "market": 1, "short": 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build();
            col.create_index(model, None)
                .await
                .map_err(|e| e.to_string())?;
        }

        // alerts: scanned per stock on every tick, listed per contact
        {
            let col = self.db.collection::<Document>("alerts");
            let model = IndexModel::builder().keys(doc! { "stock_id": 1 }).build();
            col.create_index(model, None)
                .await
                .map_err(|e| e.to_string())?;
            let model = IndexModel::builder().keys(doc! { "contact_id": 1 }).build();
            col.create_index(model, None)
                .await
                .map_err(|e| e.to_string())?;
        }

        // samples: window refresh queries by (stock_id, at)
        {
            let col = self.db.collection::<Document>("samples");
            let model = IndexModel::builder()
                .keys(doc! { "stock_id": 1, "at": 1 })
                .build();
            col.create_index(model, None)
                .await
                .map_err(|e| e.to_string())?;
        }

        // contacts: unique address
        {
            let col = self.db.collection::<Document>("contacts");
            let model = IndexModel::builder()
                .keys(doc! { "address": 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build();
            col.create_index(model, None)
                .await
                .map_err(|e| e.to_string())?;
        }

        // holdings: unique per (contact_id, stock_id)
        {
            let col = self.db.collection::<Document>("holdings");
            let model = IndexModel::builder()
                .keys(doc! { "contact_id": 1, "stock_id": 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build();
            col.create_index(model, None)
                .await
                .map_err(|e| e.to_string())?;
        }

        let current = self
            .parameter("schema_version")
            .await?
            .and_then(|v| v.parse::<i32>().ok())
            .unwrap_or(0);
        if current < SCHEMA_VERSION {
            tracing::warn!("upgrading schema version {} -> {}", current, SCHEMA_VERSION);
            self.set_parameter("schema_version", &SCHEMA_VERSION.to_string())
                .await?;
        }

        Ok(())
    }

    async fn collect<T>(&self, mut cursor: mongodb::Cursor<T>) -> Result<Vec<T>, String>
    where
        T: serde::de::DeserializeOwned + Unpin + Send + Sync,
    {
        let mut items = Vec::new();
        while let Some(res) = cursor.next().await {
            items.push(res.map_err(|e| e.to_string())?);
        }
        Ok(items)
    }
}

#[async_trait]
impl Store for MongoStore {
    async fn stock_by_id(&self, id: ObjectId) -> Result<Option<Stock>, String> {
        self.db
            .collection::<Stock>("stocks")
            .find_one(doc! { "_id": id }, None)
            .await
            .map_err(|e| e.to_string())
    }

    async fn stock_by_symbol(&self, market: &str, short: &str) -> Result<Option<Stock>, String> {
        self.db
            .collection::<Stock>("stocks")
            .find_one(doc! { "market": market, "short": short }, None)
            .await
            .map_err(|e| e.to_string())
    }

    async fn all_stocks(&self) -> Result<Vec<Stock>, String> {
        let cursor = self
            .db
            .collection::<Stock>("stocks")
            .find(doc! {}, None)
            .await
            .map_err(|e| e.to_string())?;
        self.collect(cursor).await
    }

    async fn save_stock(&self, stock: &Stock) -> Result<(), String> {
        self.db
            .collection::<Stock>("stocks")
            .replace_one(
                doc! { "_id": stock.id },
                stock,
                ReplaceOptions::builder().upsert(true).build(),
            )
            .await
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    async fn delete_stock(&self, id: ObjectId) -> Result<(), String> {
        self.db
            .collection::<Alert>("alerts")
            .delete_many(doc! { "stock_id": id }, None)
            .await
            .map_err(|e| e.to_string())?;
        self.db
            .collection::<Stock>("stocks")
            .delete_one(doc! { "_id": id }, None)
            .await
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    async fn insert_sample(&self, sample: &PriceSample) -> Result<(), String> {
        self.db
            .collection::<PriceSample>("samples")
            .insert_one(sample, None)
            .await
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    async fn sample_since(
        &self,
        stock_id: ObjectId,
        cutoff_ms: i64,
    ) -> Result<Option<PriceSample>, String> {
        let opts = FindOneOptions::builder().sort(doc! { "at": 1 }).build();
        self.db
            .collection::<PriceSample>("samples")
            .find_one(doc! { "stock_id": stock_id, "at": { "$gt": cutoff_ms } }, opts)
            .await
            .map_err(|e| e.to_string())
    }

    async fn alerts_for_stock(&self, stock_id: ObjectId) -> Result<Vec<Alert>, String> {
        let cursor = self
            .db
            .collection::<Alert>("alerts")
            .find(doc! { "stock_id": stock_id }, None)
            .await
            .map_err(|e| e.to_string())?;
        self.collect(cursor).await
    }

    async fn alerts_for_contact(&self, contact_id: ObjectId) -> Result<Vec<Alert>, String> {
        let cursor = self
            .db
            .collection::<Alert>("alerts")
            .find(doc! { "contact_id": contact_id }, None)
            .await
            .map_err(|e| e.to_string())?;
        self.collect(cursor).await
    }

    async fn save_alert(&self, alert: &Alert) -> Result<(), String> {
        self.db
            .collection::<Alert>("alerts")
            .replace_one(
                doc! { "_id": alert.id },
                alert,
                ReplaceOptions::builder().upsert(true).build(),
            )
            .await
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    async fn delete_alert(&self, id: ObjectId) -> Result<(), String> {
        self.db
            .collection::<Alert>("alerts")
            .delete_one(doc! { "_id": id }, None)
            .await
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    async fn delete_alerts_for_pair(
        &self,
        stock_id: ObjectId,
        contact_id: ObjectId,
    ) -> Result<(), String> {
        self.db
            .collection::<Alert>("alerts")
            .delete_many(doc! { "stock_id": stock_id, "contact_id": contact_id }, None)
            .await
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    async fn contact_by_address(&self, address: &str) -> Result<Contact, String> {
        let address = bare_address(address);
        let contacts = self.db.collection::<Contact>("contacts");

        if let Some(c) = contacts
            .find_one(doc! { "address": address }, None)
            .await
            .map_err(|e| e.to_string())?
        {
            return Ok(c);
        }

        tracing::info!("creating contact {}", address);
        let c = Contact::new(address);
        contacts
            .insert_one(&c, None)
            .await
            .map_err(|e| e.to_string())?;
        Ok(c)
    }

    async fn contact_by_id(&self, id: ObjectId) -> Result<Option<Contact>, String> {
        self.db
            .collection::<Contact>("contacts")
            .find_one(doc! { "_id": id }, None)
            .await
            .map_err(|e| e.to_string())
    }

    async fn save_contact(&self, contact: &Contact) -> Result<(), String> {
        self.db
            .collection::<Contact>("contacts")
            .replace_one(
                doc! { "_id": contact.id },
                contact,
                ReplaceOptions::builder().upsert(true).build(),
            )
            .await
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    async fn delete_contact(&self, id: ObjectId) -> Result<(), String> {
        self.db
            .collection::<Alert>("alerts")
            .delete_many(doc! { "contact_id": id }, None)
            .await
            .map_err(|e| e.to_string())?;
        self.db
            .collection::<Holding>("holdings")
            .delete_many(doc! { "contact_id": id }, None)
            .await
            .map_err(|e| e.to_string())?;
        self.db
            .collection::<Contact>("contacts")
            .delete_one(doc! { "_id": id }, None)
            .await
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    async fn holding_for_pair(
        &self,
        contact_id: ObjectId,
        stock_id: ObjectId,
    ) -> Result<Option<Holding>, String> {
        self.db
            .collection::<Holding>("holdings")
            .find_one(doc! { "contact_id": contact_id, "stock_id": stock_id }, None)
            .await
            .map_err(|e| e.to_string())
    }

    async fn holdings_for_contact(&self, contact_id: ObjectId) -> Result<Vec<Holding>, String> {
        let cursor = self
            .db
            .collection::<Holding>("holdings")
            .find(doc! { "contact_id": contact_id }, None)
            .await
            .map_err(|e| e.to_string())?;
        self.collect(cursor).await
    }

    async fn save_holding(&self, holding: &Holding) -> Result<(), String> {
        self.db
            .collection::<Holding>("holdings")
            .replace_one(
                doc! { "_id": holding.id },
                holding,
                ReplaceOptions::builder().upsert(true).build(),
            )
            .await
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    async fn delete_holding(&self, id: ObjectId) -> Result<(), String> {
        self.db
            .collection::<Holding>("holdings")
            .delete_one(doc! { "_id": id }, None)
            .await
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    async fn parameter(&self, name: &str) -> Result<Option<String>, String> {
        let found = self
            .db
            .collection::<Document>("parameters")
            .find_one(doc! { "name": name }, None)
            .await
            .map_err(|e| e.to_string())?;
        Ok(found.and_then(|d| d.get_str("value").ok().map(|s| s.to_string())))
    }

    async fn set_parameter(&self, name: &str, value: &str) -> Result<(), String> {
        self.db
            .collection::<Document>("parameters")
            .update_one(
                doc! { "name": name },
                doc! { "$set": { "value": value } },
                mongodb::options::UpdateOptions::builder().upsert(true).build(),
            )
            .await
            .map_err(|e| e.to_string())?;
        Ok(())
    }
}
