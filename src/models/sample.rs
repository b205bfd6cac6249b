use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// One price observation, recorded on every successful watcher cycle.
/// Consumed by the evaluation-window baseline refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSample {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub stock_id: ObjectId,

    // epoch ms
    pub at: i64,
    pub value: f64,
}

impl PriceSample {
    pub fn new(stock_id: ObjectId, at: i64, value: f64) -> Self {
        Self {
            id: ObjectId::new(),
            stock_id,
            at,
            value,
        }
    }
}
