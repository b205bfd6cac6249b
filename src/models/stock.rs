use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// A tracked instrument on a specific market.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stock {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    // "FR" | "AM" | "US" | "US2" | "W"
    pub market: String,
    pub short: String,

    pub name: String,

    // last successfully fetched price
    pub value: f64,
    pub currency: String,

    // consecutive fetch failures; reset to zero on any success
    pub failed_fetches: i64,
}

impl Stock {
    pub fn new(market: &str, short: &str) -> Self {
        Self {
            id: ObjectId::new(),
            market: market.to_uppercase(),
            short: short.to_uppercase(),
            name: String::new(),
            value: 0.0,
            currency: String::new(),
            failed_fetches: 0,
        }
    }

    /// Registry key, e.g. `FR:RNO`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.market, self.short)
    }

    /// Human-readable identity used in every chat message.
    pub fn label(&self) -> String {
        format!("\"{}\" ({}:{})", self.name, self.market, self.short)
    }
}
