use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Shares a contact declared they hold, used to enrich alerts and the
/// valuation listing with profit/loss figures. Independent of any Alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holding {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub contact_id: ObjectId,
    pub stock_id: ObjectId,

    pub shares: i64,
    pub unit_cost: f64,
}

impl Holding {
    pub fn new(contact_id: ObjectId, stock_id: ObjectId, shares: i64, unit_cost: f64) -> Self {
        Self {
            id: ObjectId::new(),
            contact_id,
            stock_id,
            shares,
            unit_cost,
        }
    }

    pub fn cost(&self) -> f64 {
        self.shares as f64 * self.unit_cost
    }

    pub fn worth(&self, price: f64) -> f64 {
        self.shares as f64 * price
    }
}
