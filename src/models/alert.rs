use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use super::Stock;

/// Which way a price movement must go before an alert fires.
/// The threshold percentage is always stored as a positive magnitude;
/// the sign is applied by the direction filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Both,
    Up,
    Down,
}

/// One (stock, contact) subscription. At most one exists per pair;
/// subscribing again replaces the previous one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub contact_id: ObjectId,
    pub stock_id: ObjectId,

    // trigger threshold, percent
    pub percent: f64,
    pub direction: Direction,

    // evaluation window; 0 = none
    pub window_ms: i64,

    // baseline price the percent change is computed against; 0.0 = unset
    pub last_value: f64,
    // last evaluation, epoch ms
    pub last_date: i64,
    // last trigger (or baseline refresh), epoch ms
    pub last_triggered: i64,
}

impl Alert {
    pub fn new(
        stock_id: ObjectId,
        contact_id: ObjectId,
        percent: f64,
        direction: Direction,
        window_ms: i64,
    ) -> Self {
        Self {
            id: ObjectId::new(),
            contact_id,
            stock_id,
            percent,
            direction,
            window_ms,
            last_value: 0.0,
            last_date: 0,
            last_triggered: 0,
        }
    }

    /// One-line description used by the `ls` listing and subscribe replies.
    pub fn describe(&self, stock: &Stock) -> String {
        let sign = match self.direction {
            Direction::Up => "+",
            Direction::Down => "-",
            Direction::Both => "~",
        };
        let mut out = format!("{} {}{:.2}%", stock.label(), sign, self.percent);
        if self.window_ms > 0 {
            out.push_str(&format!(" on {}s", self.window_ms / 1000));
        }
        out.push_str(&format!(" [{}]", self.id.to_hex()));
        out
    }
}
