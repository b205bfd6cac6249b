use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// A chat peer. Created lazily the first time an address talks to us.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub address: String,

    // alerts are suppressed while now < pause_until (epoch ms); 0 = active
    pub pause_until: i64,

    // append the quote page URL to notifications
    pub show_url: bool,
}

impl Contact {
    pub fn new(address: &str) -> Self {
        Self {
            id: ObjectId::new(),
            address: address.to_string(),
            pause_until: 0,
            show_url: true,
        }
    }

    pub fn is_paused(&self, now_ms: i64) -> bool {
        now_ms < self.pause_until
    }
}
