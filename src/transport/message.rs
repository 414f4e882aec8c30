use serde::{Deserialize, Serialize};

/// Commands sent by clients. Payloads travel as UTF-8 text.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "publish")]
    Publish { topic: String, payload: String },

    #[serde(rename = "subscribe")]
    Subscribe { topic: String },

    #[serde(rename = "unsubscribe")]
    Unsubscribe { topic: String },

    /// Commit the delivery currently held on `topic`.
    #[serde(rename = "ack")]
    Ack { topic: String },

    /// Return the delivery currently held on `topic` to the queue.
    #[serde(rename = "nack")]
    Nack { topic: String },

    #[serde(rename = "purge")]
    Purge { topic: String },

    #[serde(rename = "stats")]
    Stats { topic: String },
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "published")]
    Published { topic: String, offset: u64 },

    #[serde(rename = "subscribed")]
    Subscribed { topic: String, consumer_id: String },

    #[serde(rename = "unsubscribed")]
    Unsubscribed { topic: String },

    #[serde(rename = "message")]
    Message {
        topic: String,
        payload: String,
        delivery_count: u32,
        ack_offset: u64,
        timestamp: i64,
    },

    #[serde(rename = "acked")]
    Acked { topic: String },

    #[serde(rename = "nacked")]
    Nacked { topic: String },

    #[serde(rename = "purged")]
    Purged { topic: String, removed: u64 },

    #[serde(rename = "stats")]
    Stats {
        topic: String,
        head: u64,
        tail: u64,
        ack_tail: u64,
        ready: u64,
    },

    #[serde(rename = "error")]
    Error { message: String },
}
