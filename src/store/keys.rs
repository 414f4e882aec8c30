//! Key layout shared by every topic in the engine.
//!
//! `region tag (1 byte) ++ offset (8 bytes LE) ++ topic bytes`. Cursors live at
//! the two largest offsets of a region so they never collide with data.

use crate::utils::error::{StoreError, StoreResult};

pub const TAIL_INDICATOR: u64 = u64::MAX;
pub const HEAD_INDICATOR: u64 = u64::MAX - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Region {
    /// Undelivered messages, `[head, tail)`.
    Primary = 1,
    /// Delivered messages waiting for ack or nack.
    Ack = 2,
}

pub fn encode_key(region: Region, topic: &[u8], offset: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + 8 + topic.len());
    key.push(region as u8);
    key.extend_from_slice(&offset.to_le_bytes());
    key.extend_from_slice(topic);
    key
}

pub fn tail_key(region: Region, topic: &[u8]) -> Vec<u8> {
    encode_key(region, topic, TAIL_INDICATOR)
}

pub fn head_key(topic: &[u8]) -> Vec<u8> {
    encode_key(Region::Primary, topic, HEAD_INDICATOR)
}

pub fn encode_cursor(pos: u64) -> [u8; 8] {
    pos.to_le_bytes()
}

pub fn decode_cursor(topic: &[u8], raw: &[u8]) -> StoreResult<u64> {
    let bytes: [u8; 8] = raw.try_into().map_err(|_| StoreError::CorruptCursor {
        topic: String::from_utf8_lossy(topic).into_owned(),
        len: raw.len(),
    })?;
    Ok(u64::from_le_bytes(bytes))
}
