use crate::utils::error::{StoreError, StoreResult};

const DELIVERY_COUNT_SIZE: usize = 4;

/// A queued message: a delivery counter carried alongside the raw payload.
///
/// The store never changes `delivery_count`; it is metadata owned by
/// whoever publishes or requeues the message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Value {
    pub delivery_count: u32,
    pub payload: Vec<u8>,
}

impl Value {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            delivery_count: 0,
            payload: payload.into(),
        }
    }

    /// Encodes the counter as 4 little-endian bytes followed by the payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(DELIVERY_COUNT_SIZE + self.payload.len());
        buf.extend_from_slice(&self.delivery_count.to_le_bytes());
        buf.extend_from_slice(&self.payload);
        buf
    }

    pub fn decode(buf: &[u8]) -> StoreResult<Self> {
        let Some((count, payload)) = buf.split_first_chunk::<DELIVERY_COUNT_SIZE>() else {
            return Err(StoreError::MalformedValue {
                expected: DELIVERY_COUNT_SIZE,
                actual: buf.len(),
            });
        };

        Ok(Self {
            delivery_count: u32::from_le_bytes(*count),
            payload: payload.to_vec(),
        })
    }
}
