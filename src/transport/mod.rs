//! The `transport` module exposes the broker over WebSockets.
//!
//! It defines the JSON protocol spoken with clients and the server that maps
//! those messages onto broker operations. It holds no queue state of its own.

pub mod message;
pub mod websocket;
