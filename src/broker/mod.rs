pub mod engine;
pub mod topic;

pub use engine::Broker;
