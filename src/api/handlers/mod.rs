pub mod entries;
pub mod health;
pub mod metrics;
pub mod predictions;
pub mod quotes;
