pub mod entries;
pub mod health;
pub mod stats;
pub mod streak;
