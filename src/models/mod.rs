pub mod entry;
pub mod streak;
