pub mod format;
pub mod worker;
