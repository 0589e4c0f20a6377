pub mod checksum;
pub mod compression;
pub mod file_ops;
