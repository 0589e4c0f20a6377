pub mod chunker;
pub mod scanner;
pub mod temp_manager;
