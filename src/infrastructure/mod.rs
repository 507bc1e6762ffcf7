pub mod memory;
pub mod persistence;
