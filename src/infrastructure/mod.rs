//! Concrete implementations of the domain ports.

pub mod card_numbers;
pub mod identity;
pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
pub mod unit_of_work;
pub mod validation;
