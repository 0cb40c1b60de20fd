//! Batch replay of wallet operations from CSV, used by the command-line driver.

pub mod balance_writer;
pub mod operation_reader;
pub mod replay;
