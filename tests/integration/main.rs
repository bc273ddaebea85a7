//! Integration tests for quote-sync

mod config_test;
mod e2e_test;
mod source_test;
mod store_test;
