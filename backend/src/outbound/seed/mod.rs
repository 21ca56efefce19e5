//! Seed data adapters.

mod json_file_seed_source;

pub use json_file_seed_source::JsonFileSeedSource;
