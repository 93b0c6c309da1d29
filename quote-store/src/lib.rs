pub mod database;

pub use database::QuoteDatabase;
