pub mod config;
pub mod error;
pub mod routes;
pub mod snowflake;
pub mod state;
pub mod stream;
