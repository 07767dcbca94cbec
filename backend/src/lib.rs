pub mod config;
pub mod error;
pub mod inference;
pub mod models;
pub mod pipeline;
pub mod recommendations;
pub mod routes;
pub mod storage;
