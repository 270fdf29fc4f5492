pub mod api;
pub mod cli;
pub mod config;
pub mod database;
pub mod encryption;
pub mod entities;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod types;

#[cfg(test)]
pub mod testing;
