pub mod accounts;
pub mod auth;
pub mod config;
pub mod connections;
pub mod reports;
pub mod rules;
pub mod subscription;
pub mod transactions;
