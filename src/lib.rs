//! Query-key derivation and cache invalidation for the practice-management web client.

pub mod cache;
pub mod config;
pub mod infra;
