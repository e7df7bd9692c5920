// src/lib.rs

pub mod cli;
pub mod config;
pub mod handlers;
pub mod models;
pub mod services;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
