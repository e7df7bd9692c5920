// src/handlers/mod.rs
pub mod correlation;
pub mod error;
pub mod heat;
pub mod metrics;
pub mod odds;
pub mod pipeline;
pub mod report;
pub mod vix;
