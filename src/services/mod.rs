// src/services/mod.rs
pub mod adapter;
pub mod artifacts;
pub mod cascade;
pub mod correlation;
pub mod cross_asset;
pub mod heat;
pub mod http;
pub mod numeric;
pub mod odds;
pub mod percentile;
pub mod prices;
pub mod report;
pub mod vix;
