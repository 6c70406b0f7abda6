//! services/api/src/lib.rs

pub mod adapters;
pub mod config;
pub mod error;
pub mod music;
pub mod report;
pub mod web;
