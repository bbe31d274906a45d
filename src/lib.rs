// src/lib.rs

//! Goal timeline crawler and range-bucketed report engine.

pub mod engine;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
