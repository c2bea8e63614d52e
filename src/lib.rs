// src/lib.rs

//! NovSU group roster crawler library

#[cfg(feature = "server")]
pub mod api;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
