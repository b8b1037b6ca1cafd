// src/lib.rs

pub mod api_client;
pub mod config;
pub mod error;
pub mod feeds;
pub mod formatters;
pub mod poller;
pub mod state;
pub mod types;
pub mod view_model;
