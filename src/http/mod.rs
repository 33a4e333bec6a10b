//! HTTP client shared by the crawler and test modules

mod client;

pub use client::HttpClient;
