//! HTTP request handlers.

pub mod download;
pub mod health;
pub mod pipeline;
pub mod podcasts;

pub use health::health;
