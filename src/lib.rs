pub mod cache;
pub mod config;
pub mod deck;
pub mod error;
pub mod exec;
pub mod highlight;
pub mod logging;
pub mod pipeline;
pub mod render;
pub mod style;
pub mod tui;
