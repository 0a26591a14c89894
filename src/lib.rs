pub mod config;
pub mod display;
pub mod extract;
pub mod feed;
pub mod picks;
pub mod pipeline;
