pub mod app;
pub mod braille;
pub mod config;
pub mod data;
pub mod error;
pub mod hash;
pub mod plot;
pub mod ui;
