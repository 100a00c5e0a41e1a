pub mod app;
pub mod catalog;
pub mod config;
pub mod models;
pub mod playback;
pub mod render;
pub mod tmdb;
