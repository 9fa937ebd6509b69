// Camera app core for a Raspberry Pi with a rotated touchscreen

pub mod app;
pub mod board;
pub mod config;
pub mod display;
pub mod drivers;
pub mod kernel;
pub mod scenes;
pub mod ui;
