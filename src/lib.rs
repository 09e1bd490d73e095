pub mod app;
pub mod config;
pub mod options;
pub mod path_detector;
pub mod process_monitor;
pub mod profile;
pub mod status;
pub mod supervisor;
pub mod utils;
