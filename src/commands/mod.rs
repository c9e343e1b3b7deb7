pub mod capture;
pub mod config;

pub use capture::*;
pub use config::*;
