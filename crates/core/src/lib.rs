pub mod config;
pub mod error;
pub mod item;

pub use config::Config;
pub use error::*;
pub use item::*;
