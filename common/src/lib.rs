pub mod alias;
pub mod config;
pub mod feed;
pub mod httpauth;
pub mod models;
pub mod utils;

pub use config::*;
pub use feed::*;
pub use utils::*;
