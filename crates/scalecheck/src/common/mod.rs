pub mod cli;
pub mod env;
pub mod error;
pub mod setup;
pub mod utils;
