pub mod common;
pub mod database;
pub mod deploy;
pub mod poll;
pub mod scenario;
pub mod scheduler;
pub mod stage;
pub mod terraform;
pub mod tool;

#[cfg(test)]
pub(crate) mod tests;

pub type Error = crate::common::error::HarnessError;
pub type Result<T> = std::result::Result<T, Error>;

pub const SCALECHECK_VERSION: &str = {
    match option_env!("SCALECHECK_BUILD_VERSION") {
        Some(version) => version,
        None => const_format::concatcp!(env!("CARGO_PKG_VERSION"), "-dev"),
    }
};
