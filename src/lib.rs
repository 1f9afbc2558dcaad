pub mod config;
pub mod crl;
pub mod error;
pub mod monitor;
pub mod targets;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod test_utils;
