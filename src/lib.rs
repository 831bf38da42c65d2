#[macro_use]
extern crate async_trait;

#[cfg(test)]
pub(crate) mod test_util;

pub mod configuration;
pub mod db;
pub mod generate;
pub mod run;
pub mod sample_cache;
pub mod session;
pub mod settings;
pub mod stats;
pub mod workload;
