pub mod config;
pub mod db;
pub mod error;
pub mod sensor_cache;
pub mod sensors;
pub mod status;
pub mod thingworx;

#[cfg(test)]
mod test_support;
