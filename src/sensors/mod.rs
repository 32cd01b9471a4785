pub mod service;

pub use service::{refresh_sensor, RefreshReport, SensorFailure, SensorService, SensorUpdate};
