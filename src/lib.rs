pub mod api;
pub mod config;
pub mod db;
pub mod device;
pub mod heater;
pub mod store;
pub mod sync;
