pub mod client_ip;
pub mod config;
pub mod db;
pub mod errors;
pub mod geocode;
pub mod ipinfo;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod rest;
pub mod store;
pub mod validate;
