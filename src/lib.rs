pub mod config;
pub mod db;
pub mod environment;
pub mod errors;
pub mod io;
pub mod lifecycle;
pub mod recording;
pub mod routes;
pub mod service;
pub mod store;
pub mod summarize;
pub mod urls;
