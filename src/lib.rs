pub mod api;
pub mod booking;
pub mod cache;
pub mod clock;
pub mod config;
pub mod limits;
pub mod model;
pub mod observability;
pub mod service;
pub mod session;
pub mod sweeper;
pub mod wire;
