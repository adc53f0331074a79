pub mod api;
pub mod attendance;
pub mod capacity;
pub mod config;
pub mod error;
pub mod live;
pub mod models;
pub mod roster;
pub mod scope;
pub mod services;
