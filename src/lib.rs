pub mod book;
pub mod config;
pub mod constants;
pub mod enemy;
pub mod engine;
pub mod fade;
pub mod floater;
pub mod interaction;
pub mod level;
pub mod locomotion;
pub mod logging;
pub mod look;
pub mod nav;
pub mod perception;
pub mod player;
pub mod rng;
pub mod server_protocol;
pub mod start_screen;
pub mod time_store;
pub mod timer;
pub mod trigger;
pub mod types;
