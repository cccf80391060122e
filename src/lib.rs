//! `wandersim`: a Monte-Carlo random-walk simulation on a 2D grid, driven
//! over a local control-plane protocol (client/server, Unix domain socket).

pub mod aggregate;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod grid;
pub mod logging;
pub mod persistence;
pub mod pool;
pub mod rng;
pub mod server;
pub mod simulation;
pub mod snapshot;
pub mod trajectory;
pub mod wire;
