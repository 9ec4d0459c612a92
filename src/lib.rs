pub mod attachment;
pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod error;
pub mod event;
pub mod logging;
pub mod pool;
pub mod snapshot;
pub mod tmux;
pub mod tui;
