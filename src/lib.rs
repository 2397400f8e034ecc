pub mod api;
pub mod cli;
pub mod connection;
pub mod error;
pub mod identity;
pub mod limiters;
pub mod presence;
pub mod protocol;
pub mod relay;
pub mod settings;
