//! All Paths are recorded here for use throughout this codebase
pub mod base {
    pub const ROOT: &str = "/";
    pub const HEALTH: &str = "/health";
    pub const ABOUT: &str = "/about";
}

pub mod relay {
    pub const SOCKET: &str = "/ws";
    pub const STATS: &str = "/stats";
}
