//! Murmur application settings
use std::net::{IpAddr, SocketAddr, TcpListener};
use std::time::Duration;

use crate::error::Result;

pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const STANDARD_PORT: u16 = 3000;
pub const DEFAULT_PORT: &str = "3000";
pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0";

pub const DEFAULT_WINDOW_SECONDS: u64 = 30;
pub const DEFAULT_MAX_MESSAGES_PER_WINDOW: u32 = 10;
pub const DEFAULT_MAX_TEXT_CHARS: usize = 500;

/// Events buffered per connection before new ones are dropped for it
pub const OUTBOX_CAPACITY: usize = 256;

/// Limits applied by the fixed-window admission controller
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdmissionSettings {
    pub max_messages_per_window: u32,
    pub window: Duration,
}

impl Default for AdmissionSettings {
    fn default() -> Self {
        Self {
            max_messages_per_window: DEFAULT_MAX_MESSAGES_PER_WINDOW,
            window: Duration::from_secs(DEFAULT_WINDOW_SECONDS),
        }
    }
}

/// Everything the broadcast relay needs to validate a message
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelaySettings {
    pub admission: AdmissionSettings,
    pub max_text_chars: usize,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            admission: AdmissionSettings::default(),
            max_text_chars: DEFAULT_MAX_TEXT_CHARS,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Settings {
    // Server listen address
    pub listen_address: String,

    // HTTP + WebSocket listen port
    pub listen_port: u16,

    // Rate limit settings: max messages (over window)
    pub max_messages_per_window: u32,

    // Rate limit settings: window length in seconds
    pub window_seconds: u64,

    // Longest accepted message body, in characters
    pub max_text_chars: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listen_address: DEFAULT_LISTEN_ADDRESS.to_string(),
            listen_port: STANDARD_PORT,
            max_messages_per_window: DEFAULT_MAX_MESSAGES_PER_WINDOW,
            window_seconds: DEFAULT_WINDOW_SECONDS,
            max_text_chars: DEFAULT_MAX_TEXT_CHARS,
        }
    }
}

impl Settings {
    pub fn socket_address(&self) -> Result<SocketAddr> {
        let listen_address: IpAddr = self.listen_address.parse()?;
        Ok(SocketAddr::from((listen_address, self.listen_port)))
    }

    /// Bind the listen socket; failures surface as `RelayError::Io`
    pub fn bind(&self) -> Result<TcpListener> {
        Ok(TcpListener::bind(self.socket_address()?)?)
    }

    pub fn admission_settings(&self) -> AdmissionSettings {
        AdmissionSettings {
            max_messages_per_window: self.max_messages_per_window,
            window: Duration::from_secs(self.window_seconds),
        }
    }

    pub fn relay_settings(&self) -> RelaySettings {
        RelaySettings {
            admission: self.admission_settings(),
            max_text_chars: self.max_text_chars,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RelayError;

    #[test]
    fn default_port_string_matches_number() {
        assert_eq!(DEFAULT_PORT.parse::<u16>().unwrap(), STANDARD_PORT);
    }

    #[test]
    fn bind_reports_taken_port_as_io_error() {
        let settings = Settings {
            listen_address: "127.0.0.1".to_string(),
            listen_port: 0,
            ..Settings::default()
        };
        let first = settings.bind().unwrap();
        let taken = Settings {
            listen_port: first.local_addr().unwrap().port(),
            ..settings
        };
        assert!(matches!(taken.bind(), Err(RelayError::Io(_))));
    }

    #[test]
    fn defaults_match_documented_limits() {
        let settings = Settings::default();
        assert_eq!(settings.listen_port, 3000);

        let relay = settings.relay_settings();
        assert_eq!(relay, RelaySettings::default());
        assert_eq!(relay.admission.max_messages_per_window, 10);
        assert_eq!(relay.admission.window, Duration::from_secs(30));
        assert_eq!(relay.max_text_chars, 500);
    }

    #[test]
    fn socket_address_rejects_garbage_host() {
        let settings = Settings {
            listen_address: "localhost-ish".to_string(),
            ..Settings::default()
        };
        assert!(settings.socket_address().is_err());

        let settings = Settings {
            listen_address: "127.0.0.1".to_string(),
            listen_port: 4100,
            ..Settings::default()
        };
        assert_eq!(
            settings.socket_address().unwrap(),
            "127.0.0.1:4100".parse::<SocketAddr>().unwrap()
        );
    }
}
