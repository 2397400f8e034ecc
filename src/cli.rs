//! CLI for this application
//!
use crate::settings;

#[derive(Clone, Debug, clap::Parser)]
#[command(name = settings::APP_NAME, version = settings::APP_VERSION, about)]
pub struct Cli {
    // HTTP + WebSocket listen port
    #[clap(
        long,
        default_value = settings::DEFAULT_PORT,
        env("PORT"),
        help = "Port to bind the relay to"
    )]
    pub listen_port: u16,
}

impl Cli {
    pub fn into_settings(self) -> settings::Settings {
        settings::Settings {
            listen_port: self.listen_port,
            ..settings::Settings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn explicit_port_flows_into_settings() {
        let cli = Cli::try_parse_from(["murmur", "--listen-port", "4100"]).unwrap();
        let settings = cli.into_settings();
        assert_eq!(settings.listen_port, 4100);
        assert_eq!(settings.listen_address, settings::DEFAULT_LISTEN_ADDRESS);
        assert_eq!(settings.max_text_chars, settings::DEFAULT_MAX_TEXT_CHARS);
    }

    #[test]
    fn invalid_port_is_rejected() {
        assert!(Cli::try_parse_from(["murmur", "--listen-port", "not-a-port"]).is_err());
    }
}
