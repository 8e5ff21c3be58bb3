use broker::manager::Settings;
use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
pub enum RustEnv {
    Development,
    Production,
    Staging,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RustEnvParseError;

impl FromStr for RustEnv {
    type Err = RustEnvParseError;
    fn from_str(level: &str) -> Result<RustEnv, Self::Err> {
        match level.to_lowercase().as_str() {
            "development" => Ok(RustEnv::Development),
            "production" => Ok(RustEnv::Production),
            "staging" => Ok(RustEnv::Staging),
            _ => Err(RustEnvParseError),
        }
    }
}

impl fmt::Display for RustEnv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RustEnv::Development => write!(f, "development"),
            RustEnv::Production => write!(f, "production"),
            RustEnv::Staging => write!(f, "staging"),
        }
    }
}

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// A list of full CORS origin URLs that allowed to receive server responses.
    #[arg(
        long,
        env,
        value_delimiter = ',',
        use_value_delimiter = true,
        default_value = "https://localhost:4000"
    )]
    pub allowed_origins: Vec<String>,

    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "127.0.0.1")]
    pub interface: Option<String>,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 4000)]
    pub port: u16,

    /// Milliseconds to wait for room in one consumer's queue before giving up on
    /// delivering a notification to it
    #[arg(long, env, default_value_t = 500)]
    pub send_timeout_ms: u64,

    /// Number of notifications buffered per consumer connection
    #[arg(long, env, default_value_t = 64)]
    pub outbound_queue_depth: usize,

    /// Name of the request header in which a trusted TLS-terminating proxy forwards
    /// the verified client certificate common name (e.g. X-SSL-Client-CN).
    /// When unset, only credentials attached by the TLS acceptor are honored.
    #[arg(long, env)]
    peer_identity_header: Option<String>,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,

    /// Set the Rust runtime environment to use.
    #[arg(
    short,
    long,
    env,
    default_value_t = RustEnv::Development,
    value_parser = clap::builder::PossibleValuesParser::new([
        "DEVELOPMENT", "PRODUCTION", "STAGING",
        "development", "production", "staging"
    ])
        .map(|s| s.parse::<RustEnv>().unwrap()),
    )]
    pub runtime_env: RustEnv,
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn listen_addr(&self) -> String {
        format!(
            "{}:{}",
            self.interface.as_deref().unwrap_or("127.0.0.1"),
            self.port
        )
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn peer_identity_header(&self) -> Option<&str> {
        self.peer_identity_header.as_deref()
    }

    /// Broker tunables derived from this configuration.
    pub fn broker_settings(&self) -> Settings {
        Settings {
            send_timeout: self.send_timeout(),
            queue_depth: self.outbound_queue_depth,
        }
    }

    pub fn runtime_env(&self) -> RustEnv {
        self.runtime_env.clone()
    }

    pub fn is_production(&self) -> bool {
        self.runtime_env() == RustEnv::Production
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        Config::try_parse_from(std::iter::once("edge_broker").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);

        assert_eq!(config.send_timeout(), Duration::from_millis(500));
        assert_eq!(config.outbound_queue_depth, 64);
        assert_eq!(config.log_level_filter, LevelFilter::Info);
        assert!(!config.is_production());
    }

    #[test]
    fn test_listen_addr() {
        let config = parse(&["--interface", "0.0.0.0", "--port", "8443"]);
        assert_eq!(config.listen_addr(), "0.0.0.0:8443");
    }

    #[test]
    fn test_broker_settings_follow_flags() {
        let config = parse(&["--send-timeout-ms", "25", "--outbound-queue-depth", "4"]);

        assert_eq!(
            config.broker_settings(),
            Settings {
                send_timeout: Duration::from_millis(25),
                queue_depth: 4,
            }
        );
    }

    #[test]
    fn test_peer_identity_header_is_optional() {
        let config = parse(&["--peer-identity-header", "x-ssl-client-cn"]);
        assert_eq!(config.peer_identity_header(), Some("x-ssl-client-cn"));
    }

    #[test]
    fn test_allowed_origins_are_comma_separated() {
        let config = parse(&["--allowed-origins", "https://a.edge,https://b.edge"]);
        assert_eq!(
            config.allowed_origins,
            vec!["https://a.edge".to_string(), "https://b.edge".to_string()]
        );
    }

    #[test]
    fn test_runtime_env_parsing() {
        assert_eq!("PRODUCTION".parse::<RustEnv>(), Ok(RustEnv::Production));
        assert_eq!("staging".parse::<RustEnv>(), Ok(RustEnv::Staging));
        assert_eq!("qa".parse::<RustEnv>(), Err(RustEnvParseError));
        assert_eq!(RustEnv::Development.to_string(), "development");
    }
}
