use std::str::FromStr;
use std::time::Duration;

/// Runtime configuration, read from the environment with defaults.
///
/// Missing or malformed values fall back to the default rather than
/// aborting startup.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub application: ApplicationConfig,
    pub http_client: HttpClientConfig,
}

#[derive(Debug, Clone)]
pub struct ApplicationConfig {
    /// REST listen port.
    pub port: u16,
}

/// Tuning knobs for the shared request executor.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub max_idle_conns: usize,
    pub max_idle_conns_per_host: usize,
    pub idle_conn_timeout: Duration,
    pub disable_compression: bool,
    pub dial_timeout: Duration,
    pub keep_alive: Duration,
    pub tls_handshake_timeout: Duration,
    pub expect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self { port: 8778 }
    }
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            max_idle_conns: 10_000,
            max_idle_conns_per_host: 10_000,
            idle_conn_timeout: Duration::from_secs(90),
            disable_compression: false,
            dial_timeout: Duration::from_secs(5),
            keep_alive: Duration::from_secs(30),
            tls_handshake_timeout: Duration::from_secs(5),
            expect_timeout: Duration::from_secs(1),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    pub fn load() -> Self {
        Self {
            application: ApplicationConfig {
                port: env_or("APPLICATION_PORT", 8778),
            },
            http_client: HttpClientConfig {
                max_idle_conns: env_or("HTTP_MAX_IDLE_CONNS", 10_000),
                max_idle_conns_per_host: env_or("HTTP_MAX_IDLE_CONNS_PER_HOST", 10_000),
                idle_conn_timeout: env_duration_or("HTTP_IDLE_CONN_TIMEOUT", Duration::from_secs(90)),
                disable_compression: env_or("HTTP_DISABLE_COMPRESSION", false),
                dial_timeout: env_duration_or("HTTP_DIAL_TIMEOUT", Duration::from_secs(5)),
                keep_alive: env_duration_or("HTTP_KEEPALIVE", Duration::from_secs(30)),
                tls_handshake_timeout: env_duration_or("HTTP_TLS_HANDSHAKE_TIMEOUT", Duration::from_secs(5)),
                expect_timeout: env_duration_or("HTTP_EXPECT_TIMEOUT", Duration::from_secs(1)),
                request_timeout: env_duration_or("HTTP_REQUEST_TIMEOUT", Duration::from_secs(10)),
            },
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(value) => value.parse().unwrap_or(default),
        Err(_) => default,
    }
}

fn env_duration_or(key: &str, default: Duration) -> Duration {
    match std::env::var(key) {
        Ok(value) => humantime::parse_duration(&value).unwrap_or(default),
        Err(_) => default,
    }
}
