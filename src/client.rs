use crate::config::HttpClientConfig;

/// Builds the tuned request executor shared by all runs.
///
/// reqwest pools per host, so the global idle cap folds into the
/// per-host cap; the TLS-handshake and expect-continue ceilings are
/// covered by the connect and request timeouts.
pub fn build(cfg: &HttpClientConfig) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .pool_max_idle_per_host(cfg.max_idle_conns_per_host.min(cfg.max_idle_conns))
        .pool_idle_timeout(cfg.idle_conn_timeout)
        .connect_timeout(cfg.dial_timeout)
        .tcp_keepalive(cfg.keep_alive)
        .timeout(cfg.request_timeout)
        .gzip(!cfg.disable_compression)
        .build()
}

/// Executor with the documented defaults applied.
pub fn default_client() -> reqwest::Result<reqwest::Client> {
    build(&HttpClientConfig::default())
}
