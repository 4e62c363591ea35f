use std::time::Duration;

use reqwest::Client;

/// Fixed upstream timeout for provider calls (§4.2 invoke contract, item 3).
pub const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(120);

pub(super) fn default_http_client_builder() -> reqwest::ClientBuilder {
    Client::builder()
        .timeout(UPSTREAM_TIMEOUT)
        .tcp_nodelay(true)
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .pool_idle_timeout(Some(Duration::from_secs(5)))
}

pub(super) fn http_client() -> reqwest::Client {
    default_http_client_builder().build().expect("default HTTP client configuration is always valid")
}
