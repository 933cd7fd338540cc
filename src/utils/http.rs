use reqwest::Client;
use std::time::Duration;

const USER_AGENT: &str = concat!("certimate-rs/", env!("CARGO_PKG_VERSION"));

/// Create a standardized HTTP client for vendor and notifier calls
pub fn create_http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent(USER_AGENT)
        .use_rustls_tls() // Use rustls with system certificate store
        .build()
}
