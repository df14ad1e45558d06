use reqwest::Client;
use std::time::Duration;

pub fn new_api_client() -> Client {
    Client::builder()
        // The router lives on the LAN: it either answers fast or is down.
        // Bounded timeouts keep dashboard widgets from wedging on a dead device.
        .timeout(Duration::from_secs(10))
        .connect_timeout(Duration::from_secs(5))
        .pool_idle_timeout(Some(Duration::from_secs(60)))
        .build()
        .expect("Failed to build HTTP client")
}
