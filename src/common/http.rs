use std::time::Duration;

use reqwest::{Client, Error};

pub struct HttpClient;

impl HttpClient {
    pub fn user_agent() -> String {
        format!("tunelink/{}", env!("CARGO_PKG_VERSION"))
    }

    pub fn new(timeout: Duration) -> Result<Client, Error> {
        Client::builder()
            .user_agent(Self::user_agent())
            .timeout(timeout)
            .build()
    }
}
