//! Low-level HTTP transport.
//!
//! The rest of the crate talks to the server exclusively through the
//! [`RestClient`] trait; [`HttpRestClient`] is the reqwest-backed
//! implementation. URLs handed to the trait are relative to the service base
//! and already fully constructed (including the query string) by the entity
//! layer.

use std::collections::HashMap;

use async_trait::async_trait;

use super::RestError;

/// Request headers.
pub type Headers = HashMap<String, String>;

/// Opaque HTTP transport.
///
/// Implementations map HTTP outcomes onto [`RestError`]: 404 becomes
/// [`RestError::NotFound`], 401/403 become [`RestError::Authentication`],
/// any other non-2xx status becomes [`RestError::Status`].
#[async_trait]
pub trait RestClient: Send + Sync {
    /// Issue a GET request.
    async fn get(&self, url: &str, headers: &Headers) -> Result<Option<String>, RestError>;
    /// Issue a POST request with the given body.
    async fn post(
        &self,
        url: &str,
        headers: &Headers,
        body: &str,
    ) -> Result<Option<String>, RestError>;
    /// Issue a PUT request with the given body.
    async fn put(
        &self,
        url: &str,
        headers: &Headers,
        body: &str,
    ) -> Result<Option<String>, RestError>;
    /// Issue a DELETE request.
    async fn delete(&self, url: &str, headers: &Headers) -> Result<Option<String>, RestError>;
}

/// Reqwest-backed [`RestClient`].
pub struct HttpRestClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRestClient {
    /// Create a transport for the given service base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        HttpRestClient {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn absolute(&self, url: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), url)
    }

    async fn execute(
        &self,
        mut request: reqwest::RequestBuilder,
        headers: &Headers,
    ) -> Result<Option<String>, RestError> {
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let response = request.send().await?;

        match response.status().as_u16() {
            404 => Err(RestError::NotFound),
            401 | 403 => Err(RestError::Authentication),
            code if !(200..300).contains(&code) => Err(RestError::Status { code }),
            _ => {
                let body = response.text().await?;
                Ok(if body.is_empty() { None } else { Some(body) })
            }
        }
    }
}

#[async_trait]
impl RestClient for HttpRestClient {
    async fn get(&self, url: &str, headers: &Headers) -> Result<Option<String>, RestError> {
        log::debug!("GET {url}");
        self.execute(self.client.get(self.absolute(url)), headers)
            .await
    }

    async fn post(
        &self,
        url: &str,
        headers: &Headers,
        body: &str,
    ) -> Result<Option<String>, RestError> {
        log::debug!("POST {url}");
        self.execute(
            self.client.post(self.absolute(url)).body(body.to_owned()),
            headers,
        )
        .await
    }

    async fn put(
        &self,
        url: &str,
        headers: &Headers,
        body: &str,
    ) -> Result<Option<String>, RestError> {
        log::debug!("PUT {url}");
        self.execute(
            self.client.put(self.absolute(url)).body(body.to_owned()),
            headers,
        )
        .await
    }

    async fn delete(&self, url: &str, headers: &Headers) -> Result<Option<String>, RestError> {
        log::debug!("DELETE {url}");
        self.execute(self.client.delete(self.absolute(url)), headers)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_url_joins_without_double_slash() {
        let client = HttpRestClient::new("https://api.example/");
        assert_eq!(client.absolute("mail/l1"), "https://api.example/mail/l1");

        let client = HttpRestClient::new("https://api.example");
        assert_eq!(client.absolute("mail/l1"), "https://api.example/mail/l1");
    }
}
