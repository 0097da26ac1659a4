//! HTTP transport and query string helpers

use std::time::Duration;

use crate::error::ApiError;

/// Blocking HTTP GET returning the response body.
pub trait HttpClient: Send + Sync {
    fn get(&self, url: &str) -> Result<String, ApiError>;
}

/// Default transport backed by a shared ureq agent
pub struct UreqClient {
    agent: ureq::Agent,
    user_agent: String,
}

impl UreqClient {
    pub fn new(user_agent: &str) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(60)))
            .timeout_connect(Some(Duration::from_secs(30)))
            .max_idle_connections(4)
            .max_idle_connections_per_host(2)
            .build()
            .new_agent();

        Self {
            agent,
            user_agent: user_agent.to_string(),
        }
    }
}

impl HttpClient for UreqClient {
    fn get(&self, url: &str) -> Result<String, ApiError> {
        let mut response = self
            .agent
            .get(url)
            .header("User-Agent", &self.user_agent)
            .call()
            .map_err(|e| ApiError::Transport(format!("Request failed: {}", e)))?;

        response
            .body_mut()
            .read_to_string()
            .map_err(|e| ApiError::Transport(format!("Read failed: {}", e)))
    }
}

/// URL-encode a string for use as a query value
pub fn url_encode(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

/// Build `k1=v1&k2=v2...` with encoded values, optionally followed by the
/// session id.
pub fn build_query(params: &[(&str, String)], session_id: Option<&str>) -> String {
    let mut query = params
        .iter()
        .map(|(key, value)| format!("{}={}", key, url_encode(value)))
        .collect::<Vec<_>>()
        .join("&");

    if let Some(session_id) = session_id {
        if !query.is_empty() {
            query.push('&');
        }
        query.push_str("PHPSESSID=");
        query.push_str(session_id);
    }

    query
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_encode() {
        assert_eq!(url_encode("2024-01-15 12:00"), "2024-01-15+12%3A00");
        assert_eq!(url_encode("description,poster"), "description%2Cposter");
        assert_eq!(url_encode("a-b_c.d"), "a-b_c.d");
    }

    #[test]
    fn test_build_query() {
        let params = [("pin", "1234".to_string()), ("format", "m3u8".to_string())];
        assert_eq!(build_query(&params, None), "pin=1234&format=m3u8");
        assert_eq!(build_query(&params, Some("abc")), "pin=1234&format=m3u8&PHPSESSID=abc");
        assert_eq!(build_query(&[], Some("abc")), "PHPSESSID=abc");
    }
}
