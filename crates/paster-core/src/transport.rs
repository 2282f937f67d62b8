//! Blocking HTTP transport used by fetch workers.
//!
//! `Transport` is the seam between the coordinator and the network: one
//! instance per worker, never shared. `CurlTransport` wraps a single libcurl
//! Easy handle so connections are reused across a worker's requests.

use std::str;
use std::time::Duration;
use url::Url;

use crate::config::HttpConfig;
use crate::retry::FetchError;

/// One completed HTTP exchange.
#[derive(Debug, Clone, Default)]
pub struct Response {
    pub status: u32,
    /// Header fields of the final response, in arrival order.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Response {
    /// Value of the last header named `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Performs one blocking GET and returns status, headers and body.
pub trait Transport {
    fn get(&mut self, url: &Url) -> Result<Response, FetchError>;
}

/// Split raw header lines into fields. A status line starts a new header
/// block, so only the final response's fields survive redirects.
pub(crate) fn parse_header_lines(lines: &[String]) -> Vec<(String, String)> {
    let mut fields = Vec::new();
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with("HTTP/") {
            fields.clear();
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            fields.push((name.trim().to_string(), value.trim().to_string()));
        }
    }
    fields
}

/// libcurl transport: connect timeout, whole-request deadline, redirects followed.
pub struct CurlTransport {
    easy: curl::easy::Easy,
}

impl CurlTransport {
    pub fn new(http: &HttpConfig) -> Result<Self, FetchError> {
        let mut easy = curl::easy::Easy::new();
        easy.follow_location(true).map_err(FetchError::Curl)?;
        easy.connect_timeout(Duration::from_secs(http.connect_timeout_secs))
            .map_err(FetchError::Curl)?;
        easy.timeout(Duration::from_secs(http.request_timeout_secs))
            .map_err(FetchError::Curl)?;
        easy.useragent(&http.user_agent).map_err(FetchError::Curl)?;
        Ok(Self { easy })
    }
}

impl Transport for CurlTransport {
    fn get(&mut self, url: &Url) -> Result<Response, FetchError> {
        let mut header_lines: Vec<String> = Vec::new();
        let mut body: Vec<u8> = Vec::new();

        self.easy.url(url.as_str()).map_err(FetchError::Curl)?;
        self.easy.get(true).map_err(FetchError::Curl)?;
        {
            let mut transfer = self.easy.transfer();
            transfer
                .header_function(|data| {
                    if let Ok(s) = str::from_utf8(data) {
                        header_lines.push(s.trim_end().to_string());
                    }
                    true
                })
                .map_err(FetchError::Curl)?;
            transfer
                .write_function(|data| {
                    body.extend_from_slice(data);
                    Ok(data.len())
                })
                .map_err(FetchError::Curl)?;
            transfer.perform().map_err(FetchError::Curl)?;
        }

        let status = self.easy.response_code().map_err(FetchError::Curl)?;
        Ok(Response {
            status,
            headers: parse_header_lines(&header_lines),
            body,
        })
    }
}
