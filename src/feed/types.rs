use scraper::Html;
use std::fmt;
use thiserror::Error;

/// Protocol tag of a proxy candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    fn scheme(self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

/// A network egress point (proxy) that requests can be routed through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EgressPoint {
    pub address: String,
    pub protocol: Protocol,
}

impl EgressPoint {
    /// Parse one line of a proxy list. Blank lines and `#` comments yield None.
    /// The protocol is https whenever the line mentions it, http otherwise.
    pub fn parse(line: &str) -> Option<Self> {
        let address = line.trim();
        if address.is_empty() || address.starts_with('#') {
            return None;
        }
        let protocol = if address.contains("https") {
            Protocol::Https
        } else {
            Protocol::Http
        };
        Some(Self {
            address: address.to_string(),
            protocol,
        })
    }

    /// Proxy URL including the scheme.
    pub fn url(&self) -> String {
        if self.address.contains("://") {
            self.address.clone()
        } else {
            format!("{}://{}", self.protocol.scheme(), self.address)
        }
    }

    pub fn to_proxy(&self) -> reqwest::Result<reqwest::Proxy> {
        reqwest::Proxy::all(self.url())
    }
}

impl fmt::Display for EgressPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

/// A fetched page whose body parsed into an HTML tree.
#[derive(Debug)]
pub struct Document {
    url: String,
    html: Html,
}

impl Document {
    /// Parse a response body. Blank bodies and bodies with no markup at all
    /// are rejected; anything else goes through the HTML5 parser.
    pub fn parse(url: &str, body: &str) -> Result<Self, FetchError> {
        if body.trim().is_empty() {
            return Err(FetchError::Parse {
                url: url.to_string(),
                reason: "empty body".to_string(),
            });
        }
        if !body.contains('<') {
            return Err(FetchError::Parse {
                url: url.to_string(),
                reason: "body contains no markup".to_string(),
            });
        }
        Ok(Self {
            url: url.to_string(),
            html: Html::parse_document(body),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn html(&self) -> &Html {
        &self.html
    }
}

/// Why a page could not be fetched.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("unparseable body from {url}: {reason}")]
    Parse { url: String, reason: String },

    #[error("gave up on {url} after {attempts} attempts: {last}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last: Box<FetchError>,
    },
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            FetchError::Transport { url, .. }
            | FetchError::Status { url, .. }
            | FetchError::Parse { url, .. }
            | FetchError::RetriesExhausted { url, .. } => url,
        }
    }
}
