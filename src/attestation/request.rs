// src/attestation/request.rs
//! Outgoing request held by a protected task until it is sent

use crate::utils::errors::{GateError, Result};
use bytes::Bytes;
use hyper::header::{HeaderName, HeaderValue};
use hyper::{HeaderMap, Method, Uri};

/// Request a task will send once it is released
#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
}

impl OutgoingRequest {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Parse `url` into a GET request
    pub fn get(url: &str) -> Result<Self> {
        Self::parse(Method::GET, url)
    }

    pub fn parse(method: Method, url: &str) -> Result<Self> {
        let uri: Uri = url
            .parse()
            .map_err(|e| GateError::InvalidRequest(format!("invalid URL {}: {}", url, e)))?;
        Ok(Self::new(method, uri))
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        self.set_header(name, value)?;
        Ok(self)
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Lowercased host, if the URI has one
    pub fn host(&self) -> Option<String> {
        self.uri.host().map(|h| h.to_ascii_lowercase())
    }

    pub fn url(&self) -> String {
        self.uri.to_string()
    }

    /// Point the request at `url`, keeping method, headers and body
    pub fn set_url(&mut self, url: &str) -> Result<()> {
        self.uri = url
            .parse()
            .map_err(|e| GateError::InvalidRequest(format!("invalid URL {}: {}", url, e)))?;
        Ok(())
    }

    /// Header value as text; non-UTF-8 values read as absent
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Set a header, replacing any existing values
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<()> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| GateError::InvalidRequest(format!("invalid header name {}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| GateError::InvalidRequest(format!("invalid value for {}: {}", name, e)))?;
        self.headers.insert(name, value);
        Ok(())
    }
}
