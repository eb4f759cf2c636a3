//! Full request decomposition.
//!
//! Splits raw request text into method, scheme, host, port, path, version
//! and headers, and renders it back. The serving path does not use this;
//! it reads only the request line. Tooling and tests that need the whole
//! request do.

use std::fmt;
use std::str::FromStr;

/// Port assumed when the target names none.
const DEFAULT_PORT: &str = "80";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty request")]
    Empty,
    #[error("request line needs method, target and version: '{0}'")]
    IncompleteRequestLine(String),
    #[error("only GET is supported, got {0}")]
    UnsupportedMethod(String),
    #[error("invalid request target: {0}")]
    InvalidTarget(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedHeader {
    pub key: String,
    pub value: String,
}

impl ParsedHeader {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A GET request in absolute form, decomposed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRequest {
    pub method: String,
    /// `http` or `https`.
    pub scheme: String,
    pub host: String,
    /// Port as written, `"80"` when absent.
    pub port: String,
    /// Path including any query, `"/"` when absent.
    pub path: String,
    pub version: String,
    pub headers: Vec<ParsedHeader>,
}

struct Target<'a> {
    scheme: &'a str,
    host: &'a str,
    port: Option<&'a str>,
    path: Option<&'a str>,
}

/// Find the first `http[s]://host[:port][/path]` in `target`.
///
/// Only the leading match counts: a port keeps its leading digits and
/// anything after the host that is neither a port nor a `/` path is
/// ignored, so `http://a:80x` names host `a` on port 80.
fn split_target(target: &str) -> Result<Target<'_>, ParseError> {
    target
        .match_indices("http")
        .find_map(|(start, _)| target_at(&target[start..]))
        .ok_or_else(|| ParseError::InvalidTarget(target.to_string()))
}

fn target_at(s: &str) -> Option<Target<'_>> {
    let (scheme, rest) = if let Some(rest) = s.strip_prefix("https://") {
        ("https", rest)
    } else {
        ("http", s.strip_prefix("http://")?)
    };

    let host_end = rest.find(['/', ':']).unwrap_or(rest.len());
    if host_end == 0 {
        return None;
    }
    let (host, mut rest) = rest.split_at(host_end);

    let mut port = None;
    if let Some(after_colon) = rest.strip_prefix(':') {
        let digits_end = after_colon
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(after_colon.len());
        if digits_end > 0 {
            port = Some(&after_colon[..digits_end]);
            rest = &after_colon[digits_end..];
        }
    }

    Some(Target {
        scheme,
        host,
        port,
        path: rest.starts_with('/').then_some(rest),
    })
}

impl ParsedRequest {
    /// Decompose raw request text.
    ///
    /// Header lines without a colon are skipped; parsing stops at the first
    /// blank line.
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let mut lines = raw.split('\n').map(|line| line.trim_end_matches('\r'));

        let request_line = lines
            .by_ref()
            .find(|line| !line.trim().is_empty())
            .ok_or(ParseError::Empty)?;

        let tokens: Vec<&str> = request_line.split_whitespace().collect();
        let [method, target, version] = tokens[..] else {
            return Err(ParseError::IncompleteRequestLine(request_line.to_string()));
        };

        if method != "GET" {
            return Err(ParseError::UnsupportedMethod(method.to_string()));
        }

        let target = split_target(target)?;

        let headers = lines
            .take_while(|line| !line.trim().is_empty())
            .filter_map(|line| line.split_once(':'))
            .map(|(key, value)| ParsedHeader::new(key.trim(), value.trim()))
            .collect();

        Ok(Self {
            method: method.to_string(),
            scheme: target.scheme.to_string(),
            host: target.host.to_string(),
            port: target.port.unwrap_or(DEFAULT_PORT).to_string(),
            path: target.path.unwrap_or("/").to_string(),
            version: version.to_string(),
            headers,
        })
    }

    /// Render the request back to text, ending with a blank line.
    pub fn unparse(&self) -> String {
        let mut out = format!("{} {}://{}", self.method, self.scheme, self.host);
        if self.port != DEFAULT_PORT {
            out.push(':');
            out.push_str(&self.port);
        }
        out.push_str(&self.path);
        out.push(' ');
        out.push_str(&self.version);
        out.push_str("\r\n");
        out.push_str(&self.unparse_headers());
        out
    }

    /// Render only the header block, ending with a blank line.
    pub fn unparse_headers(&self) -> String {
        let mut out = String::new();
        for header in &self.headers {
            out.push_str(&header.key);
            out.push_str(": ");
            out.push_str(&header.value);
            out.push_str("\r\n");
        }
        out.push_str("\r\n");
        out
    }

    pub fn total_len(&self) -> usize {
        self.unparse().len()
    }

    pub fn headers_len(&self) -> usize {
        self.unparse_headers().len()
    }

    /// First header named `key`, compared case-insensitively.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.key.eq_ignore_ascii_case(key))
            .map(|h| h.value.as_str())
    }

    /// Replace the first header named `key`, or append one.
    pub fn set_header(&mut self, key: &str, value: &str) {
        match self
            .headers
            .iter_mut()
            .find(|h| h.key.eq_ignore_ascii_case(key))
        {
            Some(header) => header.value = value.to_string(),
            None => self.headers.push(ParsedHeader::new(key, value)),
        }
    }

    /// Remove every header named `key`. Returns whether any was present.
    pub fn remove_header(&mut self, key: &str) -> bool {
        let before = self.headers.len();
        self.headers.retain(|h| !h.key.eq_ignore_ascii_case(key));
        self.headers.len() != before
    }
}

impl FromStr for ParsedRequest {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ParsedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.unparse())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = "GET http://www.example.com:8080/index.html?q=1 HTTP/1.1\r\n\
                       Host: www.example.com:8080\r\n\
                       Accept: text/html\r\n\
                       \r\n";

    #[test]
    fn parses_all_parts() {
        let req = ParsedRequest::parse(RAW).unwrap();
        assert_eq!(req.method, "GET");
        assert_eq!(req.scheme, "http");
        assert_eq!(req.host, "www.example.com");
        assert_eq!(req.port, "8080");
        assert_eq!(req.path, "/index.html?q=1");
        assert_eq!(req.version, "HTTP/1.1");
        assert_eq!(
            req.headers,
            vec![
                ParsedHeader::new("Host", "www.example.com:8080"),
                ParsedHeader::new("Accept", "text/html"),
            ]
        );
    }

    #[test]
    fn unparse_reproduces_canonical_text() {
        let req: ParsedRequest = RAW.parse().unwrap();
        assert_eq!(req.unparse(), RAW);
        assert_eq!(req.to_string(), RAW);
        assert_eq!(req.total_len(), RAW.len());
        assert_eq!(
            req.unparse_headers(),
            "Host: www.example.com:8080\r\nAccept: text/html\r\n\r\n"
        );
        assert_eq!(req.headers_len(), req.unparse_headers().len());
    }

    #[test]
    fn defaults_port_and_path() {
        let req = ParsedRequest::parse("GET https://example.com HTTP/1.0\r\n\r\n").unwrap();
        assert_eq!(req.scheme, "https");
        assert_eq!(req.port, "80");
        assert_eq!(req.path, "/");
        assert!(req.headers.is_empty());
        assert_eq!(req.unparse(), "GET https://example.com/ HTTP/1.0\r\n\r\n");
    }

    #[test]
    fn skips_headers_without_colon_and_stops_at_blank_line() {
        let raw = "GET http://a/ HTTP/1.1\r\nnot a header\r\nX-One: 1\r\n\r\nX-Two: 2\r\n";
        let req = ParsedRequest::parse(raw).unwrap();
        assert_eq!(req.headers, vec![ParsedHeader::new("X-One", "1")]);
    }

    #[test]
    fn rejects_non_get() {
        assert_eq!(
            ParsedRequest::parse("POST http://a/ HTTP/1.1\r\n\r\n"),
            Err(ParseError::UnsupportedMethod("POST".into()))
        );
    }

    #[test]
    fn rejects_malformed_request_lines() {
        assert_eq!(ParsedRequest::parse(""), Err(ParseError::Empty));
        assert_eq!(ParsedRequest::parse("\r\n\r\n"), Err(ParseError::Empty));
        assert!(matches!(
            ParsedRequest::parse("GET http://a/\r\n"),
            Err(ParseError::IncompleteRequestLine(_))
        ));
        for target in ["/index.html", "ftp://a/", "http://", "http:///a", "HTTP://a/"] {
            let raw = format!("GET {} HTTP/1.1\r\n\r\n", target);
            assert_eq!(
                ParsedRequest::parse(&raw),
                Err(ParseError::InvalidTarget(target.to_string())),
                "target {}",
                target
            );
        }
    }

    #[test]
    fn takes_leading_match_of_target() {
        let cases = [
            ("http://a:80x", "a", "80", "/"),
            ("http://a:/x", "a", "80", "/"),
            ("http://a?q", "a?q", "80", "/"),
            ("http://a:8080?q", "a", "8080", "/"),
            ("xhttp://b:81/p", "b", "81", "/p"),
            ("http:///skip/http://c/d", "c", "80", "/d"),
        ];
        for (target, host, port, path) in cases {
            let raw = format!("GET {} HTTP/1.1\r\n\r\n", target);
            let request = ParsedRequest::parse(&raw).unwrap();
            assert_eq!(
                (request.host.as_str(), request.port.as_str(), request.path.as_str()),
                (host, port, path),
                "target {}",
                target
            );
        }
    }

    #[test]
    fn header_editing() {
        let mut req = ParsedRequest::parse(RAW).unwrap();
        assert_eq!(req.header("accept"), Some("text/html"));

        req.set_header("ACCEPT", "*/*");
        req.set_header("Connection", "close");
        assert_eq!(req.header("Accept"), Some("*/*"));
        assert_eq!(req.headers.len(), 3);

        assert!(req.remove_header("host"));
        assert!(!req.remove_header("host"));
        assert_eq!(
            req.unparse_headers(),
            "Accept: */*\r\nConnection: close\r\n\r\n"
        );
    }
}
