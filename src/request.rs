use std::collections::HashMap;

use indexmap::IndexMap;

use crate::utils::Result;


const MODULE: &str = "REQUEST";

pub const NOT_UTF8_ERROR: &str = "request is not valid utf-8";
pub const INCOMPLETE_REQUEST_ERROR: &str = "incomplete request";
pub const BAD_REQUEST_LINE_ERROR: &str = "malformed request line";
pub const BAD_HEADER_ERROR: &str = "malformed header";
pub const BAD_QUERY_ERROR: &str = "malformed query string";

const HEADER_DELIMITER: &str = ": ";
const CONNECTION_HEADER: &str = "Connection";
const KEEP_ALIVE: &str = "keep-alive";
const HTTP_11: &str = "HTTP/1.1";


/// One parsed inbound HTTP message. Headers keep their insertion order so
/// that `serialize` reproduces the wire form for worker forwarding; a
/// repeated header key overwrites the earlier value in place.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub protocol: String,
    pub headers: IndexMap<String, String>,
    pub body: String,
}

impl Request {
    /// Parses a complete request buffer: a three-token request line, header
    /// lines each carrying exactly one `": "`, a blank separator line, then
    /// the body. A buffer without the blank separator is a framing error.
    pub fn parse(buffer: &[u8]) -> Result<Request> {
        let text = std::str::from_utf8(buffer).map_err(|e| {
            error!("[{}] Request is not valid utf-8: {}", MODULE, e);
            NOT_UTF8_ERROR
        })?;

        let lines: Vec<&str> = text.split("\r\n").collect();

        let request_line: Vec<&str> = lines[0].split(' ').collect();
        let (method, path, protocol) = match request_line[..] {
            [method, path, protocol] => (method, path, protocol),
            _ => {
                error!("[{}] Malformed request line: `{}`", MODULE, lines[0]);
                return Err(BAD_REQUEST_LINE_ERROR);
            }
        };

        let mut headers = IndexMap::new();
        let mut blank_at = None;
        for (i, line) in lines.iter().enumerate().skip(1) {
            if line.is_empty() {
                blank_at = Some(i);
                break;
            }
            if line.matches(HEADER_DELIMITER).count() != 1 {
                error!("[{}] Malformed header line: `{}`", MODULE, line);
                return Err(BAD_HEADER_ERROR);
            }
            let (key, value) = line.split_once(HEADER_DELIMITER).ok_or(BAD_HEADER_ERROR)?;
            headers.insert(key.to_string(), value.to_string());
        }

        // No blank separator means the header section never ended.
        let blank_at = blank_at.ok_or_else(|| {
            error!("[{}] Request has no header terminator", MODULE);
            INCOMPLETE_REQUEST_ERROR
        })?;

        let body = lines[blank_at + 1..].concat();

        Ok(Request {
            method: method.to_string(),
            path: path.to_string(),
            protocol: protocol.to_string(),
            headers,
            body,
        })
    }

    /// Reconstructs the wire form, as forwarded to worker processes.
    pub fn serialize(&self) -> Vec<u8> {
        let mut head = format!("{} {} {}", self.method, self.path, self.protocol);
        for (key, value) in &self.headers {
            head.push_str("\r\n");
            head.push_str(key);
            head.push_str(HEADER_DELIMITER);
            head.push_str(value);
        }
        format!("{}\r\n\r\n{}", head, self.body).into_bytes()
    }

    /// Query parameters from the path component after `?`. A pair without
    /// `=` is malformed; a repeated key keeps its last value.
    pub fn query(&self) -> Result<HashMap<String, String>> {
        let Some((_, query_string)) = self.path.split_once('?') else {
            return Ok(HashMap::new());
        };

        let mut query = HashMap::new();
        for pair in query_string.split('&') {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                error!("[{}] Malformed query pair `{}` in `{}`", MODULE, pair, self.path);
                BAD_QUERY_ERROR
            })?;
            query.insert(key.to_string(), value.to_string());
        }
        Ok(query)
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(|v| v.as_str())
    }

    /// Connection reuse decision: loop only on an explicit `keep-alive`;
    /// with no `Connection` header, HTTP/1.1 defaults to keep-alive and
    /// every other protocol version to close.
    pub fn keep_alive(&self) -> bool {
        match self.header(CONNECTION_HEADER) {
            Some(value) => value == KEEP_ALIVE,
            None => self.protocol == HTTP_11,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &[u8]) -> Request {
        Request::parse(raw).unwrap()
    }

    #[test]
    fn test_parse_simple_get() {
        let r = parse(b"GET / HTTP/1.1\r\n\r\n");
        assert_eq!(r.method, "GET");
        assert_eq!(r.path, "/");
        assert_eq!(r.protocol, "HTTP/1.1");
        assert!(r.headers.is_empty());
        assert_eq!(r.body, "");
    }

    #[test]
    fn test_parse_headers_in_order() {
        let r = parse(b"GET / HTTP/1.1\r\nHost: localhost\r\nAccept: */*\r\n\r\n");
        assert_eq!(r.header("Host"), Some("localhost"));
        assert_eq!(r.header("Accept"), Some("*/*"));
        let keys: Vec<&str> = r.headers.keys().map(String::as_str).collect();
        assert_eq!(keys, ["Host", "Accept"]);
    }

    #[test]
    fn test_parse_repeated_header_last_wins() {
        let r = parse(b"GET / HTTP/1.1\r\nX-Tag: a\r\nX-Tag: b\r\n\r\n");
        assert_eq!(r.header("X-Tag"), Some("b"));
        assert_eq!(r.headers.len(), 1);
    }

    #[test]
    fn test_parse_body_lines_are_concatenated() {
        let r = parse(b"POST /submit HTTP/1.0\r\nHost: x\r\n\r\nline one\r\nline two");
        assert_eq!(r.body, "line oneline two");
    }

    #[test]
    fn test_parse_missing_blank_separator() {
        let result = Request::parse(b"GET / HTTP/1.1\r\nHost: localhost");
        assert_eq!(result.err(), Some(INCOMPLETE_REQUEST_ERROR));
    }

    #[test]
    fn test_parse_bad_request_line() {
        let result = Request::parse(b"GET /\r\n\r\n");
        assert_eq!(result.err(), Some(BAD_REQUEST_LINE_ERROR));

        let result = Request::parse(b"GET / HTTP/1.1 extra\r\n\r\n");
        assert_eq!(result.err(), Some(BAD_REQUEST_LINE_ERROR));
    }

    #[test]
    fn test_parse_bad_header() {
        let result = Request::parse(b"GET / HTTP/1.1\r\nNoDelimiter\r\n\r\n");
        assert_eq!(result.err(), Some(BAD_HEADER_ERROR));

        let result = Request::parse(b"GET / HTTP/1.1\r\nX: a: b\r\n\r\n");
        assert_eq!(result.err(), Some(BAD_HEADER_ERROR));
    }

    #[test]
    fn test_serialize_then_reparse_is_stable() {
        let raw: &[u8] = b"POST /add?k=v HTTP/1.1\r\nHost: localhost\r\nX-Tag: t\r\n\r\npayload";
        let first = parse(raw);
        let second = parse(&first.serialize());

        assert_eq!(second.method, first.method);
        assert_eq!(second.path, first.path);
        assert_eq!(second.protocol, first.protocol);
        assert_eq!(second.headers, first.headers);
        assert_eq!(second.body, first.body);
        assert_eq!(second.serialize(), first.serialize());
    }

    #[test]
    fn test_serialize_without_headers() {
        let r = parse(b"GET / HTTP/1.1\r\n\r\n");
        assert_eq!(r.serialize(), b"GET / HTTP/1.1\r\n\r\n");
    }

    #[test]
    fn test_query_absent() {
        let r = parse(b"GET /plain HTTP/1.1\r\n\r\n");
        assert!(r.query().unwrap().is_empty());
    }

    #[test]
    fn test_query_pairs() {
        let r = parse(b"GET /x?a=1&b=2 HTTP/1.1\r\n\r\n");
        let q = r.query().unwrap();
        assert_eq!(q.get("a").map(String::as_str), Some("1"));
        assert_eq!(q.get("b").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_query_last_occurrence_wins() {
        let r = parse(b"GET /x?a=1&a=2 HTTP/1.1\r\n\r\n");
        assert_eq!(r.query().unwrap().get("a").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_query_pair_without_equals() {
        let r = parse(b"GET /x?a HTTP/1.1\r\n\r\n");
        assert_eq!(r.query().err(), Some(BAD_QUERY_ERROR));
    }

    #[test]
    fn test_keep_alive_decision() {
        assert!(parse(b"GET / HTTP/1.0\r\nConnection: keep-alive\r\n\r\n").keep_alive());
        assert!(!parse(b"GET / HTTP/1.1\r\nConnection: close\r\n\r\n").keep_alive());
        assert!(parse(b"GET / HTTP/1.1\r\n\r\n").keep_alive());
        assert!(!parse(b"GET / HTTP/1.0\r\n\r\n").keep_alive());
    }
}
