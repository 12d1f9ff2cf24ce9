pub const HTTP_200: u16 = 200;
pub const HTTP_400: u16 = 400;
pub const HTTP_404: u16 = 404;
pub const HTTP_500: u16 = 500;


/// One outbound HTTP message. `Content-Length` is derived from the body at
/// serialization time, so the struct carries no header map of its own.
#[derive(Debug, Clone)]
pub struct Response {
    pub status_code: u16,
    pub body: String,
    pub content_type: String,
}

impl Response {
    pub fn new(status_code: u16, body: String, content_type: &str) -> Response {
        Response {
            status_code,
            body,
            content_type: content_type.to_string(),
        }
    }

    /// An error response with the code echoed into a plain-text body.
    pub fn error(status_code: u16, message: &str) -> Response {
        Response::new(status_code, format!("{}: {}", status_code, message), "text/plain")
    }

    /// Status line, `Content-Type`, `Content-Length` (in bytes), blank
    /// line, body.
    pub fn serialize(&self) -> Vec<u8> {
        format!(
            "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\n\r\n{}",
            self.status_code,
            self.content_type,
            self.body.len(),
            self.body
        ).into_bytes()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_layout() {
        let bytes = Response::new(HTTP_200, "hi".to_string(), "text/html").serialize();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(
            text,
            "HTTP/1.1 200\r\nContent-Type: text/html\r\nContent-Length: 2\r\n\r\nhi"
        );
    }

    #[test]
    fn test_content_length_counts_bytes() {
        let bytes = Response::new(HTTP_200, "héllo".to_string(), "text/plain").serialize();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("Content-Length: 6\r\n"));
    }

    #[test]
    fn test_error_body() {
        let response = Response::error(HTTP_400, "malformed header");
        assert_eq!(response.status_code, HTTP_400);
        assert_eq!(response.body, "400: malformed header");
        assert_eq!(response.content_type, "text/plain");
    }

    #[test]
    fn test_empty_body() {
        let text = String::from_utf8(Response::new(HTTP_404, String::new(), "text/html").serialize()).unwrap();
        assert!(text.contains("Content-Length: 0\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }
}
