use std::fs;
use std::io::ErrorKind;

use crate::logger::get_reporter;
use crate::request::Request;
use crate::response::{Response, HTTP_200, HTTP_404, HTTP_500};
use crate::site::SiteConfig;
use crate::utils::{ErrorStr, Result};
use crate::worker::Worker;


const MODULE: &str = "HANDLERS";

pub const READ_FILE_ERROR: &str = "could not read requested file";

const DEFAULT_CONTENT_TYPE: &str = "text/html";
const FALLBACK_NOT_FOUND_BODY: &str = "404 Not Found";


/// Produces the response for one parsed request. A returned error means the
/// connection can no longer be answered and must be closed; everything the
/// backend can express as HTTP comes back as an `Ok` response.
pub trait Backend: Sync + Send {
    fn handle(&self, request: &Request) -> Result<Response>;
}

/// Picks the backend for a site: files on disk for static sites, a spawned
/// worker process for dynamic ones.
pub fn new_backend(site: &SiteConfig, not_found_page: &str) -> Result<Box<dyn Backend>> {
    if site.is_static {
        Ok(Box::new(StaticBackend {
            root_path: site.root_path.clone(),
            not_found_page: not_found_page.to_string(),
        }))
    } else {
        Ok(Box::new(DynamicBackend {
            worker: Worker::spawn(&site.worker_command)?,
        }))
    }
}


pub struct StaticBackend {
    root_path: String,
    not_found_page: String,
}

impl Backend for StaticBackend {
    fn handle(&self, request: &Request) -> Result<Response> {
        // Paths are joined verbatim, query component included.
        let filepath = format!("{}{}", self.root_path, request.path);
        match fs::read_to_string(&filepath) {
            Ok(content) => Ok(Response::new(HTTP_200, content, content_type_for(&request.path))),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("[{}] No file at `{}`, responding 404", MODULE, filepath);
                Ok(Response::new(HTTP_404, self.not_found_body(), DEFAULT_CONTENT_TYPE))
            }
            Err(e) => {
                let code: ErrorStr = get_reporter(MODULE, "Static", READ_FILE_ERROR)(e);
                Ok(Response::error(HTTP_500, code))
            }
        }
    }
}

impl StaticBackend {
    fn not_found_body(&self) -> String {
        fs::read_to_string(&self.not_found_page)
            .unwrap_or_else(|_| FALLBACK_NOT_FOUND_BODY.to_string())
    }
}


pub struct DynamicBackend {
    worker: Worker,
}

impl Backend for DynamicBackend {
    /// Forwards the serialized request to the worker and wraps its single
    /// reply line in a regular response.
    fn handle(&self, request: &Request) -> Result<Response> {
        let reply = self.worker.exchange(&request.serialize())?;
        Ok(Response::new(HTTP_200, reply, DEFAULT_CONTENT_TYPE))
    }
}


/// Content type from the path extension; the query component does not
/// count towards the extension.
pub fn content_type_for(path: &str) -> &'static str {
    let path = path.split('?').next().unwrap_or(path);
    match path.rsplit_once('.').map(|(_, ext)| ext) {
        Some("html") | Some("htm") => "text/html",
        Some("css")  => "text/css",
        Some("js")   => "application/javascript",
        Some("json") => "application/json",
        Some("txt")  => "text/plain",
        Some("svg")  => "image/svg+xml",
        Some("png")  => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif")  => "image/gif",
        Some("ico")  => "image/x-icon",
        _ => DEFAULT_CONTENT_TYPE,
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(raw: &[u8]) -> Request {
        Request::parse(raw).unwrap()
    }

    fn static_site(root: &std::path::Path) -> StaticBackend {
        StaticBackend {
            root_path: root.to_string_lossy().to_string(),
            not_found_page: root.join("404.html").to_string_lossy().to_string(),
        }
    }

    #[test]
    fn test_static_hit() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = std::fs::File::create(dir.path().join("index.html")).unwrap();
        f.write_all(b"<html>welcome</html>").unwrap();

        let backend = static_site(dir.path());
        let response = backend.handle(&parse(b"GET /index.html HTTP/1.1\r\n\r\n")).unwrap();
        assert_eq!(response.status_code, HTTP_200);
        assert_eq!(response.body, "<html>welcome</html>");
        assert_eq!(response.content_type, "text/html");
    }

    #[test]
    fn test_static_miss_uses_not_found_page() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("404.html"), "<html>gone</html>").unwrap();

        let backend = static_site(dir.path());
        let response = backend.handle(&parse(b"GET /missing.html HTTP/1.1\r\n\r\n")).unwrap();
        assert_eq!(response.status_code, HTTP_404);
        assert_eq!(response.body, "<html>gone</html>");
    }

    #[test]
    fn test_static_miss_without_not_found_page() {
        let dir = tempfile::tempdir().unwrap();
        let backend = static_site(dir.path());
        let response = backend.handle(&parse(b"GET /missing.html HTTP/1.1\r\n\r\n")).unwrap();
        assert_eq!(response.status_code, HTTP_404);
        assert_eq!(response.body, FALLBACK_NOT_FOUND_BODY);
    }

    #[test]
    fn test_dynamic_wraps_worker_reply() {
        let backend = DynamicBackend {
            worker: Worker::spawn(
                r#"while read line; do case "$line" in GET*) echo "from worker";; esac; done"#
            ).unwrap(),
        };
        let response = backend.handle(&parse(b"GET /app HTTP/1.1\r\n\r\n")).unwrap();
        assert_eq!(response.status_code, HTTP_200);
        assert_eq!(response.body, "from worker");
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("/a.css"), "text/css");
        assert_eq!(content_type_for("/a.js"), "application/javascript");
        assert_eq!(content_type_for("/a.png?x=1"), "image/png");
        assert_eq!(content_type_for("/noext"), "text/html");
    }
}
