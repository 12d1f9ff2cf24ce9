use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use threadpool::ThreadPool;

use crate::config::Settings;
use crate::context::Context;
use crate::handlers::{new_backend, Backend};
use crate::logger::get_reporter;
use crate::request::Request;
use crate::response::{Response, HTTP_400};
use crate::site::SiteConfig;
use crate::utils::{Result, ResultV};


const MODULE: &str = "SERVER";

pub const BIND_ERROR: &str = "could not bind site listener";
pub const ACCEPT_ERROR: &str = "could not accept connection";
pub const READ_ERROR: &str = "could not read from connection";
pub const WRITE_ERROR: &str = "could not write to connection";
pub const REQUEST_TOO_LARGE_ERROR: &str = "request too large";
pub const TRUNCATED_REQUEST_ERROR: &str = "connection closed mid-request";
pub const ENGINE_STATE_ERROR: &str = "engine state is poisoned";

const CONTENT_LENGTH_HEADER: &str = "Content-Length: ";
const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

// Upper bound on one buffered request, in read chunks.
const MAX_REQUEST_CHUNKS: usize = 64;


/// One bound site: its listener, its dispatch backend and the count of
/// connections currently being handled. The engine owns every handle;
/// connection handlers only ever see their own site's.
struct SiteHandle {
    config: SiteConfig,
    listener: TcpListener,
    backend: Box<dyn Backend>,
    active: AtomicUsize,
}

impl SiteHandle {
    fn bind(config: SiteConfig, not_found_page: &str) -> Result<Arc<SiteHandle>> {
        config.validate()?;
        let listener = TcpListener::bind(config.address().as_str())
            .map_err(get_reporter(MODULE, "Bind", BIND_ERROR))?;
        let backend = new_backend(&config, not_found_page)?;
        Ok(Arc::new(SiteHandle {
            config,
            listener,
            backend,
            active: AtomicUsize::new(0),
        }))
    }
}

/// The host engine: binds one listener per configured site, spawns worker
/// processes for dynamic sites and serves connections from a shared,
/// bounded handler pool.
pub struct Server {
    pool: ThreadPool,
    chunk_size: usize,
    read_timeout: Option<Duration>,
    not_found_page: String,
    handles: Mutex<Vec<Arc<SiteHandle>>>,
    accept_loops: Mutex<Vec<thread::JoinHandle<()>>>,
}

impl Server {
    pub fn new(cfg: &Settings) -> Server {
        let read_timeout = match cfg.server.read_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };
        Server {
            pool: ThreadPool::new(cfg.server.workers),
            chunk_size: cfg.server.chunk_size,
            read_timeout,
            not_found_page: cfg.server.not_found_page.clone(),
            handles: Mutex::new(Vec::new()),
            accept_loops: Mutex::new(Vec::new()),
        }
    }

    /// Brings up every configured site. Already-running sites are not
    /// affected when a later one fails; the error is propagated after
    /// logging so startup can abort.
    pub fn start(&self, sites: Vec<SiteConfig>) -> ResultV {
        for site in sites {
            self.inject_site(site)?;
        }
        Ok(())
    }

    /// Performs the full per-site setup (bind, worker spawn, accept loop)
    /// for one additional site while the engine is running. Returns the
    /// bound address, which differs from the configured one for port 0.
    pub fn inject_site(&self, site: SiteConfig) -> Result<SocketAddr> {
        let handle = SiteHandle::bind(site, &self.not_found_page)?;
        let addr = handle.listener.local_addr()
            .map_err(get_reporter(MODULE, "Bind", BIND_ERROR))?;

        info!(
            "[{}] Site {} listening at {} ({})",
            MODULE,
            handle.config.address(),
            addr,
            if handle.config.is_static { "static" } else { "dynamic" }
        );

        self.handles.lock().map_err(get_reporter(MODULE, "State", ENGINE_STATE_ERROR))?
            .push(Arc::clone(&handle));

        let pool = self.pool.clone();
        let chunk_size = self.chunk_size;
        let read_timeout = self.read_timeout;
        let accept_loop = thread::spawn(move || {
            Self::await_connections(handle, pool, chunk_size, read_timeout);
        });
        self.accept_loops.lock().map_err(get_reporter(MODULE, "State", ENGINE_STATE_ERROR))?
            .push(accept_loop);

        Ok(addr)
    }

    /// Blocks on the accept loops; they never return on their own, so this
    /// parks the calling thread for the life of the process.
    pub fn join(&self) {
        let loops = match self.accept_loops.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(_) => return,
        };
        for accept_loop in loops {
            accept_loop.join().ok();
        }
    }

    /// Accept loop for one site. Accepted connections go to the handler
    /// pool; over the site's backlog bound they are dropped on the spot.
    /// No accept error terminates the loop.
    fn await_connections(
        handle: Arc<SiteHandle>,
        pool: ThreadPool,
        chunk_size: usize,
        read_timeout: Option<Duration>,
    ) {
        for stream in handle.listener.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    get_reporter(MODULE, "Accept", ACCEPT_ERROR)(e);
                    continue;
                }
            };

            if handle.active.load(Ordering::SeqCst) >= handle.config.backlog {
                warn!(
                    "[{}] Site {} is over its backlog of {}, dropping connection",
                    MODULE, handle.config.address(), handle.config.backlog
                );
                continue;
            }

            handle.active.fetch_add(1, Ordering::SeqCst);
            let handle_ = Arc::clone(&handle);
            pool.execute(move || {
                if let Err(e) = Self::handle_client(&handle_, stream, chunk_size, read_timeout) {
                    debug!("[{}] Connection for {} closed: {}", MODULE, handle_.config.address(), e);
                }
                handle_.active.fetch_sub(1, Ordering::SeqCst);
            });
        }
    }

    /// Per-connection state machine: read a full request, dispatch it,
    /// write the response, then loop while the request asks for
    /// keep-alive. Parse failures get a 400 and close the connection;
    /// transport and worker failures just close it.
    fn handle_client(
        site: &SiteHandle,
        mut stream: TcpStream,
        chunk_size: usize,
        read_timeout: Option<Duration>,
    ) -> ResultV {
        let peer = stream.peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        stream.set_read_timeout(read_timeout)
            .map_err(get_reporter(MODULE, "Timeout", READ_ERROR))?;

        loop {
            let buffer = match Self::read_request(&mut stream, chunk_size)? {
                Some(buffer) => buffer,
                None => break,
            };

            let mut ctx = Context::new(&peer);
            let (response, keep_alive) = match Request::parse(&buffer) {
                Ok(request) => {
                    info!(
                        "New request [qid={}]: peer: {}; site: {}; method: {}; path: {}",
                        ctx.qid, ctx.peer, site.config.address(), request.method, request.path
                    );
                    (site.backend.handle(&request)?, request.keep_alive())
                }
                Err(e) => (Response::error(HTTP_400, e), false),
            };

            let bytes = response.serialize();
            stream.write_all(&bytes).map_err(get_reporter(MODULE, "Write", WRITE_ERROR))?;
            stream.flush().map_err(get_reporter(MODULE, "Write", WRITE_ERROR))?;

            ctx.fix();
            info!(
                "Respond to [qid={}]: time: {}ms; status: {}; sent: {} bytes",
                ctx.qid, ctx.time_ms(), response.status_code, bytes.len()
            );

            if !keep_alive {
                break;
            }
        }
        Ok(())
    }

    /// Reads one complete request: chunks accumulate until the header
    /// terminator arrives, then until `Content-Length` more body bytes are
    /// buffered. `Ok(None)` means the peer closed an idle connection.
    fn read_request(stream: &mut TcpStream, chunk_size: usize) -> Result<Option<Vec<u8>>> {
        let mut buffer = Vec::new();
        let mut chunk = vec![0u8; chunk_size];

        let headers_end = loop {
            let n = stream.read(&mut chunk).map_err(|e| match e.kind() {
                ErrorKind::WouldBlock | ErrorKind::TimedOut => {
                    debug!("[{}] Connection idle for too long, closing", MODULE);
                    READ_ERROR
                }
                _ => get_reporter(MODULE, "Read", READ_ERROR)(e),
            })?;
            if n == 0 {
                if buffer.is_empty() {
                    return Ok(None);
                }
                return Err(TRUNCATED_REQUEST_ERROR);
            }
            buffer.extend_from_slice(&chunk[..n]);

            if let Some(pos) = find_terminator(&buffer) {
                break pos;
            }
            if buffer.len() > chunk_size * MAX_REQUEST_CHUNKS {
                error!("[{}] Request exceeds {} bytes, closing", MODULE, chunk_size * MAX_REQUEST_CHUNKS);
                return Err(REQUEST_TOO_LARGE_ERROR);
            }
        };

        let body_length = content_length(&buffer[..headers_end]);
        let total = headers_end + HEADER_TERMINATOR.len() + body_length;
        while buffer.len() < total {
            let n = stream.read(&mut chunk).map_err(get_reporter(MODULE, "Read", READ_ERROR))?;
            if n == 0 {
                return Err(TRUNCATED_REQUEST_ERROR);
            }
            buffer.extend_from_slice(&chunk[..n]);
        }

        Ok(Some(buffer))
    }
}

/// Offset of the first `\r\n\r\n` in the buffer, if any.
fn find_terminator(buffer: &[u8]) -> Option<usize> {
    buffer.windows(HEADER_TERMINATOR.len()).position(|w| w == HEADER_TERMINATOR)
}

/// Declared body length from the header section; exact key match, 0 when
/// absent or unparsable.
fn content_length(headers: &[u8]) -> usize {
    let text = String::from_utf8_lossy(headers);
    text.split("\r\n")
        .skip(1)
        .find_map(|line| line.strip_prefix(CONTENT_LENGTH_HEADER))
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(0)
}
