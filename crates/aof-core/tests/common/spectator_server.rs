//! Minimal HTTP/1.1 server standing in for the spectator service in
//! integration tests.
//!
//! Each route matches a path prefix (query string ignored). A route can fail
//! its first N requests with a chosen status before serving its body; hits are
//! counted per route.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Route {
    pub path_prefix: String,
    pub body: Vec<u8>,
    /// Requests answered with `fail_status` before the body is served.
    pub fail_first: u32,
    pub fail_status: u16,
}

impl Route {
    pub fn ok(path_prefix: &str, body: impl Into<Vec<u8>>) -> Self {
        Route {
            path_prefix: path_prefix.to_string(),
            body: body.into(),
            fail_first: 0,
            fail_status: 404,
        }
    }

    pub fn failing(mut self, n: u32, status: u16) -> Self {
        self.fail_first = n;
        self.fail_status = status;
        self
    }
}

struct Entry {
    route: Route,
    hits: AtomicU32,
}

pub struct SpectatorServer {
    base_url: String,
    entries: Arc<Vec<Entry>>,
}

impl SpectatorServer {
    /// Starts serving `routes` on a background thread until the process exits.
    pub fn start(routes: Vec<Route>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let entries: Arc<Vec<Entry>> = Arc::new(
            routes
                .into_iter()
                .map(|route| Entry {
                    route,
                    hits: AtomicU32::new(0),
                })
                .collect(),
        );
        let shared = Arc::clone(&entries);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let entries = Arc::clone(&shared);
                thread::spawn(move || handle(stream, &entries));
            }
        });
        SpectatorServer {
            base_url: format!("http://127.0.0.1:{}/", port),
            entries,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Requests seen by the route whose prefix is exactly `path_prefix`.
    pub fn hits(&self, path_prefix: &str) -> u32 {
        self.entries
            .iter()
            .find(|e| e.route.path_prefix == path_prefix)
            .map(|e| e.hits.load(Ordering::SeqCst))
            .unwrap_or(0)
    }
}

fn handle(mut stream: TcpStream, entries: &[Entry]) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let Ok(request) = std::str::from_utf8(&buf[..n]) else {
        return;
    };
    let target = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/");
    let path = target.split('?').next().unwrap_or(target);

    let (status, body): (u16, &[u8]) = match entries.iter().find(|e| path.starts_with(&e.route.path_prefix)) {
        Some(entry) => {
            let seen = entry.hits.fetch_add(1, Ordering::SeqCst);
            if seen < entry.route.fail_first {
                (entry.route.fail_status, b"")
            } else {
                (200, &entry.route.body)
            }
        }
        None => (404, b""),
    };
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        reason(status),
        body.len()
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.write_all(body);
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        503 => "Service Unavailable",
        _ => "Error",
    }
}
