//! Minimal in-process HTTP/1.1 server for exercising download code
//! without network access.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone, Debug)]
pub struct Route {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// Status answered to HEAD instead of the normal response.
    pub head_status: Option<u16>,
}

impl Route {
    pub fn ok(content_type: &str, body: &[u8]) -> Self {
        Self {
            status: 200,
            headers: vec![("Content-Type".to_string(), content_type.to_string())],
            body: body.to_vec(),
            head_status: None,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
            head_status: None,
        }
    }

    pub fn rejecting_head(mut self, status: u16) -> Self {
        self.head_status = Some(status);
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// Serves fixed routes on a random local port until the process exits.
pub struct TestServer {
    base_url: String,
    get_count: Arc<AtomicUsize>,
}

impl TestServer {
    pub fn start(routes: HashMap<String, Route>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let get_count = Arc::new(AtomicUsize::new(0));
        let counter = get_count.clone();
        let routes = Arc::new(Mutex::new(routes));

        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { continue };
                let mut reader = BufReader::new(stream.try_clone().unwrap());

                let mut request_line = String::new();
                if reader.read_line(&mut request_line).is_err() {
                    continue;
                }
                loop {
                    let mut line = String::new();
                    match reader.read_line(&mut line) {
                        Ok(0) => break,
                        Ok(_) if line == "\r\n" || line == "\n" => break,
                        Ok(_) => {}
                        Err(_) => break,
                    }
                }

                let mut parts = request_line.split_whitespace();
                let method = parts.next().unwrap_or_default().to_string();
                let path = parts.next().unwrap_or_default().to_string();
                if method == "GET" {
                    counter.fetch_add(1, Ordering::SeqCst);
                }

                let mut route = routes
                    .lock()
                    .unwrap()
                    .get(&path)
                    .cloned()
                    .unwrap_or_else(|| Route::status(404));
                if method == "HEAD" {
                    if let Some(status) = route.head_status {
                        route = Route::status(status);
                    }
                }

                let mut response = format!("HTTP/1.1 {} Test\r\n", route.status);
                for (name, value) in &route.headers {
                    response.push_str(&format!("{name}: {value}\r\n"));
                }
                response.push_str(&format!("Content-Length: {}\r\n", route.body.len()));
                response.push_str("Connection: close\r\n\r\n");

                let _ = stream.write_all(response.as_bytes());
                if method != "HEAD" {
                    let _ = stream.write_all(&route.body);
                }
                let _ = stream.flush();
            }
        });

        Self {
            base_url,
            get_count,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Number of GET requests served so far.
    pub fn gets(&self) -> usize {
        self.get_count.load(Ordering::SeqCst)
    }
}
