//! Minimal HTTP/1.1 server over a raw `TcpListener`.
//!
//! Wiremock always sends complete bodies. Resume tests need a server that
//! advertises one length, sends fewer bytes and then drops the connection,
//! so replies here are written byte-for-byte and the socket is closed (or
//! held open) right after.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// One scripted reply. Headers are written exactly as given, so a test can
/// promise a `content-length` the body does not honour.
#[derive(Debug, Clone)]
pub struct Reply {
    status_line: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    hold_open: bool,
}

impl Reply {
    pub fn status(code: u16, reason: &str) -> Self {
        Self {
            status_line: format!("HTTP/1.1 {code} {reason}"),
            headers: Vec::new(),
            body: Vec::new(),
            hold_open: false,
        }
    }

    pub fn ok() -> Self {
        Self::status(200, "OK")
    }

    pub fn partial() -> Self {
        Self::status(206, "Partial Content")
    }

    pub fn header(mut self, name: &str, value: impl ToString) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn body(mut self, body: &[u8]) -> Self {
        self.body = body.to_vec();
        self
    }

    /// Keeps the connection open after the body instead of closing it.
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    fn head(&self) -> String {
        let mut head = format!("{}\r\n", self.status_line);
        for (name, value) in &self.headers {
            head.push_str(&format!("{name}: {value}\r\n"));
        }
        head.push_str("connection: close\r\n\r\n");
        head
    }
}

type Script = dyn Fn(usize, Option<&str>) -> Reply + Send + Sync;

/// Serves replies chosen by a script called with the zero-based request
/// index and the request's `Range` header.
pub struct ScriptedServer {
    addr: SocketAddr,
    ranges: Arc<Mutex<Vec<Option<String>>>>,
    handle: JoinHandle<()>,
}

impl ScriptedServer {
    pub async fn start<F>(script: F) -> Self
    where
        F: Fn(usize, Option<&str>) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind scripted server");
        let addr = listener.local_addr().expect("local addr");
        let ranges = Arc::new(Mutex::new(Vec::new()));
        let script: Arc<Script> = Arc::new(script);
        let counter = Arc::new(AtomicUsize::new(0));

        let recorded = Arc::clone(&ranges);
        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let script = Arc::clone(&script);
                let recorded = Arc::clone(&recorded);
                let counter = Arc::clone(&counter);
                tokio::spawn(async move {
                    let _ = serve(stream, script, recorded, counter).await;
                });
            }
        });

        Self {
            addr,
            ranges,
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// `Range` header of every request received so far, in arrival order.
    pub fn ranges(&self) -> Vec<Option<String>> {
        self.ranges.lock().expect("ranges lock").clone()
    }

    pub fn requests(&self) -> usize {
        self.ranges.lock().expect("ranges lock").len()
    }
}

impl Drop for ScriptedServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(
    stream: TcpStream,
    script: Arc<Script>,
    recorded: Arc<Mutex<Vec<Option<String>>>>,
    counter: Arc<AtomicUsize>,
) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream);
    let mut range = None;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(());
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':')
            && name.trim().eq_ignore_ascii_case("range")
        {
            range = Some(value.trim().to_string());
        }
    }

    let index = counter.fetch_add(1, Ordering::SeqCst);
    recorded.lock().expect("ranges lock").push(range.clone());
    let reply = script(index, range.as_deref());

    let mut stream = reader.into_inner();
    stream.write_all(reply.head().as_bytes()).await?;
    stream.write_all(&reply.body).await?;
    stream.flush().await?;

    if reply.hold_open {
        tokio::time::sleep(Duration::from_secs(3600)).await;
    }
    stream.shutdown().await
}
