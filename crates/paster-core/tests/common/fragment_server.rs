//! Minimal HTTP/1.1 fragment server for integration tests.
//!
//! Every `GET /image?...` answers with one fragment container of the server's
//! choosing and its index in `X-Ece252-Fragment`. Indices follow a fixed
//! stride over the fragment set, so repeats (duplicates) are guaranteed once
//! the set has been walked. Each connection serves one request and is closed.

use flate2::write::ZlibEncoder;
use flate2::Compression;
use paster_core::codec::{encode, ImageHeader};
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

pub const SEQUENCE_HEADER: &str = "X-Ece252-Fragment";

#[derive(Debug, Clone, Copy, Default)]
pub struct FragmentServerOptions {
    /// Every n-th response omits the sequence header.
    pub drop_header_every: Option<usize>,
    /// Every n-th response carries a fragment with a damaged IDAT CRC.
    pub corrupt_every: Option<usize>,
    /// Every n-th request is answered with 503.
    pub throttle_every: Option<usize>,
    /// Answer every request with 503.
    pub always_throttle: bool,
}

/// Filtered scanlines for one band; distinct per `seed`.
pub fn band_rows(width: u32, height: u32, seed: u8) -> Vec<u8> {
    let mut out = Vec::new();
    for y in 0..height as usize {
        out.push(0);
        for x in 0..width as usize * 4 {
            out.push(seed.wrapping_mul(13).wrapping_add((x + y * 3) as u8));
        }
    }
    out
}

pub fn fragment_png(width: u32, height: u32, seed: u8) -> Vec<u8> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(&band_rows(width, height, seed)).unwrap();
    let compressed = enc.finish().unwrap();
    encode(&ImageHeader::rgba8(width, height), &compressed).unwrap()
}

fn corrupt(mut png: Vec<u8>) -> Vec<u8> {
    let at = png.len() - 13;
    png[at] ^= 0xFF;
    png
}

/// Starts a server in a background thread serving `fragments`. Returns the base
/// URL (e.g. "http://127.0.0.1:12345"). The server runs until the process exits.
pub fn start(fragments: Vec<Vec<u8>>, opts: FragmentServerOptions) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let fragments = Arc::new(fragments);
    let counter = Arc::new(AtomicUsize::new(0));
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let fragments = Arc::clone(&fragments);
            let counter = Arc::clone(&counter);
            thread::spawn(move || handle(stream, &fragments, &counter, opts));
        }
    });
    format!("http://127.0.0.1:{}", port)
}

fn respond(stream: &mut std::net::TcpStream, status: &str, headers: &str, body: &[u8]) {
    let head = format!(
        "HTTP/1.1 {}\r\nContent-Type: image/png\r\nContent-Length: {}\r\nConnection: close\r\n{}\r\n",
        status,
        body.len(),
        headers
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body);
}

fn handle(
    mut stream: std::net::TcpStream,
    fragments: &[Vec<u8>],
    counter: &AtomicUsize,
    opts: FragmentServerOptions,
) {
    let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(std::time::Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let request = String::from_utf8_lossy(&buf[..n]);
    let mut parts = request.split_whitespace();
    let method = parts.next().unwrap_or("");
    let target = parts.next().unwrap_or("");
    if !method.eq_ignore_ascii_case("GET") || !target.starts_with("/image?img=") {
        respond(&mut stream, "404 Not Found", "", b"");
        return;
    }

    let k = counter.fetch_add(1, Ordering::SeqCst) + 1;
    let hits = |every: Option<usize>| every.map_or(false, |e| e > 0 && k % e == 0);
    if opts.always_throttle || hits(opts.throttle_every) {
        respond(&mut stream, "503 Service Unavailable", "", b"");
        return;
    }

    // Stride 7 visits every index when the count is not a multiple of 7.
    let index = (k * 7) % fragments.len();
    let mut body = fragments[index].clone();
    if hits(opts.corrupt_every) {
        body = corrupt(body);
    }
    let header = if hits(opts.drop_header_every) {
        String::new()
    } else {
        format!("{}: {}\r\n", SEQUENCE_HEADER, index)
    };
    respond(&mut stream, "200 OK", &header, &body);
}
