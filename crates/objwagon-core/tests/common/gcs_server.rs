//! Minimal HTTP/1.1 server emulating the parts of the GCS JSON API the wagon uses.
//!
//! Handles object metadata, media download, one-level listing with paging,
//! and media upload for a single bucket. Faults can be queued for media
//! requests (download or upload) to exercise retries. One request per
//! connection; every response carries `Connection: close`.

use serde_json::json;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Failure injected into the next media request.
#[derive(Debug, Clone, Copy)]
pub enum ServerFault {
    /// Respond with this status and a JSON error body.
    Status(u16),
    /// Download only: advertise the full length, send this many bytes, then close.
    Truncate(usize),
}

#[derive(Debug, Clone)]
struct Object {
    data: Vec<u8>,
    content_type: String,
    updated: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<String, Object>,
    faults: VecDeque<ServerFault>,
    media_requests: usize,
    page_size: usize,
    token: Option<String>,
}

pub struct GcsServer {
    endpoint: String,
    bucket: String,
    state: Arc<Mutex<State>>,
}

impl GcsServer {
    /// Start serving `bucket` on an ephemeral port. Runs until the process exits.
    pub fn start(bucket: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(Mutex::new(State {
            page_size: 1000,
            ..State::default()
        }));
        let shared = Arc::clone(&state);
        let bucket_name = bucket.to_string();
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let state = Arc::clone(&shared);
                let bucket = bucket_name.clone();
                thread::spawn(move || handle(stream, &bucket, &state));
            }
        });
        Self {
            endpoint: format!("http://127.0.0.1:{}", port),
            bucket: bucket.to_string(),
            state,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn put_object(&self, key: &str, data: &[u8], updated: Option<&str>) {
        self.state.lock().unwrap().objects.insert(
            key.to_string(),
            Object {
                data: data.to_vec(),
                content_type: "application/octet-stream".to_string(),
                updated: updated.map(str::to_string),
            },
        );
    }

    /// Stored bytes and content type of `key`.
    pub fn object(&self, key: &str) -> Option<(Vec<u8>, String)> {
        self.state
            .lock()
            .unwrap()
            .objects
            .get(key)
            .map(|o| (o.data.clone(), o.content_type.clone()))
    }

    pub fn push_fault(&self, fault: ServerFault) {
        self.state.lock().unwrap().faults.push_back(fault);
    }

    /// Number of media downloads and uploads received.
    pub fn media_requests(&self) -> usize {
        self.state.lock().unwrap().media_requests
    }

    pub fn set_page_size(&self, n: usize) {
        self.state.lock().unwrap().page_size = n.max(1);
    }

    /// Reject requests that don't carry `Authorization: Bearer <token>`.
    pub fn require_token(&self, token: &str) {
        self.state.lock().unwrap().token = Some(token.to_string());
    }
}

struct Request {
    method: String,
    path: Vec<String>,
    query: BTreeMap<String, String>,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Request {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

fn decode_component(s: &str) -> String {
    url::form_urlencoded::parse(format!("v={}", s).as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default()
}

fn read_request(stream: &mut TcpStream) -> Option<Request> {
    let mut data = Vec::new();
    let mut buf = [0u8; 8192];
    let head_end = loop {
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buf[..n]);
        if let Some(i) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break i;
        }
    };
    let head = std::str::from_utf8(&data[..head_end]).ok()?.to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let target = request_line.next()?;
    let headers: Vec<(String, String)> = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(n, v)| (n.trim().to_string(), v.trim().to_string()))
        .collect();

    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    let path = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(decode_component)
        .collect();
    let query = url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();

    let content_length = headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = data[head_end + 4..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&buf[..n]);
    }
    Some(Request {
        method,
        path,
        query,
        headers,
        body,
    })
}

fn respond(stream: &mut TcpStream, status: u16, content_type: &str, body: &[u8]) {
    let head = format!(
        "HTTP/1.1 {} X\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        content_type,
        body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body);
}

fn respond_json(stream: &mut TcpStream, status: u16, value: serde_json::Value) {
    respond(stream, status, "application/json", value.to_string().as_bytes());
}

fn respond_error(stream: &mut TcpStream, status: u16, message: &str) {
    respond_json(
        stream,
        status,
        json!({"error": {"code": status, "message": message, "errors": [{"reason": "injected"}]}}),
    );
}

fn object_json(name: &str, o: &Object) -> serde_json::Value {
    let mut v = json!({
        "kind": "storage#object",
        "name": name,
        "size": o.data.len().to_string(),
        "contentType": o.content_type,
    });
    if let Some(updated) = &o.updated {
        v["updated"] = json!(updated);
    }
    v
}

fn handle(mut stream: TcpStream, bucket: &str, state: &Mutex<State>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let Some(req) = read_request(&mut stream) else {
        return;
    };

    if let Some(token) = state.lock().unwrap().token.clone() {
        let expected = format!("Bearer {}", token);
        if req.header("authorization") != Some(expected.as_str()) {
            respond_error(&mut stream, 403, "forbidden");
            return;
        }
    }

    let segments: Vec<&str> = req.path.iter().map(String::as_str).collect();
    match (req.method.as_str(), segments.as_slice()) {
        ("GET", ["storage", "v1", "b", b, "o", key]) if *b == bucket => {
            if req.query.get("alt").map(String::as_str) == Some("media") {
                serve_media(&mut stream, state, key);
            } else {
                let found = state.lock().unwrap().objects.get(*key).cloned();
                match found {
                    Some(o) => respond_json(&mut stream, 200, object_json(key, &o)),
                    None => respond_error(&mut stream, 404, "No such object"),
                }
            }
        }
        ("GET", ["storage", "v1", "b", b, "o"]) if *b == bucket => {
            serve_list(&mut stream, state, &req);
        }
        ("POST", ["upload", "storage", "v1", "b", b, "o"]) if *b == bucket => {
            accept_upload(&mut stream, state, &req);
        }
        _ => respond_error(&mut stream, 400, "unsupported request"),
    }
}

fn serve_media(stream: &mut TcpStream, state: &Mutex<State>, key: &str) {
    let (object, fault) = {
        let mut st = state.lock().unwrap();
        st.media_requests += 1;
        let fault = st.faults.pop_front();
        (st.objects.get(key).cloned(), fault)
    };
    match (object, fault) {
        (_, Some(ServerFault::Status(s))) => respond_error(stream, s, "injected failure"),
        (None, _) => respond_error(stream, 404, "No such object"),
        (Some(o), Some(ServerFault::Truncate(n))) => {
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                o.content_type,
                o.data.len()
            );
            let _ = stream.write_all(head.as_bytes());
            let _ = stream.write_all(&o.data[..n.min(o.data.len())]);
            let _ = stream.flush();
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
        (Some(o), None) => respond(stream, 200, &o.content_type, &o.data),
    }
}

fn serve_list(stream: &mut TcpStream, state: &Mutex<State>, req: &Request) {
    let prefix = req.query.get("prefix").cloned().unwrap_or_default();
    let offset: usize = req
        .query
        .get("pageToken")
        .and_then(|t| t.parse().ok())
        .unwrap_or(0);
    let st = state.lock().unwrap();

    let mut items = Vec::new();
    let mut prefixes = BTreeSet::new();
    for (name, o) in st.objects.range(prefix.clone()..) {
        let Some(rest) = name.strip_prefix(&prefix) else {
            break;
        };
        match rest.find('/') {
            Some(i) => {
                prefixes.insert(format!("{}{}", prefix, &rest[..=i]));
            }
            None => items.push(object_json(name, o)),
        }
    }

    let end = (offset + st.page_size).min(items.len());
    let page: Vec<_> = items[offset.min(end)..end].to_vec();
    let mut body = json!({"kind": "storage#objects", "items": page});
    if end < items.len() {
        body["nextPageToken"] = json!(end.to_string());
    } else {
        body["prefixes"] = json!(prefixes.into_iter().collect::<Vec<_>>());
    }
    drop(st);
    respond_json(stream, 200, body);
}

fn accept_upload(stream: &mut TcpStream, state: &Mutex<State>, req: &Request) {
    let Some(name) = req.query.get("name").cloned() else {
        respond_error(stream, 400, "missing name");
        return;
    };
    let fault = {
        let mut st = state.lock().unwrap();
        st.media_requests += 1;
        st.faults.pop_front()
    };
    if let Some(ServerFault::Status(s)) = fault {
        respond_error(stream, s, "injected failure");
        return;
    }
    let object = Object {
        data: req.body.clone(),
        content_type: req
            .header("content-type")
            .unwrap_or("application/octet-stream")
            .to_string(),
        updated: Some("2024-05-01T10:00:00.000Z".to_string()),
    };
    let body = object_json(&name, &object);
    state.lock().unwrap().objects.insert(name, object);
    respond_json(stream, 200, body);
}
