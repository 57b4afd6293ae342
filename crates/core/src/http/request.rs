/// An HTTP/1.1 request.
///
/// Uses a builder pattern, mirroring the shape of the request on the wire:
///
/// ```text
/// GET /liveview/liveviewstream HTTP/1.1\r\n
/// Host: 192.168.122.1:8080\r\n
/// User-Agent: liveview-rs/0.1.0\r\n
/// \r\n
/// ```
///
/// `Content-Length` is computed automatically when a body is present.
#[must_use]
pub struct HttpRequest {
    pub method: &'static str,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

/// Client identification string sent with every request.
pub const USER_AGENT: &str = concat!("liveview-rs/", env!("CARGO_PKG_VERSION"));

impl HttpRequest {
    pub fn new(method: &'static str, path: &str, authority: &str) -> Self {
        HttpRequest {
            method,
            path: path.to_string(),
            headers: vec![
                ("Host".to_string(), authority.to_string()),
                ("User-Agent".to_string(), USER_AGENT.to_string()),
            ],
            body: None,
        }
    }

    pub fn get(path: &str, authority: &str) -> Self {
        Self::new("GET", path, authority)
    }

    pub fn post(path: &str, authority: &str) -> Self {
        Self::new("POST", path, authority)
    }

    pub fn add_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// Serialize to the HTTP/1.1 wire format.
    pub fn serialize(&self) -> Vec<u8> {
        let mut head = format!("{} {} HTTP/1.1\r\n", self.method, self.path);

        for (name, value) in &self.headers {
            head.push_str(&format!("{}: {}\r\n", name, value));
        }

        match &self.body {
            Some(body) => {
                head.push_str(&format!("Content-Length: {}\r\n\r\n", body.len()));
                let mut out = head.into_bytes();
                out.extend_from_slice(body);
                out
            }
            None => {
                head.push_str("\r\n");
                head.into_bytes()
            }
        }
    }
}
