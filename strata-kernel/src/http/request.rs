//! Request wrapper handed to listeners and handlers.

use super::{REQUEST_BODY, body::Body, headers::HttpHeaders};
use crate::{error::BodyTypeError, transport::RawRequest};
use http::{Method, Version};
use parking_lot::Mutex;
use std::{any::Any, net::SocketAddr, sync::Arc};
use strata_core::Features;

/// The incoming request of one lifecycle.
///
/// A cheap handle; clones observe the same URL and body.
#[derive(Clone)]
pub struct HttpRequest {
    inner: Arc<Inner>,
}

struct Inner {
    method: Method,
    version: Version,
    original_url: String,
    url: Mutex<String>,
    headers: HttpHeaders,
    params: Vec<(String, String)>,
    cookies: Vec<(String, String)>,
    remote_addr: Option<SocketAddr>,
    secure: bool,
    raw_body: Mutex<Body>,
    features: Features,
}

impl HttpRequest {
    pub(crate) fn new(raw: RawRequest, params: Vec<(String, String)>, features: Features) -> Self {
        let cookies = raw
            .headers
            .get_all("cookie")
            .iter()
            .flat_map(|line| parse_cookies(line))
            .collect();
        Self {
            inner: Arc::new(Inner {
                method: raw.method,
                version: raw.version,
                url: Mutex::new(raw.url.clone()),
                original_url: raw.url,
                headers: raw.headers,
                params,
                cookies,
                remote_addr: raw.remote_addr,
                secure: raw.secure,
                raw_body: Mutex::new(raw.body),
                features,
            }),
        }
    }

    /// The request method.
    pub fn method(&self) -> &Method {
        &self.inner.method
    }

    /// The protocol version.
    pub fn version(&self) -> Version {
        self.inner.version
    }

    /// The current URL (path and query). Listeners may rewrite it.
    pub fn url(&self) -> String {
        self.inner.url.lock().clone()
    }

    /// Rewrite the URL.
    pub fn set_url(&self, url: impl Into<String>) {
        *self.inner.url.lock() = url.into();
    }

    /// The URL as received, unaffected by rewrites.
    pub fn original_url(&self) -> &str {
        &self.inner.original_url
    }

    /// The path component of the current URL.
    pub fn path(&self) -> String {
        let url = self.inner.url.lock();
        split_url(&url).0.to_owned()
    }

    /// Replace the path, keeping the query string.
    pub fn set_path(&self, path: &str) {
        let mut url = self.inner.url.lock();
        let rebuilt = match split_url(&url).1 {
            Some(query) => format!("{path}?{query}"),
            None => path.to_owned(),
        };
        *url = rebuilt;
    }

    /// The raw query string, without `?`. Empty when absent.
    pub fn query_string(&self) -> String {
        let url = self.inner.url.lock();
        split_url(&url).1.unwrap_or_default().to_owned()
    }

    /// Replace the query string, keeping the path.
    pub fn set_query_string(&self, query: &str) {
        let mut url = self.inner.url.lock();
        let path = split_url(&url).0.to_owned();
        *url = if query.is_empty() {
            path
        } else {
            format!("{path}?{query}")
        };
    }

    /// Decoded `key=value` pairs of the query string.
    pub fn query(&self) -> Vec<(String, String)> {
        parse_query(&self.query_string())
    }

    /// Route parameters captured by the router.
    pub fn params(&self) -> &[(String, String)] {
        &self.inner.params
    }

    /// One route parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        lookup(&self.inner.params, name)
    }

    /// Request headers.
    pub fn headers(&self) -> &HttpHeaders {
        &self.inner.headers
    }

    /// First value of one header.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner.headers.get(name)
    }

    /// Cookies sent with the request.
    pub fn cookies(&self) -> &[(String, String)] {
        &self.inner.cookies
    }

    /// One cookie value.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        lookup(&self.inner.cookies, name)
    }

    /// The `Content-Type` header.
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// The `Content-Length` header, if it is a valid number.
    pub fn content_length(&self) -> Option<u64> {
        self.header("content-length")?.trim().parse().ok()
    }

    /// The target host. HTTP/2 requests prefer the `:authority` pseudo-header.
    pub fn host(&self) -> Option<&str> {
        if self.inner.version >= Version::HTTP_2 {
            self.inner.headers.get_or(":authority", "host")
        } else {
            self.inner.headers.get("host")
        }
    }

    /// Peer address, if the transport knows it.
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.inner.remote_addr
    }

    /// Peer IP as text. Empty when unknown.
    pub fn ip(&self) -> String {
        self.inner
            .remote_addr
            .map(|addr| addr.ip().to_string())
            .unwrap_or_default()
    }

    /// `"https"` for encrypted connections, else `"http"`.
    pub fn protocol(&self) -> &'static str {
        if self.inner.secure { "https" } else { "http" }
    }

    /// Whether the connection is encrypted.
    pub fn secure(&self) -> bool {
        self.inner.secure
    }

    /// Take the unparsed body. Subsequent calls return [`Body::Empty`].
    pub fn take_raw_body(&self) -> Body {
        std::mem::take(&mut *self.inner.raw_body.lock())
    }

    /// The body stored by a `kernel.parse` listener.
    pub fn body<T: Any + Clone>(&self) -> Result<Option<T>, BodyTypeError> {
        if !self.inner.features.has(REQUEST_BODY) {
            return Ok(None);
        }
        self.inner
            .features
            .get::<T>(REQUEST_BODY)
            .map(Some)
            .ok_or(BodyTypeError {
                expected: std::any::type_name::<T>(),
            })
    }
}

impl std::fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRequest")
            .field("method", &self.inner.method)
            .field("url", &*self.inner.url.lock())
            .finish_non_exhaustive()
    }
}

fn split_url(url: &str) -> (&str, Option<&str>) {
    match url.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (url, None),
    }
}

fn lookup<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

/// `name=value; name2=value2`. Malformed pairs are skipped.
fn parse_cookies(line: &str) -> Vec<(String, String)> {
    line.split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            let value = value.trim().trim_matches('"');
            Some((name.to_owned(), percent_decode(value)))
        })
        .collect()
}

fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (
                percent_decode(&key.replace('+', " ")),
                percent_decode(&value.replace('+', " ")),
            )
        })
        .collect()
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|h| u8::from_str_radix(h, 16).ok());
            if let Some(byte) = hex {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(url: &str) -> HttpRequest {
        let raw = RawRequest::new(Method::GET, url)
            .header("Cookie", "session=abc; theme=\"dark\"")
            .unwrap()
            .header("Host", "example.com")
            .unwrap();
        HttpRequest::new(raw, vec![("id".into(), "7".into())], Features::new())
    }

    #[test]
    fn test_url_accessors() {
        let req = request("/users/7?sort=name&q=a+b%21");
        assert_eq!(req.path(), "/users/7");
        assert_eq!(req.query_string(), "sort=name&q=a+b%21");
        assert_eq!(
            req.query(),
            vec![
                ("sort".to_owned(), "name".to_owned()),
                ("q".to_owned(), "a b!".to_owned())
            ]
        );

        req.set_path("/people/7");
        assert_eq!(req.url(), "/people/7?sort=name&q=a+b%21");
        req.set_query_string("");
        assert_eq!(req.url(), "/people/7");
        assert_eq!(req.original_url(), "/users/7?sort=name&q=a+b%21");
    }

    #[test]
    fn test_cookies_params_host() {
        let req = request("/");
        assert_eq!(req.cookie("session"), Some("abc"));
        assert_eq!(req.cookie("theme"), Some("dark"));
        assert_eq!(req.param("id"), Some("7"));
        assert_eq!(req.host(), Some("example.com"));
        assert_eq!(req.protocol(), "http");
        assert_eq!(req.ip(), "");
    }

    #[test]
    fn test_parsed_body_type_mismatch() {
        let features = Features::new();
        let req = HttpRequest::new(RawRequest::new(Method::POST, "/"), Vec::new(), features.clone());
        assert_eq!(req.body::<String>(), Ok(None));

        features.set(REQUEST_BODY, 5u64);
        assert_eq!(req.body::<u64>(), Ok(Some(5)));
        assert!(req.body::<String>().is_err());
    }
}
