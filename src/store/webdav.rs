//! WebDAV store over HTTP.
//!
//! Paths handed to this store are absolute server paths; each request goes to
//! the configured origin with the path replaced.

use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use digest_auth::{AuthContext, HttpMethod, WwwAuthenticateHeader};
use parking_lot::Mutex;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use url::Url;

use super::{EntryType, PutOptions, RemoteStore, StoreError, StoreResult, WriteSink};

/// Connection timeout for WebDAV requests
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Chunks buffered between a write sink and its in-flight PUT.
const SINK_CHANNEL_CAPACITY: usize = 8;

const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:"><d:prop><d:resourcetype/></d:prop></d:propfind>"#;

/// Credentials sent with every request.
#[derive(Clone)]
pub enum WebDavAuth {
    Basic { user: String, pass: String },
    /// HTTP digest: requests are answered against the last challenge the
    /// server issued.
    Digest { user: String, pass: String },
    Bearer(String),
}

impl fmt::Debug for WebDavAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic { user, .. } => f
                .debug_struct("Basic")
                .field("user", user)
                .field("pass", &"***")
                .finish(),
            Self::Digest { user, .. } => f
                .debug_struct("Digest")
                .field("user", user)
                .field("pass", &"***")
                .finish(),
            Self::Bearer(_) => f.write_str("Bearer(***)"),
        }
    }
}

/// [`RemoteStore`] backed by a WebDAV server.
#[derive(Clone)]
pub struct WebDavStore {
    client: Client,
    origin: Url,
    auth: WebDavAuth,
    request_timeout: Option<Duration>,
    challenge: Arc<Mutex<Option<WwwAuthenticateHeader>>>,
}

impl fmt::Debug for WebDavStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebDavStore")
            .field("origin", &self.origin.as_str())
            .field("auth", &self.auth)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl WebDavStore {
    /// Create a store talking to the server at `url`. Only the scheme,
    /// host, and port of `url` are used to address requests.
    pub fn new(url: &Url, auth: WebDavAuth, request_timeout: Option<Duration>) -> StoreResult<Self> {
        if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
            return Err(StoreError::Invalid(format!("not an HTTP(S) URL: {url}")));
        }

        let client = Client::builder()
            .connect_timeout(CONNECTION_TIMEOUT)
            .build()?;

        let mut origin = url.clone();
        origin.set_path("/");
        origin.set_query(None);
        origin.set_fragment(None);

        Ok(Self {
            client,
            origin,
            auth,
            request_timeout,
            challenge: Arc::new(Mutex::new(None)),
        })
    }

    /// Request URL for a server path. Each segment is percent-encoded, so
    /// names containing `%`, `?` or `#` reach the server unchanged.
    fn url_for(&self, path: &str) -> StoreResult<Url> {
        let mut url = self.origin.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Invalid(format!("not a base URL: {}", self.origin)))?
            .clear()
            .extend(path.split('/').skip(1));
        Ok(url)
    }

    fn authorize(&self, req: RequestBuilder, method: &Method, url: &Url) -> StoreResult<RequestBuilder> {
        match &self.auth {
            WebDavAuth::Basic { user, pass } => Ok(req.basic_auth(user, Some(pass))),
            WebDavAuth::Bearer(token) => Ok(req.bearer_auth(token)),
            WebDavAuth::Digest { user, pass } => {
                let mut cached = self.challenge.lock();
                let Some(challenge) = cached.as_mut() else {
                    return Ok(req);
                };
                let context = AuthContext::new_with_method(
                    user.as_str(),
                    pass.as_str(),
                    url.path(),
                    None::<&[u8]>,
                    HttpMethod::from(method.as_str()),
                );
                let answer = challenge
                    .respond(&context)
                    .map_err(|e| StoreError::Auth(e.to_string()))?;
                Ok(req.header(AUTHORIZATION, answer.to_header_string()))
            }
        }
    }

    fn request(&self, method: Method, path: &str) -> StoreResult<RequestBuilder> {
        let url = self.url_for(path)?;
        let req = self.client.request(method.clone(), url.clone());
        let req = self.authorize(req, &method, &url)?;
        Ok(match self.request_timeout {
            Some(timeout) => req.timeout(timeout),
            None => req,
        })
    }

    /// Send a request, answering one digest challenge if the server issues
    /// it.
    async fn send<F>(&self, method: Method, path: &str, build: F) -> StoreResult<Response>
    where
        F: Fn(RequestBuilder) -> RequestBuilder + Send,
    {
        let response = build(self.request(method.clone(), path)?).send().await?;
        if !self.accept_challenge(&response)? {
            return Ok(response);
        }

        tracing::debug!(path, %method, "Answering digest challenge");
        Ok(build(self.request(method, path)?).send().await?)
    }

    /// Remember the digest challenge carried by a 401 response. Returns
    /// whether the request should be sent again.
    fn accept_challenge(&self, response: &Response) -> StoreResult<bool> {
        if response.status() != StatusCode::UNAUTHORIZED
            || !matches!(self.auth, WebDavAuth::Digest { .. })
        {
            return Ok(false);
        }
        let Some(header) = response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|value| value.to_str().ok())
        else {
            return Ok(false);
        };

        let challenge = digest_auth::parse(header).map_err(|e| StoreError::Auth(e.to_string()))?;
        *self.challenge.lock() = Some(challenge);
        Ok(true)
    }

    /// A streamed body cannot be sent twice, so collect the digest challenge
    /// with a bodiless request before the upload starts.
    async fn prime_challenge(&self, path: &str) -> StoreResult<()> {
        let response = self.request(Method::HEAD, path)?.send().await?;
        self.accept_challenge(&response)?;
        Ok(())
    }
}

fn extension_method(name: &'static str) -> StoreResult<Method> {
    Method::from_bytes(name.as_bytes())
        .map_err(|_| StoreError::Invalid(format!("invalid HTTP method: {name}")))
}

fn status_error(method: &'static str, path: &str, response: &Response) -> StoreError {
    StoreError::Status {
        method,
        path: path.to_string(),
        status: response.status().as_u16(),
    }
}

fn is_collection(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    lower.contains(":collection") || lower.contains("<collection")
}

#[async_trait::async_trait]
impl RemoteStore for WebDavStore {
    async fn stat(&self, path: &str) -> StoreResult<Option<EntryType>> {
        let response = self
            .send(extension_method("PROPFIND")?, path, |req| {
                req.header("Depth", "0")
                    .header(CONTENT_TYPE, "application/xml; charset=utf-8")
                    .body(PROPFIND_BODY)
            })
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::MULTI_STATUS | StatusCode::OK => {
                let body = response.text().await?;
                if is_collection(&body) {
                    Ok(Some(EntryType::Directory))
                } else {
                    Ok(Some(EntryType::File))
                }
            }
            _ => Err(status_error("PROPFIND", path, &response)),
        }
    }

    async fn create_directory(&self, path: &str) -> StoreResult<()> {
        let response = self
            .send(extension_method("MKCOL")?, path, |req| req)
            .await?;

        match response.status() {
            StatusCode::CREATED | StatusCode::OK => Ok(()),
            // MKCOL on an existing collection
            StatusCode::METHOD_NOT_ALLOWED => {
                tracing::trace!(path, "Directory already exists");
                Ok(())
            }
            _ => Err(status_error("MKCOL", path, &response)),
        }
    }

    async fn put_file_contents(
        &self,
        path: &str,
        data: Bytes,
        options: PutOptions,
    ) -> StoreResult<()> {
        let response = self
            .send(Method::PUT, path, |req| {
                let req = req
                    .header(CONTENT_TYPE, "application/octet-stream")
                    .body(data.clone());
                if options.overwrite {
                    req
                } else {
                    req.header("If-None-Match", "*")
                }
            })
            .await?;

        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::PRECONDITION_FAILED => Err(StoreError::AlreadyExists(path.to_string())),
            _ => Err(status_error("PUT", path, &response)),
        }
    }

    async fn create_write_sink(&self, path: &str) -> StoreResult<Box<dyn WriteSink>> {
        if matches!(self.auth, WebDavAuth::Digest { .. }) {
            let primed = self.challenge.lock().is_some();
            if !primed {
                self.prime_challenge(path).await?;
            }
        }

        let (tx, rx) = mpsc::channel::<io::Result<Bytes>>(SINK_CHANNEL_CAPACITY);

        // No overall timeout: the body is as long as the stream feeding it.
        let url = self.url_for(path)?;
        let req = self
            .client
            .put(url.clone())
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(reqwest::Body::wrap_stream(ReceiverStream::new(rx)));
        let req = self.authorize(req, &Method::PUT, &url)?;

        let task = tokio::spawn(send_streamed_put(req, path.to_string()));

        Ok(Box::new(WebDavSink {
            path: path.to_string(),
            tx: Some(tx),
            task: Some(task),
        }))
    }
}

async fn send_streamed_put(req: RequestBuilder, path: String) -> StoreResult<()> {
    let response = req.send().await?;
    if response.status().is_success() {
        Ok(())
    } else {
        Err(status_error("PUT", &path, &response))
    }
}

/// Streams chunks into a PUT request running on a spawned task.
///
/// Dropping the sink before [`finish`](WriteSink::finish) fails the request
/// body, so the server never stores a truncated file as complete.
struct WebDavSink {
    path: String,
    tx: Option<mpsc::Sender<io::Result<Bytes>>>,
    task: Option<JoinHandle<StoreResult<()>>>,
}

async fn join(task: Option<JoinHandle<StoreResult<()>>>, path: &str) -> StoreResult<()> {
    let Some(task) = task else {
        return Err(StoreError::Closed(path.to_string()));
    };
    match task.await {
        Ok(result) => result,
        Err(e) => Err(StoreError::Closed(format!("{path}: {e}"))),
    }
}

#[async_trait::async_trait]
impl WriteSink for WebDavSink {
    async fn write(&mut self, chunk: Bytes) -> StoreResult<()> {
        let Some(tx) = self.tx.as_ref() else {
            return Err(StoreError::Closed(self.path.clone()));
        };
        if tx.send(Ok(chunk)).await.is_ok() {
            return Ok(());
        }

        // The request ended early; report why.
        self.tx = None;
        match join(self.task.take(), &self.path).await {
            Ok(()) => Err(StoreError::Closed(self.path.clone())),
            Err(e) => Err(e),
        }
    }

    async fn finish(mut self: Box<Self>) -> StoreResult<()> {
        drop(self.tx.take());
        let task = self.task.take();
        join(task, &self.path).await
    }

    async fn abort(mut self: Box<Self>, reason: String) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Err(io::Error::other(reason))).await;
        }
        let task = self.task.take();
        if let Err(e) = join(task, &self.path).await {
            tracing::debug!(path = %self.path, error = %e, "Aborted upload ended with error");
        }
    }
}

impl Drop for WebDavSink {
    fn drop(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        if let Some(tx) = self.tx.take() {
            let _ = tx.try_send(Err(io::Error::other("write sink dropped")));
        }
        task.abort();
        tracing::warn!(path = %self.path, "Upload abandoned before completion");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(url: &str) -> WebDavStore {
        let auth = WebDavAuth::Bearer("t".to_string());
        WebDavStore::new(&Url::parse(url).unwrap(), auth, None).unwrap()
    }

    #[test]
    fn test_is_collection() {
        assert!(is_collection(
            "<d:multistatus><d:resourcetype><d:collection/></d:resourcetype></d:multistatus>"
        ));
        assert!(is_collection("<D:resourcetype><D:collection /></D:resourcetype>"));
        assert!(is_collection("<resourcetype><collection/></resourcetype>"));
        assert!(!is_collection("<d:resourcetype/>"));
    }

    #[test]
    fn test_rejects_non_http_urls() {
        let auth = WebDavAuth::Bearer("t".to_string());
        let url = Url::parse("file:///tmp/x").unwrap();
        assert!(WebDavStore::new(&url, auth, None).is_err());
    }

    #[test]
    fn test_url_for_replaces_path() {
        let store = store("http://web.dav:8080/dest/?q=1");
        assert_eq!(
            store.url_for("/dest/low/01.ts").unwrap().as_str(),
            "http://web.dav:8080/dest/low/01.ts"
        );
        assert_eq!(
            store.url_for("/dest/my show/a.ts").unwrap().as_str(),
            "http://web.dav:8080/dest/my%20show/a.ts"
        );
        assert_eq!(store.url_for("/dest/").unwrap().as_str(), "http://web.dav:8080/dest/");
        assert_eq!(store.url_for("/").unwrap().as_str(), "http://web.dav:8080/");
    }

    #[test]
    fn test_url_for_escapes_reserved_characters() {
        let store = store("http://web.dav/");
        assert_eq!(
            store.url_for("/dest/100%25.ts").unwrap().path(),
            "/dest/100%2525.ts"
        );
        assert_eq!(
            store.url_for("/dest/a?b#c.ts").unwrap().path(),
            "/dest/a%3Fb%23c.ts"
        );
    }

    #[test]
    fn test_extension_methods() {
        assert_eq!(extension_method("PROPFIND").unwrap().as_str(), "PROPFIND");
        assert_eq!(extension_method("MKCOL").unwrap().as_str(), "MKCOL");
        assert!(matches!(
            extension_method("BAD METHOD"),
            Err(StoreError::Invalid(_))
        ));
    }

    #[test]
    fn test_auth_debug_redacts() {
        let auth = WebDavAuth::Basic {
            user: "alice".to_string(),
            pass: "hunter2".to_string(),
        };
        let debug = format!("{auth:?}");
        assert!(debug.contains("alice"));
        assert!(!debug.contains("hunter2"));

        let auth = WebDavAuth::Digest {
            user: "alice".to_string(),
            pass: "hunter2".to_string(),
        };
        assert!(!format!("{auth:?}").contains("hunter2"));
    }
}
