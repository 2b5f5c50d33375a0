//! Per-request options.

use bytes::Bytes;
use http::Method;
use secrecy::SecretString;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

/// Body payload of a request.
#[derive(Debug, Clone)]
pub enum RequestBody {
    /// Serialized as JSON with `Content-Type: application/json`.
    Json(serde_json::Value),
    /// Sent as-is as `text/plain`.
    Text(String),
    /// Sent as-is; set a `Content-Type` header yourself if needed.
    Bytes(Bytes),
}

impl RequestBody {
    /// Serializes a value into a JSON body.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Self::Json)
    }
}

impl From<serde_json::Value> for RequestBody {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl From<String> for RequestBody {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for RequestBody {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(value))
    }
}

impl From<Bytes> for RequestBody {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

/// Basic authentication credentials.
#[derive(Debug, Clone)]
pub struct BasicAuth {
    /// User name.
    pub user: String,
    /// Password (kept secret).
    pub password: SecretString,
}

/// Options for a single logical request.
///
/// The executor reads these by reference and never mutates the caller's value.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// HTTP method. Defaults to GET.
    pub method: Method,

    /// Request headers.
    pub headers: HashMap<String, String>,

    /// Query string parameters.
    pub query: HashMap<String, String>,

    /// Values substituted for `{name}` placeholders in the URL.
    pub path_params: HashMap<String, String>,

    /// Cookies sent with the request.
    pub cookies: HashMap<String, String>,

    /// Form fields (`application/x-www-form-urlencoded`, or multipart when files are present).
    pub form_data: HashMap<String, String>,

    /// File attachments: form field name to file path.
    pub files: HashMap<String, String>,

    /// Bearer token for this request.
    pub auth_token: Option<SecretString>,

    /// Basic authentication for this request.
    pub basic_auth: Option<BasicAuth>,

    /// Content type used when interpreting the response, regardless of what the server sent.
    pub force_content_type: Option<String>,

    /// Request body.
    pub body: Option<RequestBody>,

    /// Path of a file the response body is written to.
    pub output_path: Option<String>,

    /// Name of the request, used in logs and error messages.
    pub request_name: Option<String>,

    /// Total number of dispatches allowed (0 disables retrying).
    pub retry_count: u32,

    /// Starting wait between retries. Defaults to 1 second when unset.
    pub retry_wait_time: Option<Duration>,

    /// Maximum wait between retries. Defaults to 10 seconds when unset.
    pub retry_max_wait_time: Option<Duration>,

    /// Retry until success or cancellation.
    pub infinite_retry: bool,

    /// Retry only failures classified as 5xx.
    pub retry_only_server_errors: bool,

    /// Do not log retry warnings.
    pub no_log_retry_error: bool,

    /// Record timing information on the response.
    pub enable_trace: bool,
}

impl RequestOptions {
    /// Creates options for a GET request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options with the given method.
    pub fn with_method(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    /// Sets the method.
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Adds a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Adds a query parameter.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    /// Adds query parameters from a flat `[key, value, key, value, ...]` list.
    ///
    /// A trailing key without a value is ignored.
    pub fn query_pairs<S: AsRef<str>>(mut self, pairs: &[S]) -> Self {
        self.query.extend(pairs_to_map(pairs));
        self
    }

    /// Adds a path parameter.
    pub fn path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.insert(name.into(), value.into());
        self
    }

    /// Adds a cookie.
    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    /// Adds a form field.
    pub fn form_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form_data.insert(name.into(), value.into());
        self
    }

    /// Attaches a file under the given form field.
    pub fn file(mut self, field: impl Into<String>, path: impl Into<String>) -> Self {
        self.files.insert(field.into(), path.into());
        self
    }

    /// Sets a bearer token.
    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(SecretString::new(token.into().into_boxed_str()));
        self
    }

    /// Sets basic authentication.
    pub fn basic_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.basic_auth = Some(BasicAuth {
            user: user.into(),
            password: SecretString::new(password.into().into_boxed_str()),
        });
        self
    }

    /// Forces the response content type.
    pub fn force_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.force_content_type = Some(content_type.into());
        self
    }

    /// Sets the body.
    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Writes the response body to the given file.
    pub fn output_path(mut self, path: impl Into<String>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    /// Names the request for logs.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.request_name = Some(name.into());
        self
    }

    /// Sets the retry budget.
    pub fn retries(mut self, count: u32) -> Self {
        self.retry_count = count;
        self
    }

    /// Sets the starting and maximum wait between retries.
    pub fn retry_wait(mut self, initial: Duration, max: Duration) -> Self {
        self.retry_wait_time = Some(initial);
        self.retry_max_wait_time = Some(max);
        self
    }

    /// Retries until success or cancellation.
    pub fn infinite_retry(mut self, enabled: bool) -> Self {
        self.infinite_retry = enabled;
        self
    }

    /// Retries only 5xx failures.
    pub fn retry_only_server_errors(mut self, enabled: bool) -> Self {
        self.retry_only_server_errors = enabled;
        self
    }

    /// Suppresses retry warnings.
    pub fn quiet_retries(mut self, quiet: bool) -> Self {
        self.no_log_retry_error = quiet;
        self
    }

    /// Records timing information on the response.
    pub fn trace(mut self, enabled: bool) -> Self {
        self.enable_trace = enabled;
        self
    }

    /// Returns the request name, or an empty string.
    pub fn name_or_empty(&self) -> &str {
        self.request_name.as_deref().unwrap_or("")
    }

    /// Replaces `{name}` placeholders in `url` with the configured path parameters.
    pub fn expand_path(&self, url: &str) -> String {
        let mut out = url.to_string();
        for (name, value) in &self.path_params {
            let placeholder = format!("{{{name}}}");
            out = out.replace(&placeholder, &encode_path_segment(value));
        }
        out
    }

    /// Renders the cookies as a `Cookie` header value, or `None` when there are none.
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let mut pairs: Vec<_> = self
            .cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        pairs.sort();
        Some(pairs.join("; "))
    }
}

/// Converts a flat `[key, value, ...]` list into a map, dropping an unpaired trailing key.
pub fn pairs_to_map<S: AsRef<str>>(pairs: &[S]) -> HashMap<String, String> {
    pairs
        .chunks_exact(2)
        .map(|pair| (pair[0].as_ref().to_string(), pair[1].as_ref().to_string()))
        .collect()
}

fn encode_path_segment(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}
