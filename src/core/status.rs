//! HTTP status classification.
//!
//! Maps numeric status codes to reason phrases and families, and builds the
//! classified [`HttpError`] for a non-2xx response. The table covers the
//! standard codes plus the non-standard ones that common platforms emit
//! (nginx, Cloudflare, AWS ELB, IIS, Laravel, ...).

use crate::core::error::HttpError;

use serde::Deserialize;

/// Maximum number of bytes of a raw response body kept in an error message.
const MAX_BODY_IN_ERROR: usize = 100;

/// Broad family of a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// 1xx, 2xx and 3xx.
    Success,
    /// 4xx.
    ClientError,
    /// 5xx.
    ServerError,
    /// Anything outside 100..=599 (e.g. 783, 999).
    NonStandard,
}

impl StatusClass {
    /// Returns `true` for the 5xx family.
    pub fn is_server_error(self) -> bool {
        matches!(self, Self::ServerError)
    }

    /// Returns `true` for the 4xx family.
    pub fn is_client_error(self) -> bool {
        matches!(self, Self::ClientError)
    }
}

/// Classifies a status code into its family.
pub fn classify(code: u16) -> StatusClass {
    match code {
        100..=399 => StatusClass::Success,
        400..=499 => StatusClass::ClientError,
        500..=599 => StatusClass::ServerError,
        _ => StatusClass::NonStandard,
    }
}

/// Returns the reason phrase for a known error status code.
pub fn reason(code: u16) -> Option<&'static str> {
    let phrase = match code {
        400 => "bad request",
        401 => "unauthorized",
        402 => "payment required",
        403 => "forbidden",
        404 => "not found",
        405 => "method not allowed",
        406 => "not acceptable",
        407 => "proxy authentication required",
        408 => "request timeout",
        409 => "conflict",
        410 => "gone",
        411 => "length required",
        412 => "precondition failed",
        413 => "payload too large",
        414 => "URI too long",
        415 => "unsupported media type",
        416 => "range not satisfiable",
        417 => "expectation failed",
        418 => "I'm a teapot",
        419 => "page expired",
        420 => "method failure",
        421 => "misdirected request",
        422 => "unprocessable entity",
        423 => "locked",
        424 => "failed dependency",
        425 => "too early",
        426 => "upgrade required",
        428 => "precondition required",
        429 => "too many requests",
        430 => "request header fields too large",
        431 => "request header fields too large",
        440 => "login timeout",
        444 => "no response",
        449 => "retry with",
        450 => "blocked by Windows Parental Controls",
        451 => "unavailable for legal reasons",
        460 => "client closed the connection",
        463 => "too many X-Forwarded-For headers",
        464 => "incompatible protocol versions",
        494 => "request header too large",
        495 => "SSL certificate error",
        496 => "SSL certificate required",
        497 => "HTTP request sent to HTTPS port",
        498 => "invalid token",
        499 => "token required",
        500 => "internal server error",
        501 => "not implemented",
        502 => "bad gateway",
        503 => "service unavailable",
        504 => "gateway timeout",
        505 => "HTTP version not supported",
        506 => "variant also negotiates",
        507 => "insufficient storage",
        508 => "loop detected",
        509 => "bandwidth limit exceeded",
        510 => "not extended",
        511 => "network authentication required",
        520 => "web server returned an unknown error",
        521 => "web server is down",
        522 => "connection timed out",
        523 => "origin is unreachable",
        524 => "a timeout occurred",
        525 => "SSL handshake failed",
        526 => "invalid SSL certificate",
        527 => "railgun error",
        529 => "site is overloaded",
        530 => "site is frozen",
        540 => "temporarily disabled",
        561 => "unauthorized access",
        598 => "network read timeout error",
        599 => "network connect timeout error",
        783 => "unexpected token",
        999 => "non-standard or restricted access error",
        _ => return None,
    };
    Some(phrase)
}

/// Error body shapes commonly returned by servers.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    err: Option<String>,
    #[serde(default)]
    code: Option<u16>,
}

impl ErrorBody {
    fn message(self) -> Option<String> {
        [
            self.message,
            self.error,
            self.details,
            self.text,
            self.msg,
            self.err,
        ]
        .into_iter()
        .flatten()
        .find(|m| !m.is_empty())
    }
}

/// Builds the classified error for a response, or `None` if the status is below 400.
///
/// A JSON body carrying a known `code` field overrides the HTTP status for
/// classification. The message is taken from the first non-empty common
/// error field, falling back to the (truncated) raw body.
pub fn error_for_response(status: u16, body: &[u8]) -> Option<HttpError> {
    if status < 400 {
        return None;
    }

    if let Ok(parsed) = serde_json::from_slice::<ErrorBody>(body) {
        let code = parsed
            .code
            .filter(|c| reason(*c).is_some())
            .unwrap_or(status);
        if let Some(message) = parsed.message() {
            return Some(HttpError::status(code, Some(message)));
        }
        if code != status {
            return Some(HttpError::status(code, raw_body_message(body)));
        }
    }

    Some(HttpError::status(status, raw_body_message(body)))
}

fn raw_body_message(body: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some(truncate(text, MAX_BODY_IN_ERROR).to_string())
}

fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// String-matching fallback for errors that are not an [`HttpError`].
///
/// Returns `true` if the message carries a `code 5xx` marker.
pub fn is_server_error_text(message: &str) -> bool {
    code_from_text(message).is_some_and(|code| classify(code).is_server_error())
}

/// Extracts the status code from a `code NNN` marker in an error message.
pub fn code_from_text(message: &str) -> Option<u16> {
    message.match_indices("code ").find_map(|(at, marker)| {
        let rest = &message[at + marker.len()..];
        let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
        digits.parse().ok()
    })
}

/// Returns `true` if the error (of any type) stems from a 5xx response.
///
/// Uses the typed classification when the error is an [`HttpError`] and
/// falls back to message matching otherwise.
pub fn is_server_error(error: &(dyn std::error::Error + 'static)) -> bool {
    match error.downcast_ref::<HttpError>() {
        Some(http) => http.is_server_error(),
        None => is_server_error_text(&error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify(200), StatusClass::Success);
        assert_eq!(classify(404), StatusClass::ClientError);
        assert_eq!(classify(503), StatusClass::ServerError);
        assert_eq!(classify(783), StatusClass::NonStandard);
        assert!(!classify(999).is_server_error());
    }

    #[test]
    fn test_reason_table() {
        assert_eq!(reason(502), Some("bad gateway"));
        assert_eq!(reason(522), Some("connection timed out"));
        assert_eq!(reason(299), None);
    }

    #[test]
    fn test_success_has_no_error() {
        assert!(error_for_response(200, b"{}").is_none());
        assert!(error_for_response(302, b"").is_none());
    }

    #[test]
    fn test_message_extracted_from_json_body() {
        let err = error_for_response(400, br#"{"error":"","detail":"x","msg":"bad field"}"#).unwrap();
        assert_eq!(err.status_code(), Some(400));
        assert_eq!(err.to_string(), "code 400, bad request: bad field");
    }

    #[test]
    fn test_body_code_overrides_status() {
        let err = error_for_response(400, br#"{"code":503,"message":"maintenance"}"#).unwrap();
        assert_eq!(err.status_code(), Some(503));
        assert!(err.is_server_error());
    }

    #[test]
    fn test_unknown_body_code_keeps_status() {
        let err = error_for_response(500, br#"{"code":1234,"message":"oops"}"#).unwrap();
        assert_eq!(err.status_code(), Some(500));
    }

    #[test]
    fn test_raw_body_truncated() {
        let body = "x".repeat(300);
        let err = error_for_response(500, body.as_bytes()).unwrap();
        let text = err.to_string();
        assert!(text.starts_with("code 500, internal server error: "));
        assert!(text.ends_with(&"x".repeat(100)));
        assert!(!text.ends_with(&"x".repeat(101)));
    }

    #[test]
    fn test_empty_body() {
        let err = error_for_response(404, b"").unwrap();
        assert_eq!(err.to_string(), "code 404, not found");
    }

    #[test]
    fn test_text_fallback() {
        assert!(is_server_error_text("code 500, internal server error"));
        assert!(!is_server_error_text("code 404, not found"));
        assert!(!is_server_error_text("connection refused"));
        assert_eq!(code_from_text("some error code 502, bad gateway"), Some(502));
    }

    #[test]
    fn test_text_fallback_skips_words_ending_in_code() {
        let message = "failed to decode response: code 503, service unavailable";
        assert_eq!(code_from_text(message), Some(503));
        assert!(is_server_error_text(message));
        assert_eq!(code_from_text("could not decode body"), None);
    }

    #[test]
    fn test_is_server_error_dyn() {
        let typed = HttpError::status(500, None);
        assert!(is_server_error(&typed));

        let foreign = std::io::Error::new(std::io::ErrorKind::Other, "code 503, unavailable");
        assert!(is_server_error(&foreign));
    }
}
