//! Response interpretation
//!
//! Turns a raw `TransportResponse` into typed results. A body carrying an
//! `"error"` object is always a rejection, whatever the HTTP status; a
//! non-2xx status without one is a transport failure.

use crate::error::{Result, SessionError};
use crate::transport::TransportResponse;
use crate::types::{ApiErrorBody, ApiResponse};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Shape of a decoded session-endpoint body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// Exactly `{"success": true}`
    MinimalSuccess,
    /// Has an `"error"` object
    Error,
    /// Anything else; decoded field by field
    Full,
}

/// Classify a decoded JSON body
pub fn shape_of(value: &Value) -> ResponseShape {
    let Some(obj) = value.as_object() else {
        return ResponseShape::Full;
    };
    if obj.get("error").is_some_and(Value::is_object) {
        return ResponseShape::Error;
    }
    if obj.len() == 1 && obj.get("success") == Some(&Value::Bool(true)) {
        return ResponseShape::MinimalSuccess;
    }
    ResponseShape::Full
}

fn decode(endpoint: &str, reply: &TransportResponse) -> Result<Value> {
    if reply.body.trim().is_empty() {
        return Err(if reply.is_success_status() {
            SessionError::InvalidResponse(format!("empty body from '{}'", endpoint))
        } else {
            SessionError::transport(endpoint, format!("HTTP {}", reply.status))
        });
    }

    match serde_json::from_str::<Value>(&reply.body) {
        Ok(value) => Ok(value),
        // An HTML error page from a proxy is a network problem, not a protocol one
        Err(_) if !reply.is_success_status() => Err(SessionError::transport(
            endpoint,
            format!("HTTP {}", reply.status),
        )),
        Err(e) => Err(SessionError::Parse(e)),
    }
}

fn rejection(value: &Value) -> Result<ApiErrorBody> {
    let error = value.get("error").cloned().unwrap_or(Value::Null);
    Ok(serde_json::from_value(error)?)
}

/// Parse a session-endpoint reply into an `ApiResponse`
///
/// Rejections come back as `Ok` with `error` set; only transport and
/// parse problems are `Err`.
pub fn parse_api_response(endpoint: &str, reply: &TransportResponse) -> Result<ApiResponse> {
    let value = decode(endpoint, reply)?;

    match shape_of(&value) {
        ResponseShape::Error => Ok(ApiResponse::rejected(rejection(&value)?)),
        _ if !reply.is_success_status() => Err(SessionError::transport(
            endpoint,
            format!("HTTP {}", reply.status),
        )),
        ResponseShape::MinimalSuccess => Ok(ApiResponse::minimal_success()),
        ResponseShape::Full => Ok(serde_json::from_value(value)?),
    }
}

/// Require `is_success()`, mapping everything else to an error
pub fn expect_success(response: ApiResponse) -> Result<ApiResponse> {
    if response.is_success() {
        return Ok(response);
    }
    match response.error {
        Some(error) => Err(SessionError::Rejected {
            code: error.code,
            message: error.message,
        }),
        None => Err(SessionError::Rejected {
            code: "UNSUCCESSFUL".to_string(),
            message: response
                .message
                .unwrap_or_else(|| "request was not successful".to_string()),
        }),
    }
}

/// Parse a reply carrying a typed payload
///
/// An `"error"` object becomes `SessionError::Rejected`.
pub fn parse_payload<T: DeserializeOwned>(endpoint: &str, reply: &TransportResponse) -> Result<T> {
    let value = decode(endpoint, reply)?;

    if shape_of(&value) == ResponseShape::Error {
        let error = rejection(&value)?;
        return Err(SessionError::Rejected {
            code: error.code,
            message: error.message,
        });
    }
    if !reply.is_success_status() {
        return Err(SessionError::transport(
            endpoint,
            format!("HTTP {}", reply.status),
        ));
    }

    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, NO_ACTIVE_SESSION};
    use crate::types::AdvertisementResponse;

    const EP: &str = "/games/sessions/heartbeat";

    #[test]
    fn test_minimal_success_shape() {
        let value = serde_json::json!({"success": true});
        assert_eq!(shape_of(&value), ResponseShape::MinimalSuccess);

        let resp = parse_api_response(EP, &TransportResponse::ok(r#"{"success":true}"#)).unwrap();
        assert_eq!(resp, ApiResponse::minimal_success());
    }

    #[test]
    fn test_full_shape_keeps_message() {
        let resp = parse_api_response(
            EP,
            &TransportResponse::ok(r#"{"success":true,"message":"Session started"}"#),
        )
        .unwrap();
        assert!(resp.is_success());
        assert_eq!(resp.message.as_deref(), Some("Session started"));
    }

    #[test]
    fn test_error_body_on_404_is_rejection() {
        let reply = TransportResponse::with_status(
            404,
            r#"{"success":false,"error":{"code":"NO_ACTIVE_SESSION","message":"No session"}}"#,
        );
        let resp = parse_api_response(EP, &reply).unwrap();
        assert!(resp.is_no_active_session());

        let err = expect_success(resp).unwrap_err();
        assert!(err.is_no_active_session());
    }

    #[test]
    fn test_non_2xx_without_error_is_transport() {
        let reply = TransportResponse::with_status(502, "<html>Bad Gateway</html>");
        let err = parse_api_response(EP, &reply).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);

        let reply = TransportResponse::with_status(500, r#"{"success":false}"#);
        let err = parse_api_response(EP, &reply).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let err = parse_api_response(EP, &TransportResponse::ok("{not json")).unwrap_err();
        assert!(matches!(err, SessionError::Parse(_)));

        let err = parse_api_response(EP, &TransportResponse::ok("   ")).unwrap_err();
        assert!(matches!(err, SessionError::InvalidResponse(_)));
    }

    #[test]
    fn test_expect_success_without_error_object() {
        let resp = parse_api_response(EP, &TransportResponse::ok(r#"{"success":false}"#)).unwrap();
        match expect_success(resp).unwrap_err() {
            SessionError::Rejected { code, .. } => assert_eq!(code, "UNSUCCESSFUL"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_payload_rejection() {
        let reply = TransportResponse::ok(
            serde_json::json!({"error": {"code": NO_ACTIVE_SESSION, "message": "none"}}).to_string(),
        );
        let err = parse_payload::<AdvertisementResponse>("/advertisements", &reply).unwrap_err();
        assert!(err.is_no_active_session());
    }

    #[test]
    fn test_payload_ok() {
        let reply = TransportResponse::ok(r#"{"ad":{"id":4,"title":"T"}}"#);
        let parsed = parse_payload::<AdvertisementResponse>("/advertisements", &reply).unwrap();
        assert_eq!(parsed.ad.unwrap().id, 4);
    }
}
