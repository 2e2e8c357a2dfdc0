//! Failure classification.
//!
//! Decides what the coordinator does with a failed call. The checks run in a
//! fixed order: a missing response and gateway statuses come first because
//! they may carry no meaningful status at all, and the retry marker is
//! checked before an unauthorized status can start a second refresh.

use crate::request::RequestContext;
use crate::transport::TransportError;

/// Status the API returns when the access credential is no longer valid.
pub const UNAUTHORIZED: u16 = 401;

/// Statuses a gateway returns when the service behind it is down.
pub const GATEWAY_FAILURES: [u16; 3] = [502, 503, 504];

/// Recovery action for a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// No response at all.
    Unreachable,
    /// A gateway status.
    UpstreamDown,
    /// First unauthorized response for this call; refresh and replay.
    CredentialExpired,
    /// Hand the failure back to the caller unchanged.
    Passthrough,
}

/// Classify a transport failure for the given call context.
pub fn classify(error: &TransportError, ctx: &RequestContext) -> FailureClass {
    let status = match error {
        TransportError::NoResponse { .. } => return FailureClass::Unreachable,
        TransportError::InvalidRequest { .. } | TransportError::MalformedResponse { .. } => {
            return FailureClass::Passthrough;
        }
        TransportError::Status { status, .. } => *status,
    };

    if GATEWAY_FAILURES.contains(&status) {
        return FailureClass::UpstreamDown;
    }

    if status == UNAUTHORIZED && !ctx.is_retry {
        return FailureClass::CredentialExpired;
    }

    FailureClass::Passthrough
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn status(code: u16) -> TransportError {
        TransportError::Status {
            status: code,
            body: Value::Null,
        }
    }

    #[test]
    fn test_no_response_is_unreachable() {
        let err = TransportError::NoResponse {
            message: "connection refused".to_string(),
        };
        assert_eq!(
            classify(&err, &RequestContext::default()),
            FailureClass::Unreachable
        );
        assert_eq!(
            classify(&err, &RequestContext::default().retried()),
            FailureClass::Unreachable
        );
    }

    #[test]
    fn test_gateway_statuses() {
        for code in GATEWAY_FAILURES {
            assert_eq!(
                classify(&status(code), &RequestContext::default()),
                FailureClass::UpstreamDown
            );
        }
        assert_eq!(
            classify(&status(500), &RequestContext::default()),
            FailureClass::Passthrough
        );
    }

    #[test]
    fn test_unauthorized_first_time_only() {
        assert_eq!(
            classify(&status(401), &RequestContext::default()),
            FailureClass::CredentialExpired
        );
        assert_eq!(
            classify(&status(401), &RequestContext::default().retried()),
            FailureClass::Passthrough
        );
    }

    #[test]
    fn test_local_failures_pass_through() {
        let invalid = TransportError::InvalidRequest {
            message: "path leaves the API origin".to_string(),
        };
        assert_eq!(
            classify(&invalid, &RequestContext::default()),
            FailureClass::Passthrough
        );

        let malformed = TransportError::MalformedResponse {
            status: 401,
            message: "connection reset mid-body".to_string(),
        };
        assert_eq!(
            classify(&malformed, &RequestContext::default()),
            FailureClass::Passthrough
        );
    }

    #[test]
    fn test_other_client_errors_pass_through() {
        for code in [400, 403, 404, 409, 422] {
            assert_eq!(
                classify(&status(code), &RequestContext::default()),
                FailureClass::Passthrough
            );
        }
    }
}
