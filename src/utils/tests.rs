use super::error::{BrokerError, UpstreamError};
use super::logging;

#[test]
fn logging_init_accepts_levels() {
    // Should not panic
    logging::init("info");
    logging::init("debug");
    logging::init("warn");
}

#[test]
fn logging_level_falls_back_to_info() {
    assert_eq!(logging::level_for("WARNING"), "warn");
    assert_eq!(logging::level_for("Trace"), "trace");
    assert_eq!(logging::level_for("verbose"), "info");
}

#[test]
fn error_messages_are_readable() {
    assert_eq!(BrokerError::Closed.to_string(), "broker is closed");
    assert_eq!(UpstreamError::Closed.to_string(), "stream closed by remote");
    assert_eq!(
        UpstreamError::Endpoint("refused".to_string()).to_string(),
        "endpoint error: refused"
    );
}

#[test]
fn websocket_errors_convert() {
    let err: UpstreamError = tungstenite::Error::ConnectionClosed.into();
    assert!(matches!(err, UpstreamError::WebSocket(_)));
    assert!(err.to_string().starts_with("websocket error"));
}
