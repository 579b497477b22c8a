pub mod analytics;
pub mod api;
pub mod config;
pub mod error;
pub mod io;
pub mod logging;
pub mod session;
pub mod supervisor;
pub mod upstream;

// Re-export the main error types for convenience
pub use error::{LiveTallyError, LiveTallyResult, TeardownError};

// Re-export session intake and control loop
pub use session::{InvalidTargetError, SessionState, Target, TargetQueue};
pub use supervisor::{BackoffPolicy, SessionContext, SessionServices, SessionSupervisor};

// Re-export upstream provider types
pub use upstream::{
    EventStream, GiftNotification, LiveProvider, ReplayProvider, RoomRef, SessionEventHandler,
    SessionHandle, UpstreamError, UpstreamEvent,
};

// Re-export fan-out and aggregation
pub use analytics::{AlertGiftSet, AlertHook, ComboAggregator, ComboGift, SettledGift, SingleGift};
pub use api::{FanoutEvent, FanoutSink, MemorySink, WebSocketServer};

// Re-export configuration and I/O utilities
pub use config::{AppConfig, ConfigManager, LogConfig};
pub use io::{parse_ndjson_file, parse_ndjson_file_generic, GiftLog, NdjsonError};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_structure() {
        assert!(std::any::type_name::<SessionSupervisor>().contains("SessionSupervisor"));
        assert!(std::any::type_name::<WebSocketServer>().contains("WebSocketServer"));
        assert!(std::any::type_name::<ReplayProvider>().contains("ReplayProvider"));
    }

    #[test]
    fn test_error_types_re_exported() {
        let err: LiveTallyError = Target::parse("  ").unwrap_err().into();
        assert!(matches!(err, LiveTallyError::InvalidTarget(_)));

        let err: LiveTallyError = UpstreamError::Offline("alice".to_string()).into();
        assert!(err.to_string().contains("offline"));
    }

    #[test]
    fn test_public_api_availability() {
        let queue = TargetQueue::new();
        let target = queue.submit("https://host/@alice/live").unwrap();
        assert_eq!(target.as_str(), "alice");
        assert_eq!(queue.size(), 1);

        let mut aggregator = ComboAggregator::new();
        let settled = aggregator.apply(&GiftNotification {
            gift_id: 1,
            unit_value: Some(2),
            ..Default::default()
        });
        assert!(matches!(settled, Some(SettledGift::Single(_))));
        assert_eq!(aggregator.total(), 2);
    }
}
