//! Integration tests for events

#[cfg(test)]
mod tests {
    use pkgreg_events::*;

    #[tokio::test]
    async fn test_event_emitter() {
        let (tx, mut rx) = channel();

        tx.emit_error("test error");
        tx.emit_debug("test debug");

        let first = rx.recv().await.unwrap();
        assert!(matches!(
            first.event,
            AppEvent::General(GeneralEvent::Error { .. })
        ));
        assert_eq!(first.meta.level, EventLevel::Error);
        assert_eq!(first.meta.source, EventSource::GENERAL);

        let second = rx.recv().await.unwrap();
        assert!(matches!(
            second.event,
            AppEvent::General(GeneralEvent::DebugLog { .. })
        ));
        assert_eq!(second.meta.level, EventLevel::Debug);
    }

    #[tokio::test]
    async fn test_correlation_id_is_attached() {
        let (tx, mut rx) = channel();
        tx.emit_correlated(
            "session-1",
            AppEvent::Upload(UploadEvent::ChunkReceived {
                session_id: "session-1".to_string(),
                bytes: 10,
                total: 10,
            }),
        );

        let message = rx.recv().await.unwrap();
        assert_eq!(message.meta.correlation_id.as_deref(), Some("session-1"));
        assert_eq!(message.meta.source, EventSource::UPLOAD);
    }

    #[tokio::test]
    async fn test_dropped_receiver() {
        let (tx, rx) = channel();
        drop(rx);

        // Should not panic when receiver is dropped
        tx.emit_warning("ignored");
    }

    #[test]
    fn test_absent_sender_is_silent() {
        let sender: Option<EventSender> = None;
        sender.emit_warning("nobody listening");
    }

    #[test]
    fn test_event_serialization_shape() {
        let event = AppEvent::Package(PackageEvent::Deleted {
            identity: "acme/model@1.0.0 (ml_model)".to_string(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["domain"], "package");
        assert_eq!(json["event"]["type"], "Deleted");
    }

    #[test]
    fn test_log_levels() {
        let aborted = AppEvent::Upload(UploadEvent::Aborted {
            session_id: "s".to_string(),
            identity: None,
            failure: FailureContext::new(
                Some("checksum_mismatch"),
                "mismatch",
                None::<String>,
                false,
            ),
        });
        assert_eq!(aborted.log_level(), tracing::Level::WARN);

        let committed = AppEvent::Upload(UploadEvent::Committed {
            session_id: "s".to_string(),
            identity: "i".to_string(),
            size: 1,
            checksum: "blake3:00".to_string(),
            superseded: false,
        });
        assert_eq!(committed.log_level(), tracing::Level::INFO);
        assert_eq!(committed.log_target(), "pkgreg::events::upload");
    }
}
