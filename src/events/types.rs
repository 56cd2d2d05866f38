//! Event types fanned out to connected sessions.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An event frame as delivered to WebSocket clients.
///
/// Lifecycle events (`hostedProjectUpdated`, `hostedProjectDeleted`) are sent
/// to *all* connected sessions whenever a hosted project is saved or deleted;
/// receivers filter by project name themselves. Local projects never
/// broadcast. `elementUpdate` is best-effort, at-most-once, and skips the
/// originating session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BoardEvent {
    HostedProjectUpdated {
        project_name: String,
    },
    HostedProjectDeleted {
        project_name: String,
    },
    ElementUpdate {
        element: serde_json::Value,
        project_id: String,
        grid_id: String,
    },
}

/// Bus envelope: the event plus the session that caused it, so relays can
/// exclude the originator. The origin never reaches the wire.
#[derive(Debug, Clone)]
pub struct Broadcast {
    pub origin: Option<Uuid>,
    pub event: BoardEvent,
}

impl Broadcast {
    pub fn new(event: BoardEvent) -> Self {
        Self {
            origin: None,
            event,
        }
    }

    pub fn from_session(origin: Uuid, event: BoardEvent) -> Self {
        Self {
            origin: Some(origin),
            event,
        }
    }

    /// Should this envelope be delivered to `session`?
    ///
    /// Lifecycle events go to everyone, including the originator (its UI
    /// refreshes the same way every other client does). Element updates are
    /// relayed only to *other* sessions.
    pub fn delivers_to(&self, session: Uuid) -> bool {
        match self.event {
            BoardEvent::ElementUpdate { .. } => self.origin != Some(session),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_event_wire_shape() {
        let event = BoardEvent::HostedProjectUpdated {
            project_name: "Roadmap".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "hostedProjectUpdated");
        assert_eq!(json["projectName"], "Roadmap");
    }

    #[test]
    fn test_deleted_event_wire_shape() {
        let event = BoardEvent::HostedProjectDeleted {
            project_name: "Old".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "hostedProjectDeleted");
    }

    #[test]
    fn test_element_update_wire_shape() {
        let event = BoardEvent::ElementUpdate {
            element: serde_json::json!({"type": "text_document", "name": "n"}),
            project_id: "Roadmap".into(),
            grid_id: "Main".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "elementUpdate");
        assert_eq!(json["projectId"], "Roadmap");
        assert_eq!(json["gridId"], "Main");
        assert_eq!(json["element"]["name"], "n");
    }

    #[test]
    fn test_event_roundtrip() {
        let event = BoardEvent::ElementUpdate {
            element: serde_json::json!({"x": 1}),
            project_id: "p".into(),
            grid_id: "g".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: BoardEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_element_update_skips_originator() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let envelope = Broadcast::from_session(
            me,
            BoardEvent::ElementUpdate {
                element: serde_json::Value::Null,
                project_id: "p".into(),
                grid_id: "g".into(),
            },
        );
        assert!(!envelope.delivers_to(me));
        assert!(envelope.delivers_to(other));
    }

    #[test]
    fn test_lifecycle_delivers_to_everyone() {
        let me = Uuid::new_v4();
        let envelope = Broadcast::from_session(
            me,
            BoardEvent::HostedProjectUpdated {
                project_name: "p".into(),
            },
        );
        assert!(envelope.delivers_to(me));
        assert!(envelope.delivers_to(Uuid::new_v4()));
    }
}
