//! Wire protocol of the session channel.
//!
//! Requests carry a client-generated correlation `token`; the matching
//! response echoes it so a client can pair responses with requests even with
//! many calls in flight. No ordering is guaranteed between concurrent calls.
//! `elementUpdate` is the one tokenless frame: fire-and-forget, never
//! answered.

use crate::board::ProjectType;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A request frame from a client session.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Request {
    /// Attach a user identity to this session (attribution only).
    Identify { token: String, user_name: String },
    /// Persist a full project document.
    SaveProject { token: String, project: Value },
    LoadProject {
        token: String,
        name: String,
        project_type: ProjectType,
    },
    ListProjects {
        token: String,
        project_type: ProjectType,
    },
    DeleteProject {
        token: String,
        name: String,
        project_type: ProjectType,
    },
    /// Upload a binary into the project's asset directory. `data` is base64.
    UploadFile {
        token: String,
        name: String,
        project_type: ProjectType,
        file_name: String,
        data: String,
    },
    DeleteFile {
        token: String,
        name: String,
        project_type: ProjectType,
        file_name: String,
    },
    /// Best-effort element change relayed to the other sessions.
    ElementUpdate {
        element: Value,
        project_id: String,
        grid_id: String,
    },
}

impl Request {
    /// The correlation token, if this frame expects a response.
    pub fn token(&self) -> Option<&str> {
        match self {
            Request::Identify { token, .. }
            | Request::SaveProject { token, .. }
            | Request::LoadProject { token, .. }
            | Request::ListProjects { token, .. }
            | Request::DeleteProject { token, .. }
            | Request::UploadFile { token, .. }
            | Request::DeleteFile { token, .. } => Some(token),
            Request::ElementUpdate { .. } => None,
        }
    }
}

/// A response frame, echoing the caller's correlation token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub token: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Response {
    pub fn ok(token: impl Into<String>, data: Value) -> Self {
        Self {
            token: token.into(),
            success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn ok_empty(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            success: true,
            message: None,
            data: None,
        }
    }

    pub fn err(token: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            success: false,
            message: Some(message.into()),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_identify() {
        let req: Request =
            serde_json::from_value(json!({"action": "identify", "token": "t1", "userName": "ana"}))
                .unwrap();
        assert_eq!(
            req,
            Request::Identify {
                token: "t1".into(),
                user_name: "ana".into()
            }
        );
        assert_eq!(req.token(), Some("t1"));
    }

    #[test]
    fn test_parse_save_project() {
        let req: Request = serde_json::from_value(json!({
            "action": "saveProject",
            "token": "t2",
            "project": {"name": "P", "project_type": "hosted", "grid": []},
        }))
        .unwrap();
        match req {
            Request::SaveProject { token, project } => {
                assert_eq!(token, "t2");
                assert_eq!(project["name"], "P");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_parse_load_and_list() {
        let req: Request = serde_json::from_value(json!({
            "action": "loadProject", "token": "t", "name": "P", "projectType": "local",
        }))
        .unwrap();
        assert!(matches!(
            req,
            Request::LoadProject {
                project_type: ProjectType::Local,
                ..
            }
        ));

        let req: Request = serde_json::from_value(json!({
            "action": "listProjects", "token": "t", "projectType": "hosted",
        }))
        .unwrap();
        assert!(matches!(
            req,
            Request::ListProjects {
                project_type: ProjectType::Hosted,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_upload_file() {
        let req: Request = serde_json::from_value(json!({
            "action": "uploadFile",
            "token": "t",
            "name": "P",
            "projectType": "local",
            "fileName": "pic.png",
            "data": "aGVsbG8=",
        }))
        .unwrap();
        assert!(matches!(req, Request::UploadFile { .. }));
    }

    #[test]
    fn test_element_update_has_no_token() {
        let req: Request = serde_json::from_value(json!({
            "action": "elementUpdate",
            "element": {"name": "n"},
            "projectId": "P",
            "gridId": "g",
        }))
        .unwrap();
        assert_eq!(req.token(), None);
    }

    #[test]
    fn test_unknown_action_fails() {
        let result = serde_json::from_value::<Request>(json!({"action": "format", "token": "t"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_response_shapes() {
        let ok = Response::ok("t", json!({"url": "/projects/x"}));
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["token"], "t");
        assert_eq!(json["success"], true);
        assert!(json.get("message").is_none());

        let err = Response::err("t", "not found: project");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "not found: project");
        assert!(json.get("data").is_none());
    }
}
