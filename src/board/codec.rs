//! Wire codec for the polymorphic element hierarchy and the project document.
//!
//! Every encoded element carries an explicit `type` discriminant with the
//! variant's fields flattened alongside the common ones. Decoding dispatches
//! strictly on `type`; documents lacking the tag (older or hand-edited files)
//! fall back to an ordered list of structural predicates. An object matching
//! neither is returned as [`ScreenElement::Unrecognized`] — flagged, never
//! silently dropped.

use super::models::{
    Grid, Image, Project, ProjectType, ScreenElement, TextDocument, ToDoList, Video,
};
use crate::error::StoreError;
use serde_json::{Map, Value};

/// Discriminant values written to the `type` field.
pub const TAG_TEXT_DOCUMENT: &str = "text_document";
pub const TAG_IMAGE: &str = "image";
pub const TAG_VIDEO: &str = "video";
pub const TAG_TODO_LIST: &str = "todo_list";

/// Document keys of the top-level project shape.
const KEY_GRID: &str = "grid";
const KEY_ELEMENTS: &str = "Screen_elements";
const KEY_LAST_MODIFIED: &str = "lastModified";

// ============================================================================
// Structural inference
// ============================================================================

/// Ordered structural predicates for untagged documents. First match wins.
///
/// The order matters: a hand-edited to-do list that also grew a stray
/// `text_field` must still decode as a to-do list.
const STRUCTURAL_PREDICATES: [(&str, fn(&Map<String, Value>) -> bool); 4] = [
    (TAG_TODO_LIST, looks_like_todo_list),
    (TAG_IMAGE, looks_like_image),
    (TAG_VIDEO, looks_like_video),
    (TAG_TEXT_DOCUMENT, looks_like_text_document),
];

/// A `scheduled_tasks`-like container marks a to-do list.
fn looks_like_todo_list(raw: &Map<String, Value>) -> bool {
    raw.get("scheduled_tasks").is_some_and(Value::is_array)
}

/// An image-path-like field marks an image.
fn looks_like_image(raw: &Map<String, Value>) -> bool {
    raw.contains_key("image_path") || raw.contains_key("image_data")
}

/// A video-path-like field marks a video.
fn looks_like_video(raw: &Map<String, Value>) -> bool {
    raw.contains_key("video_path") || raw.contains_key("video_data")
}

/// A text-field-like field marks a text document.
fn looks_like_text_document(raw: &Map<String, Value>) -> bool {
    raw.contains_key("text_field")
}

/// Run the ordered predicate list against an untagged object.
pub fn infer_tag(raw: &Map<String, Value>) -> Option<&'static str> {
    STRUCTURAL_PREDICATES
        .iter()
        .find(|(_, predicate)| predicate(raw))
        .map(|(tag, _)| *tag)
}

// ============================================================================
// Element encode / decode
// ============================================================================

/// Encode a screen element to its wire object.
///
/// Total: every variant encodes, and `Unrecognized` passes through unchanged
/// so foreign objects survive a load/save cycle byte-for-byte.
pub fn encode_element(element: &ScreenElement) -> Map<String, Value> {
    let (tag, value) = match element {
        ScreenElement::TextDocument(e) => (TAG_TEXT_DOCUMENT, serde_json::to_value(e)),
        ScreenElement::Image(e) => (TAG_IMAGE, serde_json::to_value(e)),
        ScreenElement::Video(e) => (TAG_VIDEO, serde_json::to_value(e)),
        ScreenElement::ToDoList(e) => (TAG_TODO_LIST, serde_json::to_value(e)),
        ScreenElement::Unrecognized(raw) => return raw.clone(),
    };

    // Serializing our own derive'd structs cannot fail.
    let mut map = match value {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    map.insert("type".into(), Value::String(tag.into()));
    map
}

/// Decode a wire object into a screen element.
///
/// Dispatch on `type` when present; unknown tags are accepted only if a
/// structural predicate identifies the variant, otherwise they are a
/// validation error. Untagged objects go through structural inference and
/// fall back to `Unrecognized`.
pub fn decode_element(raw: Map<String, Value>) -> Result<ScreenElement, StoreError> {
    match raw.get("type") {
        Some(Value::String(tag)) => {
            let tag = tag.clone();
            if let Some(element) = decode_as(&tag, &raw)? {
                return Ok(element);
            }
            // Unknown tag: accept only with a structural fallback match.
            match infer_tag(&raw) {
                Some(inferred) => decode_as(inferred, &raw)?.ok_or_else(|| {
                    StoreError::Validation(format!("unresolvable element type: {tag}"))
                }),
                None => Err(StoreError::Validation(format!(
                    "unknown element type with no structural match: {tag}"
                ))),
            }
        }
        Some(other) => Err(StoreError::Validation(format!(
            "element type must be a string, got: {other}"
        ))),
        None => match infer_tag(&raw) {
            Some(inferred) => decode_as(inferred, &raw)?
                .ok_or_else(|| StoreError::Validation("structural inference failed".into())),
            None => Ok(ScreenElement::Unrecognized(raw)),
        },
    }
}

/// Decode `raw` as the variant named by `tag`. `Ok(None)` means the tag is
/// not one of ours.
fn decode_as(tag: &str, raw: &Map<String, Value>) -> Result<Option<ScreenElement>, StoreError> {
    let value = Value::Object(raw.clone());
    let element = match tag {
        TAG_TEXT_DOCUMENT => {
            ScreenElement::TextDocument(serde_json::from_value::<TextDocument>(value)?)
        }
        TAG_IMAGE => ScreenElement::Image(serde_json::from_value::<Image>(value)?),
        TAG_VIDEO => ScreenElement::Video(serde_json::from_value::<Video>(value)?),
        TAG_TODO_LIST => ScreenElement::ToDoList(serde_json::from_value::<ToDoList>(value)?),
        _ => return Ok(None),
    };
    Ok(Some(element))
}

// ============================================================================
// Project document encode / decode
// ============================================================================

/// Encode a full project to its persisted document shape:
/// `{owner_name, name, project_type, grid: [...], lastModified}`.
pub fn encode_project(project: &Project) -> Value {
    let grids: Vec<Value> = project
        .grids
        .iter()
        .map(|grid| {
            let elements: Vec<Value> = grid
                .elements
                .iter()
                .map(|e| Value::Object(encode_element(e)))
                .collect();
            serde_json::json!({
                "name": grid.name,
                KEY_ELEMENTS: elements,
            })
        })
        .collect();

    let mut doc = Map::new();
    doc.insert("owner_name".into(), Value::String(project.owner_name.clone()));
    doc.insert("name".into(), Value::String(project.name.clone()));
    doc.insert(
        "project_type".into(),
        Value::String(project.project_type.dir_name().into()),
    );
    doc.insert(KEY_GRID.into(), Value::Array(grids));
    if let Some(ref stamp) = project.last_modified {
        doc.insert(KEY_LAST_MODIFIED.into(), Value::String(stamp.clone()));
    }
    Value::Object(doc)
}

/// Decode a persisted project document.
///
/// The store resolves `expected_type` from the directory the file lives in;
/// the directory is authoritative over whatever the document claims.
pub fn decode_project(value: Value, expected_type: ProjectType) -> Result<Project, StoreError> {
    let doc = match value {
        Value::Object(doc) => doc,
        other => {
            return Err(StoreError::Serialization(format!(
                "project document is not an object: {other}"
            )))
        }
    };

    let name = doc
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::Serialization("project document missing name".into()))?
        .to_string();
    let owner_name = doc
        .get("owner_name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let last_modified = doc
        .get(KEY_LAST_MODIFIED)
        .and_then(Value::as_str)
        .map(str::to_string);

    let mut grids = Vec::new();
    match doc.get(KEY_GRID) {
        None => {}
        Some(Value::Array(raw_grids)) => {
            for raw_grid in raw_grids {
                let grid_obj = raw_grid.as_object().ok_or_else(|| {
                    StoreError::Serialization("grid entry is not an object".into())
                })?;
                let grid_name = grid_obj
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();

                let mut elements = Vec::new();
                if let Some(raw_elements) = grid_obj.get(KEY_ELEMENTS) {
                    let raw_elements = raw_elements.as_array().ok_or_else(|| {
                        StoreError::Serialization(format!(
                            "{KEY_ELEMENTS} of grid {grid_name:?} is not an array"
                        ))
                    })?;
                    for raw in raw_elements {
                        let obj = raw.as_object().cloned().ok_or_else(|| {
                            StoreError::Serialization("element entry is not an object".into())
                        })?;
                        elements.push(decode_element(obj)?);
                    }
                }
                grids.push(Grid {
                    name: grid_name,
                    elements,
                });
            }
        }
        Some(other) => {
            return Err(StoreError::Serialization(format!(
                "grid field is not an array: {other}"
            )))
        }
    }

    Ok(Project {
        owner_name,
        name,
        project_type: expected_type,
        grids,
        last_modified,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::models::{ElementBase, Priority, ScheduledTask};
    use chrono::Utc;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn base(name: &str) -> ElementBase {
        ElementBase {
            name: name.into(),
            x_pos: 10.0,
            y_pos: -4.5,
            x_scale: 2.0,
            y_scale: 0.5,
        }
    }

    // ------------------------------------------------------------------
    // Structural predicates, one test per predicate
    // ------------------------------------------------------------------

    #[test]
    fn test_predicate_todo_list() {
        assert!(looks_like_todo_list(&obj(json!({"scheduled_tasks": []}))));
        // A non-array container does not qualify
        assert!(!looks_like_todo_list(&obj(json!({"scheduled_tasks": 3}))));
        assert!(!looks_like_todo_list(&obj(json!({"name": "x"}))));
    }

    #[test]
    fn test_predicate_image() {
        assert!(looks_like_image(&obj(json!({"image_path": "/p.png"}))));
        assert!(looks_like_image(&obj(json!({"image_data": "AAAA"}))));
        assert!(!looks_like_image(&obj(json!({"video_path": "/v.mp4"}))));
    }

    #[test]
    fn test_predicate_video() {
        assert!(looks_like_video(&obj(json!({"video_path": "/v.mp4"}))));
        assert!(!looks_like_video(&obj(json!({"image_path": "/p.png"}))));
    }

    #[test]
    fn test_predicate_text_document() {
        assert!(looks_like_text_document(&obj(json!({"text_field": ""}))));
        assert!(!looks_like_text_document(&obj(json!({"name": "x"}))));
    }

    #[test]
    fn test_inference_order_prefers_todo_list() {
        // An object with both a task container and a text field is a to-do list.
        let raw = obj(json!({"scheduled_tasks": [], "text_field": "note"}));
        assert_eq!(infer_tag(&raw), Some(TAG_TODO_LIST));
    }

    #[test]
    fn test_inference_no_match() {
        assert_eq!(infer_tag(&obj(json!({"name": "n", "x_pos": 1}))), None);
    }

    // ------------------------------------------------------------------
    // Round trips
    // ------------------------------------------------------------------

    #[test]
    fn test_roundtrip_text_document() {
        let el = ScreenElement::TextDocument(TextDocument {
            base: base("notes"),
            text_field: "hello world".into(),
        });
        assert_eq!(decode_element(encode_element(&el)).unwrap(), el);
    }

    #[test]
    fn test_roundtrip_text_document_empty_strings() {
        let el = ScreenElement::TextDocument(TextDocument {
            base: ElementBase {
                name: String::new(),
                x_pos: 0.0,
                y_pos: 0.0,
                x_scale: 0.0,
                y_scale: -1.0,
            },
            text_field: String::new(),
        });
        assert_eq!(decode_element(encode_element(&el)).unwrap(), el);
    }

    #[test]
    fn test_roundtrip_image_with_legacy_inline_binary() {
        let el = ScreenElement::Image(Image {
            base: base("logo"),
            image_path: "/projects/local/p_assets/logo.png".into(),
            image_data: Some("aGVsbG8=".into()),
        });
        assert_eq!(decode_element(encode_element(&el)).unwrap(), el);

        let el = ScreenElement::Image(Image {
            base: base("logo"),
            image_path: String::new(),
            image_data: None,
        });
        assert_eq!(decode_element(encode_element(&el)).unwrap(), el);
    }

    #[test]
    fn test_roundtrip_video() {
        let el = ScreenElement::Video(Video {
            base: base("clip"),
            video_path: "/projects/hosted/p_assets/clip.mp4".into(),
            video_data: None,
        });
        assert_eq!(decode_element(encode_element(&el)).unwrap(), el);
    }

    #[test]
    fn test_roundtrip_todo_list_full() {
        let mut task = ScheduledTask::new("write brief", Priority::High, Utc::now());
        task.mark_done("bob", Utc::now());
        let el = ScreenElement::ToDoList(ToDoList {
            base: base("sprint"),
            scheduled_tasks: vec![task, ScheduledTask::new("review", Priority::Low, Utc::now())],
            collaborators: ["alice".to_string(), "bob".to_string()].into(),
            tags: ["urgent".to_string()].into(),
        });
        assert_eq!(decode_element(encode_element(&el)).unwrap(), el);
    }

    #[test]
    fn test_roundtrip_todo_list_empty_containers() {
        let el = ScreenElement::ToDoList(ToDoList {
            base: base("empty"),
            scheduled_tasks: vec![],
            collaborators: Default::default(),
            tags: Default::default(),
        });
        assert_eq!(decode_element(encode_element(&el)).unwrap(), el);
    }

    #[test]
    fn test_roundtrip_unrecognized_passthrough() {
        let raw = obj(json!({"name": "widget", "custom_field": [1, 2, 3]}));
        let el = decode_element(raw.clone()).unwrap();
        assert!(el.is_unrecognized());
        // Encoding returns the object unchanged — no type tag injected.
        assert_eq!(encode_element(&el), raw);
        assert_eq!(decode_element(encode_element(&el)).unwrap(), el);
    }

    // ------------------------------------------------------------------
    // Dispatch and fallback behavior
    // ------------------------------------------------------------------

    #[test]
    fn test_tagged_dispatch_is_strict() {
        // A tagged text document keeps its tag even though it has no text_field.
        let raw = obj(json!({"type": "text_document", "name": "t"}));
        let el = decode_element(raw).unwrap();
        assert!(matches!(el, ScreenElement::TextDocument(_)));
    }

    #[test]
    fn test_untagged_todo_list_inferred() {
        let raw = obj(json!({
            "name": "legacy list",
            "scheduled_tasks": [{"task_name": "old", "priority": "2"}],
            "tags": ["ops"],
        }));
        match decode_element(raw).unwrap() {
            ScreenElement::ToDoList(list) => {
                assert_eq!(list.base.name, "legacy list");
                assert_eq!(list.scheduled_tasks[0].priority, Priority::Medium);
            }
            other => panic!("expected todo list, got {other:?}"),
        }
    }

    #[test]
    fn test_untagged_image_and_video_and_text_inferred() {
        assert!(matches!(
            decode_element(obj(json!({"image_path": "/x.png"}))).unwrap(),
            ScreenElement::Image(_)
        ));
        assert!(matches!(
            decode_element(obj(json!({"video_path": "/x.mp4"}))).unwrap(),
            ScreenElement::Video(_)
        ));
        assert!(matches!(
            decode_element(obj(json!({"text_field": "hi"}))).unwrap(),
            ScreenElement::TextDocument(_)
        ));
    }

    #[test]
    fn test_unknown_tag_with_structural_match_decodes() {
        let raw = obj(json!({"type": "ToDoLst", "scheduled_tasks": []}));
        assert!(matches!(
            decode_element(raw).unwrap(),
            ScreenElement::ToDoList(_)
        ));
    }

    #[test]
    fn test_unknown_tag_without_structural_match_is_validation_error() {
        let raw = obj(json!({"type": "hologram", "name": "x"}));
        assert!(matches!(
            decode_element(raw),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn test_non_string_tag_is_validation_error() {
        let raw = obj(json!({"type": 7, "name": "x"}));
        assert!(matches!(
            decode_element(raw),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn test_bad_priority_is_serialization_error() {
        let raw = obj(json!({
            "type": "todo_list",
            "scheduled_tasks": [{"task_name": "x", "priority": "soon"}],
        }));
        assert!(matches!(
            decode_element(raw),
            Err(StoreError::Serialization(_))
        ));
    }

    // ------------------------------------------------------------------
    // Project document shape
    // ------------------------------------------------------------------

    fn sample_project() -> Project {
        let mut project = Project::new("Roadmap 2026", ProjectType::Hosted, "carol");
        let mut grid = Grid::new("Main");
        grid.elements.push(ScreenElement::TextDocument(TextDocument {
            base: base("readme"),
            text_field: "welcome".into(),
        }));
        grid.elements.push(ScreenElement::ToDoList(ToDoList {
            base: base("tasks"),
            scheduled_tasks: vec![ScheduledTask::new("kickoff", Priority::High, Utc::now())],
            collaborators: Default::default(),
            tags: ["launch".to_string()].into(),
        }));
        project.grids.push(grid);
        project.last_modified = Some("2026-08-01T00:00:00+00:00".into());
        project
    }

    #[test]
    fn test_project_document_shape() {
        let doc = encode_project(&sample_project());
        assert_eq!(doc["name"], "Roadmap 2026");
        assert_eq!(doc["owner_name"], "carol");
        assert_eq!(doc["project_type"], "hosted");
        assert_eq!(doc["lastModified"], "2026-08-01T00:00:00+00:00");
        assert_eq!(doc["grid"][0]["name"], "Main");
        let elements = doc["grid"][0]["Screen_elements"].as_array().unwrap();
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0]["type"], "text_document");
        assert_eq!(elements[1]["type"], "todo_list");
    }

    #[test]
    fn test_project_roundtrip() {
        let project = sample_project();
        let decoded = decode_project(encode_project(&project), ProjectType::Hosted).unwrap();
        assert_eq!(decoded, project);
    }

    #[test]
    fn test_decode_project_directory_is_authoritative() {
        let mut doc = encode_project(&sample_project());
        doc["project_type"] = json!("local");
        // The store found this file under hosted/ — the directory wins.
        let decoded = decode_project(doc, ProjectType::Hosted).unwrap();
        assert_eq!(decoded.project_type, ProjectType::Hosted);
    }

    #[test]
    fn test_decode_project_missing_name_fails() {
        let doc = json!({"owner_name": "x", "grid": []});
        assert!(matches!(
            decode_project(doc, ProjectType::Local),
            Err(StoreError::Serialization(_))
        ));
    }

    #[test]
    fn test_decode_project_tolerates_missing_grid() {
        let doc = json!({"name": "bare", "owner_name": "x"});
        let project = decode_project(doc, ProjectType::Local).unwrap();
        assert!(project.grids.is_empty());
        assert!(project.last_modified.is_none());
    }

    #[test]
    fn test_decode_project_rejects_non_array_grid() {
        let doc = json!({"name": "bad", "grid": {"name": "g"}});
        assert!(matches!(
            decode_project(doc, ProjectType::Local),
            Err(StoreError::Serialization(_))
        ));
    }
}
