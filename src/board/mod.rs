//! Project board domain model and the wire codec for its element hierarchy.

pub mod codec;
pub mod models;

pub use models::{
    ElementBase, Grid, Image, Priority, Project, ProjectSummary, ProjectType, ScheduledTask,
    ScreenElement, TextDocument, ToDoList, Video,
};
