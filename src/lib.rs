pub mod commands;
pub mod config;
pub mod document;
pub mod editor;
pub mod handles;
pub mod issues;
pub mod node;
pub mod render_cache;
pub mod selection;
pub mod snapshot;

pub use brushwork_commands;
pub use brushwork_geometry;

pub use config::{ConfigError, EditorConfig};
pub use document::{DetachedNode, Document, NodePosition};
pub use editor::Editor;
pub use handles::{BrushHandle, ExtractedHandles, HandleBrushMap, HandleSelection};
pub use issues::{Issue, IssueGenerator, IssueKind, NodeIssueGenerator, QuickFix};
pub use node::{BrushFaceHandle, BrushNode, Node, NodeId, NodeKind};
pub use render_cache::{BrushRenderCache, CachedEdge, CachedFace, CachedVertex};
pub use selection::Selection;
pub use snapshot::{Capture, Snapshot, SnapshotError};
