//! CollabCanvas Core Library
//!
//! Document model, undo history, interaction logic and sync plumbing for a
//! collaborative canvas of text, shape, image and document elements.

pub mod arrange;
pub mod autosave;
pub mod backend;
pub mod camera;
pub mod chat;
pub mod config;
pub mod editor;
pub mod element;
pub mod gateway;
pub mod history;
pub mod input;
pub mod selection;
pub mod session;
pub mod snapshot;
pub mod store;
pub mod sync;
pub mod tools;

pub use arrange::{Alignment, Distribution, GRID_SIZE, snap_point, snap_to_grid};
pub use autosave::{AutoSave, SaveStatus};
pub use backend::{Backend, BackendError, HttpBackend, MemoryBackend};
pub use camera::Viewport;
pub use chat::ChatFeed;
pub use config::{CanvasConfig, ConfigError, UserIdentity};
pub use editor::{Editor, EditorEvent};
pub use element::{Element, ElementId, ElementKind, ElementPatch, NewElement, ShapeType};
pub use gateway::SyncGateway;
pub use history::History;
pub use selection::{ResizeHandle, SelectionSet};
pub use session::{Session, SessionEvent};
pub use snapshot::{DocumentSnapshot, Theme, ViewSettings};
pub use store::{DocumentStore, StoreChange, StoreError};
pub use sync::{ClientMessage, ConnectionState, NativeWebSocket, ServerMessage, SyncEvent, Transport};
pub use tools::{Command, ToolKind, ToolManager};
