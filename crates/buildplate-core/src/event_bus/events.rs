//! Event type definitions for the event bus.
//!
//! Events are cloneable and serializable so they can be logged or replayed
//! in headless sessions.

use serde::{Deserialize, Serialize};

use crate::ids::ModelId;

/// Root event enum
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AppEvent {
    /// Model store mutations
    Store(StoreEvent),
    /// Scene renderer lifecycle (loads, disposal, build plate)
    Scene(SceneEvent),
    /// Pointer, gizmo and tool interaction
    Interaction(InteractionEvent),
    /// User-facing toast notifications
    Notification(Notification),
}

impl AppEvent {
    /// Get the category of this event
    pub fn category(&self) -> EventCategory {
        match self {
            AppEvent::Store(_) => EventCategory::Store,
            AppEvent::Scene(_) => EventCategory::Scene,
            AppEvent::Interaction(_) => EventCategory::Interaction,
            AppEvent::Notification(_) => EventCategory::Notification,
        }
    }

    /// Get a short description of this event for logging
    pub fn description(&self) -> String {
        match self {
            AppEvent::Store(e) => e.description(),
            AppEvent::Scene(e) => e.description(),
            AppEvent::Interaction(e) => e.description(),
            AppEvent::Notification(n) => format!("{}: {}", n.title, n.description),
        }
    }
}

/// Event category for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCategory {
    /// Model store events.
    Store,
    /// Scene renderer events.
    Scene,
    /// Interaction events.
    Interaction,
    /// Notification events.
    Notification,
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventCategory::Store => write!(f, "Store"),
            EventCategory::Scene => write!(f, "Scene"),
            EventCategory::Interaction => write!(f, "Interaction"),
            EventCategory::Notification => write!(f, "Notification"),
        }
    }
}

/// Model store mutations.
///
/// Each variant is published after the store has already applied the change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoreEvent {
    /// Active printer (and build volume) replaced.
    PrinterChanged {
        /// Resolved printer id (after default fallback).
        printer_id: String,
    },
    /// A model was appended.
    ModelAdded {
        /// New model id.
        id: ModelId,
        /// Geometry source path.
        path: String,
    },
    /// A model was removed.
    ModelRemoved {
        /// Removed model id.
        id: ModelId,
    },
    /// All models were removed.
    ModelsCleared,
    /// Position, rotation or scale of a model changed.
    TransformChanged {
        /// Changed model id.
        id: ModelId,
    },
    /// Selection changed.
    SelectionChanged {
        /// New selection, possibly dangling.
        selected: Option<ModelId>,
    },
    /// The validation error list was replaced.
    ValidationChanged {
        /// Number of errors now recorded.
        error_count: usize,
    },
}

impl StoreEvent {
    fn description(&self) -> String {
        match self {
            StoreEvent::PrinterChanged { printer_id } => format!("Printer: {}", printer_id),
            StoreEvent::ModelAdded { id, path } => format!("Added {} ({})", id, path),
            StoreEvent::ModelRemoved { id } => format!("Removed {}", id),
            StoreEvent::ModelsCleared => "All models cleared".to_string(),
            StoreEvent::TransformChanged { id } => format!("Transform of {}", id),
            StoreEvent::SelectionChanged { selected } => match selected {
                Some(id) => format!("Selected {}", id),
                None => "Selection cleared".to_string(),
            },
            StoreEvent::ValidationChanged { error_count } => {
                format!("{} placement errors", error_count)
            }
        }
    }

    /// True if the set of models changed.
    pub fn changes_model_list(&self) -> bool {
        matches!(
            self,
            StoreEvent::ModelAdded { .. } | StoreEvent::ModelRemoved { .. } | StoreEvent::ModelsCleared
        )
    }
}

/// Scene renderer lifecycle events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SceneEvent {
    /// Geometry load started for a model.
    LoadStarted {
        /// Model being loaded.
        id: ModelId,
        /// Geometry source path.
        path: String,
    },
    /// Geometry load finished and an instance was created.
    LoadCompleted {
        /// Loaded model.
        id: ModelId,
        /// Triangle count of the loaded geometry.
        triangles: usize,
    },
    /// Geometry load failed; the model stays without an instance.
    LoadFailed {
        /// Model whose load failed.
        id: ModelId,
        /// Failure message.
        error: String,
    },
    /// A completed load was dropped because the model was removed meanwhile.
    LoadDiscarded {
        /// Model that no longer exists.
        id: ModelId,
    },
    /// An instance was detached and its resources released.
    InstanceReleased {
        /// Model whose instance was released.
        id: ModelId,
    },
    /// Build-plate asset loaded for a printer.
    BuildPlateLoaded {
        /// Printer the plate belongs to.
        printer_id: String,
    },
    /// Build-plate asset failed to load.
    BuildPlateFailed {
        /// Printer the plate belongs to.
        printer_id: String,
        /// Failure message.
        error: String,
    },
}

impl SceneEvent {
    fn description(&self) -> String {
        match self {
            SceneEvent::LoadStarted { id, path } => format!("Loading {} from {}", id, path),
            SceneEvent::LoadCompleted { id, triangles } => {
                format!("Loaded {} ({} triangles)", id, triangles)
            }
            SceneEvent::LoadFailed { id, error } => format!("Load of {} failed: {}", id, error),
            SceneEvent::LoadDiscarded { id } => format!("Discarded load of {}", id),
            SceneEvent::InstanceReleased { id } => format!("Released {}", id),
            SceneEvent::BuildPlateLoaded { printer_id } => {
                format!("Build plate loaded: {}", printer_id)
            }
            SceneEvent::BuildPlateFailed { printer_id, error } => {
                format!("Build plate {} failed: {}", printer_id, error)
            }
        }
    }
}

/// Gizmo manipulation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ManipulationMode {
    /// Move along an axis.
    #[default]
    Translate,
    /// Rotate about an axis.
    Rotate,
    /// Scale along an axis or uniformly.
    Scale,
}

impl std::fmt::Display for ManipulationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ManipulationMode::Translate => write!(f, "translate"),
            ManipulationMode::Rotate => write!(f, "rotate"),
            ManipulationMode::Scale => write!(f, "scale"),
        }
    }
}

/// Interaction events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InteractionEvent {
    /// Hovered model changed.
    HoverChanged {
        /// Model under the pointer, if any.
        hovered: Option<ModelId>,
    },
    /// Adjustment tool broadcast a new gizmo mode.
    ToolChanged {
        /// Requested mode; `None` when no tool is active.
        mode: Option<ManipulationMode>,
    },
    /// A gizmo drag began.
    DragStarted {
        /// Model being dragged.
        id: ModelId,
        /// Active manipulation.
        mode: ManipulationMode,
    },
    /// A gizmo drag finished or was cancelled.
    DragEnded {
        /// Model that was dragged.
        id: ModelId,
        /// True if the drag was cancelled.
        cancelled: bool,
    },
}

impl InteractionEvent {
    fn description(&self) -> String {
        match self {
            InteractionEvent::HoverChanged { hovered } => match hovered {
                Some(id) => format!("Hovering {}", id),
                None => "Hover cleared".to_string(),
            },
            InteractionEvent::ToolChanged { mode } => match mode {
                Some(mode) => format!("Tool mode: {}", mode),
                None => "Tool mode: none".to_string(),
            },
            InteractionEvent::DragStarted { id, mode } => format!("Drag {} on {}", mode, id),
            InteractionEvent::DragEnded { id, cancelled } => {
                if *cancelled {
                    format!("Drag cancelled on {}", id)
                } else {
                    format!("Drag ended on {}", id)
                }
            }
        }
    }
}

/// Severity of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationSeverity {
    /// Informational.
    Info,
    /// Something the user should look at.
    Warning,
    /// An operation failed.
    Error,
}

/// A toast shown to the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Short title.
    pub title: String,
    /// Longer description.
    pub description: String,
    /// Severity.
    pub severity: NotificationSeverity,
}

impl Notification {
    /// Build an error notification.
    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            severity: NotificationSeverity::Error,
        }
    }
}
