//! # Buildplate Core
//!
//! Shared building blocks for the Buildplate workspace:
//! - Model identifiers and colours
//! - Typed event bus for store, scene and interaction notifications
//!
//! Everything here is UI-agnostic and free of rendering concerns.

pub mod color;
pub mod event_bus;
pub mod ids;

pub use color::{Color, ColorParseError};
pub use event_bus::{
    AppEvent, EventBus, EventBusError, EventCategory, EventFilter,
    InteractionEvent, ManipulationMode, Notification, NotificationSeverity, SceneEvent,
    StoreEvent, SubscriptionId,
};
pub use ids::ModelId;
