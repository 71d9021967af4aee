//! # Event Bus Module
//!
//! Typed publish/subscribe used to connect the model store with the
//! components that react to it (scene renderer, placement monitor,
//! interaction controller, notifications).
//!
//! There is no process-wide instance: each viewport owns its bus and hands
//! it to the store that publishes on it.
//!
//! ## Usage
//!
//! ```rust
//! use buildplate_core::event_bus::{AppEvent, EventBus, EventCategory, EventFilter, StoreEvent};
//!
//! let bus = EventBus::new();
//! let subscription = bus.subscribe(
//!     EventFilter::Categories(vec![EventCategory::Store]),
//!     |event| {
//!         if let AppEvent::Store(change) = event {
//!             println!("store changed: {:?}", change);
//!         }
//!     },
//! );
//!
//! bus.publish(AppEvent::Store(StoreEvent::ModelsCleared)).ok();
//! bus.unsubscribe(subscription);
//! ```

mod bus;
mod events;

pub use bus::*;
pub use events::*;
