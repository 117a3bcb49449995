//! In-process typed event bus decoupling kernel producers (dialogue,
//! memory, emotion, plugin notifications) from consumers (memory ingestion,
//! external observability) via dotted-namespace events.

mod bus;
mod event;
mod pattern;

pub use bus::{EventBus, Handler, SubscriptionId};
pub use event::Event;
