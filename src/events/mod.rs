//! Event bus and event types shared by the executor, operations and observers

mod bus;
mod event;

pub use bus::{EventBus, Handler, Unsubscribe};
pub use event::{Event, EventKind, Level, OpKind, OpTarget};
