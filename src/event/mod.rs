//! Event system: raw input, picking, dispatch, enter/exit routing.

pub mod handler;
pub mod input;
pub mod mouse;
mod pick;
pub mod routing;
pub mod touch;

pub use handler::{
    DispatchOutcome, DragRequest, Event, EventContext, EventDispatcher, EventTarget, EventType, Handler, HandlerId,
    Phase, TouchDetail,
};
pub use input::{InputEvent, Key, KeyEvent, Modifiers, MouseButton, PointerAction, PointerEvent, TouchEvent, TouchPoint, TouchState};
pub use mouse::MouseState;
pub use routing::{EnterExitTracker, Transition};
pub use touch::TouchTracker;
