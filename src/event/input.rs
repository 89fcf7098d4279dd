//! Raw input events, decoupled from the platform layer.
//!
//! Defines [`InputEvent`] and the key, pointer, and touch structures it
//! carries. Coordinates are in scene space. Terminal events from crossterm
//! convert via `From` impls and [`from_crossterm`].

use bitflags::bitflags;

use crate::geometry::Point;

// ---------------------------------------------------------------------------
// Key
// ---------------------------------------------------------------------------

/// Keyboard key, decoupled from crossterm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Char(char),
    Enter,
    Escape,
    Tab,
    BackTab,
    Backspace,
    Delete,
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
    PageUp,
    PageDown,
    F(u8),
    /// A key without a dedicated variant.
    Other,
}

bitflags! {
    /// Modifier keys held during an event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        const SHIFT = 1 << 0;
        const CTRL  = 1 << 1;
        const ALT   = 1 << 2;
    }
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers::empty();
}

/// A keyboard event with key and modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub code: Key,
    pub modifiers: Modifiers,
}

impl KeyEvent {
    pub fn new(code: Key, modifiers: Modifiers) -> Self {
        Self { code, modifiers }
    }
}

// ---------------------------------------------------------------------------
// Pointer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Primary,
    Secondary,
    Middle,
}

/// What the pointer did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerAction {
    Pressed(MouseButton),
    Released(MouseButton),
    Moved,
    Dragged(MouseButton),
    /// The pointer left the window.
    Exited,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub action: PointerAction,
    pub x: f64,
    pub y: f64,
    pub modifiers: Modifiers,
}

impl PointerEvent {
    pub fn new(action: PointerAction, x: f64, y: f64) -> Self {
        Self { action, x, y, modifiers: Modifiers::NONE }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

// ---------------------------------------------------------------------------
// Touch
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TouchState {
    Pressed,
    Moved,
    Stationary,
    Released,
}

/// One contact as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchPoint {
    /// Platform id, stable for the lifetime of the contact.
    pub id: u64,
    pub state: TouchState,
    pub x: f64,
    pub y: f64,
}

impl TouchPoint {
    pub fn new(id: u64, state: TouchState, x: f64, y: f64) -> Self {
        Self { id, state, x, y }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// All active contacts at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct TouchEvent {
    pub points: Vec<TouchPoint>,
    /// Number of contacts the platform announced.
    pub count: usize,
    pub modifiers: Modifiers,
}

impl TouchEvent {
    pub fn new(points: Vec<TouchPoint>) -> Self {
        let count = points.len();
        Self { points, count, modifiers: Modifiers::NONE }
    }

    /// Override the announced count (builder).
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }
}

// ---------------------------------------------------------------------------
// InputEvent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Key(KeyEvent),
    Pointer(PointerEvent),
    Touch(TouchEvent),
    Resize { width: f64, height: f64 },
}

// ---------------------------------------------------------------------------
// From<crossterm> conversions
// ---------------------------------------------------------------------------

fn convert_modifiers(m: crossterm::event::KeyModifiers) -> Modifiers {
    let mut out = Modifiers::NONE;
    if m.contains(crossterm::event::KeyModifiers::SHIFT) {
        out |= Modifiers::SHIFT;
    }
    if m.contains(crossterm::event::KeyModifiers::CONTROL) {
        out |= Modifiers::CTRL;
    }
    if m.contains(crossterm::event::KeyModifiers::ALT) {
        out |= Modifiers::ALT;
    }
    out
}

impl From<crossterm::event::KeyEvent> for KeyEvent {
    fn from(ct: crossterm::event::KeyEvent) -> Self {
        use crossterm::event::KeyCode;
        let code = match ct.code {
            KeyCode::Char(c) => Key::Char(c),
            KeyCode::Enter => Key::Enter,
            KeyCode::Esc => Key::Escape,
            KeyCode::Tab => Key::Tab,
            KeyCode::BackTab => Key::BackTab,
            KeyCode::Backspace => Key::Backspace,
            KeyCode::Delete => Key::Delete,
            KeyCode::Left => Key::Left,
            KeyCode::Right => Key::Right,
            KeyCode::Up => Key::Up,
            KeyCode::Down => Key::Down,
            KeyCode::Home => Key::Home,
            KeyCode::End => Key::End,
            KeyCode::PageUp => Key::PageUp,
            KeyCode::PageDown => Key::PageDown,
            KeyCode::F(n) => Key::F(n),
            _ => Key::Other,
        };
        KeyEvent { code, modifiers: convert_modifiers(ct.modifiers) }
    }
}

impl From<crossterm::event::MouseButton> for MouseButton {
    fn from(b: crossterm::event::MouseButton) -> Self {
        match b {
            crossterm::event::MouseButton::Left => MouseButton::Primary,
            crossterm::event::MouseButton::Right => MouseButton::Secondary,
            crossterm::event::MouseButton::Middle => MouseButton::Middle,
        }
    }
}

/// Convert a crossterm mouse event. Scroll events have no counterpart.
pub fn pointer_from_crossterm(me: crossterm::event::MouseEvent) -> Option<PointerEvent> {
    use crossterm::event::MouseEventKind;
    let action = match me.kind {
        MouseEventKind::Down(b) => PointerAction::Pressed(b.into()),
        MouseEventKind::Up(b) => PointerAction::Released(b.into()),
        MouseEventKind::Drag(b) => PointerAction::Dragged(b.into()),
        MouseEventKind::Moved => PointerAction::Moved,
        _ => return None,
    };
    Some(
        PointerEvent::new(action, f64::from(me.column), f64::from(me.row))
            .with_modifiers(convert_modifiers(me.modifiers)),
    )
}

/// Convert a crossterm terminal event into an [`InputEvent`].
///
/// Returns `None` for events the scene graph does not route (focus changes,
/// paste, scrolling).
pub fn from_crossterm(event: crossterm::event::Event) -> Option<InputEvent> {
    match event {
        crossterm::event::Event::Key(ke) => Some(InputEvent::Key(ke.into())),
        crossterm::event::Event::Mouse(me) => pointer_from_crossterm(me).map(InputEvent::Pointer),
        crossterm::event::Event::Resize(w, h) => Some(InputEvent::Resize {
            width: f64::from(w),
            height: f64::from(h),
        }),
        _ => None,
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ct_mouse(kind: crossterm::event::MouseEventKind, column: u16, row: u16) -> crossterm::event::Event {
        crossterm::event::Event::Mouse(crossterm::event::MouseEvent {
            kind,
            column,
            row,
            modifiers: crossterm::event::KeyModifiers::NONE,
        })
    }

    // ── Modifiers ────────────────────────────────────────────────────

    #[test]
    fn modifiers_none_is_empty() {
        assert!(Modifiers::NONE.is_empty());
        assert!(Modifiers::CTRL.contains(Modifiers::NONE));
    }

    #[test]
    fn modifiers_combined() {
        let mods = Modifiers::CTRL | Modifiers::ALT;
        assert!(mods.contains(Modifiers::CTRL));
        assert!(!mods.contains(Modifiers::SHIFT));
    }

    // ── Key conversion ───────────────────────────────────────────────

    #[test]
    fn from_crossterm_key_with_ctrl() {
        let ct = crossterm::event::KeyEvent::new(
            crossterm::event::KeyCode::Char('c'),
            crossterm::event::KeyModifiers::CONTROL,
        );
        let ke = KeyEvent::from(ct);
        assert_eq!(ke.code, Key::Char('c'));
        assert!(ke.modifiers.contains(Modifiers::CTRL));
    }

    #[test]
    fn from_crossterm_key_navigation() {
        for (ct_code, expected) in [
            (crossterm::event::KeyCode::Tab, Key::Tab),
            (crossterm::event::KeyCode::BackTab, Key::BackTab),
            (crossterm::event::KeyCode::Home, Key::Home),
            (crossterm::event::KeyCode::Esc, Key::Escape),
            (crossterm::event::KeyCode::F(5), Key::F(5)),
            (crossterm::event::KeyCode::Insert, Key::Other),
        ] {
            let ct = crossterm::event::KeyEvent::new(ct_code, crossterm::event::KeyModifiers::NONE);
            assert_eq!(KeyEvent::from(ct).code, expected);
        }
    }

    // ── Event conversion ─────────────────────────────────────────────

    #[test]
    fn pointer_press_from_crossterm() {
        let ct = ct_mouse(
            crossterm::event::MouseEventKind::Down(crossterm::event::MouseButton::Left),
            10,
            5,
        );
        let Some(InputEvent::Pointer(pe)) = from_crossterm(ct) else { panic!("expected pointer event") };
        assert_eq!(pe.action, PointerAction::Pressed(MouseButton::Primary));
        assert_eq!(pe.position(), Point::new(10.0, 5.0));
    }

    #[test]
    fn pointer_drag_from_crossterm() {
        let ct = ct_mouse(
            crossterm::event::MouseEventKind::Drag(crossterm::event::MouseButton::Right),
            3,
            7,
        );
        let Some(InputEvent::Pointer(pe)) = from_crossterm(ct) else { panic!("expected pointer event") };
        assert_eq!(pe.action, PointerAction::Dragged(MouseButton::Secondary));
    }

    #[test]
    fn scroll_is_not_routed() {
        let ct = ct_mouse(crossterm::event::MouseEventKind::ScrollUp, 0, 0);
        assert_eq!(from_crossterm(ct), None);
    }

    #[test]
    fn resize_from_crossterm() {
        assert_eq!(
            from_crossterm(crossterm::event::Event::Resize(120, 40)),
            Some(InputEvent::Resize { width: 120.0, height: 40.0 })
        );
        assert_eq!(from_crossterm(crossterm::event::Event::FocusGained), None);
    }

    // ── Touch ────────────────────────────────────────────────────────

    #[test]
    fn touch_event_counts_points() {
        let event = TouchEvent::new(vec![
            TouchPoint::new(7, TouchState::Pressed, 1.0, 1.0),
            TouchPoint::new(9, TouchState::Pressed, 2.0, 2.0),
        ]);
        assert_eq!(event.count, 2);
        assert_eq!(event.with_count(3).count, 3);
    }
}
