//! Window Manager Module
//!
//! Owns every client window, their z-order and focus, routes pointer input
//! and records the screen damage the compositor repaints. Notifications for
//! clients are queued in an outbox the server drains after each step.

pub mod backing_store;
pub mod button;
pub mod decorations;
pub mod events;
pub mod menu;
pub mod moveresize;
pub mod stacking;
pub mod window;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use pane_proto::{
    ClientId, CreateWindowParams, MouseButtons, Point, Rect, ServerMessage, Size, StandardCursor,
    WindowId, WindowType,
};
use tracing::{debug, info, trace};

use crate::compositor::damage::DamageTracker;
use crate::compositor::painter::Font;
use crate::config::{Config, FrameColors};
use crate::input::MotionPacket;
use crate::shared::Bitmap;
use backing_store::BackingStore;
use button::ButtonAction;
use decorations::{FrameAction, FramePaint, FrameState};
use events::{MouseEvent, MouseEventKind};
use menu::{MenuHit, MenuManager};
use moveresize::MoveResizeManager;
use stacking::StackingManager;
pub use window::{Window, WindowKey};

pub struct WindowManager {
    screen: Rect,
    windows: HashMap<WindowKey, Window>,
    stacking: StackingManager,
    active: Option<WindowKey>,
    highlight: Option<WindowKey>,
    hovered: Option<WindowKey>,
    moves: MoveResizeManager,
    damage: DamageTracker,
    menus: MenuManager,
    /// Notifications waiting to be delivered, in emission order
    outbox: Vec<(ClientId, ServerMessage)>,
    /// Replaced backing stores, released after the next compose pass
    retired: Vec<BackingStore>,
    next_window_id: HashMap<ClientId, WindowId>,
    default_icon: Arc<Bitmap>,
    cursor_position: Point,
    buttons: MouseButtons,
    colors: FrameColors,
    font: Font,
    speed: f32,
}

impl WindowManager {
    pub fn new(screen_size: Size, config: &Config) -> Self {
        let screen = Rect::from_parts(Point::default(), screen_size);
        let font = Font {
            glyph_width: config.window_manager.title_font.glyph_width,
            glyph_height: config.window_manager.title_font.glyph_height,
        };
        info!("Initializing window manager for {}x{} screen", screen_size.width, screen_size.height);
        Self {
            screen,
            windows: HashMap::new(),
            stacking: StackingManager::new(),
            active: None,
            highlight: None,
            hovered: None,
            moves: MoveResizeManager::new(),
            damage: DamageTracker::new(screen, config.compositor.max_damage_regions),
            menus: MenuManager::new(font, screen_size.width),
            outbox: Vec::new(),
            retired: Vec::new(),
            next_window_id: HashMap::new(),
            default_icon: Arc::new(Bitmap::default_window_icon()),
            cursor_position: screen.center(),
            buttons: MouseButtons::empty(),
            colors: config.window_manager.colors.clone(),
            font,
            speed: config.input.speed,
        }
    }

    pub fn screen_rect(&self) -> Rect {
        self.screen
    }

    pub fn window(&self, key: WindowKey) -> Option<&Window> {
        self.windows.get(&key)
    }

    pub fn window_mut(&mut self, key: WindowKey) -> Option<&mut Window> {
        self.windows.get_mut(&key)
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    pub fn active_window(&self) -> Option<WindowKey> {
        self.active
    }

    pub fn highlight_window(&self) -> Option<WindowKey> {
        self.highlight
    }

    pub fn hovered_window(&self) -> Option<WindowKey> {
        self.hovered
    }

    pub fn dragged_window(&self) -> Option<WindowKey> {
        self.moves.window()
    }

    pub fn stacking_order(&self) -> &[WindowKey] {
        self.stacking.get_stacking_order()
    }

    /// Windows bottom to top
    pub fn windows_back_to_front(&self) -> impl Iterator<Item = &Window> + '_ {
        self.stacking
            .get_stacking_order()
            .iter()
            .filter_map(|key| self.windows.get(key))
    }

    pub fn active_client(&self) -> Option<ClientId> {
        self.active.map(|key| key.client_id)
    }

    pub fn menus(&self) -> &MenuManager {
        &self.menus
    }

    pub fn menus_mut(&mut self) -> &mut MenuManager {
        &mut self.menus
    }

    pub fn damage(&self) -> &DamageTracker {
        &self.damage
    }

    pub fn damage_mut(&mut self) -> &mut DamageTracker {
        &mut self.damage
    }

    pub fn cursor_position(&self) -> Point {
        self.cursor_position
    }

    pub fn frame_state(&self, key: WindowKey) -> FrameState {
        if self.highlight == Some(key) {
            FrameState::Highlighted
        } else if self.moves.window() == Some(key) {
            FrameState::Dragging
        } else if self.active == Some(key) {
            FrameState::Active
        } else {
            FrameState::Inactive
        }
    }

    pub fn frame_paint<'a>(&'a self, window: &'a Window) -> FramePaint<'a> {
        FramePaint {
            state: self.frame_state(window.key()),
            title: window.title(),
            icon: window.icon(),
            colors: &self.colors,
            font: self.font,
        }
    }

    /// Cursor shape for the current pointer position
    pub fn current_cursor(&self) -> StandardCursor {
        if self.moves.is_active() {
            return StandardCursor::Arrow;
        }
        self.hovered
            .and_then(|key| self.windows.get(&key))
            .map(|window| window.override_cursor)
            .filter(|cursor| *cursor != StandardCursor::None)
            .unwrap_or(StandardCursor::Arrow)
    }

    /// Drain queued notifications
    pub fn take_outbox(&mut self) -> Vec<(ClientId, ServerMessage)> {
        std::mem::take(&mut self.outbox)
    }

    /// Drain backing stores replaced since the last compose pass
    pub fn take_retired(&mut self) -> Vec<BackingStore> {
        std::mem::take(&mut self.retired)
    }

    fn send(&mut self, client: ClientId, message: ServerMessage) {
        self.outbox.push((client, message));
    }

    /// Add screen-clipped damage
    pub fn invalidate(&mut self, rect: Rect) {
        self.damage.add(rect);
    }

    /// Full repaint on the next pass
    pub fn invalidate_screen(&mut self) {
        self.damage.add(self.screen);
    }

    pub fn invalidate_menubar(&mut self) {
        self.damage.add(self.menus.menubar_rect());
        if let Some(rect) = self.menus.open_menu_rect() {
            self.damage.add(rect);
        }
    }

    fn invalidate_frame(&mut self, key: WindowKey) {
        if let Some(window) = self.windows.get(&key) {
            self.damage.add(window.frame().rect());
        }
    }

    fn invalidate_titlebar(&mut self, key: WindowKey) {
        if let Some(window) = self.windows.get(&key) {
            self.damage.add(window.frame().titlebar_screen_rect());
        }
    }

    // ---- window lifecycle ----

    pub fn create_window(&mut self, client: ClientId, params: &CreateWindowParams) -> WindowId {
        let next = self.next_window_id.entry(client).or_insert(1);
        let window_id = *next;
        *next += 1;

        let key = WindowKey::new(client, window_id);
        let window = Window::new(key, params, Arc::clone(&self.default_icon));
        info!(
            "Client {} created {:?} window {} at {:?}",
            client, params.window_type, window_id, params.rect
        );
        self.windows.insert(key, window);
        self.stacking.add_window(key);

        if params.window_type == WindowType::Normal {
            self.set_active(Some(key));
        }
        if params.window_type == WindowType::Taskbar {
            self.send_all_window_states(client);
        }

        self.invalidate_frame(key);
        self.request_paint(key, Rect::from_parts(Point::default(), params.rect.size));
        self.notify_taskbars(key);
        window_id
    }

    pub fn destroy_window(&mut self, key: WindowKey) -> bool {
        let Some(mut window) = self.windows.remove(&key) else {
            return false;
        };
        debug!("Destroying window {:?}", key);
        self.stacking.remove_window(key);
        if self.active == Some(key) {
            self.active = None;
            self.invalidate_menubar();
        }
        if self.highlight == Some(key) {
            self.highlight = None;
        }
        if self.hovered == Some(key) {
            self.hovered = None;
        }
        self.moves.cancel_for(key);
        self.damage.add(window.frame().rect());
        if let Some(store) = window.take_backing_store() {
            self.retired.push(store);
        }
        if window.window_type() == WindowType::Normal {
            let message = ServerMessage::WmWindowRemoved {
                client_id: key.client_id,
                window_id: key.window_id,
            };
            for taskbar in self.taskbar_clients() {
                self.send(taskbar, message.clone());
            }
        }
        true
    }

    /// Drop every window and menu of a lost connection
    pub fn destroy_client(&mut self, client: ClientId) {
        let keys: Vec<WindowKey> = self
            .stacking
            .get_stacking_order()
            .iter()
            .copied()
            .filter(|key| key.client_id == client)
            .collect();
        for key in keys {
            self.destroy_window(key);
        }
        if self.menus.has_menubar(Some(client)) {
            self.invalidate_menubar();
        }
        self.menus.destroy_client(client);
        self.next_window_id.remove(&client);
        self.outbox.retain(|(recipient, _)| *recipient != client);
    }

    // ---- focus and stacking ----

    pub fn move_to_front_and_make_active(&mut self, key: WindowKey) {
        if !self.windows.contains_key(&key) {
            return;
        }
        self.stacking.raise_window(key);
        self.invalidate_frame(key);
        self.set_active(Some(key));
    }

    pub fn set_active(&mut self, key: Option<WindowKey>) {
        if self.active == key {
            return;
        }
        let previous = self.active;
        if previous.map(|k| k.client_id) != key.map(|k| k.client_id) {
            // The menubar follows the active client
            self.invalidate_menubar();
            self.menus.close();
        }
        self.active = key;

        if let Some(previous) = previous {
            self.invalidate_titlebar(previous);
            self.send(
                previous.client_id,
                ServerMessage::WindowDeactivated {
                    window_id: previous.window_id,
                },
            );
            self.notify_taskbars(previous);
        }
        if let Some(key) = key {
            self.invalidate_titlebar(key);
            self.send(
                key.client_id,
                ServerMessage::WindowActivated {
                    window_id: key.window_id,
                },
            );
            self.notify_taskbars(key);
        }
        if self.menus.has_menubar(self.active_client()) {
            self.invalidate_menubar();
        }
    }

    pub fn set_highlight_window(&mut self, key: Option<WindowKey>) {
        let key = key.filter(|key| self.windows.contains_key(key));
        if self.highlight == key {
            return;
        }
        if let Some(previous) = self.highlight {
            self.invalidate_titlebar(previous);
        }
        self.highlight = key;
        if let Some(key) = key {
            self.invalidate_titlebar(key);
        }
    }

    pub fn start_window_drag(&mut self, key: WindowKey, pointer: Point) {
        let Some(window) = self.windows.get(&key) else {
            return;
        };
        self.moves.start_move(key, pointer, window.rect());
        self.invalidate_titlebar(key);
    }

    // ---- geometry and state ----

    pub fn set_window_rect(&mut self, key: WindowKey, rect: Rect) -> bool {
        let Some(window) = self.windows.get_mut(&key) else {
            return false;
        };
        let old_rect = window.rect();
        let [old_frame, new_frame] = window.set_rect(rect);
        self.damage.add(old_frame);
        self.damage.add(new_frame);
        self.send(
            key.client_id,
            ServerMessage::WindowResized {
                window_id: key.window_id,
                rect,
                old_rect,
            },
        );
        if old_rect.size != rect.size {
            self.request_paint(key, Rect::from_parts(Point::default(), rect.size));
        }
        self.notify_taskbars(key);
        true
    }

    pub fn set_window_title(&mut self, key: WindowKey, title: &str) -> bool {
        let Some(window) = self.windows.get_mut(&key) else {
            return false;
        };
        window.set_title(title);
        self.invalidate_titlebar(key);
        self.notify_taskbars(key);
        true
    }

    pub fn set_window_opacity(&mut self, key: WindowKey, opacity: f32) -> bool {
        let Some(window) = self.windows.get_mut(&key) else {
            return false;
        };
        window.set_opacity(opacity);
        self.invalidate_frame(key);
        true
    }

    pub fn set_minimized(&mut self, key: WindowKey, minimized: bool) -> bool {
        let Some(window) = self.windows.get_mut(&key) else {
            return false;
        };
        if window.minimized == minimized {
            return true;
        }
        window.minimized = minimized;
        debug!("Window {:?} minimized={}", key, minimized);
        if minimized {
            if self.active == Some(key) {
                self.set_active(None);
            }
            if self.hovered == Some(key) {
                self.hovered = None;
            }
            self.moves.cancel_for(key);
        }
        self.invalidate_frame(key);
        self.notify_taskbars(key);
        true
    }

    // ---- painting ----

    /// Ask the owner to repaint `rect` (window-local)
    fn request_paint(&mut self, key: WindowKey, rect: Rect) {
        let Some(window) = self.windows.get_mut(&key) else {
            return;
        };
        let bounds = Rect::from_parts(Point::default(), window.size());
        let rect = if rect.is_empty() { bounds } else { rect.intersected(&bounds) };
        window.pending_paint = true;
        let window_size = window.size();
        self.send(
            key.client_id,
            ServerMessage::Paint {
                window_id: key.window_id,
                rect,
                window_size,
            },
        );
    }

    /// Client-side invalidation; answered with a paint request
    pub fn invalidate_window_content(&mut self, key: WindowKey, rect: Rect) -> bool {
        if !self.windows.contains_key(&key) {
            return false;
        }
        self.request_paint(key, rect);
        true
    }

    /// The client finished painting `rect` (window-local) into its store
    pub fn did_finish_painting(&mut self, key: WindowKey, rect: Rect) -> bool {
        let Some(window) = self.windows.get_mut(&key) else {
            return false;
        };
        window.pending_paint = false;
        let content = window.rect();
        let dirty = if rect.is_empty() {
            content
        } else {
            rect.translated_by(content.location).intersected(&content)
        };
        self.damage.add(dirty);
        true
    }

    /// Install a new backing store; the one it replaces is retired
    pub fn set_backing_store(&mut self, key: WindowKey, store: BackingStore, flush_immediately: bool) -> bool {
        let Some(window) = self.windows.get_mut(&key) else {
            return false;
        };
        let content = window.rect();
        if let Some(old) = window.replace_backing_store(store) {
            trace!("Retiring shared buffer {} of {:?}", old.shared_buffer_id(), key);
            self.retired.push(old);
        }
        if flush_immediately {
            self.damage.add(content);
        }
        true
    }

    // ---- taskbar notifications ----

    fn taskbar_clients(&self) -> BTreeSet<ClientId> {
        self.windows
            .values()
            .filter(|window| window.window_type() == WindowType::Taskbar)
            .map(Window::client_id)
            .collect()
    }

    fn notify_taskbars(&mut self, key: WindowKey) {
        let Some(window) = self.windows.get(&key) else {
            return;
        };
        if window.window_type() != WindowType::Normal {
            return;
        }
        let info = window.state_info(self.active == Some(key));
        for taskbar in self.taskbar_clients() {
            self.send(taskbar, ServerMessage::WmWindowStateChanged(info.clone()));
        }
    }

    fn send_all_window_states(&mut self, taskbar: ClientId) {
        let states: Vec<_> = self
            .windows_back_to_front()
            .filter(|window| window.window_type() == WindowType::Normal)
            .map(|window| window.state_info(self.active == Some(window.key())))
            .collect();
        for info in states {
            self.send(taskbar, ServerMessage::WmWindowStateChanged(info));
        }
    }

    // ---- input ----

    /// Apply one decoded device packet: move the pointer and synthesize
    /// button transitions.
    pub fn process_motion_packet(&mut self, packet: &MotionPacket) {
        let dx = (packet.dx as f32 * self.speed).round() as i32;
        // Device y grows upward, screen y grows downward
        let dy = (-packet.dy as f32 * self.speed).round() as i32;
        let position = Point::new(
            (self.cursor_position.x + dx).clamp(self.screen.left(), self.screen.right()),
            (self.cursor_position.y + dy).clamp(self.screen.top(), self.screen.bottom()),
        );
        let buttons = packet.buttons();
        let previous = self.buttons;

        if position != self.cursor_position {
            self.cursor_position = position;
            self.process_mouse_event(MouseEvent::new(
                MouseEventKind::Move,
                position,
                pane_proto::MouseButton::None,
                previous,
            ));
        }
        self.buttons = buttons;
        for button in buttons.pressed_since(previous) {
            self.process_mouse_event(MouseEvent::new(MouseEventKind::Down, position, button, buttons));
        }
        for button in buttons.released_since(previous) {
            self.process_mouse_event(MouseEvent::new(MouseEventKind::Up, position, button, buttons));
        }
    }

    /// Route a screen-space pointer event
    pub fn process_mouse_event(&mut self, event: MouseEvent) {
        self.cursor_position = event.position;

        if self.moves.is_active() {
            self.process_drag_event(&event);
            return;
        }

        if event.kind == MouseEventKind::Down && self.process_menu_event(&event) {
            return;
        }

        let mut delivered = BTreeSet::new();
        if event.kind == MouseEventKind::Move {
            let trackers: Vec<(WindowKey, Point)> = self
                .windows
                .values()
                .filter(|window| window.global_cursor_tracking && !window.minimized)
                .map(|window| (window.key(), window.rect().location))
                .collect();
            for (key, origin) in trackers {
                let local = event.translated(Point::new(-origin.x, -origin.y));
                self.send(
                    key.client_id,
                    ServerMessage::MouseMove {
                        window_id: key.window_id,
                        mouse: local.info(),
                    },
                );
                delivered.insert(key);
            }
        }

        let hit = self.stacking.front_to_back().find(|key| {
            self.windows
                .get(key)
                .is_some_and(|window| !window.minimized && window.frame().rect().contains(event.position))
        });
        let in_content = hit.filter(|key| {
            self.windows
                .get(key)
                .is_some_and(|window| window.rect().contains(event.position))
        });
        self.set_hovered(in_content);

        let mut frame_target = None;
        match (hit, in_content) {
            (None, _) => {
                if event.kind == MouseEventKind::Down {
                    self.set_active(None);
                }
            }
            (Some(key), Some(_)) => {
                if event.kind == MouseEventKind::Down {
                    self.move_to_front_and_make_active(key);
                }
                if !delivered.contains(&key) {
                    self.deliver_to_client(key, &event);
                }
            }
            (Some(key), None) => {
                frame_target = Some(key);
                self.deliver_to_frame(key, &event);
            }
        }

        // Frames the event did not reach drop their press/hover state
        let stale: Vec<WindowKey> = self
            .windows
            .iter_mut()
            .filter(|(key, _)| Some(**key) != frame_target)
            .filter_map(|(key, window)| window.frame_mut().reset_buttons(event.kind).then_some(*key))
            .collect();
        for key in stale {
            self.invalidate_titlebar(key);
        }
    }

    fn process_drag_event(&mut self, event: &MouseEvent) {
        match event.kind {
            MouseEventKind::Move => {
                if let Some((key, rect)) = self.moves.update_move(event.position) {
                    if let Some(window) = self.windows.get_mut(&key) {
                        let [old_frame, new_frame] = window.set_rect(rect);
                        self.damage.add(old_frame);
                        self.damage.add(new_frame);
                    }
                }
            }
            MouseEventKind::Up if event.button == pane_proto::MouseButton::Left => {
                if let Some((key, old_rect)) = self.moves.end_move() {
                    self.invalidate_titlebar(key);
                    if let Some(window) = self.windows.get(&key) {
                        let rect = window.rect();
                        self.send(
                            key.client_id,
                            ServerMessage::WindowResized {
                                window_id: key.window_id,
                                rect,
                                old_rect,
                            },
                        );
                    }
                    self.notify_taskbars(key);
                }
            }
            _ => {}
        }
    }

    /// Returns true when the menus consumed the event
    fn process_menu_event(&mut self, event: &MouseEvent) -> bool {
        let active_client = self.active_client();
        if !self.menus.is_open() && !self.menus.has_menubar(active_client) {
            return false;
        }
        self.invalidate_menubar();
        let hit = self.menus.on_mouse_down(active_client, event.position);
        self.invalidate_menubar();
        match hit {
            MenuHit::Activated {
                client_id,
                menu_id,
                identifier,
            } => {
                debug!("Menu item {} of menu {} activated", identifier, menu_id);
                self.send(client_id, ServerMessage::MenuItemActivated { menu_id, identifier });
                true
            }
            MenuHit::Handled => true,
            MenuHit::Missed => false,
        }
    }

    fn set_hovered(&mut self, key: Option<WindowKey>) {
        if self.hovered == key {
            return;
        }
        if let Some(previous) = self.hovered {
            if self.windows.contains_key(&previous) {
                self.send(
                    previous.client_id,
                    ServerMessage::WindowLeft {
                        window_id: previous.window_id,
                    },
                );
            }
        }
        self.hovered = key;
        if let Some(key) = key {
            self.send(
                key.client_id,
                ServerMessage::WindowEntered {
                    window_id: key.window_id,
                },
            );
        }
    }

    fn deliver_to_client(&mut self, key: WindowKey, event: &MouseEvent) {
        let Some(window) = self.windows.get(&key) else {
            return;
        };
        let origin = window.rect().location;
        let mouse = event.translated(Point::new(-origin.x, -origin.y)).info();
        let window_id = key.window_id;
        let message = match event.kind {
            MouseEventKind::Move => ServerMessage::MouseMove { window_id, mouse },
            MouseEventKind::Down => ServerMessage::MouseDown { window_id, mouse },
            MouseEventKind::Up => ServerMessage::MouseUp { window_id, mouse },
        };
        self.send(key.client_id, message);
    }

    fn deliver_to_frame(&mut self, key: WindowKey, event: &MouseEvent) {
        let Some(window) = self.windows.get_mut(&key) else {
            return;
        };
        let origin = window.frame().rect().location;
        let local = event.translated(Point::new(-origin.x, -origin.y));
        let actions = window.frame_mut().on_mouse_event(&local);

        for action in actions {
            match action {
                FrameAction::RaiseAndActivate => self.move_to_front_and_make_active(key),
                FrameAction::Button(ButtonAction::Close) => {
                    debug!("Close requested for {:?}", key);
                    self.send(
                        key.client_id,
                        ServerMessage::WindowCloseRequest {
                            window_id: key.window_id,
                        },
                    );
                }
                FrameAction::Button(ButtonAction::Minimize) => {
                    self.set_minimized(key, true);
                }
                FrameAction::StartDrag => self.start_window_drag(key, event.position),
                FrameAction::InvalidateTitlebar => self.invalidate_titlebar(key),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pane_proto::MouseButton;
    use proptest::prelude::*;

    const SCREEN: Size = Size::new(640, 480);

    fn manager() -> WindowManager {
        WindowManager::new(SCREEN, &Config::default())
    }

    fn create(wm: &mut WindowManager, client: ClientId, rect: Rect) -> WindowKey {
        let id = wm.create_window(client, &CreateWindowParams::normal(rect, "test"));
        WindowKey::new(client, id)
    }

    fn mouse(kind: MouseEventKind, x: i32, y: i32) -> MouseEvent {
        let button = match kind {
            MouseEventKind::Move => MouseButton::None,
            _ => MouseButton::Left,
        };
        let buttons = match kind {
            MouseEventKind::Down => MouseButtons::LEFT,
            _ => MouseButtons::empty(),
        };
        MouseEvent::new(kind, Point::new(x, y), button, buttons)
    }

    fn messages_for(outbox: &[(ClientId, ServerMessage)], client: ClientId) -> Vec<ServerMessage> {
        outbox
            .iter()
            .filter(|(recipient, _)| *recipient == client)
            .map(|(_, message)| message.clone())
            .collect()
    }

    #[test]
    fn test_create_window_activates_and_requests_paint() {
        let mut wm = manager();
        let key = create(&mut wm, 1, Rect::new(50, 50, 100, 80));
        assert_eq!(key.window_id, 1);
        assert_eq!(wm.active_window(), Some(key));
        assert_eq!(wm.stacking_order(), &[key]);
        assert!(!wm.damage().is_empty());

        let outbox = wm.take_outbox();
        assert!(outbox.contains(&(1, ServerMessage::WindowActivated { window_id: 1 })));
        assert!(outbox.contains(&(
            1,
            ServerMessage::Paint {
                window_id: 1,
                rect: Rect::new(0, 0, 100, 80),
                window_size: Size::new(100, 80),
            }
        )));
    }

    #[test]
    fn test_window_ids_are_per_client() {
        let mut wm = manager();
        let a = create(&mut wm, 1, Rect::new(0, 30, 10, 10));
        let b = create(&mut wm, 2, Rect::new(0, 30, 10, 10));
        let c = create(&mut wm, 1, Rect::new(0, 30, 10, 10));
        assert_eq!((a.window_id, b.window_id, c.window_id), (1, 1, 2));
    }

    #[test]
    fn test_move_to_front_and_make_active() {
        let mut wm = manager();
        let a = create(&mut wm, 1, Rect::new(50, 50, 100, 80));
        let b = create(&mut wm, 1, Rect::new(80, 80, 100, 80));
        wm.take_outbox();

        wm.move_to_front_and_make_active(a);
        assert_eq!(wm.active_window(), Some(a));
        assert_eq!(wm.stacking_order().last(), Some(&a));

        let messages = messages_for(&wm.take_outbox(), 1);
        assert!(messages.contains(&ServerMessage::WindowDeactivated { window_id: b.window_id }));
        assert!(messages.contains(&ServerMessage::WindowActivated { window_id: a.window_id }));
    }

    #[test]
    fn test_click_in_content_raises_and_reaches_client() {
        let mut wm = manager();
        let a = create(&mut wm, 1, Rect::new(50, 50, 100, 80));
        let _b = create(&mut wm, 2, Rect::new(300, 300, 100, 80));
        wm.take_outbox();

        wm.process_mouse_event(mouse(MouseEventKind::Down, 60, 70));
        assert_eq!(wm.active_window(), Some(a));
        assert_eq!(wm.stacking_order().last(), Some(&a));

        let messages = messages_for(&wm.take_outbox(), 1);
        let down = messages.iter().find_map(|message| match message {
            ServerMessage::MouseDown { window_id, mouse } => Some((*window_id, mouse.position)),
            _ => None,
        });
        assert_eq!(down, Some((a.window_id, Point::new(10, 20))));
    }

    #[test]
    fn test_click_on_nothing_clears_active() {
        let mut wm = manager();
        create(&mut wm, 1, Rect::new(50, 50, 100, 80));
        wm.process_mouse_event(mouse(MouseEventKind::Down, 600, 400));
        assert_eq!(wm.active_window(), None);
    }

    #[test]
    fn test_drag_moves_window_without_restacking() {
        let mut wm = manager();
        let a = create(&mut wm, 1, Rect::new(50, 50, 100, 80));
        let b = create(&mut wm, 1, Rect::new(300, 300, 100, 80));
        let order = wm.stacking_order().to_vec();
        assert_eq!(order, vec![a, b]);

        // Titlebar of b, left of the title text
        wm.process_mouse_event(mouse(MouseEventKind::Down, 305, 290));
        assert_eq!(wm.dragged_window(), Some(b));
        let order = wm.stacking_order().to_vec();

        for step in 1..=5 {
            wm.process_mouse_event(mouse(MouseEventKind::Move, 305 - step * 10, 290 - step * 5));
            assert_eq!(wm.stacking_order(), order.as_slice());
        }
        assert_eq!(wm.window(b).unwrap().rect(), Rect::new(250, 275, 100, 80));
        assert_eq!(wm.window(a).unwrap().rect(), Rect::new(50, 50, 100, 80));

        wm.take_outbox();
        wm.process_mouse_event(mouse(MouseEventKind::Up, 255, 265));
        assert_eq!(wm.dragged_window(), None);
        assert_eq!(wm.window(b).unwrap().rect(), Rect::new(250, 275, 100, 80));
        let resized: Vec<ServerMessage> = messages_for(&wm.take_outbox(), 1)
            .into_iter()
            .filter(|message| matches!(message, ServerMessage::WindowResized { .. }))
            .collect();
        assert_eq!(
            resized,
            vec![ServerMessage::WindowResized {
                window_id: b.window_id,
                rect: Rect::new(250, 275, 100, 80),
                old_rect: Rect::new(300, 300, 100, 80),
            }]
        );
    }

    #[test]
    fn test_frame_state_prefers_highlight_then_drag_then_active() {
        let mut wm = manager();
        let a = create(&mut wm, 1, Rect::new(50, 50, 100, 80));
        let b = create(&mut wm, 1, Rect::new(300, 300, 100, 80));
        assert_eq!(wm.frame_state(a), FrameState::Inactive);
        assert_eq!(wm.frame_state(b), FrameState::Active);

        wm.process_mouse_event(mouse(MouseEventKind::Down, 305, 290));
        assert_eq!(wm.frame_state(b), FrameState::Dragging);
        wm.set_highlight_window(Some(b));
        assert_eq!(wm.frame_state(b), FrameState::Highlighted);
        wm.set_highlight_window(None);
        assert_eq!(wm.frame_state(b), FrameState::Dragging);

        wm.process_mouse_event(mouse(MouseEventKind::Up, 305, 290));
        assert_eq!(wm.frame_state(b), FrameState::Active);
        assert_eq!(wm.frame_state(a), FrameState::Inactive);
    }

    #[test]
    fn test_destroying_dragged_or_highlighted_window_clears_state() {
        let mut wm = manager();
        let below = create(&mut wm, 1, Rect::new(50, 50, 200, 200));
        let top = create(&mut wm, 2, Rect::new(300, 300, 100, 80));
        wm.set_highlight_window(Some(below));

        wm.process_mouse_event(mouse(MouseEventKind::Down, 305, 290));
        assert_eq!(wm.dragged_window(), Some(top));
        assert!(wm.destroy_window(top));
        assert_eq!(wm.dragged_window(), None);
        wm.take_outbox();

        // The drag is gone, so this move only hovers the window below
        wm.process_mouse_event(mouse(MouseEventKind::Move, 100, 100));
        wm.process_mouse_event(mouse(MouseEventKind::Up, 100, 100));
        assert_eq!(wm.window(below).unwrap().rect(), Rect::new(50, 50, 200, 200));
        let outbox = wm.take_outbox();
        assert!(messages_for(&outbox, 2).is_empty());
        assert!(!messages_for(&outbox, 1)
            .iter()
            .any(|m| matches!(m, ServerMessage::WindowResized { .. })));

        assert_eq!(wm.highlight_window(), Some(below));
        assert!(wm.destroy_window(below));
        assert_eq!(wm.highlight_window(), None);
        wm.set_highlight_window(Some(below));
        assert_eq!(wm.highlight_window(), None);
    }

    #[test]
    fn test_close_button_sends_close_request() {
        let mut wm = manager();
        let key = create(&mut wm, 1, Rect::new(100, 100, 200, 100));
        let close = wm.window(key).unwrap().frame().buttons()[0].relative_rect();
        let origin = wm.window(key).unwrap().frame().rect().location;
        let x = origin.x + close.x() + 4;
        let y = origin.y + close.y() + 4;
        wm.take_outbox();

        wm.process_mouse_event(mouse(MouseEventKind::Down, x, y));
        wm.process_mouse_event(mouse(MouseEventKind::Up, x, y));
        let messages = messages_for(&wm.take_outbox(), 1);
        assert!(messages.contains(&ServerMessage::WindowCloseRequest { window_id: key.window_id }));
        assert_eq!(wm.dragged_window(), None);
    }

    #[test]
    fn test_minimize_button_hides_window_from_hit_testing() {
        let mut wm = manager();
        let key = create(&mut wm, 1, Rect::new(100, 100, 200, 100));
        let minimize = wm.window(key).unwrap().frame().buttons()[1].relative_rect();
        let origin = wm.window(key).unwrap().frame().rect().location;
        let x = origin.x + minimize.x() + 4;
        let y = origin.y + minimize.y() + 4;

        wm.process_mouse_event(mouse(MouseEventKind::Down, x, y));
        wm.process_mouse_event(mouse(MouseEventKind::Up, x, y));
        assert!(wm.window(key).unwrap().minimized);
        assert_eq!(wm.active_window(), None);

        wm.take_outbox();
        wm.process_mouse_event(mouse(MouseEventKind::Down, 150, 150));
        assert!(messages_for(&wm.take_outbox(), 1).is_empty());
    }

    #[test]
    fn test_destroy_active_window_then_hit_window_below() {
        let mut wm = manager();
        let below = create(&mut wm, 1, Rect::new(50, 50, 200, 200));
        let top = create(&mut wm, 2, Rect::new(100, 100, 50, 50));
        assert_eq!(wm.active_window(), Some(top));

        assert!(wm.destroy_window(top));
        assert_eq!(wm.active_window(), None);
        assert!(!wm.stacking_order().contains(&top));
        wm.take_outbox();

        wm.process_mouse_event(mouse(MouseEventKind::Down, 120, 120));
        assert_eq!(wm.active_window(), Some(below));
        assert!(messages_for(&wm.take_outbox(), 2).is_empty());

        wm.destroy_window(below);
        wm.process_mouse_event(mouse(MouseEventKind::Down, 120, 120));
        assert_eq!(wm.active_window(), None);
        assert!(wm.take_outbox().is_empty());
    }

    #[test]
    fn test_hover_emits_entered_and_left() {
        let mut wm = manager();
        let key = create(&mut wm, 1, Rect::new(50, 50, 100, 80));
        wm.take_outbox();

        wm.process_mouse_event(mouse(MouseEventKind::Move, 60, 60));
        wm.process_mouse_event(mouse(MouseEventKind::Move, 600, 400));
        let messages = messages_for(&wm.take_outbox(), 1);
        assert_eq!(messages[0], ServerMessage::WindowEntered { window_id: key.window_id });
        assert!(matches!(messages[1], ServerMessage::MouseMove { .. }));
        assert_eq!(messages[2], ServerMessage::WindowLeft { window_id: key.window_id });
    }

    #[test]
    fn test_global_cursor_tracking_receives_every_move() {
        let mut wm = manager();
        let key = create(&mut wm, 1, Rect::new(50, 50, 100, 80));
        wm.window_mut(key).unwrap().global_cursor_tracking = true;
        wm.take_outbox();

        wm.process_mouse_event(mouse(MouseEventKind::Move, 600, 400));
        let messages = messages_for(&wm.take_outbox(), 1);
        let moves: Vec<Point> = messages
            .iter()
            .filter_map(|message| match message {
                ServerMessage::MouseMove { mouse, .. } => Some(mouse.position),
                _ => None,
            })
            .collect();
        assert_eq!(moves, vec![Point::new(550, 350)]);
    }

    #[test]
    fn test_set_window_rect_emits_resize_and_paint() {
        let mut wm = manager();
        let key = create(&mut wm, 1, Rect::new(50, 50, 100, 80));
        wm.take_outbox();

        wm.set_window_rect(key, Rect::new(60, 60, 100, 80));
        let messages = messages_for(&wm.take_outbox(), 1);
        assert_eq!(messages.len(), 1);
        assert!(matches!(messages[0], ServerMessage::WindowResized { .. }));

        wm.set_window_rect(key, Rect::new(60, 60, 120, 90));
        let messages = messages_for(&wm.take_outbox(), 1);
        assert!(messages.iter().any(|m| matches!(m, ServerMessage::Paint { window_size, .. } if *window_size == Size::new(120, 90))));
    }

    #[test]
    fn test_taskbar_receives_window_state() {
        let mut wm = manager();
        let normal = create(&mut wm, 1, Rect::new(50, 50, 100, 80));
        let mut params = CreateWindowParams::normal(Rect::new(0, 450, 640, 30), "");
        params.window_type = WindowType::Taskbar;
        wm.create_window(9, &params);

        let messages = messages_for(&wm.take_outbox(), 9);
        let state = messages.iter().find_map(|message| match message {
            ServerMessage::WmWindowStateChanged(info) => Some(info.clone()),
            _ => None,
        });
        let state = state.unwrap();
        assert_eq!((state.client_id, state.window_id), (normal.client_id, normal.window_id));
        assert!(state.is_active);

        wm.destroy_window(normal);
        assert!(messages_for(&wm.take_outbox(), 9).contains(&ServerMessage::WmWindowRemoved {
            client_id: 1,
            window_id: 1
        }));
    }

    #[test]
    fn test_motion_packet_moves_pointer_and_clicks() {
        let mut wm = manager();
        let key = create(&mut wm, 1, Rect::new(300, 220, 100, 80));
        wm.take_outbox();
        let start = wm.cursor_position();

        wm.process_motion_packet(&MotionPacket { dx: 10, dy: 5, buttons: 0 });
        assert_eq!(wm.cursor_position(), Point::new(start.x + 10, start.y - 5));

        wm.process_motion_packet(&MotionPacket { dx: 0, dy: 0, buttons: 1 });
        let messages = messages_for(&wm.take_outbox(), 1);
        assert!(messages.iter().any(|m| matches!(m, ServerMessage::MouseDown { window_id, .. } if *window_id == key.window_id)));

        wm.process_motion_packet(&MotionPacket { dx: -5000, dy: -5000, buttons: 0 });
        assert_eq!(wm.cursor_position(), Point::new(0, 479));
    }

    #[test]
    fn test_backing_store_replacement_retires_old_store() {
        use crate::shm::SharedBufferPool;
        use pane_proto::BackingStoreInfo;

        let dir = tempfile::tempdir().unwrap();
        let mut pool = SharedBufferPool::new(dir.path(), 1 << 20);
        let mut wm = manager();
        let key = create(&mut wm, 1, Rect::new(10, 30, 4, 4));

        let attach = |pool: &mut SharedBufferPool| {
            let buffer = pool.create(64, 1).unwrap();
            let info = BackingStoreInfo {
                size: Size::new(4, 4),
                bits_per_pixel: 32,
                pitch: 16,
                shared_buffer_id: buffer.id(),
                has_alpha_channel: false,
            };
            BackingStore::attach(info, buffer, false).unwrap()
        };
        let first = attach(&mut pool);
        let first_id = first.shared_buffer_id();
        wm.set_backing_store(key, first, true);
        assert!(wm.take_retired().is_empty());

        let second = attach(&mut pool);
        let second_id = second.shared_buffer_id();
        wm.set_backing_store(key, second, true);
        let retired = wm.take_retired();
        assert_eq!(retired.len(), 1);
        assert_eq!(retired[0].shared_buffer_id(), first_id);
        assert_eq!(wm.window(key).unwrap().backing_store().unwrap().shared_buffer_id(), second_id);
    }

    #[test]
    fn test_destroy_client_removes_its_windows_only() {
        let mut wm = manager();
        create(&mut wm, 1, Rect::new(0, 30, 10, 10));
        let other = create(&mut wm, 2, Rect::new(0, 30, 10, 10));
        create(&mut wm, 1, Rect::new(0, 30, 10, 10));
        wm.destroy_client(1);
        assert_eq!(wm.stacking_order(), &[other]);
        assert_eq!(wm.window_count(), 1);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Create(ClientId),
        Destroy(usize),
        Raise(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1..4i32).prop_map(Op::Create),
            any::<usize>().prop_map(Op::Destroy),
            any::<usize>().prop_map(Op::Raise),
        ]
    }

    proptest! {
        #[test]
        fn test_stacking_holds_exactly_live_windows(ops in prop::collection::vec(op(), 0..64)) {
            let mut wm = manager();
            let mut live: Vec<WindowKey> = Vec::new();
            for op in ops {
                match op {
                    Op::Create(client) => live.push(create(&mut wm, client, Rect::new(10, 30, 50, 50))),
                    Op::Destroy(index) if !live.is_empty() => {
                        let key = live.remove(index % live.len());
                        prop_assert!(wm.destroy_window(key));
                    }
                    Op::Raise(index) if !live.is_empty() => {
                        let key = live[index % live.len()];
                        wm.move_to_front_and_make_active(key);
                        prop_assert_eq!(wm.active_window(), Some(key));
                        prop_assert_eq!(wm.stacking_order().last(), Some(&key));
                    }
                    _ => {}
                }
                let mut stacked = wm.stacking_order().to_vec();
                stacked.sort();
                let mut expected = live.clone();
                expected.sort();
                prop_assert_eq!(stacked, expected);
            }
        }
    }
}
