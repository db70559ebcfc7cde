//! Menu Module
//!
//! Client-defined menus and menubars. The active client's application
//! menubar is drawn across the top of the screen by the server; clicking a
//! title opens its menu and clicking an item is reported back to the client.

use std::collections::HashMap;

use pane_proto::{ClientId, MenuId, MenubarId, Point, Rect};
use thiserror::Error;
use tracing::debug;

use crate::compositor::painter::{Font, Painter, TextAlignment};
use crate::shared::Color;

pub const MENUBAR_HEIGHT: i32 = 18;
const ITEM_HEIGHT: i32 = 16;
const SEPARATOR_HEIGHT: i32 = 8;
const MENU_PADDING: i32 = 2;
const TITLE_PADDING: i32 = 8;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MenuError {
    #[error("no menu with id {0}")]
    NoSuchMenu(MenuId),

    #[error("no menubar with id {0}")]
    NoSuchMenubar(MenubarId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuItem {
    Action {
        identifier: u32,
        text: String,
        shortcut: String,
    },
    Separator,
}

impl MenuItem {
    fn height(&self) -> i32 {
        match self {
            MenuItem::Action { .. } => ITEM_HEIGHT,
            MenuItem::Separator => SEPARATOR_HEIGHT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Menu {
    pub id: MenuId,
    pub client_id: ClientId,
    pub name: String,
    pub items: Vec<MenuItem>,
}

#[derive(Debug, Clone)]
pub struct Menubar {
    pub id: MenubarId,
    pub client_id: ClientId,
    pub menus: Vec<MenuId>,
}

/// Result of offering a mouse-down to the menus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuHit {
    Activated {
        client_id: ClientId,
        menu_id: MenuId,
        identifier: u32,
    },
    /// Consumed without activating anything
    Handled,
    /// Not over any menu; the event continues to the windows
    Missed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpenMenu {
    menu_id: MenuId,
    title_rect: Rect,
}

/// Menu manager
pub struct MenuManager {
    menus: HashMap<MenuId, Menu>,
    menubars: HashMap<MenubarId, Menubar>,
    app_menubars: HashMap<ClientId, MenubarId>,
    next_menu_id: MenuId,
    next_menubar_id: MenubarId,
    open: Option<OpenMenu>,
    font: Font,
    screen_width: i32,
}

impl MenuManager {
    pub fn new(font: Font, screen_width: i32) -> Self {
        Self {
            menus: HashMap::new(),
            menubars: HashMap::new(),
            app_menubars: HashMap::new(),
            next_menu_id: 1,
            next_menubar_id: 1,
            open: None,
            font,
            screen_width,
        }
    }

    pub fn create_menubar(&mut self, client_id: ClientId) -> MenubarId {
        let id = self.next_menubar_id;
        self.next_menubar_id += 1;
        self.menubars.insert(
            id,
            Menubar {
                id,
                client_id,
                menus: Vec::new(),
            },
        );
        debug!("Client {} created menubar {}", client_id, id);
        id
    }

    pub fn destroy_menubar(&mut self, client_id: ClientId, id: MenubarId) -> Result<(), MenuError> {
        self.menubar(client_id, id)?;
        self.menubars.remove(&id);
        if self.app_menubars.get(&client_id) == Some(&id) {
            self.app_menubars.remove(&client_id);
            self.open = None;
        }
        Ok(())
    }

    pub fn create_menu(&mut self, client_id: ClientId, name: &str) -> MenuId {
        let id = self.next_menu_id;
        self.next_menu_id += 1;
        self.menus.insert(
            id,
            Menu {
                id,
                client_id,
                name: name.to_owned(),
                items: Vec::new(),
            },
        );
        id
    }

    pub fn destroy_menu(&mut self, client_id: ClientId, id: MenuId) -> Result<(), MenuError> {
        self.menu(client_id, id)?;
        self.menus.remove(&id);
        for menubar in self.menubars.values_mut() {
            menubar.menus.retain(|&menu| menu != id);
        }
        if self.open.is_some_and(|open| open.menu_id == id) {
            self.open = None;
        }
        Ok(())
    }

    pub fn add_menu_to_menubar(
        &mut self,
        client_id: ClientId,
        menubar_id: MenubarId,
        menu_id: MenuId,
    ) -> Result<(), MenuError> {
        self.menu(client_id, menu_id)?;
        let menubar = self
            .menubars
            .get_mut(&menubar_id)
            .filter(|menubar| menubar.client_id == client_id)
            .ok_or(MenuError::NoSuchMenubar(menubar_id))?;
        menubar.menus.push(menu_id);
        Ok(())
    }

    pub fn set_application_menubar(
        &mut self,
        client_id: ClientId,
        menubar_id: MenubarId,
    ) -> Result<(), MenuError> {
        self.menubar(client_id, menubar_id)?;
        self.app_menubars.insert(client_id, menubar_id);
        self.open = None;
        Ok(())
    }

    pub fn add_item(
        &mut self,
        client_id: ClientId,
        menu_id: MenuId,
        item: MenuItem,
    ) -> Result<(), MenuError> {
        self.menus
            .get_mut(&menu_id)
            .filter(|menu| menu.client_id == client_id)
            .ok_or(MenuError::NoSuchMenu(menu_id))?
            .items
            .push(item);
        Ok(())
    }

    /// Drop every menu and menubar of a disconnected client
    pub fn destroy_client(&mut self, client_id: ClientId) {
        if let Some(open) = self.open {
            if self.menus.get(&open.menu_id).is_some_and(|m| m.client_id == client_id) {
                self.open = None;
            }
        }
        self.menus.retain(|_, menu| menu.client_id != client_id);
        self.menubars.retain(|_, menubar| menubar.client_id != client_id);
        self.app_menubars.remove(&client_id);
    }

    fn menu(&self, client_id: ClientId, id: MenuId) -> Result<&Menu, MenuError> {
        self.menus
            .get(&id)
            .filter(|menu| menu.client_id == client_id)
            .ok_or(MenuError::NoSuchMenu(id))
    }

    fn menubar(&self, client_id: ClientId, id: MenubarId) -> Result<&Menubar, MenuError> {
        self.menubars
            .get(&id)
            .filter(|menubar| menubar.client_id == client_id)
            .ok_or(MenuError::NoSuchMenubar(id))
    }

    pub fn menubar_rect(&self) -> Rect {
        Rect::new(0, 0, self.screen_width, MENUBAR_HEIGHT)
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    pub fn close(&mut self) {
        self.open = None;
    }

    /// Menu titles of `client_id`'s application menubar with their rects
    fn title_rects(&self, client_id: Option<ClientId>) -> Vec<(MenuId, Rect)> {
        let Some(menubar) = client_id
            .and_then(|client| self.app_menubars.get(&client))
            .and_then(|id| self.menubars.get(id))
        else {
            return Vec::new();
        };
        let mut x = 4;
        menubar
            .menus
            .iter()
            .filter_map(|id| self.menus.get(id))
            .map(|menu| {
                let width = self.font.text_width(&menu.name) + TITLE_PADDING * 2;
                let rect = Rect::new(x, 0, width, MENUBAR_HEIGHT);
                x += width;
                (menu.id, rect)
            })
            .collect()
    }

    pub fn has_menubar(&self, client_id: Option<ClientId>) -> bool {
        client_id.is_some_and(|client| self.app_menubars.contains_key(&client))
    }

    fn dropdown_rect(&self, open: OpenMenu) -> Option<Rect> {
        let menu = self.menus.get(&open.menu_id)?;
        let content_width = menu
            .items
            .iter()
            .map(|item| match item {
                MenuItem::Action { text, shortcut, .. } if !shortcut.is_empty() => {
                    self.font.text_width(text) + self.font.text_width(shortcut) + 24
                }
                MenuItem::Action { text, .. } => self.font.text_width(text),
                MenuItem::Separator => 0,
            })
            .max()
            .unwrap_or(0);
        let height: i32 = menu.items.iter().map(MenuItem::height).sum();
        Some(Rect::new(
            open.title_rect.x(),
            MENUBAR_HEIGHT,
            (content_width + TITLE_PADDING * 2).max(100),
            height + MENU_PADDING * 2,
        ))
    }

    /// Screen rect of the open dropdown
    pub fn open_menu_rect(&self) -> Option<Rect> {
        self.open.and_then(|open| self.dropdown_rect(open))
    }

    /// Offer a screen-space mouse-down to the menus
    pub fn on_mouse_down(&mut self, active_client: Option<ClientId>, point: Point) -> MenuHit {
        if let Some(open) = self.open {
            if let Some(rect) = self.dropdown_rect(open) {
                if rect.contains(point) {
                    let hit = self.item_at(open.menu_id, rect, point);
                    self.open = None;
                    return hit;
                }
            }
        }

        if self.has_menubar(active_client) && self.menubar_rect().contains(point) {
            let title = self
                .title_rects(active_client)
                .into_iter()
                .find(|(_, rect)| rect.contains(point));
            self.open = match (title, self.open) {
                (Some((menu_id, _)), Some(open)) if open.menu_id == menu_id => None,
                (Some((menu_id, title_rect)), _) => Some(OpenMenu { menu_id, title_rect }),
                (None, _) => None,
            };
            return MenuHit::Handled;
        }

        // Clicking elsewhere closes the menu and falls through
        self.open = None;
        MenuHit::Missed
    }

    fn item_at(&self, menu_id: MenuId, dropdown: Rect, point: Point) -> MenuHit {
        let Some(menu) = self.menus.get(&menu_id) else {
            return MenuHit::Handled;
        };
        let mut y = dropdown.y() + MENU_PADDING;
        for item in &menu.items {
            let height = item.height();
            if point.y >= y && point.y < y + height {
                return match item {
                    MenuItem::Action { identifier, .. } => MenuHit::Activated {
                        client_id: menu.client_id,
                        menu_id,
                        identifier: *identifier,
                    },
                    MenuItem::Separator => MenuHit::Handled,
                };
            }
            y += height;
        }
        MenuHit::Handled
    }

    /// Paint the menubar and any open dropdown in screen space
    pub fn paint(&self, painter: &mut Painter<'_>, active_client: Option<ClientId>) {
        if !self.has_menubar(active_client) {
            return;
        }
        let bar = self.menubar_rect();
        painter.fill_rect(bar, Color::LIGHT_GRAY);
        painter.draw_line(
            Point::new(bar.left(), bar.bottom()),
            Point::new(bar.right(), bar.bottom()),
            Color::DARK_GRAY,
        );

        let open_id = self.open.map(|open| open.menu_id);
        for (menu_id, rect) in self.title_rects(active_client) {
            let Some(menu) = self.menus.get(&menu_id) else {
                continue;
            };
            let text_color = if open_id == Some(menu_id) {
                painter.fill_rect(rect, Color::DARK_GRAY);
                Color::WHITE
            } else {
                Color::BLACK
            };
            painter.draw_text(rect, &menu.name, self.font, TextAlignment::Center, text_color);
        }

        let Some(open) = self.open else {
            return;
        };
        let (Some(menu), Some(rect)) = (self.menus.get(&open.menu_id), self.dropdown_rect(open)) else {
            return;
        };
        painter.fill_rect(rect, Color::WHITE);
        painter.draw_rect(rect, Color::BLACK);
        let mut y = rect.y() + MENU_PADDING;
        for item in &menu.items {
            let height = item.height();
            let item_rect = Rect::new(rect.x() + TITLE_PADDING, y, rect.width() - TITLE_PADDING * 2, height);
            match item {
                MenuItem::Action { text, shortcut, .. } => {
                    painter.draw_text(item_rect, text, self.font, TextAlignment::CenterLeft, Color::BLACK);
                    if !shortcut.is_empty() {
                        let width = self.font.text_width(shortcut);
                        let shortcut_rect = Rect::new(item_rect.right() + 1 - width, y, width, height);
                        painter.draw_text(
                            shortcut_rect,
                            shortcut,
                            self.font,
                            TextAlignment::CenterLeft,
                            Color::MID_GRAY,
                        );
                    }
                }
                MenuItem::Separator => {
                    let line_y = y + height / 2;
                    painter.draw_line(
                        Point::new(rect.left() + 1, line_y),
                        Point::new(rect.right() - 1, line_y),
                        Color::MID_GRAY,
                    );
                }
            }
            y += height;
        }
    }
}
