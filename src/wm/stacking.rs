//! Stacking Module
//!
//! Manages window z-order. The order is kept bottom to top: the last entry
//! is the front-most window.

use tracing::debug;

use super::window::WindowKey;

/// Stacking manager
#[derive(Debug, Default)]
pub struct StackingManager {
    /// Stacking order (bottom to top)
    stacking_order: Vec<WindowKey>,
}

impl StackingManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a window at the top
    pub fn add_window(&mut self, window: WindowKey) {
        debug_assert!(!self.stacking_order.contains(&window), "{window:?} stacked twice");
        if !self.stacking_order.contains(&window) {
            self.stacking_order.push(window);
        }
    }

    pub fn remove_window(&mut self, window: WindowKey) {
        self.stacking_order.retain(|&w| w != window);
    }

    /// Move a window to the top
    pub fn raise_window(&mut self, window: WindowKey) {
        debug!("Raising window {:?}", window);
        if let Some(index) = self.stacking_order.iter().position(|&w| w == window) {
            let key = self.stacking_order.remove(index);
            self.stacking_order.push(key);
        }
    }

    pub fn contains(&self, window: WindowKey) -> bool {
        self.stacking_order.contains(&window)
    }

    pub fn top(&self) -> Option<WindowKey> {
        self.stacking_order.last().copied()
    }

    /// Stacking order (bottom to top)
    pub fn get_stacking_order(&self) -> &[WindowKey] {
        &self.stacking_order
    }

    /// Front-most first, for hit testing
    pub fn front_to_back(&self) -> impl Iterator<Item = WindowKey> + '_ {
        self.stacking_order.iter().rev().copied()
    }

    pub fn len(&self) -> usize {
        self.stacking_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stacking_order.is_empty()
    }
}
