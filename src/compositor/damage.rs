//! Screen damage accumulation
//!
//! Overlapping rects are merged as they arrive. Once the region limit is hit
//! the tracker collapses to full-screen damage until the next pass clears it.

use pane_proto::Rect;

#[derive(Debug, Clone)]
pub struct DamageTracker {
    screen: Rect,
    regions: Vec<Rect>,
    max_regions: usize,
    full_damage: bool,
}

impl DamageTracker {
    pub fn new(screen: Rect, max_regions: usize) -> Self {
        Self {
            screen,
            regions: Vec::new(),
            max_regions: max_regions.max(1),
            full_damage: false,
        }
    }

    /// Add a screen-space rect, clipped to the screen
    pub fn add(&mut self, rect: Rect) {
        let rect = rect.intersected(&self.screen);
        if rect.is_empty() || self.full_damage {
            return;
        }

        if let Some(index) = self.regions.iter().position(|r| r.intersects(&rect)) {
            self.regions[index] = self.regions[index].united(&rect);
            self.merge_all_overlapping();
            return;
        }

        if self.regions.len() < self.max_regions {
            self.regions.push(rect);
        } else {
            self.add_full_damage();
        }
    }

    pub fn add_full_damage(&mut self) {
        self.full_damage = true;
        self.regions.clear();
    }

    fn merge_all_overlapping(&mut self) {
        let mut i = 0;
        while i < self.regions.len() {
            let mut j = i + 1;
            let mut merged = false;
            while j < self.regions.len() {
                if self.regions[i].intersects(&self.regions[j]) {
                    let other = self.regions.swap_remove(j);
                    self.regions[i] = self.regions[i].united(&other);
                    merged = true;
                } else {
                    j += 1;
                }
            }
            // A grown rect can reach entries it was already compared with
            if !merged {
                i += 1;
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.full_damage && self.regions.is_empty()
    }

    #[cfg(test)]
    pub fn is_full(&self) -> bool {
        self.full_damage
    }

    /// Rects to repaint this pass
    pub fn regions(&self) -> Vec<Rect> {
        if self.full_damage {
            vec![self.screen]
        } else {
            self.regions.clone()
        }
    }

    pub fn clear(&mut self) {
        self.regions.clear();
        self.full_damage = false;
    }
}
