//! Open screens in tab order and which one is active.

use collections::IndexMap;
use terminal::ScreenId;

use crate::screen::Screen;

/// Owns every open [`Screen`].
///
/// Whenever the registry is non-empty exactly one screen is active. Ids
/// are allocated monotonically and never reused.
#[derive(Default)]
pub struct ScreenRegistry {
    screens: IndexMap<ScreenId, Screen>,
    active: Option<ScreenId>,
    last_id: u64,
}

impl ScreenRegistry {
    pub fn allocate_id(&mut self) -> ScreenId {
        self.last_id += 1;
        ScreenId(self.last_id)
    }

    /// Add a screen. The first screen becomes active.
    pub fn insert(&mut self, screen: Screen) {
        let id = screen.id();
        self.screens.insert(id, screen);
        if self.active.is_none() {
            self.set_active(id);
        }
    }

    /// Remove a screen. Removing an unknown id is a no-op. If the active
    /// screen goes, the first remaining screen takes over.
    pub fn remove(&mut self, id: ScreenId) -> Option<Screen> {
        let screen = self.screens.shift_remove(&id)?;
        if self.active == Some(id) {
            self.active = None;
            if let Some(next) = self.screens.keys().next().copied() {
                self.set_active(next);
            }
        }
        Some(screen)
    }

    /// Make `id` the active screen and restart its jump navigation.
    pub fn set_active(&mut self, id: ScreenId) -> bool {
        let Some(screen) = self.screens.get_mut(&id) else {
            return false;
        };
        screen.jumps.reset_cursor();
        self.active = Some(id);
        true
    }

    pub fn active_id(&self) -> Option<ScreenId> {
        self.active
    }

    pub fn active(&self) -> Option<&Screen> {
        self.screens.get(&self.active?)
    }

    pub fn active_mut(&mut self) -> Option<&mut Screen> {
        self.screens.get_mut(&self.active?)
    }

    pub fn get(&self, id: ScreenId) -> Option<&Screen> {
        self.screens.get(&id)
    }

    pub fn get_mut(&mut self, id: ScreenId) -> Option<&mut Screen> {
        self.screens.get_mut(&id)
    }

    pub fn contains(&self, id: ScreenId) -> bool {
        self.screens.contains_key(&id)
    }

    /// Screen after (or before) `id` in tab order, wrapping around.
    pub fn neighbor(&self, id: ScreenId, forward: bool) -> Option<ScreenId> {
        let index = self.screens.get_index_of(&id)?;
        let len = self.screens.len();
        let next = if forward {
            (index + 1) % len
        } else {
            (index + len - 1) % len
        };
        self.screens.get_index(next).map(|(id, _)| *id)
    }

    pub fn ids(&self) -> impl Iterator<Item = ScreenId> + '_ {
        self.screens.keys().copied()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Screen> {
        self.screens.values_mut()
    }

    pub fn len(&self) -> usize {
        self.screens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.screens.is_empty()
    }
}
