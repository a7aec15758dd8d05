use std::ops::{Index, IndexMut};

use crate::renderer::software::sprites::VisSprite;

pub const INITIAL_VISSPRITES: usize = 128;

/// Handle of a vissprite: its offset in the pool. Valid until the next
/// [`VisSpritePool::reset`]; growth never invalidates it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VisSpriteId(usize);

impl VisSpriteId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Frame-scoped vissprite storage. Grows by doubling, never shrinks.
pub struct VisSpritePool {
    slots: Vec<VisSprite>,
    cursor: usize,
}

impl Default for VisSpritePool {
    fn default() -> Self {
        Self::new(INITIAL_VISSPRITES)
    }
}

impl VisSpritePool {
    pub fn new(initial: usize) -> Self {
        Self { slots: vec![VisSprite::default(); initial.max(1)], cursor: 0 }
    }

    /// Forget every sprite of the previous frame; keeps the storage.
    #[inline]
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Hand out a fresh (defaulted) slot.
    pub fn allocate(&mut self) -> VisSpriteId {
        if self.cursor == self.slots.len() {
            let grown = self.slots.len() * 2;
            self.slots.resize(grown, VisSprite::default());
            log::debug!("vissprite pool grown to {grown}");
        }
        let id = VisSpriteId(self.cursor);
        self.cursor += 1;
        self.slots[id.0] = VisSprite::default();
        id
    }

    pub fn push(&mut self, vis: VisSprite) -> VisSpriteId {
        let id = self.allocate();
        self.slots[id.0] = vis;
        id
    }

    #[inline]
    pub fn get(&self, id: VisSpriteId) -> Option<&VisSprite> {
        self.slots[..self.cursor].get(id.0)
    }

    #[inline]
    pub fn get_mut(&mut self, id: VisSpriteId) -> Option<&mut VisSprite> {
        self.slots[..self.cursor].get_mut(id.0)
    }

    /// Sprites allocated this frame.
    #[inline]
    pub fn len(&self) -> usize {
        self.cursor
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cursor == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn ids(&self) -> impl Iterator<Item = VisSpriteId> + use<> {
        (0..self.cursor).map(VisSpriteId)
    }

    pub fn iter(&self) -> impl Iterator<Item = &VisSprite> + '_ {
        self.slots[..self.cursor].iter()
    }
}

impl Index<VisSpriteId> for VisSpritePool {
    type Output = VisSprite;
    fn index(&self, id: VisSpriteId) -> &VisSprite {
        &self.slots[..self.cursor][id.0]
    }
}

impl IndexMut<VisSpriteId> for VisSpritePool {
    fn index_mut(&mut self, id: VisSpriteId) -> &mut VisSprite {
        &mut self.slots[..self.cursor][id.0]
    }
}
