use std::cmp::Ordering;

use crate::renderer::software::{
    pool::{VisSpriteId, VisSpritePool},
    sprites::VisSprite,
};

/// Painter's order: farther first; at equal depth the taller top first.
#[inline]
pub fn back_to_front(a: &VisSprite, b: &VisSprite) -> Ordering {
    b.depth.cmp(&a.depth).then_with(|| b.gzt.cmp(&a.gzt))
}

/// Reusable sort buffer; orders the pool back to front every frame.
#[derive(Default)]
pub struct DepthSorter {
    order: Vec<VisSpriteId>,
}

impl DepthSorter {
    /// Ties on both keys keep allocation order, so the result is the same
    /// on every run.
    pub fn sort(&mut self, pool: &VisSpritePool) -> &[VisSpriteId] {
        self.order.clear();
        self.order.extend(pool.ids());
        self.order
            .sort_unstable_by(|&a, &b| back_to_front(&pool[a], &pool[b]).then(a.cmp(&b)));
        &self.order
    }

    pub(crate) fn take(&mut self) -> Vec<VisSpriteId> {
        std::mem::take(&mut self.order)
    }

    pub(crate) fn restore(&mut self, order: Vec<VisSpriteId>) {
        self.order = order;
    }
}
