//! Fixed-capacity particle storage.
//!
//! Live particles form a chain through their `next` link, newest first.
//! Free slots sit on a stack of indices. Every slot is in exactly one of
//! the two at all times and indices never move.

use crate::fixed::Fixed;

/// Stable index of a particle slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParticleId(u32);

impl ParticleId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Particle {
    pub x: Fixed,
    pub y: Fixed,
    pub z: Fixed,
    /// Palette index.
    pub color: u8,
    /// Opacity 0..=255.
    pub trans: u8,
    /// Footprint in map units / 8.
    pub size: u8,
    next: Option<ParticleId>,
}

impl Particle {
    pub fn new(x: Fixed, y: Fixed, z: Fixed, color: u8, trans: u8, size: u8) -> Self {
        Self { x, y, z, color, trans, size, next: None }
    }
}

pub struct ParticleSlab {
    slots: Vec<Particle>,
    free: Vec<ParticleId>,
    active: Option<ParticleId>,
    active_len: usize,
}

impl ParticleSlab {
    pub fn new(capacity: usize) -> Self {
        let mut slab = Self {
            slots: vec![Particle::default(); capacity],
            free: Vec::with_capacity(capacity),
            active: None,
            active_len: 0,
        };
        slab.clear();
        slab
    }

    /// Retire every particle.
    pub fn clear(&mut self) {
        self.slots.fill(Particle::default());
        self.free.clear();
        // Lowest index on top so allocation runs 0, 1, 2, ...
        self.free.extend((0..self.slots.len() as u32).rev().map(ParticleId));
        self.active = None;
        self.active_len = 0;
    }

    /// Take a free slot and put it at the head of the active chain.
    /// `None` when every slot is in use.
    pub fn new_particle(&mut self, p: Particle) -> Option<ParticleId> {
        let id = self.free.pop()?;
        self.slots[id.index()] = Particle { next: self.active, ..p };
        self.active = Some(id);
        self.active_len += 1;
        Some(id)
    }

    #[inline]
    pub fn get(&self, id: ParticleId) -> Option<&Particle> {
        self.slots.get(id.index())
    }

    #[inline]
    pub fn get_mut(&mut self, id: ParticleId) -> Option<&mut Particle> {
        self.slots.get_mut(id.index())
    }

    /// Active particles, newest first.
    pub fn active(&self) -> impl Iterator<Item = (ParticleId, &Particle)> + '_ {
        let mut cur = self.active;
        std::iter::from_fn(move || {
            let id = cur?;
            let p = &self.slots[id.index()];
            cur = p.next;
            Some((id, p))
        })
    }

    /// Keep the active particles for which `keep` returns true; the rest
    /// go back on the free stack. Chain order is preserved.
    pub fn retain(&mut self, mut keep: impl FnMut(&mut Particle) -> bool) {
        let mut cur = self.active;
        let mut prev: Option<ParticleId> = None;
        while let Some(id) = cur {
            let p = &mut self.slots[id.index()];
            let next = p.next;
            if keep(p) {
                prev = Some(id);
            } else {
                p.next = None;
                match prev {
                    Some(prev) => self.slots[prev.index()].next = next,
                    None => self.active = next,
                }
                self.free.push(id);
                self.active_len -= 1;
            }
            cur = next;
        }
    }

    #[inline]
    pub fn active_len(&self) -> usize {
        self.active_len
    }

    #[inline]
    pub fn free_len(&self) -> usize {
        self.free.len()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    /// Active chain and free stack together cover every slot once.
    fn assert_partition(slab: &ParticleSlab) {
        let mut seen = HashSet::new();
        for (id, _) in slab.active() {
            assert!(seen.insert(id), "{id:?} twice in the active chain");
        }
        assert_eq!(seen.len(), slab.active_len());
        for &id in &slab.free {
            assert!(seen.insert(id), "{id:?} both free and active");
        }
        assert_eq!(seen.len(), slab.capacity());
    }

    #[test]
    fn allocation_hands_out_distinct_slots_until_full() {
        let mut slab = ParticleSlab::new(100);
        let ids: HashSet<_> = (0..100)
            .map(|i| slab.new_particle(Particle::new(i, 0, 0, 1, 255, 1)).unwrap())
            .collect();
        assert_eq!(ids.len(), 100);
        assert_eq!(slab.new_particle(Particle::default()), None);
        assert_eq!(slab.free_len(), 0);
        assert_partition(&slab);
    }

    #[test]
    fn active_chain_is_newest_first() {
        let mut slab = ParticleSlab::new(4);
        for x in 0..3 {
            slab.new_particle(Particle::new(x, 0, 0, 0, 0, 0));
        }
        let xs: Vec<_> = slab.active().map(|(_, p)| p.x).collect();
        assert_eq!(xs, vec![2, 1, 0]);
    }

    #[test]
    fn retain_returns_slots_to_the_free_stack() {
        let mut slab = ParticleSlab::new(10);
        for x in 0..10 {
            slab.new_particle(Particle::new(x, 0, 0, 0, 0, 0));
        }
        slab.retain(|p| p.x % 3 != 0);
        let xs: Vec<_> = slab.active().map(|(_, p)| p.x).collect();
        assert_eq!(xs, vec![8, 7, 5, 4, 2, 1]);
        assert_eq!(slab.free_len(), 4);
        assert_partition(&slab);

        // Freed slots are reused.
        for _ in 0..4 {
            assert!(slab.new_particle(Particle::default()).is_some());
        }
        assert!(slab.new_particle(Particle::default()).is_none());
        assert_partition(&slab);
    }

    #[test]
    fn clear_frees_everything() {
        let mut slab = ParticleSlab::new(5);
        slab.new_particle(Particle::default());
        slab.new_particle(Particle::default());
        slab.clear();
        assert_eq!(slab.active().count(), 0);
        assert_eq!(slab.free_len(), 5);
        assert_partition(&slab);
        assert_eq!(slab.new_particle(Particle::default()).map(ParticleId::index), Some(0));
    }
}
