//! Vertical space allocation for concurrently visible comments
//!
//! Each movement category owns one allocator. An allocator keeps a stack of
//! lanes; every lane lists its occupants by ascending bottom edge. A new
//! comment goes into the first lane where some vertical offset keeps it clear
//! of every occupant it would collide with. Lanes past the first are overflow
//! layers that are only used once the surface is full.

use crate::active::CommentId;
use crate::stage::Size;
use crate::Result;
use danmaku_core::ordered::binsert;
use std::collections::HashMap;

/// Space and time a comment occupies, in the allocator's coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Footprint {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Start of the lifetime in ms
    pub start: f64,
    /// Length of the lifetime in ms
    pub duration: f64,
}

impl Footprint {
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    /// `max(startA, startB) < min(endA, endB)`
    pub fn overlaps_in_time(&self, other: &Footprint) -> bool {
        self.start.max(other.start) < self.end().min(other.end())
    }

    pub fn overlaps_vertically(&self, other: &Footprint) -> bool {
        !(other.y > self.bottom() || other.bottom() < self.y)
    }

    pub fn overlaps_horizontally(&self, other: &Footprint) -> bool {
        !(other.right() < self.x || other.x > self.right())
    }
}

/// Live geometry lookup for the comments an allocator tracks by id
pub trait OccupantSource {
    fn footprint(&self, id: CommentId) -> Option<Footprint>;
}

impl OccupantSource for HashMap<CommentId, Footprint> {
    fn footprint(&self, id: CommentId) -> Option<Footprint> {
        self.get(&id).copied()
    }
}

/// Lane a comment was placed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    Managed(usize),
    /// Not tracked for collisions (too tall, or a category without allocator)
    Unmanaged,
}

/// Result of an allocation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub lane: Lane,
    /// Horizontal offset chosen by the allocator, if it picks one
    pub x: Option<f64>,
    /// Vertical offset from the category's anchor edge
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AllocatorKind {
    /// Collision depends on horizontal paths and lifetimes
    Path,
    /// Horizontally centered; any vertical overlap collides
    Anchor,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    id: CommentId,
    bottom: f64,
}

/// Lane allocator for one movement category
#[derive(Debug, Clone)]
pub struct SpaceAllocator {
    kind: AllocatorKind,
    width: f64,
    height: f64,
    spacing: f64,
    pools: Vec<Vec<Slot>>,
}

impl SpaceAllocator {
    /// Allocator for moving comments
    pub fn path(bounds: Size, spacing: f64) -> Self {
        Self::with_kind(AllocatorKind::Path, bounds, spacing)
    }

    /// Allocator for static top/bottom comments
    pub fn anchor(bounds: Size, spacing: f64) -> Self {
        Self::with_kind(AllocatorKind::Anchor, bounds, spacing)
    }

    fn with_kind(kind: AllocatorKind, bounds: Size, spacing: f64) -> Self {
        Self {
            kind,
            width: bounds.width,
            height: bounds.height,
            spacing,
            pools: Vec::new(),
        }
    }

    pub fn is_anchor(&self) -> bool {
        self.kind == AllocatorKind::Anchor
    }

    /// Updates the surface size used by later allocations
    pub fn set_bounds(&mut self, bounds: Size) {
        self.width = bounds.width;
        self.height = bounds.height;
    }

    pub fn bounds(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Number of lanes created so far (including empty ones)
    pub fn lane_count(&self) -> usize {
        self.pools.len()
    }

    /// Occupants of `lane`, by ascending bottom edge
    pub fn occupants(&self, lane: usize) -> impl Iterator<Item = CommentId> + '_ {
        self.pools.get(lane).into_iter().flatten().map(|slot| slot.id)
    }

    /// Total tracked comments across all lanes
    pub fn len(&self) -> usize {
        self.pools.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Chooses a lane and offset for `id` and starts tracking it
    pub fn add(
        &mut self,
        id: CommentId,
        footprint: &Footprint,
        occupants: &dyn OccupantSource,
    ) -> Result<Placement> {
        let mut candidate = *footprint;
        let x = match self.kind {
            AllocatorKind::Anchor => {
                candidate.x = (self.width - candidate.width) / 2.0;
                Some(candidate.x)
            }
            AllocatorKind::Path => None,
        };

        if candidate.height > self.height {
            return Ok(Placement {
                lane: Lane::Unmanaged,
                x,
                y: 0.0,
            });
        }

        let (lane, y) = self.assign(&candidate, occupants);
        while self.pools.len() <= lane {
            self.pools.push(Vec::new());
        }
        binsert(
            &mut self.pools[lane],
            Slot {
                id,
                bottom: y + candidate.height,
            },
            |a, b| a.bottom.total_cmp(&b.bottom),
        )?;
        tracing::trace!(id = id.0, lane, y, "allocated comment");

        Ok(Placement {
            lane: Lane::Managed(lane),
            x,
            y,
        })
    }

    /// Stops tracking `id`; remaining occupants keep their order
    pub fn remove(&mut self, id: CommentId, lane: Lane) {
        let Lane::Managed(index) = lane else {
            return;
        };
        if let Some(pool) = self.pools.get_mut(index) {
            if let Some(position) = pool.iter().position(|slot| slot.id == id) {
                pool.remove(position);
            }
        }
    }

    fn assign(&self, candidate: &Footprint, occupants: &dyn OccupantSource) -> (usize, f64) {
        let mut lane = 0;
        loop {
            let Some(pool) = self.pools.get(lane) else {
                return (lane, 0.0);
            };
            if pool.is_empty() || self.path_check(0.0, candidate, pool, occupants) {
                return (lane, 0.0);
            }
            for slot in pool {
                let y = slot.bottom + self.spacing;
                if y + candidate.height > self.height {
                    break;
                }
                if self.path_check(y, candidate, pool, occupants) {
                    return (lane, y);
                }
            }
            lane += 1;
        }
    }

    fn path_check(
        &self,
        y: f64,
        candidate: &Footprint,
        pool: &[Slot],
        occupants: &dyn OccupantSource,
    ) -> bool {
        let probe = Footprint { y, ..*candidate };
        for slot in pool {
            let Some(other) = occupants.footprint(slot.id) else {
                continue;
            };
            if !probe.overlaps_vertically(&other) {
                continue;
            }
            match self.kind {
                AllocatorKind::Anchor => return false,
                AllocatorKind::Path => {
                    if probe.overlaps_horizontally(&other) && probe.overlaps_in_time(&other) {
                        return false;
                    }
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Fixture {
        allocator: SpaceAllocator,
        live: HashMap<CommentId, Footprint>,
        next: u64,
    }

    impl Fixture {
        fn path() -> Self {
            Self {
                allocator: SpaceAllocator::path(Size::new(640.0, 100.0), 3.0),
                live: HashMap::new(),
                next: 0,
            }
        }

        fn anchor() -> Self {
            Self {
                allocator: SpaceAllocator::anchor(Size::new(640.0, 100.0), 3.0),
                live: HashMap::new(),
                next: 0,
            }
        }

        fn add(&mut self, footprint: Footprint) -> (CommentId, Placement) {
            let id = CommentId(self.next);
            self.next += 1;
            let placement = self.allocator.add(id, &footprint, &self.live).unwrap();
            let mut placed = footprint;
            placed.y = placement.y;
            if let Some(x) = placement.x {
                placed.x = x;
            }
            if placement.lane != Lane::Unmanaged {
                self.live.insert(id, placed);
            }
            (id, placement)
        }

        fn remove(&mut self, id: CommentId, lane: Lane) {
            self.allocator.remove(id, lane);
            self.live.remove(&id);
        }
    }

    fn scroll(x: f64, width: f64, start: f64) -> Footprint {
        Footprint {
            x,
            y: 0.0,
            width,
            height: 20.0,
            start,
            duration: 4000.0,
        }
    }

    #[test]
    fn test_empty_lane_places_at_top() {
        let mut fx = Fixture::path();
        let (_, placement) = fx.add(scroll(640.0, 100.0, 0.0));
        assert_eq!(
            placement,
            Placement {
                lane: Lane::Managed(0),
                x: None,
                y: 0.0
            }
        );
    }

    #[test]
    fn test_overlapping_comments_stack() {
        let mut fx = Fixture::path();
        let (_, first) = fx.add(scroll(640.0, 100.0, 0.0));
        let (_, second) = fx.add(scroll(640.0, 100.0, 0.0));
        let (_, third) = fx.add(scroll(640.0, 100.0, 10.0));
        assert_eq!(first.y, 0.0);
        assert_eq!(second.y, 23.0);
        assert_eq!(third.y, 46.0);
        assert!(third.lane == Lane::Managed(0));
    }

    #[test]
    fn test_disjoint_lifetimes_share_top() {
        let mut fx = Fixture::path();
        let (_, first) = fx.add(scroll(0.0, 300.0, 0.0));
        let (_, second) = fx.add(scroll(100.0, 300.0, 5000.0));
        assert_eq!(first.y, 0.0);
        assert_eq!(second.y, 0.0);
        assert_eq!(second.lane, Lane::Managed(0));
    }

    #[test]
    fn test_horizontally_disjoint_occupant_shares_row() {
        let mut fx = Fixture::path();
        fx.add(scroll(10.0, 100.0, 0.0));
        let (_, late) = fx.add(scroll(640.0, 100.0, 3500.0));
        assert_eq!(late.y, 0.0);

        // Still alive for most of the newcomer's lifetime, but not in its path
        let mut fx = Fixture::path();
        fx.add(scroll(300.0, 100.0, 0.0));
        let (_, early) = fx.add(scroll(640.0, 100.0, 1000.0));
        assert_eq!(early.y, 0.0);
        assert_eq!(fx.allocator.occupants(0).count(), 2);
    }

    #[test]
    fn test_no_vertical_overlap_for_colliding_comments() {
        let mut fx = Fixture::path();
        let mut placed = Vec::new();
        for i in 0..4 {
            let (id, placement) = fx.add(scroll(640.0, 120.0, i as f64 * 10.0));
            placed.push((id, placement));
        }
        for (i, (a, _)) in placed.iter().enumerate() {
            for (b, _) in placed.iter().skip(i + 1) {
                let fa = fx.live[a];
                let fb = fx.live[b];
                assert!(fa.bottom() <= fb.y || fb.bottom() <= fa.y);
            }
        }
    }

    #[test]
    fn test_full_lane_overflows_to_next() {
        let mut fx = Fixture::path();
        let placements: Vec<Placement> = (0..5)
            .map(|_| fx.add(scroll(640.0, 100.0, 0.0)).1)
            .collect();
        // 20px rows with 3px spacing: 0, 23, 46, 69 fit in 100px; the fifth does not
        assert_eq!(placements[3].y, 69.0);
        assert_eq!(placements[4].lane, Lane::Managed(1));
        assert_eq!(placements[4].y, 0.0);
        assert_eq!(fx.allocator.lane_count(), 2);
    }

    #[test]
    fn test_too_tall_is_unmanaged() {
        let mut fx = Fixture::path();
        let mut tall = scroll(640.0, 100.0, 0.0);
        tall.height = 150.0;
        let (_, placement) = fx.add(tall);
        assert_eq!(placement.lane, Lane::Unmanaged);
        assert_eq!(placement.y, 0.0);
        assert!(fx.allocator.is_empty());
    }

    #[test]
    fn test_anchor_centers_and_stacks_regardless_of_path() {
        let mut fx = Fixture::anchor();
        let (_, first) = fx.add(scroll(0.0, 100.0, 0.0));
        assert_eq!(first.x, Some(270.0));
        let (_, second) = fx.add(scroll(0.0, 40.0, 3000.0));
        assert_eq!(second.x, Some(300.0));
        assert_eq!(second.y, 23.0);
    }

    #[test]
    fn test_remove_frees_space_and_keeps_order() {
        let mut fx = Fixture::anchor();
        let (a, pa) = fx.add(scroll(0.0, 100.0, 0.0));
        let (b, _) = fx.add(scroll(0.0, 100.0, 0.0));
        let (c, _) = fx.add(scroll(0.0, 100.0, 0.0));
        assert_eq!(fx.allocator.occupants(0).collect::<Vec<_>>(), vec![a, b, c]);

        fx.remove(a, pa.lane);
        assert_eq!(fx.allocator.occupants(0).collect::<Vec<_>>(), vec![b, c]);

        let (d, pd) = fx.add(scroll(0.0, 100.0, 0.0));
        assert_eq!(pd.y, 0.0);
        assert_eq!(fx.allocator.occupants(0).collect::<Vec<_>>(), vec![d, b, c]);
    }

    #[test]
    fn test_set_bounds_applies_to_later_allocations() {
        let mut fx = Fixture::anchor();
        let (_, before) = fx.add(scroll(0.0, 100.0, 0.0));
        fx.allocator.set_bounds(Size::new(200.0, 100.0));
        let (_, after) = fx.add(scroll(0.0, 100.0, 0.0));
        assert_eq!(before.x, Some(270.0));
        assert_eq!(after.x, Some(50.0));
        assert_eq!(fx.live[&CommentId(0)].x, 270.0);
    }
}
