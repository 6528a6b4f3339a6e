//! Payload tracker: per-side cart buckets, rebuilt wholesale on a timer.

use crate::spatial::closest_position;
use crate::timer::RateLimiter;

use capture_env::{EntityHandle, EntityKind, EntitySnapshot, Field, Position, Team};
use std::time::Duration;
use tracing::trace;

/// Tracks the carts of both sides.
#[derive(Debug)]
pub struct PayloadTracker {
    /// Red carts first, then blu
    carts: [Vec<EntityHandle>; 2],
    rebuild_timer: RateLimiter,
}

impl PayloadTracker {
    pub fn new(rebuild_interval: Duration) -> Self {
        Self {
            carts: [Vec::new(), Vec::new()],
            rebuild_timer: RateLimiter::new(rebuild_interval),
        }
    }

    /// Rebuilds both buckets if the rebuild interval has elapsed.
    pub fn refresh<S: EntitySnapshot + ?Sized>(&mut self, snapshot: &S, now: Duration) {
        if !self.rebuild_timer.test_and_set(now) {
            return;
        }

        for bucket in &mut self.carts {
            bucket.clear();
        }

        for handle in snapshot.entities() {
            if snapshot.kind(handle) != Some(EntityKind::CartDispenser) {
                continue;
            }
            let team = snapshot
                .read_int(handle, Field::Team.scalar())
                .map_or(Team::Unknown, Team::from_raw);
            if let Some(index) = team.index() {
                self.carts[index].push(handle);
            }
        }

        trace!(red = self.carts[0].len(), blu = self.carts[1].len(), "cart buckets rebuilt");
    }

    /// Position of the side's cart nearest to `source`.
    pub fn closest_to<S: EntitySnapshot + ?Sized>(
        &self,
        snapshot: &S,
        source: &Position,
        team: Team,
    ) -> Option<Position> {
        let index = team.index()?;
        let positions = self.carts[index].iter().filter_map(|&handle| {
            if !snapshot.is_good(handle) || snapshot.kind(handle) != Some(EntityKind::CartDispenser) {
                return None;
            }
            snapshot.read_vector(handle, Field::Origin.scalar())
        });
        closest_position(source, positions)
    }

    /// The side's bucket as of the last rebuild.
    pub fn carts(&self, team: Team) -> &[EntityHandle] {
        match team.index() {
            Some(index) => &self.carts[index],
            None => &[],
        }
    }

    pub fn level_reset(&mut self) {
        for bucket in &mut self.carts {
            bucket.clear();
        }
        self.rebuild_timer.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capture_env::MemoryWorld;

    fn spawn_cart(world: &mut MemoryWorld, team: i32, origin: Position) -> EntityHandle {
        let cart = world.spawn(EntityKind::CartDispenser);
        world.set_int(cart, Field::Team, team).unwrap();
        world.set_origin(cart, origin).unwrap();
        cart
    }

    fn tracker() -> PayloadTracker {
        PayloadTracker::new(Duration::from_millis(3000))
    }

    #[test]
    fn test_buckets_by_team() {
        let mut world = MemoryWorld::new("plr_hightower");
        let red = spawn_cart(&mut world, 2, Position::new(0.0, 0.0, 0.0));
        let blu = spawn_cart(&mut world, 3, Position::new(10.0, 0.0, 0.0));
        spawn_cart(&mut world, 0, Position::new(20.0, 0.0, 0.0));
        spawn_cart(&mut world, 5, Position::new(30.0, 0.0, 0.0));

        let mut tracker = tracker();
        tracker.refresh(&world, Duration::ZERO);

        assert_eq!(tracker.carts(Team::Red), &[red]);
        assert_eq!(tracker.carts(Team::Blu), &[blu]);
        assert!(tracker.carts(Team::Unknown).is_empty());
    }

    #[test]
    fn test_rebuild_is_rate_limited() {
        let mut world = MemoryWorld::new("pl_badwater");
        spawn_cart(&mut world, 3, Position::zeros());
        let mut tracker = tracker();
        tracker.refresh(&world, Duration::ZERO);

        spawn_cart(&mut world, 3, Position::new(5.0, 0.0, 0.0));
        tracker.refresh(&world, Duration::from_millis(2999));
        assert_eq!(tracker.carts(Team::Blu).len(), 1);

        tracker.refresh(&world, Duration::from_millis(3000));
        assert_eq!(tracker.carts(Team::Blu).len(), 2);
    }

    #[test]
    fn test_closest_cart() {
        let mut world = MemoryWorld::new("plr_pipeline");
        spawn_cart(&mut world, 3, Position::new(100.0, 0.0, 0.0));
        spawn_cart(&mut world, 3, Position::new(0.0, 20.0, 0.0));
        spawn_cart(&mut world, 2, Position::new(1.0, 0.0, 0.0));
        let mut tracker = tracker();
        tracker.refresh(&world, Duration::ZERO);

        assert_eq!(
            tracker.closest_to(&world, &Position::zeros(), Team::Blu),
            Some(Position::new(0.0, 20.0, 0.0))
        );
        assert_eq!(
            tracker.closest_to(&world, &Position::zeros(), Team::Red),
            Some(Position::new(1.0, 0.0, 0.0))
        );
        assert_eq!(tracker.closest_to(&world, &Position::zeros(), Team::Unknown), None);
    }

    #[test]
    fn test_closest_skips_invalid_and_dormant() {
        let mut world = MemoryWorld::new("pl_upward");
        let near = spawn_cart(&mut world, 3, Position::new(1.0, 0.0, 0.0));
        let far = spawn_cart(&mut world, 3, Position::new(50.0, 0.0, 0.0));
        let mut tracker = tracker();
        tracker.refresh(&world, Duration::ZERO);

        world.set_dormant(near, true).unwrap();
        assert_eq!(
            tracker.closest_to(&world, &Position::zeros(), Team::Blu),
            Some(Position::new(50.0, 0.0, 0.0))
        );

        world.remove(far).unwrap();
        assert_eq!(tracker.closest_to(&world, &Position::zeros(), Team::Blu), None);
    }

    #[test]
    fn test_closest_tie_keeps_first() {
        let mut world = MemoryWorld::new("pl_goldrush");
        spawn_cart(&mut world, 3, Position::new(5.0, 0.0, 0.0));
        spawn_cart(&mut world, 3, Position::new(-5.0, 0.0, 0.0));
        let mut tracker = tracker();
        tracker.refresh(&world, Duration::ZERO);

        assert_eq!(
            tracker.closest_to(&world, &Position::zeros(), Team::Blu),
            Some(Position::new(5.0, 0.0, 0.0))
        );
    }

    #[test]
    fn test_level_reset_clears_and_rearms() {
        let mut world = MemoryWorld::new("pl_badwater");
        spawn_cart(&mut world, 3, Position::zeros());
        let mut tracker = tracker();
        tracker.refresh(&world, Duration::from_millis(100));
        tracker.level_reset();

        assert!(tracker.carts(Team::Blu).is_empty());
        assert_eq!(tracker.closest_to(&world, &Position::zeros(), Team::Blu), None);

        // Rebuilds right away on the new level
        tracker.refresh(&world, Duration::from_millis(200));
        assert_eq!(tracker.carts(Team::Blu).len(), 1);
    }
}
