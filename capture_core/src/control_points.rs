//! Control-point tracker.
//!
//! Positions are refreshed every tick; eligibility is recomputed on a
//! slower timer because it reads the whole round state.

use crate::config::PointException;
use crate::eligibility::evaluate;
use crate::objective_resource::{ObjectiveResource, MAX_CONTROL_POINTS};
use crate::spatial::closest_position;
use crate::timer::RateLimiter;

use capture_env::{CachedConVar, ConVarStore, EntitySnapshot, LevelInfo, Position, Team};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, trace};

/// Derived state of one control point slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlPointRecord {
    /// Point index, stamped while the slot is in range
    pub index: Option<usize>,

    pub position: Option<Position>,

    /// Red first, then blu
    pub can_cap: [bool; 2],
}

impl ControlPointRecord {
    pub fn can_cap(&self, team: Team) -> bool {
        team.index().is_some_and(|side| self.can_cap[side])
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_none()
    }
}

/// Tracks control points and which side may capture each of them.
#[derive(Debug)]
pub struct ControlPointTracker {
    points: [ControlPointRecord; MAX_CONTROL_POINTS + 1],
    resource: ObjectiveResource,
    eligibility_timer: RateLimiter,
    linear_capture: CachedConVar,
    control_point_mode: CachedConVar,
    exceptions: Vec<PointException>,
}

impl ControlPointTracker {
    pub fn new(
        eligibility_interval: Duration,
        linear_capture_var: &str,
        control_point_mode_var: &str,
        exceptions: Vec<PointException>,
    ) -> Self {
        Self {
            points: [ControlPointRecord::default(); MAX_CONTROL_POINTS + 1],
            resource: ObjectiveResource::new(),
            eligibility_timer: RateLimiter::new(eligibility_interval),
            linear_capture: CachedConVar::new(linear_capture_var),
            control_point_mode: CachedConVar::new(control_point_mode_var),
            exceptions,
        }
    }

    pub fn refresh<W>(&mut self, world: &W, now: Duration)
    where
        W: EntitySnapshot + ConVarStore + ?Sized,
    {
        if self.resource.acquire(world).is_none() {
            return;
        }

        let num_points = self.resource.point_count(world);
        if num_points == 0 {
            return;
        }

        for slot in &mut self.points[num_points..] {
            *slot = ControlPointRecord::default();
        }

        for (index, slot) in self.points[..num_points].iter_mut().enumerate() {
            slot.index = Some(index);
            slot.position = self.resource.point_position(world, index);
        }

        if !self.eligibility_timer.test_and_set(now) {
            return;
        }

        let Some(round) = self.resource.read_round_state(world) else {
            return;
        };
        let linear_capture = self.linear_capture.get_bool(world);

        for (index, slot) in self.points[..num_points].iter_mut().enumerate() {
            let mut can_cap = [false; 2];
            for team in Team::SIDES {
                let Some(side) = team.index() else {
                    continue;
                };
                let verdict = evaluate(&round, index, team, linear_capture);
                trace!(point = index, %team, ?verdict, "eligibility evaluated");
                can_cap[side] = verdict.is_capturable();
            }
            if slot.can_cap != can_cap {
                debug!(point = index, red = can_cap[0], blu = can_cap[1], "eligibility changed");
            }
            slot.can_cap = can_cap;
        }
    }

    /// Index excluded on the given level by the exception table. When
    /// several entries match, the last one wins.
    pub fn excluded_point(&self, level_name: &str) -> Option<usize> {
        self.exceptions
            .iter()
            .filter(|e| level_name.contains(e.map.as_str()))
            .map(|e| e.point)
            .last()
    }

    /// Position of the nearest point `team` may capture right now.
    pub fn closest_capturable<W>(&self, world: &W, source: &Position, team: Team) -> Option<Position>
    where
        W: EntitySnapshot + ConVarStore + LevelInfo + ?Sized,
    {
        if self.control_point_mode.get_bool(world) != Some(true) {
            return None;
        }
        self.resource.handle()?;
        let side = team.index()?;
        if self.resource.point_count(world) == 0 {
            return None;
        }

        let excluded = self.excluded_point(&world.level_name());

        let candidates = self
            .points
            .iter()
            .enumerate()
            .filter(|(index, _)| Some(*index) != excluded)
            .filter(|(_, point)| point.can_cap[side])
            .filter_map(|(_, point)| point.position);
        closest_position(source, candidates)
    }

    /// All slots, including the trailing spare slot.
    pub fn points(&self) -> &[ControlPointRecord] {
        &self.points
    }

    /// Slots currently stamped with an index.
    pub fn active_points(&self) -> impl Iterator<Item = &ControlPointRecord> {
        self.points.iter().filter(|p| !p.is_empty())
    }

    pub fn has_resource(&self) -> bool {
        self.resource.handle().is_some()
    }

    pub fn level_reset(&mut self) {
        self.points = [ControlPointRecord::default(); MAX_CONTROL_POINTS + 1];
        self.resource.release();
        self.eligibility_timer.reset();
        // The next level may register its variables in a different order
        self.linear_capture.invalidate();
        self.control_point_mode.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objective_resource::{write_round_state, RoundState};
    use capture_env::{EntityHandle, EntityKind, Field, MemoryWorld};

    const SECOND: Duration = Duration::from_secs(1);

    fn tracker() -> ControlPointTracker {
        ControlPointTracker::new(
            SECOND,
            "tf_caplinear",
            "tf_gamemode_cp",
            vec![PointException::new("cp_steel", 4)],
        )
    }

    /// Points laid out along x at 0, 100, 200, ...
    fn cp_world(level: &str, round: &RoundState) -> (MemoryWorld, EntityHandle) {
        let mut world = MemoryWorld::new(level);
        world.set_convar("tf_gamemode_cp", true);
        world.set_convar("tf_caplinear", true);
        let res = world.spawn(EntityKind::ObjectiveResource);
        write_round_state(&mut world, res, round).unwrap();
        for index in 0..round.num_points {
            world
                .set_vector(res, Field::CpPositions.at(index), Position::new(index as f32 * 100.0, 0.0, 0.0))
                .unwrap();
        }
        (world, res)
    }

    fn frontier_round() -> RoundState {
        let mut round = RoundState::linear(5);
        round.owners[1] = Team::Red;
        round.owners[2] = Team::Red;
        round
    }

    #[test]
    fn test_five_point_frontier_scenario() {
        let (world, _) = cp_world("cp_granary", &frontier_round());
        let mut tracker = tracker();
        tracker.refresh(&world, Duration::ZERO);

        let points = tracker.points();
        assert!(points[3].can_cap(Team::Red));
        assert!(!points[4].can_cap(Team::Red));
        assert!(!points[2].can_cap(Team::Red));
        assert_eq!(points[3].position, Some(Position::new(300.0, 0.0, 0.0)));
        assert_eq!(tracker.active_points().count(), 5);

        assert_eq!(
            tracker.closest_capturable(&world, &Position::new(1000.0, 0.0, 0.0), Team::Red),
            Some(Position::new(300.0, 0.0, 0.0))
        );
    }

    #[test]
    fn test_linear_capture_disabled_opens_every_point() {
        let (mut world, _) = cp_world("cp_granary", &frontier_round());
        world.set_convar("tf_caplinear", false);
        let mut tracker = tracker();
        tracker.refresh(&world, Duration::ZERO);

        assert!(tracker.points()[3].can_cap(Team::Red));
        assert!(tracker.points()[4].can_cap(Team::Red));
        assert!(tracker.points()[1].can_cap(Team::Blu));
        assert!(!tracker.points()[4].can_cap(Team::Blu));
    }

    #[test]
    fn test_eligibility_is_rate_limited_but_positions_are_not() {
        let (mut world, res) = cp_world("cp_granary", &frontier_round());
        let mut tracker = tracker();
        tracker.refresh(&world, Duration::ZERO);
        assert!(!tracker.points()[4].can_cap(Team::Red));

        let mut round = frontier_round();
        round.owners[3] = Team::Red;
        write_round_state(&mut world, res, &round).unwrap();
        world.set_vector(res, Field::CpPositions.at(4), Position::new(0.0, 0.0, 50.0)).unwrap();

        tracker.refresh(&world, Duration::from_millis(500));
        assert!(!tracker.points()[4].can_cap(Team::Red));
        assert_eq!(tracker.points()[4].position, Some(Position::new(0.0, 0.0, 50.0)));

        tracker.refresh(&world, Duration::from_millis(1000));
        assert!(tracker.points()[4].can_cap(Team::Red));
        assert!(!tracker.points()[3].can_cap(Team::Red));
    }

    #[test]
    fn test_slots_beyond_count_are_cleared() {
        let (mut world, res) = cp_world("cp_granary", &frontier_round());
        let mut tracker = tracker();
        tracker.refresh(&world, Duration::ZERO);
        assert!(tracker.points()[3].can_cap(Team::Red));

        world.set_int(res, Field::NumControlPoints, 3).unwrap();
        tracker.refresh(&world, Duration::from_millis(10));

        assert_eq!(tracker.active_points().count(), 3);
        assert_eq!(tracker.points()[3], ControlPointRecord::default());
        assert_eq!(tracker.points()[4], ControlPointRecord::default());
    }

    #[test]
    fn test_zero_points_keeps_last_values() {
        let (mut world, res) = cp_world("cp_granary", &frontier_round());
        let mut tracker = tracker();
        tracker.refresh(&world, Duration::ZERO);

        world.set_int(res, Field::NumControlPoints, 0).unwrap();
        tracker.refresh(&world, Duration::from_secs(5));

        assert!(tracker.points()[3].can_cap(Team::Red));
        assert_eq!(tracker.closest_capturable(&world, &Position::zeros(), Team::Red), None);
    }

    #[test]
    fn test_map_exception_skips_point() {
        let mut round = RoundState::linear(5);
        round.owners[1] = Team::Red;
        round.owners[2] = Team::Red;
        round.owners[3] = Team::Red;
        let (world, _) = cp_world("cp_steel_rc2", &round);
        let mut tracker = tracker();
        tracker.refresh(&world, Duration::ZERO);

        // Point 4 is eligible and the only candidate, but excluded on this map
        assert!(tracker.points()[4].can_cap(Team::Red));
        assert_eq!(tracker.excluded_point("cp_steel_rc2"), Some(4));
        assert_eq!(tracker.closest_capturable(&world, &Position::new(400.0, 0.0, 0.0), Team::Red), None);
    }

    #[test]
    fn test_map_exception_only_applies_to_matching_level() {
        let (world, _) = cp_world("cp_granary", &frontier_round());
        let tracker = tracker();
        assert_eq!(tracker.excluded_point(&world.level_name()), None);
    }

    #[test]
    fn test_last_matching_exception_wins() {
        let tracker = ControlPointTracker::new(
            SECOND,
            "tf_caplinear",
            "tf_gamemode_cp",
            vec![PointException::new("cp_", 1), PointException::new("cp_steel", 4)],
        );
        assert_eq!(tracker.excluded_point("cp_steel"), Some(4));
        assert_eq!(tracker.excluded_point("cp_dustbowl"), Some(1));
    }

    #[test]
    fn test_closest_requires_control_point_mode() {
        let (mut world, _) = cp_world("cp_granary", &frontier_round());
        let mut tracker = tracker();
        tracker.refresh(&world, Duration::ZERO);

        world.set_convar("tf_gamemode_cp", false);
        assert_eq!(tracker.closest_capturable(&world, &Position::zeros(), Team::Red), None);

        let mut missing = MemoryWorld::new("cp_granary");
        missing.spawn(EntityKind::ObjectiveResource);
        assert_eq!(tracker.closest_capturable(&missing, &Position::zeros(), Team::Red), None);
    }

    #[test]
    fn test_closest_rejects_unknown_team() {
        let (world, _) = cp_world("cp_granary", &frontier_round());
        let mut tracker = tracker();
        tracker.refresh(&world, Duration::ZERO);
        assert_eq!(tracker.closest_capturable(&world, &Position::zeros(), Team::Unknown), None);
    }

    #[test]
    fn test_no_resource_means_no_answer() {
        let mut world = MemoryWorld::new("cp_granary");
        world.set_convar("tf_gamemode_cp", true);
        let mut tracker = tracker();
        tracker.refresh(&world, Duration::ZERO);

        assert!(!tracker.has_resource());
        assert_eq!(tracker.closest_capturable(&world, &Position::zeros(), Team::Blu), None);
    }

    #[test]
    fn test_level_reset_clears_everything() {
        let (world, _) = cp_world("cp_granary", &frontier_round());
        let mut tracker = tracker();
        tracker.refresh(&world, Duration::ZERO);
        tracker.level_reset();

        assert!(!tracker.has_resource());
        assert!(tracker.points().iter().all(|p| *p == ControlPointRecord::default()));
        assert_eq!(tracker.closest_capturable(&world, &Position::zeros(), Team::Red), None);

        // Recomputes immediately on the next tick
        tracker.refresh(&world, Duration::from_millis(1));
        assert!(tracker.points()[3].can_cap(Team::Red));
    }
}
