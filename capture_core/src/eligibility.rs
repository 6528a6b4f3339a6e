//! Control-point eligibility: can a side attempt to capture a point now?
//!
//! The rule is a decision table evaluated top to bottom over a `RoundState`
//! snapshot. The first row that applies decides; no history is kept between
//! evaluations.
//!
//! | # | Condition                                    | Result |
//! |---|----------------------------------------------|--------|
//! | 1 | side owns the point                          | no     |
//! | 2 | can-cap matrix forbids the side              | no     |
//! | 3 | mini-rounds active, point not in this round  | no     |
//! | 4 | point locked                                 | no     |
//! | 5 | linear capture explicitly off                | yes    |
//! | 6 | first prerequisite is the point itself       | yes    |
//! | 7 | no prerequisites, not sectioned              | adjacent to owned frontier |
//! | 8 | no prerequisites, sectioned                  | yes    |
//! | 9 | explicit prerequisites                       | all owned by side |

use crate::objective_resource::{RoundState, MAX_CONTROL_POINTS, MAX_PREVIOUS_POINTS, NO_POINT};
use capture_env::Team;

/// Which row of the table decided, and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Point index outside the round or side not playable
    OutOfRound,
    AlreadyOwned,
    CannotCap,
    OutsideMiniRound,
    Locked,
    LinearCaptureDisabled,
    SelfPrerequisite,
    /// Frontier-adjacency fallback with the farthest owned point it used
    Frontier { farthest: i32, adjacent: bool },
    /// No prerequisite data in a sectioned round; always allowed
    SectionFallback,
    /// Explicit prerequisite list, first unmet entry if any
    Prerequisites { unmet: Option<i32> },
}

impl Verdict {
    pub fn is_capturable(&self) -> bool {
        match self {
            Verdict::OutOfRound
            | Verdict::AlreadyOwned
            | Verdict::CannotCap
            | Verdict::OutsideMiniRound
            | Verdict::Locked => false,
            Verdict::LinearCaptureDisabled | Verdict::SelfPrerequisite | Verdict::SectionFallback => true,
            Verdict::Frontier { adjacent, .. } => *adjacent,
            Verdict::Prerequisites { unmet } => unmet.is_none(),
        }
    }
}

/// Evaluates the eligibility table for `team` on point `index`.
///
/// `linear_capture` is the linear-capture variable: `None` when the
/// variable does not exist, which behaves like `Some(true)`.
pub fn evaluate(round: &RoundState, index: usize, team: Team, linear_capture: Option<bool>) -> Verdict {
    if team.index().is_none() || index >= round.num_points || index >= MAX_CONTROL_POINTS {
        return Verdict::OutOfRound;
    }

    if round.owner(index) == team {
        return Verdict::AlreadyOwned;
    }

    if !round.team_can_cap(index, team) {
        return Verdict::CannotCap;
    }

    if round.playing_mini_rounds && !round.in_mini_round[index] {
        return Verdict::OutsideMiniRound;
    }

    if round.locked[index] {
        return Verdict::Locked;
    }

    if linear_capture == Some(false) {
        return Verdict::LinearCaptureDisabled;
    }

    let first = round.previous_point(index, team, 0);

    if first == index as i32 {
        return Verdict::SelfPrerequisite;
    }

    if first == NO_POINT {
        if round.playing_mini_rounds {
            return Verdict::SectionFallback;
        }
        let farthest = farthest_owned_point(round, team);
        let adjacent = (farthest - index as i32).abs() <= 1;
        return Verdict::Frontier { farthest, adjacent };
    }

    let unmet = (0..MAX_PREVIOUS_POINTS)
        .map(|slot| round.previous_point(index, team, slot))
        .filter(|&entry| entry != NO_POINT)
        .find(|&entry| round.owner_of_entry(entry) != team);

    Verdict::Prerequisites { unmet }
}

/// True when `team` may attempt to capture point `index`.
pub fn is_capturable(round: &RoundState, index: usize, team: Team, linear_capture: Option<bool>) -> bool {
    evaluate(round, index, team, linear_capture).is_capturable()
}

/// Farthest point `team` holds contiguously from its base, or `NO_POINT`
/// when the side has no base.
///
/// Walks from the base toward the enemy end (exclusive), +1 when the base
/// is point 0 and -1 otherwise, stopping at the first point not owned by
/// `team`. The base itself is the starting answer even if it has been lost.
pub fn farthest_owned_point(round: &RoundState, team: Team) -> i32 {
    let base = round.base_point(team);
    if base == NO_POINT {
        return NO_POINT;
    }

    let count = round.num_points as i32;
    let (walk, enemy_end) = if base == 0 { (1, count - 1) } else { (-1, 0) };

    let mut farthest = base;
    let mut point = base;
    while point != enemy_end && (0..MAX_CONTROL_POINTS as i32).contains(&point) {
        if round.owner_of_entry(point) != team {
            break;
        }
        farthest = point;
        point += walk;
    }
    farthest
}
