//! Serializable snapshot of the whole derived objective model.

use crate::flags::FlagStatus;
use capture_env::{Position, Team};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagSummary {
    pub team: Team,
    pub status: FlagStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home: Option<Position>,
    pub carried: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointSummary {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    pub red_can_cap: bool,
    pub blu_can_cap: bool,
}

/// Everything the trackers currently believe, for logging and export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveSummary {
    pub level: String,
    pub tick: u64,
    pub flags: Vec<FlagSummary>,
    /// Tracked carts per side, red first
    pub carts: [usize; 2],
    pub points: Vec<PointSummary>,
}

impl ObjectiveSummary {
    pub fn flag(&self, team: Team) -> Option<&FlagSummary> {
        self.flags.iter().find(|f| f.team == team)
    }

    /// True when nothing at all is being tracked.
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty() && self.carts == [0, 0] && self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn summary() -> ObjectiveSummary {
        ObjectiveSummary {
            level: "ctf_2fort".to_string(),
            tick: 12,
            flags: vec![FlagSummary {
                team: Team::Blu,
                status: FlagStatus::Dropped,
                position: Some(Position::new(10.5, -3.25, 0.0)),
                home: None,
                carried: false,
            }],
            carts: [0, 0],
            points: Vec::new(),
        }
    }

    #[test]
    fn test_flag_lookup_by_team() {
        let summary = summary();
        assert_eq!(summary.flag(Team::Blu).map(|f| f.status), Some(FlagStatus::Dropped));
        assert!(summary.flag(Team::Red).is_none());
        assert!(!summary.is_empty());
    }

    #[test]
    fn test_json_omits_unknown_positions() {
        let json = serde_json::to_value(summary()).unwrap();
        let flag = &json["flags"][0];

        assert!(flag.get("home").is_none());
        assert_relative_eq!(flag["position"][0].as_f64().unwrap(), 10.5);
        assert_relative_eq!(flag["position"][1].as_f64().unwrap(), -3.25);

        let back: ObjectiveSummary = serde_json::from_value(json).unwrap();
        assert_eq!(back, summary());
    }
}
