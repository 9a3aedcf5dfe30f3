//! The core decision rule: a pure function from (current status, metric,
//! schedule) to what should happen to the entity.

use autoads_core::types::{CampaignStatus, Direction, RunStatus, ScheduleSpec};

/// Outcome of evaluating one entity against a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The metric crossed the threshold and the entity is in the wrong
    /// state; issue exactly one mutation to `RunStatus`.
    Update(RunStatus),
    /// The metric crossed the threshold but the entity is already in the
    /// target state; no call needed.
    AlreadyCorrect(RunStatus),
    /// The metric did not cross the threshold; the entity remains as-is.
    /// A valid outcome, not an error.
    Remains,
}

impl Verdict {
    pub fn target(&self) -> Option<RunStatus> {
        match self {
            Self::Update(status) | Self::AlreadyCorrect(status) => Some(*status),
            Self::Remains => None,
        }
    }
}

/// ON means "turn on when the metric is below the threshold"; OFF means
/// "turn off when the metric is at or above the threshold". Anything else
/// leaves the entity alone.
pub fn decide(current: CampaignStatus, metric: f64, spec: &ScheduleSpec) -> Verdict {
    let target = match spec.direction {
        Direction::On if metric < spec.threshold => RunStatus::Active,
        Direction::Off if metric >= spec.threshold => RunStatus::Paused,
        _ => return Verdict::Remains,
    };

    if current.matches(target) {
        Verdict::AlreadyCorrect(target)
    } else {
        Verdict::Update(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoads_core::matching::MatchStrategy;
    use autoads_core::types::ScheduleScope;

    fn spec(direction: Direction, threshold: f64) -> ScheduleSpec {
        ScheduleSpec {
            scope: ScheduleScope::Campaigns,
            match_key: "SS".into(),
            threshold,
            direction,
            date_start: None,
            date_end: None,
            matching: MatchStrategy::default(),
        }
    }

    #[test]
    fn test_on_below_threshold_targets_active() {
        let verdict = decide(CampaignStatus::Paused, 5.0, &spec(Direction::On, 10.0));
        assert_eq!(verdict, Verdict::Update(RunStatus::Active));
    }

    #[test]
    fn test_on_at_or_above_threshold_remains() {
        assert_eq!(
            decide(CampaignStatus::Paused, 15.0, &spec(Direction::On, 10.0)),
            Verdict::Remains
        );
        // Threshold itself is not "below".
        assert_eq!(
            decide(CampaignStatus::Paused, 10.0, &spec(Direction::On, 10.0)),
            Verdict::Remains
        );
    }

    #[test]
    fn test_off_at_or_above_threshold_targets_paused() {
        assert_eq!(
            decide(CampaignStatus::Active, 60.0, &spec(Direction::Off, 50.0)),
            Verdict::Update(RunStatus::Paused)
        );
        assert_eq!(
            decide(CampaignStatus::Active, 50.0, &spec(Direction::Off, 50.0)),
            Verdict::Update(RunStatus::Paused)
        );
    }

    #[test]
    fn test_off_below_threshold_remains() {
        assert_eq!(
            decide(CampaignStatus::Active, 49.99, &spec(Direction::Off, 50.0)),
            Verdict::Remains
        );
    }

    #[test]
    fn test_no_mutation_when_already_in_target_state() {
        assert_eq!(
            decide(CampaignStatus::Active, 5.0, &spec(Direction::On, 10.0)),
            Verdict::AlreadyCorrect(RunStatus::Active)
        );
        assert_eq!(
            decide(CampaignStatus::Paused, 60.0, &spec(Direction::Off, 50.0)),
            Verdict::AlreadyCorrect(RunStatus::Paused)
        );
    }

    #[test]
    fn test_decide_is_deterministic() {
        let schedule = spec(Direction::Off, 50.0);
        let first = decide(CampaignStatus::Active, 60.0, &schedule);
        let second = decide(CampaignStatus::Active, 60.0, &schedule);
        assert_eq!(first, second);
    }
}
