// src/models/fixture.rs

//! Match, goal event and score data structures.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::models::CategoryPath;

/// A (home, guest) score pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Score {
    pub home: u32,
    pub guest: u32,
}

impl Score {
    pub const fn new(home: u32, guest: u32) -> Self {
        Self { home, guest }
    }

    pub fn total(&self) -> i64 {
        i64::from(self.home) + i64::from(self.guest)
    }

    /// Absolute goal difference.
    pub fn diff(&self) -> i64 {
        (i64::from(self.home) - i64::from(self.guest)).abs()
    }

    pub fn is_nil(&self) -> bool {
        self.home == 0 && self.guest == 0
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.home, self.guest)
    }
}

impl FromStr for Score {
    type Err = String;

    /// Parses "2-1", "2:1" or "2 - 1".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(['-', ':']).map(str::trim);
        let (Some(home), Some(guest), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(format!("not a score: '{s}'"));
        };
        let home = home.parse().map_err(|_| format!("bad home score in '{s}'"))?;
        let guest = guest.parse().map_err(|_| format!("bad guest score in '{s}'"))?;
        Ok(Self { home, guest })
    }
}

/// Semantic type of an event-table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalKind {
    Regular,
    RedCard,
    YellowCard,
    OwnGoal,
    Penalty,
    MissedPenalty,
}

impl GoalKind {
    const CODES: [(u8, GoalKind); 6] = [
        (1, GoalKind::Regular),
        (2, GoalKind::RedCard),
        (3, GoalKind::YellowCard),
        (4, GoalKind::OwnGoal),
        (5, GoalKind::Penalty),
        (6, GoalKind::MissedPenalty),
    ];

    /// Map the numeric code embedded in a row class to its kind.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::CODES
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, kind)| *kind)
    }

    pub fn code(self) -> u8 {
        Self::CODES
            .iter()
            .find(|(_, kind)| *kind == self)
            .map(|(c, _)| *c)
            .unwrap_or(0)
    }

    /// Cards and missed penalties do not change the score.
    pub fn is_scoring(self) -> bool {
        matches!(self, Self::Regular | Self::OwnGoal | Self::Penalty)
    }
}

/// A scoring event on a match timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub kind: GoalKind,

    /// "67" or "45+2"
    pub minute: String,

    /// Score immediately before this event
    pub score_before: Score,

    pub team: String,
    pub player: String,
}

impl Goal {
    /// Leading minute number of the label, if any.
    pub fn primary_minute(&self) -> Option<u32> {
        primary_minute(&self.minute)
    }

    /// Label is exactly `minute` with no stoppage-time suffix.
    pub fn is_exact_minute(&self, minute: u32) -> bool {
        self.minute.trim() == minute.to_string()
    }

    /// Label is `minute+<anything>`.
    pub fn is_stoppage_of(&self, minute: u32) -> bool {
        self.minute.trim().starts_with(&format!("{minute}+"))
    }
}

/// Leading integer of a minute label ("45+2" -> 45).
pub fn primary_minute(label: &str) -> Option<u32> {
    let digits: String = label
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// A successfully parsed match page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub date: NaiveDateTime,
    pub home: String,
    pub guest: String,
    pub path: CategoryPath,

    /// Position of the season/category among its siblings
    pub order: usize,

    pub half_time: Score,
    pub full_time: Score,
    pub url: String,
    pub goals: Vec<Goal>,
}

impl Match {
    /// Some goal label is exactly `minute`.
    pub fn has_goal_at(&self, minute: u32) -> bool {
        self.goals.iter().any(|g| g.is_exact_minute(minute))
    }

    /// Some goal label is `minute+<extra>`.
    pub fn has_stoppage_goal_after(&self, minute: u32) -> bool {
        self.goals.iter().any(|g| g.is_stoppage_of(minute))
    }
}

/// Builder collecting page fields before the match is published.
#[derive(Debug, Clone)]
pub struct MatchBuilder {
    date: NaiveDateTime,
    home: String,
    guest: String,
    path: CategoryPath,
    order: usize,
    url: String,
    half_time: Option<Score>,
    full_time: Option<Score>,
    goals: Vec<Goal>,
}

impl MatchBuilder {
    pub fn new(
        date: NaiveDateTime,
        home: impl Into<String>,
        guest: impl Into<String>,
        path: CategoryPath,
        order: usize,
        url: impl Into<String>,
    ) -> Self {
        Self {
            date,
            home: home.into(),
            guest: guest.into(),
            path,
            order,
            url: url.into(),
            half_time: None,
            full_time: None,
            goals: Vec::new(),
        }
    }

    pub fn half_time(mut self, score: Option<Score>) -> Self {
        self.half_time = score;
        self
    }

    pub fn full_time(mut self, score: Option<Score>) -> Self {
        self.full_time = score;
        self
    }

    pub fn goal(mut self, goal: Goal) -> Self {
        self.goals.push(goal);
        self
    }

    pub fn goals(mut self, goals: Vec<Goal>) -> Self {
        self.goals.extend(goals);
        self
    }

    /// Unset half-time defaults to 0-0, unset full-time to half-time.
    pub fn build(self) -> Match {
        let half_time = self.half_time.unwrap_or_default();
        let full_time = self.full_time.unwrap_or(half_time);
        Match {
            date: self.date,
            home: self.home,
            guest: self.guest,
            path: self.path,
            order: self.order,
            half_time,
            full_time,
            url: self.url,
            goals: self.goals,
        }
    }
}

/// Why a match page produced no usable data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoInfoReason {
    Postponed,
    EmptyEventTable,
    MissingGoals,
    BoundaryMinuteAnomaly,
}

impl fmt::Display for NoInfoReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Postponed => "postponed or cancelled",
            Self::EmptyEventTable => "event table has no rows",
            Self::MissingGoals => "no goal events but non-zero final score",
            Self::BoundaryMinuteAnomaly => "duplicate goals at minute 45 or 90",
        };
        f.write_str(text)
    }
}

/// A match URL that yielded no usable event data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoInfoEntry {
    pub path: CategoryPath,
    pub order: usize,
    pub url: String,
    pub reason: NoInfoReason,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn kickoff() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .and_then(|d| d.and_hms_opt(15, 0, 0))
            .unwrap()
    }

    fn goal(minute: &str) -> Goal {
        Goal {
            kind: GoalKind::Regular,
            minute: minute.to_string(),
            score_before: Score::new(0, 0),
            team: "Home".to_string(),
            player: "Player".to_string(),
        }
    }

    #[test]
    fn test_full_time_defaults_to_half_time() {
        let m = MatchBuilder::new(kickoff(), "A", "B", CategoryPath::default(), 1, "u")
            .half_time(Some(Score::new(1, 0)))
            .build();
        assert_eq!(m.full_time, Score::new(1, 0));
    }

    #[test]
    fn test_unset_scores_default_to_nil() {
        let m = MatchBuilder::new(kickoff(), "A", "B", CategoryPath::default(), 1, "u").build();
        assert_eq!(m.half_time, Score::new(0, 0));
        assert_eq!(m.full_time, Score::new(0, 0));
    }

    #[test]
    fn test_score_parse() {
        assert_eq!("2-1".parse::<Score>(), Ok(Score::new(2, 1)));
        assert_eq!("3 : 3".parse::<Score>(), Ok(Score::new(3, 3)));
        assert!("x-1".parse::<Score>().is_err());
        assert!("1-2-3".parse::<Score>().is_err());
        assert!("P-P".parse::<Score>().is_err());
    }

    #[test]
    fn test_score_total_and_diff() {
        let score = Score::new(1, 3);
        assert_eq!(score.total(), 4);
        assert_eq!(score.diff(), 2);
    }

    #[test]
    fn test_goal_kind_code_table() {
        assert_eq!(GoalKind::from_code(1), Some(GoalKind::Regular));
        assert_eq!(GoalKind::from_code(4), Some(GoalKind::OwnGoal));
        assert_eq!(GoalKind::from_code(6), Some(GoalKind::MissedPenalty));
        assert_eq!(GoalKind::from_code(9), None);
        assert_eq!(GoalKind::Penalty.code(), 5);
        assert!(!GoalKind::YellowCard.is_scoring());
    }

    #[test]
    fn test_minute_predicates() {
        assert!(goal("45").is_exact_minute(45));
        assert!(!goal("45+1").is_exact_minute(45));
        assert!(goal("45+1").is_stoppage_of(45));
        assert!(!goal("45").is_stoppage_of(45));
        assert_eq!(goal("90+4").primary_minute(), Some(90));
        assert_eq!(primary_minute("pen"), None);
    }
}
