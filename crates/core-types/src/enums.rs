use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;

/// When in the replay loop a strategy callback runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Once per clock tick, before that tick's events are replayed.
    AfterNewTimePeriod,
    /// After every replayed pool event.
    AfterEventApplied,
}

/// The two rebalance families a run drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebalanceKind {
    /// Debt overlay: leverage / deleverage toward the target collateral ratio.
    Dlv,
    /// Liquidity management: passive rebalance of the three ranges.
    Alm,
}

impl RebalanceKind {
    /// Order in which the replay loop visits the kinds inside one phase.
    pub const ORDER: [RebalanceKind; 2] = [RebalanceKind::Dlv, RebalanceKind::Alm];
}

impl fmt::Display for RebalanceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RebalanceKind::Dlv => write!(f, "dlv"),
            RebalanceKind::Alm => write!(f, "alm"),
        }
    }
}

/// Clock granularity of the replay loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickSize {
    Minute,
    Hour,
    FourHour,
    Day,
}

impl TickSize {
    pub fn duration(&self) -> Duration {
        match self {
            TickSize::Minute => Duration::minutes(1),
            TickSize::Hour => Duration::hours(1),
            TickSize::FourHour => Duration::hours(4),
            TickSize::Day => Duration::days(1),
        }
    }
}

/// Which pool token is the stable (debt-denominating) one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StableToken {
    Token0,
    Token1,
}

impl StableToken {
    /// True when swapping stable into volatile moves token0 into the pool.
    pub fn stable_is_token0(&self) -> bool {
        matches!(self, StableToken::Token0)
    }
}

/// Discriminant of a replayed pool event. The derive order is the tie-break
/// order for events sharing a `(block_number, log_index)` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Mint,
    Burn,
    Swap,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Mint => write!(f, "mint"),
            EventKind::Burn => write!(f, "burn"),
            EventKind::Swap => write!(f, "swap"),
        }
    }
}
