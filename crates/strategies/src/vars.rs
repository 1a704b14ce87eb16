//! The variable bag shared by the replay loop and the strategies.
//!
//! The loop writes the clock, pool and hold-benchmark keys before every callback;
//! strategies may add their own keys under their own prefix.

use crate::error::StrategyError;
use chrono::{DateTime, Utc};
use core_types::U256;
use std::collections::HashMap;

pub const CLOCK_NOW: &str = "clock.now";
pub const CLOCK_PERIOD_INDEX: &str = "clock.period_index";
pub const POOL_TICK: &str = "pool.tick";
pub const POOL_SQRT_PRICE_X96: &str = "pool.sqrt_price_x96";
pub const EVENT_KIND: &str = "event.kind";
pub const EVENT_BLOCK: &str = "event.block";
/// Token amounts the operator deposited, the hold benchmark.
pub const HOLD_AMOUNT0: &str = "hold.amount0";
pub const HOLD_AMOUNT1: &str = "hold.amount1";

#[derive(Debug, Clone, PartialEq)]
pub enum VarValue {
    Int(i64),
    UInt(u64),
    Float(f64),
    Amount(U256),
    Time(DateTime<Utc>),
    Text(String),
    Flag(bool),
}

impl From<i64> for VarValue {
    fn from(v: i64) -> Self {
        VarValue::Int(v)
    }
}

impl From<i32> for VarValue {
    fn from(v: i32) -> Self {
        VarValue::Int(v.into())
    }
}

impl From<u64> for VarValue {
    fn from(v: u64) -> Self {
        VarValue::UInt(v)
    }
}

impl From<f64> for VarValue {
    fn from(v: f64) -> Self {
        VarValue::Float(v)
    }
}

impl From<U256> for VarValue {
    fn from(v: U256) -> Self {
        VarValue::Amount(v)
    }
}

impl From<DateTime<Utc>> for VarValue {
    fn from(v: DateTime<Utc>) -> Self {
        VarValue::Time(v)
    }
}

impl From<String> for VarValue {
    fn from(v: String) -> Self {
        VarValue::Text(v)
    }
}

impl From<&str> for VarValue {
    fn from(v: &str) -> Self {
        VarValue::Text(v.to_string())
    }
}

impl From<bool> for VarValue {
    fn from(v: bool) -> Self {
        VarValue::Flag(v)
    }
}

/// String-keyed, typed variables with checked accessors.
#[derive(Debug, Clone, Default)]
pub struct StrategyVars {
    values: HashMap<String, VarValue>,
}

macro_rules! typed_getter {
    ($name:ident, $variant:ident, $ty:ty, $label:literal) => {
        pub fn $name(&self, key: &str) -> Result<$ty, StrategyError> {
            match self.require(key)? {
                VarValue::$variant(v) => Ok(v.clone()),
                _ => Err(StrategyError::VariableType { key: key.to_string(), expected: $label }),
            }
        }
    };
}

impl StrategyVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<VarValue>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&VarValue> {
        self.values.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<VarValue> {
        self.values.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn require(&self, key: &str) -> Result<&VarValue, StrategyError> {
        self.values.get(key).ok_or_else(|| StrategyError::MissingVariable(key.to_string()))
    }

    typed_getter!(int, Int, i64, "signed integer");
    typed_getter!(uint, UInt, u64, "unsigned integer");
    typed_getter!(float, Float, f64, "float");
    typed_getter!(amount, Amount, U256, "token amount");
    typed_getter!(time, Time, DateTime<Utc>, "timestamp");
    typed_getter!(text, Text, String, "string");
    typed_getter!(flag, Flag, bool, "flag");

    /// Current pool tick as written by the replay loop.
    pub fn tick(&self) -> Result<i32, StrategyError> {
        let tick = self.int(POOL_TICK)?;
        i32::try_from(tick).map_err(|_| StrategyError::VariableType { key: POOL_TICK.to_string(), expected: "tick" })
    }
}
