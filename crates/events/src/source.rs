use crate::error::EventsError;
use crate::merge::{EventBatch, OrderedEvents};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{BurnEvent, EventKey, EventKind, MintEvent, SwapEvent};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Read access to the pool's event history.
///
/// Implementations must be safe to share across concurrent runs.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Returns the events with `start <= timestamp < end`, each list sorted by
    /// `(block_number, log_index)`.
    async fn load(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<EventBatch, EventsError>;

    /// Most recent swap strictly before `timestamp`, used to price the pool at
    /// the start of a window. Sources without lookback answer `None`.
    async fn last_swap_before(&self, _timestamp: DateTime<Utc>) -> Result<Option<SwapEvent>, EventsError> {
        Ok(None)
    }
}

/// Loads the `[start, end)` window and returns it as one lazily merged sequence.
pub async fn stream_events_by_date(
    source: &dyn EventSource,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<OrderedEvents, EventsError> {
    let batch = source.load(start, end).await?;
    tracing::debug!(%start, %end, events = batch.len(), "Loaded event window");
    OrderedEvents::new(batch)
}

/// Full event history held in memory, answering windows by binary search.
#[derive(Debug, Clone, Default)]
pub struct HistoricalEvents {
    mints: Vec<MintEvent>,
    burns: Vec<BurnEvent>,
    swaps: Vec<SwapEvent>,
}

fn normalize<T>(
    items: &mut [T],
    kind: EventKind,
    key: impl Fn(&T) -> EventKey,
    timestamp: impl Fn(&T) -> DateTime<Utc>,
) -> Result<(), EventsError> {
    items.sort_by_key(|item| key(item));
    for pair in items.windows(2) {
        if timestamp(&pair[1]) < timestamp(&pair[0]) {
            return Err(EventsError::TimestampOrder { kind, key: key(&pair[1]) });
        }
    }
    Ok(())
}

fn window<T: Clone>(
    items: &[T],
    timestamp: impl Fn(&T) -> DateTime<Utc>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<T> {
    let from = items.partition_point(|item| timestamp(item) < start);
    let to = items.partition_point(|item| timestamp(item) < end);
    if from >= to { Vec::new() } else { items[from..to].to_vec() }
}

async fn read_jsonl<T: DeserializeOwned>(path: PathBuf) -> Result<Vec<T>, EventsError> {
    let contents = match tokio::fs::read_to_string(&path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "Event file missing, treating the stream as empty");
            return Ok(Vec::new());
        }
        Err(source) => return Err(EventsError::Io { path, source }),
    };
    let mut items = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let item = serde_json::from_str(line).map_err(|source| EventsError::Parse {
            path: path.clone(),
            line: index + 1,
            source,
        })?;
        items.push(item);
    }
    Ok(items)
}

impl HistoricalEvents {
    /// Sorts each stream by `(block_number, log_index)` and checks that timestamps
    /// never go backwards along that order.
    pub fn new(
        mut mints: Vec<MintEvent>,
        mut burns: Vec<BurnEvent>,
        mut swaps: Vec<SwapEvent>,
    ) -> Result<Self, EventsError> {
        normalize(&mut mints, EventKind::Mint, MintEvent::key, |e| e.timestamp)?;
        normalize(&mut burns, EventKind::Burn, BurnEvent::key, |e| e.timestamp)?;
        normalize(&mut swaps, EventKind::Swap, SwapEvent::key, |e| e.timestamp)?;
        Ok(Self { mints, burns, swaps })
    }

    /// Reads `mints.jsonl`, `burns.jsonl` and `swaps.jsonl` from `dir`.
    pub async fn from_jsonl_dir(dir: impl AsRef<Path>) -> Result<Self, EventsError> {
        let dir = dir.as_ref();
        let mints = read_jsonl(dir.join("mints.jsonl")).await?;
        let burns = read_jsonl(dir.join("burns.jsonl")).await?;
        let swaps = read_jsonl(dir.join("swaps.jsonl")).await?;
        let history = Self::new(mints, burns, swaps)?;
        tracing::info!(
            dir = %dir.display(),
            mints = history.mints.len(),
            burns = history.burns.len(),
            swaps = history.swaps.len(),
            "Loaded event history"
        );
        Ok(history)
    }

    /// Most recent swap strictly before `timestamp`; its post-swap state is the
    /// pool price at that moment.
    pub fn last_swap_before(&self, timestamp: DateTime<Utc>) -> Option<&SwapEvent> {
        let index = self.swaps.partition_point(|e| e.timestamp < timestamp);
        index.checked_sub(1).and_then(|i| self.swaps.get(i))
    }

    pub fn len(&self) -> usize {
        self.mints.len() + self.burns.len() + self.swaps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl EventSource for HistoricalEvents {
    async fn load(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<EventBatch, EventsError> {
        Ok(EventBatch {
            mints: window(&self.mints, |e| e.timestamp, start, end),
            burns: window(&self.burns, |e| e.timestamp, start, end),
            swaps: window(&self.swaps, |e| e.timestamp, start, end),
        })
    }

    async fn last_swap_before(&self, timestamp: DateTime<Utc>) -> Result<Option<SwapEvent>, EventsError> {
        Ok(HistoricalEvents::last_swap_before(self, timestamp).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use core_types::{PoolEvent, U256};
    use std::sync::Arc;

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn swap(block: u64, log: u32, minutes: i64, tick: i32) -> SwapEvent {
        SwapEvent {
            block_number: block,
            log_index: log,
            timestamp: at(minutes),
            amount0: 10,
            amount1: -9,
            sqrt_price_x96: U256::from(1u8) << 96usize,
            liquidity: 1_000,
            tick,
        }
    }

    fn mint(block: u64, log: u32, minutes: i64) -> MintEvent {
        MintEvent {
            block_number: block,
            log_index: log,
            timestamp: at(minutes),
            owner: "lp".into(),
            tick_lower: -60,
            tick_upper: 60,
            amount: 5,
            amount0: U256::from(1u8),
            amount1: U256::from(1u8),
        }
    }

    fn history() -> HistoricalEvents {
        HistoricalEvents::new(
            vec![mint(12, 0, 20), mint(10, 4, 0)],
            vec![],
            vec![swap(13, 1, 30, 5), swap(10, 1, 0, 1), swap(11, 0, 10, 2), swap(14, 0, 60, 7)],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn windows_are_half_open() {
        let history = history();
        let batch = history.load(at(0), at(30)).await.unwrap();
        assert_eq!(batch.swaps.iter().map(|s| s.tick).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(batch.mints.len(), 2);
        let batch = history.load(at(30), at(60)).await.unwrap();
        assert_eq!(batch.swaps.len(), 1);
        assert!(history.load(at(61), at(120)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn repeated_streams_are_identical() {
        let shared: Arc<dyn EventSource> = Arc::new(history());
        let first: Vec<PoolEvent> = stream_events_by_date(shared.as_ref(), at(0), at(90)).await.unwrap().collect();
        let second: Vec<PoolEvent> = stream_events_by_date(shared.as_ref(), at(0), at(90)).await.unwrap().collect();
        assert_eq!(first, second);
        assert!(first.windows(2).all(|w| w[0].key() <= w[1].key()));
    }

    #[test]
    fn rejects_timestamps_running_backwards() {
        let result = HistoricalEvents::new(vec![], vec![], vec![swap(1, 0, 50, 0), swap(2, 0, 10, 0)]);
        assert!(matches!(result, Err(EventsError::TimestampOrder { kind: EventKind::Swap, .. })));
    }

    #[test]
    fn finds_last_swap_before_window() {
        let history = history();
        assert_eq!(history.last_swap_before(at(30)).map(|s| s.tick), Some(2));
        assert!(history.last_swap_before(at(0)).is_none());
    }

    #[tokio::test]
    async fn shared_source_answers_lookback() {
        let shared: Arc<dyn EventSource> = Arc::new(history());
        let seed = shared.last_swap_before(at(30)).await.unwrap();
        assert_eq!(seed.map(|s| s.key()), Some(EventKey { block_number: 11, log_index: 0 }));
    }

    #[tokio::test]
    async fn loads_jsonl_directory() {
        let dir = std::env::temp_dir().join(format!("vaultsim-events-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let lines: Vec<String> =
            [swap(2, 0, 5, 3), swap(1, 0, 0, 4)].iter().map(|s| serde_json::to_string(s).unwrap()).collect();
        tokio::fs::write(dir.join("swaps.jsonl"), lines.join("\n") + "\n\n").await.unwrap();
        tokio::fs::write(dir.join("mints.jsonl"), "{\"not\": \"an event\"}\n").await.unwrap();

        let err = HistoricalEvents::from_jsonl_dir(&dir).await.unwrap_err();
        assert!(matches!(err, EventsError::Parse { line: 1, .. }));

        tokio::fs::remove_file(dir.join("mints.jsonl")).await.unwrap();
        let history = HistoricalEvents::from_jsonl_dir(&dir).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history.last_swap_before(at(60)).map(|s| s.tick), Some(3));
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
