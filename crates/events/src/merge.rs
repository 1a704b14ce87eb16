use crate::error::EventsError;
use core_types::{BurnEvent, EventKey, EventKind, MintEvent, PoolEvent, SwapEvent};
use std::iter::Peekable;
use std::vec;

/// Three already windowed lists of pool events, each sorted by `(block, log index)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventBatch {
    pub mints: Vec<MintEvent>,
    pub burns: Vec<BurnEvent>,
    pub swaps: Vec<SwapEvent>,
}

impl EventBatch {
    pub fn len(&self) -> usize {
        self.mints.len() + self.burns.len() + self.swaps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_ordered(self) -> Result<OrderedEvents, EventsError> {
        OrderedEvents::new(self)
    }
}

fn ensure_sorted<T>(items: &[T], kind: EventKind, key: impl Fn(&T) -> EventKey) -> Result<(), EventsError> {
    for pair in items.windows(2) {
        let (previous, next) = (key(&pair[0]), key(&pair[1]));
        if next < previous {
            return Err(EventsError::Unsorted { kind, previous, next });
        }
    }
    Ok(())
}

/// Lazy three-way merge of mint, burn and swap streams into causal order.
///
/// Only the head of each stream is inspected per step. Not seekable: restart by
/// loading the window again.
#[derive(Debug)]
pub struct OrderedEvents {
    mints: Peekable<vec::IntoIter<MintEvent>>,
    burns: Peekable<vec::IntoIter<BurnEvent>>,
    swaps: Peekable<vec::IntoIter<SwapEvent>>,
}

impl OrderedEvents {
    /// Rejects any input stream that is not sorted by `(block_number, log_index)`.
    pub fn new(batch: EventBatch) -> Result<Self, EventsError> {
        ensure_sorted(&batch.mints, EventKind::Mint, MintEvent::key)?;
        ensure_sorted(&batch.burns, EventKind::Burn, BurnEvent::key)?;
        ensure_sorted(&batch.swaps, EventKind::Swap, SwapEvent::key)?;
        Ok(Self {
            mints: batch.mints.into_iter().peekable(),
            burns: batch.burns.into_iter().peekable(),
            swaps: batch.swaps.into_iter().peekable(),
        })
    }

    pub fn remaining(&self) -> usize {
        self.mints.len() + self.burns.len() + self.swaps.len()
    }
}

impl Iterator for OrderedEvents {
    type Item = PoolEvent;

    fn next(&mut self) -> Option<PoolEvent> {
        let heads = [
            self.mints.peek().map(|e| (e.key(), EventKind::Mint)),
            self.burns.peek().map(|e| (e.key(), EventKind::Burn)),
            self.swaps.peek().map(|e| (e.key(), EventKind::Swap)),
        ];
        let (_, kind) = heads.into_iter().flatten().min()?;
        match kind {
            EventKind::Mint => self.mints.next().map(PoolEvent::Mint),
            EventKind::Burn => self.burns.next().map(PoolEvent::Burn),
            EventKind::Swap => self.swaps.next().map(PoolEvent::Swap),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for OrderedEvents {}
