//! Downstream message bus abstraction and the in-process implementation.
//!
//! A bus takes keyed records for a topic. Records with the same key land
//! in the same partition, so per-event ordering holds wherever the bus
//! has partitions at all.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use tokio::sync::broadcast;

use crate::types::{PublishError, ScoreSnapshot};

/// Capacity of the live feed returned by [`InMemoryBus::subscribe`].
const FEED_CAPACITY: usize = 1024;
const DEFAULT_PARTITIONS: u32 = 4;
/// Records kept per `(topic, partition)` before the oldest are dropped.
const DEFAULT_RETENTION: usize = 10_000;

/// One keyed message headed for a topic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusRecord {
    pub topic: String,
    pub key: String,
    pub value: serde_json::Value,
}

impl BusRecord {
    /// Encode a score snapshot as a record keyed by its event id.
    pub fn score_update(topic: &str, snapshot: &ScoreSnapshot) -> Result<Self, PublishError> {
        Ok(Self {
            topic: topic.to_string(),
            key: snapshot.event_id().as_str().to_string(),
            value: serde_json::to_value(snapshot.to_payload())?,
        })
    }
}

/// Broker acknowledgment for a delivered record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub topic: String,
    pub partition: Option<u32>,
    pub offset: Option<u64>,
}

/// Abstraction over the downstream message system.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Deliver one record, resolving once the bus has accepted or refused it.
    async fn send(&self, record: BusRecord) -> Result<Delivery, PublishError>;

    /// Bus name for logging.
    fn name(&self) -> &str;
}

/// Deterministic FNV-1a hash (stable across runs and processes).
fn fnv1a_u64(s: &str) -> u64 {
    let mut h: u64 = 0xcbf29ce484222325;
    for b in s.as_bytes() {
        h ^= *b as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    h
}

/// Partition a key maps to.
pub fn partition_for(key: &str, partitions: u32) -> u32 {
    if partitions <= 1 {
        return 0;
    }
    (fnv1a_u64(key) % partitions as u64) as u32
}

// ---------------------------------------------------------------------------
// In-memory bus
// ---------------------------------------------------------------------------

/// One `(topic, partition)` log, keeping only the newest records.
#[derive(Default)]
struct PartitionLog {
    /// Offset of the oldest retained record.
    base_offset: u64,
    records: VecDeque<BusRecord>,
}

impl PartitionLog {
    /// Append and return the record's offset. Evicts from the front once
    /// more than `retention` records are held.
    fn append(&mut self, record: BusRecord, retention: usize) -> u64 {
        self.records.push_back(record);
        while self.records.len() > retention {
            self.records.pop_front();
            self.base_offset += 1;
        }
        self.base_offset + self.records.len() as u64 - 1
    }
}

/// Partitioned, in-process bus with bounded retention.
///
/// Used when no external broker is configured, and by tests. Each
/// partition keeps its newest `retention` records; offsets keep counting
/// past evictions. Every accepted record is also pushed to a broadcast
/// feed.
pub struct InMemoryBus {
    partitions: u32,
    retention: usize,
    logs: DashMap<(String, u32), PartitionLog>,
    feed: broadcast::Sender<BusRecord>,
    /// If set, every send fails with this message.
    failure: Mutex<Option<String>>,
}

impl InMemoryBus {
    pub fn new(partitions: u32) -> Self {
        Self::with_retention(partitions, DEFAULT_RETENTION)
    }

    pub fn with_retention(partitions: u32, retention: usize) -> Self {
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            partitions: partitions.max(1),
            retention: retention.max(1),
            logs: DashMap::new(),
            feed,
            failure: Mutex::new(None),
        }
    }

    /// Live feed of accepted records.
    pub fn subscribe(&self) -> broadcast::Receiver<BusRecord> {
        self.feed.subscribe()
    }

    /// Force subsequent sends to fail (`Some`) or succeed again (`None`).
    pub fn fail_with(&self, message: Option<&str>) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = message.map(str::to_owned);
    }

    /// Retained records of `topic`, partition by partition, each in offset order.
    pub fn records(&self, topic: &str) -> Vec<BusRecord> {
        (0..self.partitions)
            .filter_map(|p| {
                self.logs
                    .get(&(topic.to_string(), p))
                    .map(|log| log.records.iter().cloned().collect::<Vec<_>>())
            })
            .flatten()
            .collect()
    }

    /// Retained records of `topic` carrying `key`, in publish order.
    pub fn records_for_key(&self, topic: &str, key: &str) -> Vec<BusRecord> {
        let partition = partition_for(key, self.partitions);
        self.logs
            .get(&(topic.to_string(), partition))
            .map(|log| log.records.iter().filter(|r| r.key == key).cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new(DEFAULT_PARTITIONS)
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn send(&self, record: BusRecord) -> Result<Delivery, PublishError> {
        if let Some(msg) = self.failure.lock().unwrap_or_else(PoisonError::into_inner).clone() {
            return Err(PublishError::Unavailable(msg));
        }

        let partition = partition_for(&record.key, self.partitions);
        let topic = record.topic.clone();
        let offset = self
            .logs
            .entry((topic.clone(), partition))
            .or_default()
            .append(record.clone(), self.retention);

        // No subscribers is fine.
        let _ = self.feed.send(record);

        Ok(Delivery {
            topic,
            partition: Some(partition),
            offset: Some(offset),
        })
    }

    fn name(&self) -> &str {
        "memory"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
