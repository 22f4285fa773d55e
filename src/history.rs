use crate::{
    record::GameRecord,
    storage::{KvStore, HISTORY_KEY},
    tags::TagSets,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const HISTORY_CAPACITY: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub record: GameRecord,
    #[serde(default)]
    pub available: TagSets,
    pub message_ids: Vec<i64>,
    #[serde(default)]
    pub sent_at: String,
    #[serde(default)]
    pub message_link: Option<String>,
    #[serde(default)]
    pub image_count: usize,
}

impl DeliveryRecord {
    pub fn title(&self) -> &str {
        self.record.display_name()
    }

    pub fn matches(&self, ids: &[i64]) -> bool {
        same_ids(&self.message_ids, ids)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SendReceipt {
    pub message_ids: Vec<i64>,
    pub sent_at: String,
    pub message_link: Option<String>,
}

pub struct DeliveryHistory {
    entries: Vec<DeliveryRecord>,
    capacity: usize,
    store: Arc<dyn KvStore>,
}

impl DeliveryHistory {
    pub fn load(store: Arc<dyn KvStore>) -> Result<Self> {
        let entries = match store.load(HISTORY_KEY)? {
            Some(raw) => serde_json::from_str(&raw).context("parse delivery history")?,
            None => Vec::new(),
        };
        Ok(Self {
            entries,
            capacity: HISTORY_CAPACITY,
            store,
        })
    }

    #[cfg(test)]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self.entries.truncate(self.capacity);
        self
    }

    pub fn entries(&self) -> &[DeliveryRecord] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn find(&self, ids: &[i64]) -> Option<&DeliveryRecord> {
        if ids.is_empty() {
            return None;
        }
        self.entries.iter().find(|entry| entry.matches(ids))
    }

    pub fn add(&mut self, record: GameRecord, available: TagSets, receipt: SendReceipt) {
        self.remove(&receipt.message_ids);
        let image_count = record.images.len();
        self.entries.insert(
            0,
            DeliveryRecord {
                record: record.without_uploads(),
                available,
                message_ids: receipt.message_ids,
                sent_at: receipt.sent_at,
                message_link: receipt.message_link,
                image_count,
            },
        );
        self.entries.truncate(self.capacity);
        self.persist();
    }

    /// Replaces the payload of the entry for `ids` and moves it to the front.
    /// Prior images are kept when `record` carries none.
    pub fn update(
        &mut self,
        ids: &[i64],
        mut record: GameRecord,
        available: TagSets,
    ) -> Option<&DeliveryRecord> {
        let mut entry = self.remove(ids)?;
        if record.images.is_empty() {
            record.images = std::mem::take(&mut entry.record.images);
        } else {
            entry.image_count = record.images.len();
        }
        entry.record = record.without_uploads();
        entry.available = available;
        self.entries.insert(0, entry);
        self.persist();
        self.entries.first()
    }

    pub fn delete(&mut self, ids: &[i64]) -> Option<DeliveryRecord> {
        let entry = self.remove(ids)?;
        self.persist();
        Some(entry)
    }

    pub fn save(&self) -> Result<()> {
        let raw = serde_json::to_string_pretty(&self.entries).context("serialize delivery history")?;
        self.store.save(HISTORY_KEY, &raw)
    }

    fn remove(&mut self, ids: &[i64]) -> Option<DeliveryRecord> {
        if ids.is_empty() {
            return None;
        }
        let index = self.entries.iter().position(|entry| entry.matches(ids))?;
        Some(self.entries.remove(index))
    }

    fn persist(&self) {
        if let Err(err) = self.save() {
            log::warn!("delivery history not saved: {err:#}");
        }
    }
}

fn same_ids(left: &[i64], right: &[i64]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    let mut left = left.to_vec();
    let mut right = right.to_vec();
    left.sort_unstable();
    right.sort_unstable();
    left == right
}
