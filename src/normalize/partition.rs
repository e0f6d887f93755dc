use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::feed::models::Reading;

/// Partition key used when no device slots are configured.
pub const SINGLE_DEVICE_KEY: &str = "default";

/// One logical device and every identifier it has reported under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSlot {
    pub key: String,
    pub label: String,
    /// Extra identifiers (legacy or renamed ids). The key always matches itself.
    pub aliases: Vec<String>,
}

impl DeviceSlot {
    #[must_use]
    pub fn new(key: &str, label: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            aliases: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }
}

/// Alias lookup table: identifier → slot index.
#[derive(Debug, Clone)]
pub struct DeviceTable {
    slots: Vec<DeviceSlot>,
    index: HashMap<String, usize>,
}

impl DeviceTable {
    /// Build the lookup table. An identifier claimed by two slots belongs to the first one.
    #[must_use]
    pub fn new(slots: Vec<DeviceSlot>) -> Self {
        let mut index: HashMap<String, usize> = HashMap::new();
        for (i, slot) in slots.iter().enumerate() {
            for id in std::iter::once(&slot.key).chain(&slot.aliases) {
                if let Some(&owner) = index.get(id) {
                    if owner != i {
                        tracing::warn!(
                            id = %id,
                            kept = %slots[owner].key,
                            ignored = %slot.key,
                            "Device identifier claimed by two slots"
                        );
                    }
                    continue;
                }
                index.insert(id.clone(), i);
            }
        }
        Self { slots, index }
    }

    /// No slots configured: every reading belongs to one implicit device.
    #[must_use]
    pub fn is_single_device(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slot index for a reading's device id. Always `Some(0)` in single-device mode.
    #[must_use]
    pub fn resolve(&self, device_id: Option<&str>) -> Option<usize> {
        if self.is_single_device() {
            return Some(0);
        }
        device_id.and_then(|id| self.index.get(id).copied())
    }

    /// Split chronologically sorted readings into one partition per slot, in slot order.
    ///
    /// Readings whose id matches no slot are dropped.
    #[must_use]
    pub fn partition(&self, readings: Vec<Reading>) -> Vec<Partition> {
        let mut partitions: Vec<Partition> = if self.is_single_device() {
            vec![Partition::new(SINGLE_DEVICE_KEY, "Sensor")]
        } else {
            self.slots
                .iter()
                .map(|s| Partition::new(&s.key, &s.label))
                .collect()
        };

        let mut dropped = 0usize;
        for reading in readings {
            match self.resolve(reading.device_id.as_deref()) {
                Some(i) => partitions[i].readings.push(reading),
                None => dropped += 1,
            }
        }

        if dropped > 0 {
            tracing::debug!(dropped, "Readings from unknown devices dropped");
        }

        partitions
    }
}

/// The readings attributed to one logical device, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub device: String,
    pub label: String,
    pub readings: Vec<Reading>,
}

impl Partition {
    #[must_use]
    pub fn new(device: &str, label: &str) -> Self {
        Self {
            device: device.to_string(),
            label: label.to_string(),
            readings: Vec::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    #[must_use]
    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.readings.iter().map(|r| r.timestamp).collect()
    }

    #[must_use]
    pub fn latest(&self) -> Option<&Reading> {
        self.readings.last()
    }

    /// Whether any reading carries `key`, even as null.
    #[must_use]
    pub fn has_field(&self, key: &str) -> bool {
        self.readings.iter().any(|r| r.has_field(key))
    }
}
