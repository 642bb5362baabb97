//! In-Process Lock Store
//!
//! Lock table for tests and the standalone binary. Leases are enforced
//! against the injected clock: an expired lease is stealable by the next
//! acquirer, exactly like the store-side watchdog on the network store.

use crate::clock::{to_chrono, ClockRef};
use crate::error::Result;
use crate::lock::LockStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::time::Duration;

#[derive(Debug, Clone)]
struct Lease {
    holder: String,
    expires_at: DateTime<Utc>,
}

/// DashMap-backed [`LockStore`]
pub struct MemoryLockStore {
    leases: DashMap<String, Lease>,
    clock: ClockRef,
}

impl MemoryLockStore {
    pub fn new(clock: ClockRef) -> Self {
        Self {
            leases: DashMap::new(),
            clock,
        }
    }

    /// Number of leases currently in the table, expired or not
    pub fn len(&self) -> usize {
        self.leases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leases.is_empty()
    }
}

#[async_trait]
impl LockStore for MemoryLockStore {
    async fn try_acquire(&self, key: &str, holder: &str, lease: Duration) -> Result<bool> {
        let now = self.clock.now();
        let fresh = Lease {
            holder: holder.to_string(),
            expires_at: now
                .checked_add_signed(to_chrono(lease))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        };

        match self.leases.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                if occupied.get().expires_at <= now {
                    occupied.insert(fresh);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(fresh);
                Ok(true)
            }
        }
    }

    async fn release(&self, key: &str, holder: &str) -> Result<bool> {
        let removed = self
            .leases
            .remove_if(key, |_, lease| lease.holder == holder);
        Ok(removed.is_some())
    }
}
