// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Feed access telemetry.

use super::FeedKind;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use tokio::sync::Mutex;

/// One feed fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedAccess {
    pub kind: FeedKind,
    pub query: Option<String>,
    pub client_ip: String,
    pub at: DateTime<Utc>,
}

/// Destination for access records.
#[async_trait]
pub trait AccessSink: Send + Sync {
    async fn record(&self, access: FeedAccess) -> Result<()>;
}

/// Keeps the most recent accesses in memory.
pub struct MemoryAccessLog {
    capacity: usize,
    entries: Mutex<VecDeque<FeedAccess>>,
}

impl MemoryAccessLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
        }
    }

    /// Recorded accesses, oldest first.
    pub async fn recent(&self) -> Vec<FeedAccess> {
        self.entries.lock().await.iter().cloned().collect()
    }
}

impl Default for MemoryAccessLog {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl AccessSink for MemoryAccessLog {
    async fn record(&self, access: FeedAccess) -> Result<()> {
        let mut entries = self.entries.lock().await;
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(access);
        Ok(())
    }
}
