//! Stores for settlements that arrived before their transfer was linked

use std::collections::HashMap;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::RwLock;

use crate::domain::payments::UnattachedSettlement;
use crate::domain::ports::UnattachedSettlementRepository;
use crate::shared::error::{AppError, AppResult};

#[derive(Default)]
pub struct InMemoryUnattachedSettlements {
    entries: RwLock<HashMap<String, UnattachedSettlement>>,
}

impl InMemoryUnattachedSettlements {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UnattachedSettlementRepository for InMemoryUnattachedSettlements {
    async fn put(&self, settlement: UnattachedSettlement) -> AppResult<()> {
        // Redelivery keeps the first sighting
        self.entries
            .write()
            .await
            .entry(settlement.settlement_id.clone())
            .or_insert(settlement);
        Ok(())
    }

    async fn take(&self, settlement_id: &str) -> AppResult<Option<UnattachedSettlement>> {
        Ok(self.entries.write().await.remove(settlement_id))
    }

    async fn list(&self) -> AppResult<Vec<UnattachedSettlement>> {
        let mut entries: Vec<_> = self.entries.read().await.values().cloned().collect();
        entries.sort_by(|a, b| a.received_at.cmp(&b.received_at));
        Ok(entries)
    }
}

/// Redis hash keyed by settlement id, values are JSON
pub struct RedisUnattachedSettlements {
    redis: ConnectionManager,
    key: String,
}

impl RedisUnattachedSettlements {
    pub fn new(redis: ConnectionManager, prefix: &str) -> Self {
        Self {
            redis,
            key: format!("{}:unattached_settlements", prefix),
        }
    }

    fn decode(bytes: &[u8]) -> AppResult<UnattachedSettlement> {
        serde_json::from_slice(bytes)
            .map_err(|e| AppError::Storage(format!("corrupt unattached settlement: {}", e)))
    }
}

#[async_trait]
impl UnattachedSettlementRepository for RedisUnattachedSettlements {
    async fn put(&self, settlement: UnattachedSettlement) -> AppResult<()> {
        let serialized = serde_json::to_vec(&settlement)
            .map_err(|e| AppError::Internal(format!("serialize settlement: {}", e)))?;
        let mut conn = self.redis.clone();
        let _: bool = conn.hset_nx(&self.key, &settlement.settlement_id, serialized).await?;
        Ok(())
    }

    async fn take(&self, settlement_id: &str) -> AppResult<Option<UnattachedSettlement>> {
        let mut conn = self.redis.clone();
        // HGET + HDEL in one transaction so two takers cannot both win
        let (data, _removed): (Option<Vec<u8>>, i64) = redis::pipe()
            .atomic()
            .hget(&self.key, settlement_id)
            .hdel(&self.key, settlement_id)
            .query_async(&mut conn)
            .await?;
        data.as_deref().map(Self::decode).transpose()
    }

    async fn list(&self) -> AppResult<Vec<UnattachedSettlement>> {
        let mut conn = self.redis.clone();
        let values: Vec<Vec<u8>> = conn.hvals(&self.key).await?;
        let mut entries = values.iter().map(|v| Self::decode(v)).collect::<AppResult<Vec<_>>>()?;
        entries.sort_by(|a, b| a.received_at.cmp(&b.received_at));
        Ok(entries)
    }
}
