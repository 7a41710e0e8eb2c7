//! Order stores: in-memory and Redis-backed
//!
//! Both keep a payment id index and a settlement id index next to the orders.
//! A payment id belongs to one order. A settlement batch covers many
//! transfers, so the settlement index points at the order written last.
//! Writes are conditional on the stored version.

use std::collections::HashMap;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::order::{Order, OrderPaymentRecord};
use crate::domain::ports::{OrderRepository, WriteOutcome};
use crate::shared::error::{AppError, AppResult};

#[derive(Default)]
struct Tables {
    orders: HashMap<String, Order>,
    by_payment: HashMap<String, String>,
    by_settlement: HashMap<String, String>,
}

impl Tables {
    fn claimed_by_other(&self, index: &HashMap<String, String>, key: Option<&String>, order_id: &str) -> bool {
        key.and_then(|k| index.get(k)).is_some_and(|owner| owner != order_id)
    }

    fn index(&mut self, order: &Order) {
        if let Some(payment_id) = &order.payment.payment_id {
            self.by_payment.insert(payment_id.clone(), order.order_id.clone());
        }
        if let Some(settlement_id) = &order.payment.settlement.settlement_id {
            self.by_settlement.insert(settlement_id.clone(), order.order_id.clone());
        }
    }
}

/// Process-local store for development and tests
#[derive(Default)]
pub struct InMemoryOrderStore {
    tables: RwLock<Tables>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderStore {
    async fn insert(&self, order: Order) -> AppResult<Order> {
        let mut tables = self.tables.write().await;
        if tables.orders.contains_key(&order.order_id) {
            return Err(AppError::Conflict(format!("order {} already exists", order.order_id)));
        }
        if tables.claimed_by_other(&tables.by_payment, order.payment.payment_id.as_ref(), &order.order_id) {
            return Err(AppError::Conflict("payment id already belongs to another order".to_string()));
        }
        tables.index(&order);
        tables.orders.insert(order.order_id.clone(), order.clone());
        Ok(order)
    }

    async fn get(&self, order_id: &str) -> AppResult<Option<Order>> {
        Ok(self.tables.read().await.orders.get(order_id).cloned())
    }

    async fn find_by_payment_id(&self, payment_id: &str) -> AppResult<Option<Order>> {
        let tables = self.tables.read().await;
        Ok(tables
            .by_payment
            .get(payment_id)
            .and_then(|order_id| tables.orders.get(order_id))
            .cloned())
    }

    async fn find_by_settlement_id(&self, settlement_id: &str) -> AppResult<Option<Order>> {
        let tables = self.tables.read().await;
        Ok(tables
            .by_settlement
            .get(settlement_id)
            .and_then(|order_id| tables.orders.get(order_id))
            .cloned())
    }

    async fn compare_and_swap(
        &self,
        order_id: &str,
        expected_version: u64,
        payment: OrderPaymentRecord,
    ) -> AppResult<WriteOutcome> {
        let mut tables = self.tables.write().await;
        let order = match tables.orders.get(order_id) {
            Some(order) if order.version == expected_version => order,
            Some(_) => return Ok(WriteOutcome::VersionConflict),
            None => return Err(AppError::NotFound(format!("order {}", order_id))),
        };
        if tables.claimed_by_other(&tables.by_payment, payment.payment_id.as_ref(), order_id) {
            return Err(AppError::Conflict("payment id already belongs to another order".to_string()));
        }

        let updated = Order {
            payment,
            version: order.version + 1,
            ..order.clone()
        };
        tables.index(&updated);
        tables.orders.insert(order_id.to_string(), updated.clone());
        Ok(WriteOutcome::Written(updated))
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

// KEYS: order doc, version, owned index keys, shared index keys
// ARGV: document, version, order id, number of owned index keys
const INSERT_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then return 0 end
for i = 3, 2 + tonumber(ARGV[4]) do
  local owner = redis.call('GET', KEYS[i])
  if owner and owner ~= ARGV[3] then return -1 end
end
redis.call('SET', KEYS[1], ARGV[1])
redis.call('SET', KEYS[2], ARGV[2])
for i = 3, #KEYS do redis.call('SET', KEYS[i], ARGV[3]) end
return 1
"#;

// KEYS: order doc, version, owned index keys, shared index keys
// ARGV: expected version, document, new version, order id, number of owned index keys
const CAS_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[2])
if not current then return -1 end
if current ~= ARGV[1] then return 0 end
for i = 3, 2 + tonumber(ARGV[5]) do
  local owner = redis.call('GET', KEYS[i])
  if owner and owner ~= ARGV[4] then return -2 end
end
redis.call('SET', KEYS[1], ARGV[2])
redis.call('SET', KEYS[2], ARGV[3])
for i = 3, #KEYS do redis.call('SET', KEYS[i], ARGV[4]) end
return 1
"#;

fn payment_key(prefix: &str, payment_id: &str) -> String {
    format!("{}:payment:{}", prefix, payment_id)
}

fn settlement_key(prefix: &str, settlement_id: &str) -> String {
    format!("{}:settlement:{}", prefix, settlement_id)
}

/// Index keys for `payment`, owned ones first, and how many are owned.
/// The scripts only check ownership on the first `owned` keys.
fn index_keys(prefix: &str, payment: &OrderPaymentRecord) -> (Vec<String>, usize) {
    let mut keys = Vec::new();
    if let Some(payment_id) = &payment.payment_id {
        keys.push(payment_key(prefix, payment_id));
    }
    let owned = keys.len();
    if let Some(settlement_id) = &payment.settlement.settlement_id {
        keys.push(settlement_key(prefix, settlement_id));
    }
    (keys, owned)
}

/// Redis-backed store: one JSON document and one version key per order
pub struct RedisOrderStore {
    redis: ConnectionManager,
    prefix: String,
    insert_script: Script,
    cas_script: Script,
}

impl RedisOrderStore {
    pub fn new(redis: ConnectionManager, prefix: impl Into<String>) -> Self {
        Self {
            redis,
            prefix: prefix.into(),
            insert_script: Script::new(INSERT_SCRIPT),
            cas_script: Script::new(CAS_SCRIPT),
        }
    }

    fn order_key(&self, order_id: &str) -> String {
        format!("{}:order:{}", self.prefix, order_id)
    }

    fn version_key(&self, order_id: &str) -> String {
        format!("{}:order:{}:version", self.prefix, order_id)
    }

    fn payment_key(&self, payment_id: &str) -> String {
        payment_key(&self.prefix, payment_id)
    }

    fn settlement_key(&self, settlement_id: &str) -> String {
        settlement_key(&self.prefix, settlement_id)
    }

    async fn lookup(&self, index_key: String) -> AppResult<Option<Order>> {
        let mut conn = self.redis.clone();
        let order_id: Option<String> = conn.get(index_key).await?;
        match order_id {
            Some(order_id) => self.get(&order_id).await,
            None => Ok(None),
        }
    }
}

#[async_trait]
impl OrderRepository for RedisOrderStore {
    async fn insert(&self, order: Order) -> AppResult<Order> {
        let document = serde_json::to_vec(&order)
            .map_err(|e| AppError::Internal(format!("serialize order: {}", e)))?;

        let mut invocation = self.insert_script.prepare_invoke();
        invocation
            .key(self.order_key(&order.order_id))
            .key(self.version_key(&order.order_id));
        let (keys, owned) = index_keys(&self.prefix, &order.payment);
        for key in keys {
            invocation.key(key);
        }
        invocation
            .arg(document)
            .arg(order.version)
            .arg(&order.order_id)
            .arg(owned);

        let mut conn = self.redis.clone();
        let status: i64 = invocation.invoke_async(&mut conn).await?;
        match status {
            1 => Ok(order),
            0 => Err(AppError::Conflict(format!("order {} already exists", order.order_id))),
            _ => Err(AppError::Conflict("payment id already belongs to another order".to_string())),
        }
    }

    async fn get(&self, order_id: &str) -> AppResult<Option<Order>> {
        let mut conn = self.redis.clone();
        let data: Option<Vec<u8>> = conn.get(self.order_key(order_id)).await?;
        data.map(|bytes| {
            serde_json::from_slice::<Order>(&bytes)
                .map_err(|e| AppError::Storage(format!("corrupt order document {}: {}", order_id, e)))
        })
        .transpose()
    }

    async fn find_by_payment_id(&self, payment_id: &str) -> AppResult<Option<Order>> {
        self.lookup(self.payment_key(payment_id)).await
    }

    async fn find_by_settlement_id(&self, settlement_id: &str) -> AppResult<Option<Order>> {
        self.lookup(self.settlement_key(settlement_id)).await
    }

    async fn compare_and_swap(
        &self,
        order_id: &str,
        expected_version: u64,
        payment: OrderPaymentRecord,
    ) -> AppResult<WriteOutcome> {
        let current = match self.get(order_id).await? {
            Some(order) => order,
            None => return Err(AppError::NotFound(format!("order {}", order_id))),
        };
        if current.version != expected_version {
            return Ok(WriteOutcome::VersionConflict);
        }

        let updated = Order {
            version: expected_version + 1,
            payment,
            ..current
        };
        let document = serde_json::to_vec(&updated)
            .map_err(|e| AppError::Internal(format!("serialize order: {}", e)))?;

        let mut invocation = self.cas_script.prepare_invoke();
        invocation.key(self.order_key(order_id)).key(self.version_key(order_id));
        let (keys, owned) = index_keys(&self.prefix, &updated.payment);
        for key in keys {
            invocation.key(key);
        }
        invocation
            .arg(expected_version)
            .arg(document)
            .arg(updated.version)
            .arg(order_id)
            .arg(owned);

        let mut conn = self.redis.clone();
        let status: i64 = invocation.invoke_async(&mut conn).await?;
        match status {
            1 => Ok(WriteOutcome::Written(updated)),
            0 => {
                debug!(order_id = %order_id, expected_version, "Redis CAS lost the race");
                Ok(WriteOutcome::VersionConflict)
            }
            -1 => Err(AppError::NotFound(format!("order {}", order_id))),
            _ => Err(AppError::Conflict("payment id already belongs to another order".to_string())),
        }
    }

    async fn ping(&self) -> AppResult<()> {
        let mut conn = self.redis.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
