use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tracing::info;

use super::{Delivery, JobQueue, QueueConsumer, QueueError};

/// Seconds a consumer blocks in `BLMOVE` before returning empty-handed,
/// so a cancelled worker notices promptly.
const RECEIVE_BLOCK_SECS: u64 = 1;

/// Reliable list queue: producers `LPUSH` onto `name`; consumers atomically
/// move the oldest entry onto `name:processing` and `LREM` it to acknowledge.
#[derive(Clone)]
pub struct RedisQueue {
    client: redis::Client,
    publisher: MultiplexedConnection,
    name: String,
    processing: String,
}

impl RedisQueue {
    pub async fn connect(redis_url: &str, name: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url)?;
        let publisher = client.get_multiplexed_async_connection().await?;
        info!(queue = name, "Redis queue connected");

        Ok(Self {
            client,
            publisher,
            name: name.to_string(),
            processing: format!("{name}:processing"),
        })
    }
}

#[async_trait]
impl JobQueue for RedisQueue {
    async fn publish(&self, payload: String) -> Result<(), QueueError> {
        let mut conn = self.publisher.clone();
        let _: i64 = redis::cmd("LPUSH")
            .arg(&self.name)
            .arg(payload)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn consumer(&self) -> Result<Box<dyn QueueConsumer>, QueueError> {
        let conn = self.client.get_multiplexed_async_connection().await?;
        Ok(Box::new(RedisConsumer {
            conn,
            name: self.name.clone(),
            processing: self.processing.clone(),
        }))
    }

    async fn recover_unacked(&self) -> Result<usize, QueueError> {
        let mut conn = self.publisher.clone();
        let mut moved = 0;
        loop {
            // newest first, so the oldest lands last at the consuming end
            let entry: Option<String> = redis::cmd("LMOVE")
                .arg(&self.processing)
                .arg(&self.name)
                .arg("LEFT")
                .arg("RIGHT")
                .query_async(&mut conn)
                .await?;
            if entry.is_none() {
                break;
            }
            moved += 1;
        }
        Ok(moved)
    }
}

struct RedisConsumer {
    conn: MultiplexedConnection,
    name: String,
    processing: String,
}

#[async_trait]
impl QueueConsumer for RedisConsumer {
    async fn receive(&mut self) -> Result<Option<Delivery>, QueueError> {
        let payload: Option<String> = redis::cmd("BLMOVE")
            .arg(&self.name)
            .arg(&self.processing)
            .arg("RIGHT")
            .arg("LEFT")
            .arg(RECEIVE_BLOCK_SECS)
            .query_async(&mut self.conn)
            .await?;
        Ok(payload.map(|payload| Delivery { payload }))
    }

    async fn ack(&mut self, delivery: &Delivery) -> Result<(), QueueError> {
        let _: i64 = redis::cmd("LREM")
            .arg(&self.processing)
            .arg(1)
            .arg(&delivery.payload)
            .query_async(&mut self.conn)
            .await?;
        Ok(())
    }
}
