use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisWrite, ToRedisArgs};

impl ToRedisArgs for UserId {
    fn write_redis_args<W>(&self, out: &mut W)
    where
        W: ?Sized + RedisWrite,
    {
        out.write_arg(self.0.as_bytes())
    }
}

impl ToRedisArgs for ItemId {
    fn write_redis_args<W>(&self, out: &mut W)
    where
        W: ?Sized + RedisWrite,
    {
        out.write_arg(self.0.as_bytes())
    }
}

fn store_err(e: redis::RedisError) -> DataServiceError {
    DataServiceError::Store(e.to_string())
}

/// Bookmarks live in one sorted set per user, scored by bookmark time in
/// epoch millis. Tool records are JSON strings keyed by item id.
pub struct RedisMembershipRepo {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisMembershipRepo {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisMembershipRepo {
            conn,
            prefix: prefix.into(),
        }
    }

    fn bookmarks_key(&self, user_id: &UserId) -> String {
        format!("{}:bookmarks:{}", self.prefix, user_id)
    }

    fn tool_key(&self, item_id: &ItemId) -> String {
        format!("{}:tool:{}", self.prefix, item_id)
    }

    pub async fn put_tool(&self, record: &ToolRecord) -> Result<(), DataServiceError> {
        let json = serde_json::to_string(record)
            .map_err(|e| DataServiceError::InternalError(e.to_string()))?;
        let mut conn = self.conn.clone();
        let _: () = conn
            .set(self.tool_key(&record.id), json)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn load_records(
        &self,
        item_ids: &[ItemId],
    ) -> Result<Vec<Option<ToolRecord>>, DataServiceError> {
        if item_ids.is_empty() {
            return Ok(Vec::new());
        }
        let keys: Vec<String> = item_ids.iter().map(|id| self.tool_key(id)).collect();
        let mut conn = self.conn.clone();
        let raw: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await
            .map_err(store_err)?;

        Ok(raw
            .into_iter()
            .zip(item_ids)
            .map(|(json, item_id)| {
                json.and_then(|s| match serde_json::from_str::<ToolRecord>(&s) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        warn!(%item_id, "malformed tool record: {}", e);
                        None
                    }
                })
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl MembershipRepo for RedisMembershipRepo {
    async fn list_membership(
        &self,
        user_id: &UserId,
        join_records: bool,
    ) -> Result<Vec<BookmarkEntry>, DataServiceError> {
        let mut conn = self.conn.clone();
        let members: Vec<(String, f64)> = conn
            .zrange_withscores(self.bookmarks_key(user_id), 0, -1)
            .await
            .map_err(store_err)?;

        let item_ids: Vec<ItemId> = members.iter().map(|(id, _)| ItemId::new(id.as_str())).collect();
        let records = if join_records {
            self.load_records(&item_ids).await?
        } else {
            vec![None; item_ids.len()]
        };

        Ok(item_ids
            .into_iter()
            .zip(members)
            .zip(records)
            .map(|((item_id, (_, score)), record)| BookmarkEntry {
                item_id,
                bookmarked_at: DateTime::from_timestamp_millis(score as i64)
                    .unwrap_or_else(Utc::now),
                record,
            })
            .collect())
    }

    async fn add_membership(
        &self,
        user_id: &UserId,
        item_id: &ItemId,
    ) -> Result<AddOutcome, DataServiceError> {
        let mut conn = self.conn.clone();
        let added: i64 = redis::cmd("ZADD")
            .arg(self.bookmarks_key(user_id))
            .arg("NX")
            .arg(Utc::now().timestamp_millis())
            .arg(item_id)
            .query_async(&mut conn)
            .await
            .map_err(store_err)?;
        if added == 1 {
            Ok(AddOutcome::Added)
        } else {
            Ok(AddOutcome::AlreadyExists)
        }
    }

    async fn remove_membership(
        &self,
        user_id: &UserId,
        item_id: &ItemId,
    ) -> Result<(), DataServiceError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .zrem(self.bookmarks_key(user_id), item_id)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn clear_membership(&self, user_id: &UserId) -> Result<(), DataServiceError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .del(self.bookmarks_key(user_id))
            .await
            .map_err(store_err)?;
        Ok(())
    }
}
