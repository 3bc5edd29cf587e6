use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tokio::sync::mpsc;

use crate::error::{AppError, Result};
use crate::models::session::{CandidateMetadata, SessionRecord};

use super::documents::RecordWatch;

const STARTED_AT: &str = "started_at";
const FINISHED_AT: &str = "finished_at";
const METADATA: &str = "metadata";

fn record_key(uid: &str) -> String {
    format!("users:{}", uid)
}

/// Redis document binding: one hash per candidate under `users:{uid}`.
///
/// Creation is a pipelined `DEL` + `HSET` (the non-merging overwrite);
/// finishing is a single-field `HSET` (the partial update). Observation
/// polls `HGETALL` on the configured interval and emits only on change.
#[derive(Clone)]
pub struct RedisDocuments {
    conn: ConnectionManager,
    poll_interval: Duration,
}

impl RedisDocuments {
    pub fn new(conn: ConnectionManager, poll_interval: Duration) -> Self {
        Self {
            conn,
            poll_interval,
        }
    }

    pub async fn create_session(&self, uid: &str, metadata: CandidateMetadata) -> Result<()> {
        let metadata_json = sonic_rs::to_string(&metadata)
            .map_err(|e| AppError::Internal(format!("Metadata serialization failed: {}", e)))?;
        let key = record_key(uid);
        let mut conn = self.conn.clone();
        let _: () = redis::pipe()
            .atomic()
            .del(&key)
            .hset(&key, STARTED_AT, Utc::now().to_rfc3339())
            .hset(&key, METADATA, metadata_json)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn mark_finished(&self, uid: &str) -> Result<()> {
        let key = record_key(uid);
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(&key).await?;
        if !exists {
            return Err(AppError::RecordNotFound);
        }
        let _: () = conn
            .hset(&key, FINISHED_AT, Utc::now().to_rfc3339())
            .await?;
        Ok(())
    }

    pub fn observe(
        &self,
        uid: &str,
        tx: mpsc::UnboundedSender<Option<SessionRecord>>,
    ) -> RecordWatch {
        let key = record_key(uid);
        let mut conn = self.conn.clone();
        let poll_interval = self.poll_interval;
        let task = tokio::spawn(async move {
            let mut last: Option<Option<SessionRecord>> = None;
            let mut ticker = tokio::time::interval(poll_interval);
            loop {
                ticker.tick().await;
                let outcome: redis::RedisResult<HashMap<String, String>> =
                    conn.hgetall(&key).await;
                let record = match outcome {
                    Ok(fields) if fields.is_empty() => None,
                    Ok(fields) => Some(parse_record(&fields)),
                    Err(e) => {
                        tracing::warn!("record observation failed, treating as absent: {}", e);
                        None
                    }
                };
                if last.as_ref() != Some(&record) {
                    if tx.send(record.clone()).is_err() {
                        return;
                    }
                    last = Some(record);
                }
            }
        });
        RecordWatch::new(task)
    }
}

/// An unparseable field reads the same as an absent one.
fn parse_record(fields: &HashMap<String, String>) -> SessionRecord {
    let parse_ts = |name: &str| -> Option<DateTime<Utc>> {
        fields
            .get(name)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|ts| ts.with_timezone(&Utc))
    };
    let metadata: CandidateMetadata = fields
        .get(METADATA)
        .and_then(|raw| sonic_rs::from_str(raw).ok())
        .unwrap_or_default();
    SessionRecord {
        started_at: parse_ts(STARTED_AT),
        finished_at: parse_ts(FINISHED_AT),
        metadata,
    }
}
