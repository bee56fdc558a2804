#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use kindred_core::{DocumentPath, Fields, Timestamp, Value};
use kindred_db_memory::MemoryStore;
use kindred_notifications::{NotificationError, PushGateway, PushMessage, SendResult};
use kindred_storage::{DocumentStore, DynStore};

/// How the recording gateway answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayMode {
    Accept,
    Reject,
    Fail,
}

/// Gateway that keeps every message it is handed.
pub struct RecordingGateway {
    sent: Mutex<Vec<PushMessage>>,
    mode: Mutex<GatewayMode>,
}

impl RecordingGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            mode: Mutex::new(GatewayMode::Accept),
        })
    }

    pub fn set_mode(&self, mode: GatewayMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn sent(&self) -> Vec<PushMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushGateway for RecordingGateway {
    async fn send(&self, message: &PushMessage) -> Result<SendResult, NotificationError> {
        message.validate()?;
        self.sent.lock().unwrap().push(message.clone());
        let count = self.sent.lock().unwrap().len();
        match *self.mode.lock().unwrap() {
            GatewayMode::Accept => Ok(SendResult::delivered(format!("msg-{count}"))),
            GatewayMode::Reject => Ok(SendResult::rejected("UNREGISTERED")),
            GatewayMode::Fail => Err(NotificationError::SendFailed("connection reset".into())),
        }
    }

    fn name(&self) -> &str {
        "recording"
    }
}

pub fn fields<const N: usize>(pairs: [(&str, Value); N]) -> Fields {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

pub fn path(collection: &str, id: &str) -> DocumentPath {
    DocumentPath::new(collection, id).unwrap()
}

pub async fn put(store: &MemoryStore, collection: &str, id: &str, fields: Fields) {
    store.create(collection, Some(id), fields).await.unwrap();
}

pub async fn user(store: &MemoryStore, id: &str, name: &str, token: Option<&str>) {
    let mut f = fields([("displayName", Value::from(name))]);
    if let Some(token) = token {
        f.insert("deviceToken".into(), Value::from(token));
    }
    put(store, "users", id, f).await;
}

pub async fn counter(store: &MemoryStore, user: &str, field: &str) -> Option<i64> {
    store
        .get(&path("users", user))
        .await
        .unwrap()
        .and_then(|doc| doc.get_i64(field))
}

pub fn dyn_store(store: &Arc<MemoryStore>) -> DynStore {
    store.clone()
}

pub fn days_ago(now: Timestamp, days: i64) -> Value {
    Value::from(now.minus(time::Duration::days(days)))
}

pub fn hours_ago(now: Timestamp, hours: i64) -> Value {
    Value::from(now.minus(time::Duration::hours(hours)))
}
