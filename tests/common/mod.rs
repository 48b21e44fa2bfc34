//! Shared test doubles and the pipeline harness.
//!
//! Each external capability has a scripted stand-in: responses are popped
//! from a queue, falling back to a successful default once the queue is
//! empty. The recording scheduler keeps work items instead of running them so
//! tests can drain the pipeline deterministically under paused tokio time.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use publisher_core::catalog::InMemoryCatalog;
use publisher_core::config::PublisherConfig;
use publisher_core::database::{InMemoryTaskStore, TaskStore};
use publisher_core::enhancement::{
    ContentEnhancer, EnhancedContent, EnhancementError, EnhancementRequest,
};
use publisher_core::events::EventPublisher;
use publisher_core::marketplaces::{
    MarketplaceFailure, MarketplaceRegistry, MarketplaceRequest, MarketplaceResponse,
    MarketplaceTransport,
};
use publisher_core::models::{
    MarketplaceCredentials, MarketplaceRecord, ProductSnapshot, PublicationTask,
};
use publisher_core::orchestration::{WorkItem, WorkScheduler};
use publisher_core::state_machine::{AdvanceOutcome, PipelineDependencies, TaskStateMachine};
use publisher_core::webhooks::{SignedPayload, TransportError, WebhookResponse, WebhookTransport};

pub const PRODUCT_ID: i64 = 123;
pub const MARKETPLACE_ID: i64 = 456;
pub const WEBHOOK_URL: &str = "https://hooks.example.com/publisher";
pub const WEBHOOK_SECRET: &str = "test-secret";

pub fn product(id: i64) -> ProductSnapshot {
    ProductSnapshot {
        id,
        title: "Wireless Headphones".to_string(),
        description: "Over-ear headphones with noise cancelling".to_string(),
        short_description: Some("Over-ear headphones".to_string()),
        sku: format!("SKU-{id}"),
        price: 99.99,
        stock: 10,
        category: Some("Electronics".to_string()),
        weight: Some(0.4),
        dimensions: Some("20x18x8".to_string()),
    }
}

pub fn marketplace(id: i64, name: &str, slug: &str) -> MarketplaceRecord {
    MarketplaceRecord {
        id,
        name: name.to_string(),
        slug: slug.to_string(),
        api_url: format!("https://api.{slug}.example.com"),
        webhook_url: None,
        is_active: true,
        credentials: MarketplaceCredentials {
            access_token: "token-123".to_string(),
            ..MarketplaceCredentials::default()
        },
    }
}

pub fn enhanced(description: &str, keywords: &[&str]) -> EnhancedContent {
    EnhancedContent {
        enhanced_description: description.to_string(),
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
    }
}

#[derive(Default)]
pub struct ScriptedEnhancer {
    script: Mutex<VecDeque<Result<EnhancedContent, EnhancementError>>>,
    calls: AtomicUsize,
}

impl ScriptedEnhancer {
    pub fn push(&self, response: Result<EnhancedContent, EnhancementError>) {
        self.script.lock().push_back(response);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentEnhancer for ScriptedEnhancer {
    async fn enhance(&self, _request: &EnhancementRequest) -> Result<EnhancedContent, EnhancementError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script.lock().pop_front().unwrap_or_else(|| {
            Ok(enhanced(
                "Immersive wireless sound with all-day comfort",
                &["wireless", "headphones", "bluetooth"],
            ))
        })
    }
}

#[derive(Default)]
pub struct ScriptedMarketplaceTransport {
    script: Mutex<VecDeque<Result<MarketplaceResponse, MarketplaceFailure>>>,
    requests: Mutex<Vec<MarketplaceRequest>>,
}

impl ScriptedMarketplaceTransport {
    pub fn push(&self, response: Result<MarketplaceResponse, MarketplaceFailure>) {
        self.script.lock().push_back(response);
    }

    pub fn push_failure(&self, code: &str, message: &str) {
        self.push(Err(MarketplaceFailure::new(code, message)
            .with_raw_response(json!({ "error": code, "message": message }))));
    }

    pub fn requests(&self) -> Vec<MarketplaceRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl MarketplaceTransport for ScriptedMarketplaceTransport {
    async fn send(&self, request: MarketplaceRequest) -> Result<MarketplaceResponse, MarketplaceFailure> {
        self.requests.lock().push(request);
        self.script.lock().pop_front().unwrap_or_else(|| {
            Ok(MarketplaceResponse {
                status: 201,
                body: json!({
                    "id": "MLM999",
                    "permalink": "https://articulo.mercadolibre.com.ar/MLM999",
                }),
            })
        })
    }
}

#[derive(Default)]
pub struct ScriptedWebhookTransport {
    script: Mutex<VecDeque<Result<WebhookResponse, TransportError>>>,
    deliveries: Mutex<Vec<(String, SignedPayload)>>,
}

impl ScriptedWebhookTransport {
    pub fn push(&self, response: Result<WebhookResponse, TransportError>) {
        self.script.lock().push_back(response);
    }

    pub fn push_status(&self, status_code: u16, body: &str) {
        self.push(Ok(WebhookResponse {
            status_code,
            body: body.to_string(),
        }));
    }

    pub fn deliveries(&self) -> Vec<(String, SignedPayload)> {
        self.deliveries.lock().clone()
    }

    /// Parsed bodies of every delivery attempt
    pub fn payloads(&self) -> Vec<Value> {
        self.deliveries
            .lock()
            .iter()
            .filter_map(|(_, signed)| serde_json::from_str(&signed.body).ok())
            .collect()
    }
}

#[async_trait]
impl WebhookTransport for ScriptedWebhookTransport {
    async fn deliver(&self, url: &str, payload: &SignedPayload) -> Result<WebhookResponse, TransportError> {
        self.deliveries.lock().push((url.to_string(), payload.clone()));
        self.script.lock().pop_front().unwrap_or_else(|| {
            Ok(WebhookResponse {
                status_code: 200,
                body: "ok".to_string(),
            })
        })
    }
}

/// Keeps scheduled work for the test to run
#[derive(Default)]
pub struct RecordingScheduler {
    items: Mutex<Vec<(WorkItem, Duration)>>,
}

impl RecordingScheduler {
    pub fn take(&self) -> Vec<(WorkItem, Duration)> {
        std::mem::take(&mut *self.items.lock())
    }

    pub fn pending(&self) -> Vec<(WorkItem, Duration)> {
        self.items.lock().clone()
    }
}

impl WorkScheduler for RecordingScheduler {
    fn schedule(&self, item: WorkItem, delay: Duration) {
        self.items.lock().push((item, delay));
    }
}

pub struct Harness {
    pub machine: Arc<TaskStateMachine>,
    pub store: Arc<InMemoryTaskStore>,
    pub catalog: Arc<InMemoryCatalog>,
    pub enhancer: Arc<ScriptedEnhancer>,
    pub marketplace: Arc<ScriptedMarketplaceTransport>,
    pub webhooks: Arc<ScriptedWebhookTransport>,
    pub scheduler: Arc<RecordingScheduler>,
    pub events: EventPublisher,
    pub config: PublisherConfig,
}

pub fn test_config() -> PublisherConfig {
    let mut config = PublisherConfig::default();
    config.webhook.url = Some(WEBHOOK_URL.to_string());
    config.webhook.secret = Some(WEBHOOK_SECRET.to_string());
    config
}

impl Harness {
    /// Must be called inside a tokio runtime so the pipeline clock follows
    /// paused time
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: PublisherConfig) -> Self {
        let store = Arc::new(InMemoryTaskStore::new());
        let catalog = Arc::new(InMemoryCatalog::new());
        catalog.upsert_product(product(PRODUCT_ID));
        catalog.upsert_marketplace(marketplace(MARKETPLACE_ID, "MercadoLibre", "mercadolibre"));

        let enhancer = Arc::new(ScriptedEnhancer::default());
        let marketplace_transport = Arc::new(ScriptedMarketplaceTransport::default());
        let webhooks = Arc::new(ScriptedWebhookTransport::default());
        let scheduler = Arc::new(RecordingScheduler::default());
        let events = EventPublisher::new(256);

        let machine = Arc::new(TaskStateMachine::new(
            PipelineDependencies {
                store: store.clone(),
                catalog: catalog.clone(),
                content_enhancer: enhancer.clone(),
                marketplaces: Arc::new(MarketplaceRegistry::with_builtin(marketplace_transport.clone())),
                webhook_transport: webhooks.clone(),
                scheduler: scheduler.clone(),
                events: events.clone(),
            },
            &config,
        ));

        Self {
            machine,
            store,
            catalog,
            enhancer,
            marketplace: marketplace_transport,
            webhooks,
            scheduler,
            events,
            config,
        }
    }

    pub async fn task(&self, task_id: Uuid) -> PublicationTask {
        self.store
            .get(task_id)
            .await
            .expect("store read")
            .expect("task exists")
    }

    /// Run scheduled work, advancing paused time over each delay, until
    /// nothing is left
    pub async fn run_until_idle(&self) -> Vec<AdvanceOutcome> {
        let mut outcomes = Vec::new();
        for _ in 0..100 {
            let batch = self.scheduler.take();
            if batch.is_empty() {
                return outcomes;
            }
            for (item, delay) in batch {
                if !delay.is_zero() {
                    tokio::time::advance(delay).await;
                }
                outcomes.push(self.machine.dispatch(item).await.expect("dispatch"));
            }
        }
        panic!("pipeline did not settle after 100 rounds");
    }

    /// Create a task for the default pair and drive it to rest
    pub async fn publish(&self) -> PublicationTask {
        let created = self
            .machine
            .create(PRODUCT_ID, MARKETPLACE_ID)
            .await
            .expect("create task");
        self.run_until_idle().await;
        self.task(created.task_id).await
    }
}
