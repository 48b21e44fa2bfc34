use std::sync::Arc;
use std::time::Duration;

use publisher_core::catalog::InMemoryCatalog;
use publisher_core::database::InMemoryTaskStore;
use publisher_core::events::EventPublisher;
use publisher_core::marketplaces::MarketplaceRegistry;
use publisher_core::models::PublicationTask;
use publisher_core::orchestration::{TokioScheduler, WorkHandler, WorkerPool, WorkerPoolHandle};
use publisher_core::state_machine::{PipelineDependencies, TaskStateMachine, TaskStatus};

use crate::common::{
    marketplace, product, test_config, ScriptedEnhancer, ScriptedMarketplaceTransport,
    ScriptedWebhookTransport, MARKETPLACE_ID, PRODUCT_ID,
};

struct Runtime {
    machine: Arc<TaskStateMachine>,
    catalog: Arc<InMemoryCatalog>,
    marketplace: Arc<ScriptedMarketplaceTransport>,
    webhooks: Arc<ScriptedWebhookTransport>,
    pool: WorkerPoolHandle,
}

fn runtime() -> Runtime {
    let catalog = Arc::new(InMemoryCatalog::new());
    catalog.upsert_product(product(PRODUCT_ID));
    catalog.upsert_product(product(124));
    catalog.upsert_marketplace(marketplace(MARKETPLACE_ID, "MercadoLibre", "mercadolibre"));
    catalog.upsert_marketplace(marketplace(457, "Walmart", "walmart"));

    let marketplace_transport = Arc::new(ScriptedMarketplaceTransport::default());
    let webhooks = Arc::new(ScriptedWebhookTransport::default());
    let (scheduler, receiver) = TokioScheduler::channel();
    let config = test_config();

    let machine = Arc::new(TaskStateMachine::new(
        PipelineDependencies {
            store: Arc::new(InMemoryTaskStore::new()),
            catalog: catalog.clone(),
            content_enhancer: Arc::new(ScriptedEnhancer::default()),
            marketplaces: Arc::new(MarketplaceRegistry::with_builtin(marketplace_transport.clone())),
            webhook_transport: webhooks.clone(),
            scheduler: Arc::new(scheduler),
            events: EventPublisher::new(64),
        },
        &config,
    ));
    let handler: Arc<dyn WorkHandler> = machine.clone();
    let pool = WorkerPool::spawn(handler, receiver, config.execution.worker_concurrency);

    Runtime {
        machine,
        catalog,
        marketplace: marketplace_transport,
        webhooks,
        pool,
    }
}

async fn wait_for_terminal(machine: &TaskStateMachine, task_id: uuid::Uuid) -> PublicationTask {
    for _ in 0..1_000 {
        let task = machine.task(task_id).await.unwrap();
        if task.is_terminal() && task.webhook_result.is_some() {
            return task;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    panic!("task {task_id} never settled");
}

#[tokio::test(start_paused = true)]
async fn test_worker_pool_drives_task_through_retries() {
    let runtime = runtime();
    runtime.marketplace.push_failure("HTTP_503", "Service temporarily unavailable");

    let created = runtime.machine.create(PRODUCT_ID, MARKETPLACE_ID).await.unwrap();
    let task = wait_for_terminal(&runtime.machine, created.task_id).await;

    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.publication_retries, 1);
    assert_eq!(runtime.marketplace.requests().len(), 2);
    assert_eq!(runtime.webhooks.deliveries().len(), 1);

    runtime.pool.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_worker_pool_runs_tasks_independently() {
    let runtime = runtime();
    runtime
        .marketplace
        .push_failure("invalid_category", "Category MLM1051 is not valid for this item");

    let first = runtime.machine.create(PRODUCT_ID, MARKETPLACE_ID).await.unwrap();
    let second = runtime.machine.create(124, 457).await.unwrap();

    let first = wait_for_terminal(&runtime.machine, first.task_id).await;
    let second = wait_for_terminal(&runtime.machine, second.task_id).await;

    // exactly one of the two hit the scripted rejection
    let mut statuses = vec![first.status, second.status];
    statuses.sort();
    assert_eq!(statuses, vec![TaskStatus::Completed, TaskStatus::Failed]);
    assert_eq!(runtime.marketplace.requests().len(), 2);

    runtime.pool.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_resume_after_restart() {
    let runtime = runtime();
    let created = runtime.machine.create(PRODUCT_ID, MARKETPLACE_ID).await.unwrap();
    let task = wait_for_terminal(&runtime.machine, created.task_id).await;
    assert_eq!(task.status, TaskStatus::Completed);

    // resuming a settled task is a no-op
    let results = runtime.machine.resume([created.task_id]).await;
    assert_eq!(results.len(), 1);
    assert!(results[0].1.is_ok());
    assert_eq!(runtime.marketplace.requests().len(), 1);

    runtime.pool.shutdown().await;
}
