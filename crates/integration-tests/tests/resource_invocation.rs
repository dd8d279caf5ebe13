//! Resource invocation against SQLite storage
//!
//! The engine delivers bound queues to mock resources; failures end up in
//! the dead-letter queue.

use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tenantq_core::application::resource_engine::lock_key;
use tenantq_core::application::{
    CreateQueueRequest, IntervalInvoker, QueueService, ResourceHandlers,
    ResourceInvocationEngine, TickSummary,
};
use tenantq_core::domain::{Orid, Patch};
use tenantq_core::port::id_provider::mocks::SequentialIdProvider;
use tenantq_core::port::resource_invoker::mocks::{MockBehavior, MockResourceInvoker};
use tenantq_core::port::time_provider::mocks::MockTimeProvider;
use tenantq_core::port::{QueueLock, QueueRepository};
use tenantq_infra_sqlite::{create_pool, run_migrations, SqliteQueueLock, SqliteQueueRepository};

const FUNCTION: &str = "orid:1:orid:::1000:sf:resize-image";
const STATE_MACHINE: &str = "orid:1:orid:::1000:sm:checkout";

struct Harness {
    pool: SqlitePool,
    clock: Arc<MockTimeProvider>,
    repo: Arc<SqliteQueueRepository>,
    service: QueueService,
    function: Arc<MockResourceInvoker>,
    state_machine: Arc<MockResourceInvoker>,
}

impl Harness {
    async fn new() -> Self {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();

        let clock = Arc::new(MockTimeProvider::new(1_700_000_000_000));
        let repo = Arc::new(SqliteQueueRepository::with_pool(
            pool.clone(),
            Arc::new(SequentialIdProvider::new("msg")),
            clock.clone(),
        ));
        let service = QueueService::new(repo.clone(), "orid");

        Self {
            pool,
            clock,
            repo,
            service,
            function: Arc::new(MockResourceInvoker::new_success()),
            state_machine: Arc::new(MockResourceInvoker::new_success()),
        }
    }

    fn engine(&self) -> ResourceInvocationEngine {
        ResourceInvocationEngine::new(
            self.repo.clone(),
            ResourceHandlers {
                serverless_function: self.function.clone(),
                state_machine: self.state_machine.clone(),
            },
        )
    }

    /// A queue bound to `resource` with its own DLQ
    async fn bound_queue(&self, name: &str, resource: &str) -> (Orid, Orid) {
        let dlq = self
            .service
            .create_queue(plain(&format!("{name}-dlq")))
            .await
            .unwrap();
        let queue = self
            .service
            .create_queue(CreateQueueRequest {
                resource: Some(resource.to_string()),
                dlq: Some(dlq.to_string()),
                ..plain(name)
            })
            .await
            .unwrap();
        (queue, dlq)
    }

    async fn length(&self, queue: &Orid) -> u64 {
        self.service.get_queue_length(queue).await.unwrap().size
    }
}

fn plain(name: &str) -> CreateQueueRequest {
    CreateQueueRequest {
        name: name.to_string(),
        account_id: "1000".to_string(),
        ..CreateQueueRequest::default()
    }
}

#[tokio::test]
async fn test_delivery_removes_message() {
    let h = Harness::new().await;
    let (queue, dlq) = h.bound_queue("thumbnails", FUNCTION).await;
    h.service.create_message(&queue, r#"{"id":7}"#, None).await.unwrap();

    let summary = h.engine().invoke_queue_resources().await.unwrap();

    assert_eq!(summary.delivered, 1);
    assert_eq!(h.function.calls()[0].0.to_string(), FUNCTION);
    assert_eq!(h.function.calls()[0].1, r#"{"id":7}"#);
    assert_eq!(h.length(&queue).await, 0);
    assert_eq!(h.length(&dlq).await, 0);
}

#[tokio::test]
async fn test_failed_invocation_moves_message_to_dlq() {
    let h = Harness::new().await;
    h.state_machine.set_behavior(MockBehavior::Fail("503".to_string()));
    let (queue, dlq) = h.bound_queue("checkout", STATE_MACHINE).await;
    h.service.create_message(&queue, "order-42", None).await.unwrap();

    let summary = h.engine().invoke_queue_resources().await.unwrap();

    assert_eq!(summary.dead_lettered, 1);
    assert_eq!(h.state_machine.call_count(), 1);
    assert_eq!(h.length(&queue).await, 0);

    let dead = h.service.get_message(&dlq, None).await.unwrap().unwrap();
    assert_eq!(dead.body, "order-42");
    assert_eq!(dead.receive_count, 1);
}

#[tokio::test]
async fn test_one_message_per_queue_per_pass() {
    let h = Harness::new().await;
    let (queue, _dlq) = h.bound_queue("thumbnails", FUNCTION).await;
    for n in 0..3 {
        h.service
            .create_message(&queue, &format!("m{n}"), None)
            .await
            .unwrap();
    }
    let engine = h.engine();

    engine.invoke_queue_resources().await.unwrap();
    assert_eq!(h.length(&queue).await, 2);

    engine.invoke_queue_resources().await.unwrap();
    engine.invoke_queue_resources().await.unwrap();
    assert_eq!(h.length(&queue).await, 0);

    let bodies: Vec<String> = h.function.calls().into_iter().map(|(_, b)| b).collect();
    assert_eq!(bodies, vec!["m0", "m1", "m2"]);
}

#[tokio::test]
async fn test_unbound_and_unknown_queues_are_left_alone() {
    let h = Harness::new().await;
    let unbound = h.service.create_queue(plain("inbox")).await.unwrap();
    h.service.create_message(&unbound, "keep", None).await.unwrap();

    // Bindings to types nothing invokes can only be written at the storage level
    let (odd, dlq) = h.bound_queue("odd", FUNCTION).await;
    h.repo
        .update_queue(
            &odd,
            Patch::Set(dlq.clone()),
            Patch::Set(Orid::parse("orid:1:orid:::1000:db:table").unwrap()),
        )
        .await
        .unwrap();
    h.service.create_message(&odd, "keep", None).await.unwrap();

    let summary = h.engine().invoke_queue_resources().await.unwrap();

    assert_eq!(summary.delivered, 0);
    assert_eq!(summary.dead_lettered, 0);
    assert_eq!(summary.skipped, summary.queues);
    assert_eq!(h.function.call_count(), 0);
    assert_eq!(h.length(&unbound).await, 1);
    assert_eq!(h.length(&odd).await, 1);
    assert_eq!(h.length(&dlq).await, 0);
}

#[tokio::test]
async fn test_hidden_message_not_delivered_twice() {
    let h = Harness::new().await;
    let (queue, _dlq) = h.bound_queue("thumbnails", FUNCTION).await;
    h.service.create_message(&queue, "busy", None).await.unwrap();
    // Someone else holds it for the visibility timeout
    h.service.get_message(&queue, None).await.unwrap().unwrap();

    let summary = h.engine().invoke_queue_resources().await.unwrap();
    assert_eq!(summary.delivered, 0);
    assert_eq!(h.function.call_count(), 0);

    h.clock.advance_millis(30_000);
    let summary = h.engine().invoke_queue_resources().await.unwrap();
    assert_eq!(summary.delivered, 1);
    assert_eq!(h.length(&queue).await, 0);
}

#[tokio::test]
async fn test_queue_lock_held_elsewhere_skips_queue() {
    let h = Harness::new().await;
    let (queue, _dlq) = h.bound_queue("thumbnails", FUNCTION).await;
    h.service.create_message(&queue, "job", None).await.unwrap();

    let ttl = Duration::from_secs(30);
    let ours = Arc::new(SqliteQueueLock::new(h.pool.clone(), "owned-by-a", h.clock.clone()));
    let theirs = SqliteQueueLock::new(h.pool.clone(), "owned-by-b", h.clock.clone());
    let engine = h.engine().with_queue_lock(ours, ttl);

    let key = lock_key(&queue);
    assert!(theirs.try_acquire(&key, ttl).await.unwrap());

    engine.invoke_queue_resources().await.unwrap();
    assert_eq!(h.function.call_count(), 0);

    // Lease expires, our engine takes over
    h.clock.advance_millis(30_000);
    let summary = engine.invoke_queue_resources().await.unwrap();
    assert_eq!(summary.delivered, 1);
    assert_eq!(h.length(&queue).await, 0);
}

#[tokio::test]
async fn test_interval_invoker_drains_queue() {
    let h = Harness::new().await;
    let (queue, _dlq) = h.bound_queue("thumbnails", FUNCTION).await;
    for n in 0..3 {
        h.service
            .create_message(&queue, &format!("m{n}"), None)
            .await
            .unwrap();
    }

    let invoker = IntervalInvoker::new(Arc::new(h.engine()), Duration::from_millis(10));
    assert!(invoker.start());

    for _ in 0..200 {
        if h.length(&queue).await == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    invoker.stop_and_wait().await;

    assert_eq!(h.length(&queue).await, 0);
    assert_eq!(h.function.call_count(), 3);
    assert!(!invoker.is_running());
}

#[tokio::test]
async fn test_empty_storage_pass() {
    let h = Harness::new().await;
    let summary = h.engine().invoke_queue_resources().await.unwrap();
    assert_eq!(summary, TickSummary::default());
}
