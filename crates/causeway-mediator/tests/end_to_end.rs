//! Full-pipeline test: a command through every stock behavior, the
//! event-sourced repository, the outbox dispatcher and a saga, all on the
//! in-memory stores.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use causeway_core::aggregate::Aggregate;
use causeway_core::clock::Clock;
use causeway_core::error::CoreError;
use causeway_core::event::DomainEvent;
use causeway_core::store::EventStore;
use causeway_core::uow::MemoryUnitOfWorkFactory;
use causeway_event_store::memory::InMemoryEventStore;
use causeway_event_store::repository::EventSourcedRepository;
use causeway_outbox::dispatcher::{DispatcherConfig, OutboxDispatcher};
use causeway_outbox::inbox::{InMemoryInboxStore, InboxStore};
use causeway_outbox::publisher::PublisherRegistry;
use causeway_outbox::store::{InMemoryOutboxStore, OutboxStore};
use causeway_saga::coordinator::SagaCoordinator;
use causeway_saga::registry::SagaRegistry;
use causeway_saga::state::{HandlesMessage, Saga, SagaState, SagaStep};
use causeway_saga::store::{InMemorySagaStore, SagaStore};
use causeway_test_support::{FixedClock, RecordingPublisher};

use causeway_mediator::behaviors::{
    AuditBehavior, AuditEntry, AuditOutcome, AuditSink, AuthorizationBehavior, Authorizer,
    LoggingBehavior, SagaTriggerBehavior, TelemetryBehavior, TransactionBehavior,
    ValidationBehavior, ValidatorRegistry,
};
use causeway_mediator::handler::{HandlerContext, RequestHandler};
use causeway_mediator::mediator::{Mediator, MediatorBuilder};
use causeway_mediator::request::{AuthorizationClaim, Request, RequestKind};

// --- domain under test ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum WidgetEvent {
    Created { name: String },
}

impl DomainEvent for WidgetEvent {
    fn event_type(&self) -> &'static str {
        "widget.created"
    }

    fn to_payload(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("WidgetEvent serialization is infallible")
    }

    fn from_payload(_event_type: &str, payload: &serde_json::Value) -> Result<Self, CoreError> {
        serde_json::from_value(payload.clone())
            .map_err(|e| CoreError::Serialization(e.to_string()))
    }

    fn destination(&self) -> Option<&str> {
        Some("widgets")
    }
}

#[derive(Debug)]
struct Widget {
    id: Uuid,
    version: i64,
    name: String,
    pending: Vec<WidgetEvent>,
}

impl Widget {
    fn create(&mut self, name: &str) {
        self.record(WidgetEvent::Created {
            name: name.to_string(),
        });
    }
}

impl Aggregate for Widget {
    type Event = WidgetEvent;

    fn new(id: Uuid) -> Self {
        Self {
            id,
            version: 0,
            name: String::new(),
            pending: Vec::new(),
        }
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn set_version(&mut self, version: i64) {
        self.version = version;
    }

    fn apply(&mut self, event: &Self::Event) {
        let WidgetEvent::Created { name } = event;
        self.name.clone_from(name);
    }

    fn uncommitted_events(&self) -> &[Self::Event] {
        &self.pending
    }

    fn uncommitted_events_mut(&mut self) -> &mut Vec<Self::Event> {
        &mut self.pending
    }
}

// --- requests ---

struct CreateWidget {
    widget_id: Uuid,
    name: String,
}

impl Request for CreateWidget {
    type Response = ();

    fn kind() -> RequestKind {
        RequestKind::Command
    }

    fn name() -> &'static str {
        "CreateWidget"
    }

    fn authorization(&self) -> Option<AuthorizationClaim> {
        Some(AuthorizationClaim {
            subject: "operator".to_string(),
            action: "create".to_string(),
            resource: "widget".to_string(),
        })
    }

    fn audit_payload(&self) -> serde_json::Value {
        serde_json::json!({ "widget_id": self.widget_id, "name": self.name })
    }
}

struct CreateWidgetHandler {
    repo: Arc<EventSourcedRepository<Widget>>,
}

#[async_trait]
impl RequestHandler<CreateWidget> for CreateWidgetHandler {
    async fn handle(&self, request: &CreateWidget, ctx: &HandlerContext) -> Result<(), CoreError> {
        let mut widget = self.repo.get(request.widget_id).await?;
        if widget.version() > 0 {
            return Err(CoreError::Validation(vec![format!(
                "widget {} already exists",
                request.widget_id
            )]));
        }
        widget.create(&request.name);
        self.repo
            .save(ctx.unit_of_work().map(|uow| uow.as_ref()), &mut widget)
            .await
    }
}

// --- provisioning saga, started by the command and finished by an inbound
// --- integration message

struct WidgetProvisioned {
    widget_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProvisioningState {
    correlation_id: String,
    completed: bool,
    updated_at: DateTime<Utc>,
}

impl SagaState for ProvisioningState {
    fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    fn is_completed(&self) -> bool {
        self.completed
    }

    fn set_completed(&mut self) {
        self.completed = true;
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

struct Provisioning;

impl Saga for Provisioning {
    type State = ProvisioningState;

    fn name(&self) -> &'static str {
        "widget-provisioning"
    }

    fn initial_state(&self, correlation_id: String, now: DateTime<Utc>) -> Self::State {
        ProvisioningState {
            correlation_id,
            completed: false,
            updated_at: now,
        }
    }
}

#[async_trait]
impl HandlesMessage<CreateWidget> for Provisioning {
    async fn handle(
        &self,
        _state: &mut Self::State,
        _message: &CreateWidget,
    ) -> Result<SagaStep, CoreError> {
        Ok(SagaStep::Continue)
    }
}

#[async_trait]
impl HandlesMessage<WidgetProvisioned> for Provisioning {
    async fn handle(
        &self,
        _state: &mut Self::State,
        _message: &WidgetProvisioned,
    ) -> Result<SagaStep, CoreError> {
        Ok(SagaStep::Completed)
    }
}

// --- pipeline doubles ---

struct AllowAll;

#[async_trait]
impl Authorizer for AllowAll {
    async fn authorize(&self, _claim: &AuthorizationClaim) -> Result<bool, CoreError> {
        Ok(true)
    }
}

#[derive(Default)]
struct RecordingSink {
    entries: Mutex<Vec<AuditEntry>>,
}

#[async_trait]
impl AuditSink for RecordingSink {
    async fn record(&self, entry: AuditEntry) -> Result<(), CoreError> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }
}

// --- wiring ---

struct Harness {
    mediator: Mediator,
    coordinator: Arc<SagaCoordinator>,
    events: Arc<InMemoryEventStore>,
    outbox: Arc<InMemoryOutboxStore>,
    inbox: Arc<InMemoryInboxStore>,
    saga_store: Arc<InMemorySagaStore<ProvisioningState>>,
    audit: Arc<RecordingSink>,
    publisher: Arc<RecordingPublisher>,
    dispatcher: OutboxDispatcher,
}

fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock(
        Utc.with_ymd_and_hms(2026, 2, 1, 12, 0, 0).unwrap(),
    ))
}

fn harness() -> Harness {
    let events = Arc::new(InMemoryEventStore::new());
    let outbox = Arc::new(InMemoryOutboxStore::new());
    let inbox = Arc::new(InMemoryInboxStore::new());
    let saga_store = Arc::new(InMemorySagaStore::new());
    let audit = Arc::new(RecordingSink::default());
    let clock = clock();

    let repo = Arc::new(
        EventSourcedRepository::<Widget>::new(
            Arc::clone(&events) as Arc<dyn EventStore>,
            Arc::clone(&clock) as Arc<dyn Clock>,
        )
        .with_outbox(Arc::clone(&outbox) as Arc<dyn OutboxStore>),
    );

    let mut saga_registry = SagaRegistry::new();
    saga_registry.add_saga(
        Provisioning,
        Arc::clone(&saga_store) as Arc<dyn SagaStore<ProvisioningState>>,
        |cfg| {
            cfg.starts_with::<CreateWidget>(|m| Some(m.widget_id.to_string()));
            cfg.handles::<WidgetProvisioned>(|m| Some(m.widget_id.to_string()));
        },
    );
    let coordinator = Arc::new(SagaCoordinator::new(
        saga_registry,
        Arc::clone(&clock) as Arc<dyn Clock>,
    ));

    let mut validators = ValidatorRegistry::new();
    validators.add::<CreateWidget>(|request: &CreateWidget| {
        if request.name.is_empty() {
            Err(vec!["name must not be empty".to_string()])
        } else {
            Ok(())
        }
    });

    let mediator = MediatorBuilder::new()
        .register::<CreateWidget>(Arc::new(CreateWidgetHandler {
            repo: Arc::clone(&repo),
        }))
        .unwrap()
        .with_behavior(Arc::new(LoggingBehavior))
        .with_behavior(Arc::new(TelemetryBehavior))
        .with_behavior(Arc::new(ValidationBehavior::new(Arc::new(validators))))
        .with_behavior(Arc::new(AuthorizationBehavior::new(Arc::new(AllowAll))))
        .with_behavior(Arc::new(AuditBehavior::new(
            Arc::clone(&audit) as Arc<dyn AuditSink>,
            Arc::clone(&clock) as Arc<dyn Clock>,
        )))
        .with_behavior(Arc::new(TransactionBehavior::new(Arc::new(
            MemoryUnitOfWorkFactory,
        ))))
        .with_behavior(Arc::new(SagaTriggerBehavior::new(Arc::clone(&coordinator))))
        .build();

    let publisher = Arc::new(RecordingPublisher::new("widgets"));
    let mut publishers = PublisherRegistry::new();
    publishers.register(Arc::clone(&publisher) as Arc<dyn causeway_outbox::publisher::Publisher>);
    let dispatcher = OutboxDispatcher::new(
        Arc::clone(&outbox) as Arc<dyn OutboxStore>,
        publishers,
        DispatcherConfig::default(),
        Arc::clone(&clock) as Arc<dyn Clock>,
    );

    Harness {
        mediator,
        coordinator,
        events,
        outbox,
        inbox,
        saga_store,
        audit,
        publisher,
        dispatcher,
    }
}

// --- scenarios ---

#[tokio::test]
async fn test_command_flows_through_store_outbox_dispatcher_and_saga() {
    let h = harness();
    let widget_id = Uuid::new_v4();

    h.mediator
        .send(CreateWidget {
            widget_id,
            name: "gadget".to_string(),
        })
        .await
        .unwrap();

    // The committed unit of work made the event and the outbox row visible.
    let stream = h.events.read_stream(widget_id, 0).await.unwrap();
    assert_eq!(stream.len(), 1);
    assert_eq!(stream[0].version, 1);
    assert_eq!(h.outbox.pending_count().await.unwrap(), 1);

    // The saga started on the command.
    let state = h
        .saga_store
        .find(&widget_id.to_string())
        .await
        .unwrap()
        .unwrap();
    assert!(!state.is_completed());

    // One dispatcher tick delivers the integration message.
    let summary = h.dispatcher.tick().await.unwrap();
    assert_eq!(summary.published, 1);
    assert_eq!(h.outbox.pending_count().await.unwrap(), 0);
    let published = h.publisher.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].message.destination.as_deref(), Some("widgets"));

    // The audit trail recorded the success.
    let entries = h.audit.entries.lock().unwrap().clone();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].request_name, "CreateWidget");
    assert_eq!(entries[0].outcome, AuditOutcome::Success);
}

#[tokio::test]
async fn test_inbound_message_completes_the_saga_exactly_once() {
    let h = harness();
    let widget_id = Uuid::new_v4();
    h.mediator
        .send(CreateWidget {
            widget_id,
            name: "gadget".to_string(),
        })
        .await
        .unwrap();

    // First delivery of the inbound integration message passes the inbox
    // gate and completes the saga.
    let message_id = format!("provisioned-{widget_id}");
    let fresh = h
        .inbox
        .try_ensure_processed("provisioning", &message_id, None, Utc::now())
        .await
        .unwrap();
    assert!(fresh);
    h.coordinator
        .publish(&WidgetProvisioned { widget_id })
        .await
        .unwrap();
    assert!(h.saga_store.is_empty());

    // A redelivery is filtered by the inbox and never reaches the
    // coordinator, so the finished saga is not resurrected.
    let duplicate = h
        .inbox
        .try_ensure_processed("provisioning", &message_id, None, Utc::now())
        .await
        .unwrap();
    assert!(!duplicate);
    assert!(h.saga_store.is_empty());
}

#[tokio::test]
async fn test_validation_failure_leaves_no_trace() {
    let h = harness();
    let widget_id = Uuid::new_v4();

    let err = h
        .mediator
        .send(CreateWidget {
            widget_id,
            name: String::new(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::Validation(_)));
    assert!(h.events.read_stream(widget_id, 0).await.unwrap().is_empty());
    assert_eq!(h.outbox.pending_count().await.unwrap(), 0);
    assert!(h.saga_store.is_empty());
}

#[tokio::test]
async fn test_failed_command_rolls_back_event_and_outbox_together() {
    let h = harness();
    let widget_id = Uuid::new_v4();
    h.mediator
        .send(CreateWidget {
            widget_id,
            name: "gadget".to_string(),
        })
        .await
        .unwrap();

    // Creating the same widget again fails in the handler; the transaction
    // behavior rolls the scope back and nothing new becomes visible.
    let err = h
        .mediator
        .send(CreateWidget {
            widget_id,
            name: "again".to_string(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::Validation(_)));
    assert_eq!(h.events.read_stream(widget_id, 0).await.unwrap().len(), 1);
    assert_eq!(h.outbox.pending_count().await.unwrap(), 1);

    let entries = h.audit.entries.lock().unwrap().clone();
    assert_eq!(entries.len(), 2);
    assert!(matches!(entries[1].outcome, AuditOutcome::Failure(_)));
}
