#![allow(dead_code)]

use async_trait::async_trait;
use eventbus::broker::{InMemoryBroker, InMemoryBrokerOptions};
use eventbus::eventing::{HandlerId, HandlerInstance, HandlerLocator, HandlerScope};
use eventbus::{EventBusConfig, EventBusResult, IntegrationEventHandler, ServiceBusEventBus};
use eventbus_macros::integration_event;
use parking_lot::Mutex;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const TOPIC: &str = "inventory";
pub const SUBSCRIPTION: &str = "warehouse";

#[integration_event]
pub struct ItemCreatedEvent {
    pub sku: String,
    pub quantity: u32,
}

#[integration_event]
pub struct ItemDeletedEvent {
    pub sku: String,
}

/// 记录处理器调用顺序
#[derive(Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.calls.lock().push(entry.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

pub struct CreatedHandler {
    pub log: CallLog,
}

#[async_trait]
impl IntegrationEventHandler<ItemCreatedEvent> for CreatedHandler {
    async fn handle(&self, event: &ItemCreatedEvent) -> anyhow::Result<()> {
        self.log.push(format!("created:{}:{}", event.sku, event.id));
        Ok(())
    }
}

pub struct AuditHandler {
    pub log: CallLog,
}

#[async_trait]
impl IntegrationEventHandler<ItemCreatedEvent> for AuditHandler {
    async fn handle(&self, event: &ItemCreatedEvent) -> anyhow::Result<()> {
        self.log.push(format!("audit:{}", event.sku));
        Ok(())
    }
}

pub struct DeletedHandler {
    pub log: CallLog,
}

#[async_trait]
impl IntegrationEventHandler<ItemDeletedEvent> for DeletedHandler {
    async fn handle(&self, event: &ItemDeletedEvent) -> anyhow::Result<()> {
        self.log.push(format!("deleted:{}:{}", event.sku, event.id));
        Ok(())
    }
}

pub struct FailingHandler {
    pub attempts: Arc<AtomicUsize>,
}

#[async_trait]
impl IntegrationEventHandler<ItemCreatedEvent> for FailingHandler {
    async fn handle(&self, event: &ItemCreatedEvent) -> anyhow::Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("cannot stock {}", event.sku)
    }
}

/// 以预先放入的实例解析处理器，并统计打开的作用域数量
#[derive(Clone, Default)]
pub struct StaticLocator {
    instances: Arc<Mutex<HashMap<TypeId, HandlerInstance>>>,
    scopes_opened: Arc<AtomicUsize>,
}

impl StaticLocator {
    pub fn with<H: Send + Sync + 'static>(self, handler: H) -> Self {
        self.instances
            .lock()
            .insert(TypeId::of::<H>(), Arc::new(handler));
        self
    }

    pub fn scopes_opened(&self) -> usize {
        self.scopes_opened.load(Ordering::SeqCst)
    }
}

impl HandlerLocator for StaticLocator {
    fn open_scope(&self) -> Box<dyn HandlerScope> {
        self.scopes_opened.fetch_add(1, Ordering::SeqCst);
        Box::new(self.clone())
    }
}

#[async_trait]
impl HandlerScope for StaticLocator {
    async fn resolve(&self, handler: &HandlerId) -> Option<HandlerInstance> {
        self.instances.lock().get(&handler.type_id()).cloned()
    }
}

pub fn config(subscription: Option<&str>) -> EventBusConfig {
    EventBusConfig::builder()
        .connection_string("memory://test")
        .topic(TOPIC)
        .maybe_subscription_name(subscription)
        .build()
}

/// 单条消息最多投递两次，便于快速观察死信
pub fn broker() -> InMemoryBroker {
    InMemoryBroker::with_options(InMemoryBrokerOptions {
        max_delivery_count: 2,
        ..Default::default()
    })
}

/// 规则操作带有延迟的 Broker，用于观察并发的订阅与取消订阅
pub fn slow_rules_broker(latency: Duration) -> InMemoryBroker {
    InMemoryBroker::with_options(InMemoryBrokerOptions {
        max_delivery_count: 2,
        rule_latency: latency,
    })
}

pub async fn connect(
    broker: &InMemoryBroker,
    locator: StaticLocator,
    config: EventBusConfig,
) -> EventBusResult<ServiceBusEventBus> {
    ServiceBusEventBus::builder()
        .config(config)
        .client_factory(broker.client_factory())
        .handler_locator(Arc::new(locator))
        .connect()
        .await
}

/// 轮询直到条件成立或超时，返回最终结果
pub async fn eventually(mut cond: impl FnMut() -> bool) -> bool {
    tokio::time::timeout(Duration::from_secs(3), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .is_ok()
}
