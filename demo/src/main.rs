use anyhow::Context;
use async_trait::async_trait;
use eventbus::broker::InMemoryBroker;
use eventbus::integration_event::IntegrationEvent;
use eventbus::{EventBus, EventBusConfig, IntegrationEventHandler, ServiceBusEventBus};
use eventbus_di::HandlerContainer;
use eventbus_macros::integration_event;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[integration_event]
struct ItemCreatedEvent {
    sku: String,
    name: String,
    quantity: u32,
}

#[integration_event]
struct ItemDeletedEvent {
    sku: String,
}

type Inventory = Arc<Mutex<HashMap<String, (String, u32)>>>;

struct ItemCreatedHandler {
    inventory: Inventory,
}

#[async_trait]
impl IntegrationEventHandler<ItemCreatedEvent> for ItemCreatedHandler {
    async fn handle(&self, event: &ItemCreatedEvent) -> anyhow::Result<()> {
        let mut inventory = self
            .inventory
            .lock()
            .map_err(|_| anyhow::anyhow!("inventory lock poisoned"))?;
        inventory.insert(event.sku.clone(), (event.name.clone(), event.quantity));
        info!(sku = %event.sku, event_id = event.id(), "Item created");
        Ok(())
    }
}

struct ItemDeletedHandler {
    inventory: Inventory,
}

#[async_trait]
impl IntegrationEventHandler<ItemDeletedEvent> for ItemDeletedHandler {
    async fn handle(&self, event: &ItemDeletedEvent) -> anyhow::Result<()> {
        let removed = self
            .inventory
            .lock()
            .map_err(|_| anyhow::anyhow!("inventory lock poisoned"))?
            .remove(&event.sku);
        anyhow::ensure!(removed.is_some(), "unknown sku: {}", event.sku);
        info!(sku = %event.sku, event_id = event.id(), "Item deleted");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,eventbus=debug")),
        )
        .init();

    // 可选：第一个参数为 TOML 配置文件路径
    let file = std::env::args().nth(1).map(PathBuf::from);
    let mut config = EventBusConfig::load(file.as_deref()).context("load event bus config")?;
    if !config.is_subscriber() {
        config.subscription_name = Some("demo".to_string());
    }

    let broker = InMemoryBroker::new();
    let inventory: Inventory = Arc::default();

    let container = HandlerContainer::new();
    {
        let inventory = inventory.clone();
        container.add_scoped(move || ItemCreatedHandler {
            inventory: inventory.clone(),
        })?;
    }
    container.add_singleton(ItemDeletedHandler {
        inventory: inventory.clone(),
    })?;

    let bus = ServiceBusEventBus::builder()
        .config(config.clone())
        .client_factory(broker.client_factory())
        .handler_locator(Arc::new(container))
        .connect()
        .await?;

    bus.subscribe::<ItemCreatedEvent, ItemCreatedHandler>().await?;
    bus.subscribe::<ItemDeletedEvent, ItemDeletedHandler>().await?;

    let created = ItemCreatedEvent::new("SKU-001".into(), "Keyboard".into(), 5);
    // 与创建事件共用同一事件标识
    let deleted = ItemDeletedEvent {
        id: created.id.clone(),
        created_at: eventbus::integration_event::now(),
        sku: created.sku.clone(),
    };

    bus.publish(&created).await?;
    bus.publish(&deleted).await?;

    let subscription = config.subscription().unwrap_or("demo").to_string();
    tokio::time::timeout(Duration::from_secs(5), async {
        while broker.completed(&config.topic, &subscription).len() < 2 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .context("events were not handled in time")?;

    let completed = broker.completed(&config.topic, &subscription);
    info!(
        completed = completed.len(),
        labels = ?completed.iter().map(|m| m.label.as_str()).collect::<Vec<_>>(),
        remaining = inventory.lock().map(|i| i.len()).unwrap_or_default(),
        "Demo finished"
    );

    bus.close().await?;
    Ok(())
}
