//! 基于 Topic/Subscription 的事件总线（ServiceBusEventBus）
//!
//! - 发布：事件序列化为 JSON，以事件名为标签发送到 Topic；
//!   持有的 Topic 客户端已关闭时，在发布锁内重建（每次发布至多重建一次）；
//! - 订阅：首次订阅某事件名时在 Subscription 上添加同名过滤规则，
//!   订阅表由空变为非空时注册一次消息回调；
//! - 消费：按标签查找事件类型，解析到首个处理器时反序列化一次，依次调用各处理器，
//!   仅当事件名已订阅且全部处理成功时确认消息。
//!
//! 订阅与取消订阅在同一把异步锁内完成规则维护与订阅表变更，
//! 同一事件名的规则与订阅表始终一致。
//!
use super::{EventBus, HandlerId, HandlerLocator, IntegrationEventHandler};
use crate::broker::{
    ClientFactory, DEFAULT_RULE_NAME, FaultAction, MessageHandler, MessageHandlerOptions, OutboundMessage,
    ReceiveFault, ReceivedMessage, RuleDescription, SubscriptionClient, TopicClient,
};
use crate::config::EventBusConfig;
use crate::error::{BrokerError, EventBusError, EventBusResult};
use crate::integration_event::IntegrationEvent;
use crate::subscription::{DecodedEvent, EventDescriptor, Removal, Subscription, SubscriptionRegistry};
use arc_swap::ArcSwap;
use async_trait::async_trait;
use bon::bon;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

/// 订阅表与处理器定位器的组合：负责单条消息的分发
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<RwLock<SubscriptionRegistry>>,
    locator: Arc<dyn HandlerLocator>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<RwLock<SubscriptionRegistry>>,
        locator: Arc<dyn HandlerLocator>,
    ) -> Self {
        Self { registry, locator }
    }

    pub fn registry(&self) -> &Arc<RwLock<SubscriptionRegistry>> {
        &self.registry
    }

    /// 分发一条消息
    ///
    /// 返回 `Ok(false)` 表示事件名未订阅，未调用任何处理器；
    /// 返回 `Ok(true)` 表示全部可解析的处理器均已成功处理。
    pub async fn process_event(&self, event_name: &str, payload: &[u8]) -> EventBusResult<bool> {
        // 快照后立即释放读锁，处理器执行期间不持锁
        let (descriptor, subscriptions) = {
            let registry = self.registry.read();
            if !registry.has_subscriptions_for_event(event_name) {
                return Ok(false);
            }
            (
                registry.event_type_by_name(event_name)?.clone(),
                registry.handlers_for_event(event_name)?.to_vec(),
            )
        };

        let scope = self.locator.open_scope();
        // 首个处理器解析成功后才反序列化
        let mut event: Option<DecodedEvent> = None;

        for subscription in &subscriptions {
            let Some(instance) = scope.resolve(subscription.handler()).await else {
                debug!(
                    event = event_name,
                    handler = %subscription.handler(),
                    "Handler not resolvable in scope, skipped"
                );
                continue;
            };
            let decoded = match &event {
                Some(decoded) => decoded.clone(),
                None => {
                    let decoded = descriptor.decode(payload)?;
                    event = Some(decoded.clone());
                    decoded
                }
            };
            subscription.invoke(instance, decoded).await?;
        }

        Ok(true)
    }
}

/// 注册到 Subscription 客户端的消息回调
struct MessagePump {
    dispatcher: Dispatcher,
    client: Arc<dyn SubscriptionClient>,
}

#[async_trait]
impl MessageHandler for MessagePump {
    async fn on_message(&self, message: ReceivedMessage) -> EventBusResult<()> {
        let event_name = message.label();

        if self
            .dispatcher
            .process_event(event_name, message.body())
            .await?
        {
            match self.client.complete(message.lock_token()).await {
                Ok(()) => debug!(
                    event = event_name,
                    message_id = message.message_id(),
                    "Message processed and completed"
                ),
                Err(e) => {
                    self.on_error(ReceiveFault {
                        error: e.into(),
                        action: FaultAction::Complete,
                        entity_path: self.client.path().to_string(),
                        message_id: Some(message.message_id().to_string()),
                    })
                    .await
                }
            }
        } else {
            debug!(
                event = event_name,
                message_id = message.message_id(),
                "No subscription for event, message left unacknowledged"
            );
        }
        Ok(())
    }

    async fn on_error(&self, fault: ReceiveFault) {
        error!(
            error = %fault.error,
            action = %fault.action,
            entity_path = %fault.entity_path,
            message_id = ?fault.message_id,
            "Message handler encountered a fault"
        );
    }
}

/// 基于 Topic/Subscription 型 Broker 的事件总线
pub struct ServiceBusEventBus {
    config: EventBusConfig,
    client_factory: Arc<dyn ClientFactory>,
    topic_client: ArcSwap<Box<dyn TopicClient>>,
    subscription_client: Option<Arc<dyn SubscriptionClient>>,
    dispatcher: Dispatcher,
    // 仅在重建 Topic 客户端时串行化发布
    publish_lock: Mutex<()>,
    // 串行化订阅/取消订阅：规则维护、订阅表变更与回调激活
    subscription_lock: tokio::sync::Mutex<()>,
    // 回调注册成功后置位
    handler_activated: AtomicBool,
}

#[bon]
impl ServiceBusEventBus {
    /// 创建 Topic 客户端；配置了 Subscription 名称时同时创建 Subscription 客户端，
    /// 并在启用标签过滤时移除其默认全量规则
    #[builder(finish_fn = connect)]
    pub async fn new(
        config: EventBusConfig,
        client_factory: Arc<dyn ClientFactory>,
        handler_locator: Arc<dyn HandlerLocator>,
        #[builder(default)] registry: Arc<RwLock<SubscriptionRegistry>>,
    ) -> EventBusResult<Self> {
        config.validate()?;

        let topic_client =
            client_factory.create_topic_client(&config.connection_string, &config.topic)?;

        let subscription_client = match config.subscription() {
            Some(name) => {
                let client = client_factory.create_subscription_client(
                    &config.connection_string,
                    &config.topic,
                    name,
                )?;
                if config.label_filtering {
                    remove_rule_tolerant(client.as_ref(), DEFAULT_RULE_NAME).await?;
                }
                Some(client)
            }
            None => None,
        };

        info!(
            topic = %config.topic,
            subscription = ?config.subscription(),
            label_filtering = config.label_filtering,
            "Event bus connected"
        );

        Ok(Self {
            client_factory,
            topic_client: ArcSwap::from_pointee(topic_client),
            subscription_client,
            dispatcher: Dispatcher::new(registry, handler_locator),
            publish_lock: Mutex::new(()),
            subscription_lock: tokio::sync::Mutex::new(()),
            handler_activated: AtomicBool::new(false),
            config,
        })
    }
}

impl ServiceBusEventBus {
    pub fn config(&self) -> &EventBusConfig {
        &self.config
    }

    pub fn is_subscriber(&self) -> bool {
        self.subscription_client.is_some()
    }

    pub fn registry(&self) -> &Arc<RwLock<SubscriptionRegistry>> {
        self.dispatcher.registry()
    }

    /// 直接分发一条消息，语义同消息回调（但不确认消息）
    pub async fn process_event(&self, event_name: &str, payload: &[u8]) -> EventBusResult<bool> {
        self.dispatcher.process_event(event_name, payload).await
    }

    /// 关闭 Topic 与 Subscription 客户端；之后的发布会重建 Topic 客户端
    pub async fn close(&self) -> EventBusResult<()> {
        self.topic_client.load_full().close().await?;
        if let Some(client) = &self.subscription_client {
            client.close().await?;
        }
        info!(topic = %self.config.topic, "Event bus closed");
        Ok(())
    }

    fn subscriber(&self) -> EventBusResult<&Arc<dyn SubscriptionClient>> {
        self.subscription_client
            .as_ref()
            .ok_or_else(|| EventBusError::NotSubscriber {
                topic: self.config.topic.clone(),
            })
    }

    /// 取得可用的 Topic 客户端，已关闭时重建
    fn topic_client(&self) -> EventBusResult<Arc<Box<dyn TopicClient>>> {
        let current = self.topic_client.load_full();
        if !current.is_closed() {
            return Ok(current);
        }

        let _guard = self.publish_lock.lock();
        // 等锁期间可能已被其他发布者重建
        let current = self.topic_client.load_full();
        if !current.is_closed() {
            return Ok(current);
        }

        let fresh = Arc::new(
            self.client_factory
                .create_topic_client(&self.config.connection_string, &self.config.topic)?,
        );
        self.topic_client.store(fresh.clone());
        info!(topic = %self.config.topic, "Topic client was closed, re-created");

        Ok(fresh)
    }

    /// 注册消息回调；须在 `subscription_lock` 内调用。注册失败时保持未激活，下次订阅重试
    fn activate_message_handler(&self, client: &Arc<dyn SubscriptionClient>) -> EventBusResult<()> {
        if self.handler_activated.load(Ordering::SeqCst) {
            return Ok(());
        }

        let pump = Arc::new(MessagePump {
            dispatcher: self.dispatcher.clone(),
            client: client.clone(),
        });
        client.register_message_handler(
            pump,
            MessageHandlerOptions {
                max_concurrent_calls: 1,
                auto_complete: false,
            },
        )?;
        self.handler_activated.store(true, Ordering::SeqCst);

        info!(path = client.path(), "Message handler activated");
        Ok(())
    }
}

#[async_trait]
impl EventBus for ServiceBusEventBus {
    async fn publish<E>(&self, event: &E) -> EventBusResult<()>
    where
        E: IntegrationEvent,
    {
        let event_name = event.event_name();
        let message = OutboundMessage::new(event_name, serde_json::to_vec(event)?);
        let message_id = message.message_id.clone();

        self.topic_client()?.send(message).await?;

        debug!(
            event = event_name,
            event_id = event.id(),
            message_id = %message_id,
            "Integration event published"
        );
        Ok(())
    }

    async fn subscribe<E, H>(&self) -> EventBusResult<()>
    where
        E: IntegrationEvent,
        H: IntegrationEventHandler<E>,
    {
        let event_name = E::NAME;
        let handler = HandlerId::of::<H>();
        let client = self.subscriber()?;
        let _upkeep = self.subscription_lock.lock().await;

        let known = self
            .dispatcher
            .registry
            .read()
            .has_subscriptions_for_event(event_name);
        if !known && self.config.label_filtering {
            match client.add_rule(RuleDescription::for_label(event_name)).await {
                Ok(()) => {}
                Err(e) if e.is_already_exists() => {
                    warn!(event = event_name, path = client.path(), "Rule already exists");
                }
                Err(e) => return Err(e.into()),
            }
        }

        info!(event = event_name, handler = %handler, "Subscribing to integration event");

        let added = self
            .dispatcher
            .registry
            .write()
            .add_subscription(EventDescriptor::of::<E>(), Subscription::of::<E, H>())?;
        if !added {
            debug!(event = event_name, handler = %handler, "Handler already subscribed");
        }

        // 订阅表首次非空时激活；此前激活失败的在此重试
        self.activate_message_handler(client)
    }

    async fn unsubscribe<E, H>(&self) -> EventBusResult<()>
    where
        E: IntegrationEvent,
        H: IntegrationEventHandler<E>,
    {
        let event_name = E::NAME;
        let handler = HandlerId::of::<H>();
        let client = self.subscriber()?;
        let _upkeep = self.subscription_lock.lock().await;

        let removal = self
            .dispatcher
            .registry
            .write()
            .remove_subscription(event_name, &handler);

        match removal {
            Removal::NotSubscribed => {
                debug!(event = event_name, handler = %handler, "Handler was not subscribed");
            }
            Removal::HandlerRemoved => {
                info!(event = event_name, handler = %handler, "Unsubscribed from integration event");
            }
            Removal::EventRemoved => {
                info!(event = event_name, handler = %handler, "Unsubscribed from integration event");
                if self.config.label_filtering {
                    remove_rule_tolerant(client.as_ref(), event_name).await?;
                }
            }
        }
        Ok(())
    }
}

async fn remove_rule_tolerant(client: &dyn SubscriptionClient, name: &str) -> Result<(), BrokerError> {
    match client.remove_rule(name).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_not_found() => {
            warn!(rule = name, path = client.path(), "Rule not found");
            Ok(())
        }
        Err(e) => Err(e),
    }
}
