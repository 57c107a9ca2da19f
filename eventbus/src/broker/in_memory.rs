//! 内存版消息中间件（InMemoryBroker）
//!
//! 进程内模拟 Topic/Subscription 语义，满足 `broker` 模块的全部协议：
//! - Topic 按需创建；Subscription 创建时自带 `$Default` 全量规则；
//! - 发送时按规则扇出到各 Subscription 的队列；
//! - 注册回调后启动投递任务，按 `max_concurrent_calls` 限流；
//! - 回调结束仍未确认的消息重新入队，超过 `max_delivery_count` 后转入死信。
//!
//! 另外提供只读的观测接口（已发送/已确认/死信/规则），便于测试断言。
//!
//! 注意：消息不落盘，进程退出即丢失。
use super::{
    ClientFactory, FaultAction, LockToken, MessageHandler, MessageHandlerOptions,
    OutboundMessage, ReceiveFault, ReceivedMessage, RuleDescription, RuleFilter,
    SubscriptionClient, TopicClient,
};
use crate::error::BrokerError;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// 内存 Broker 配置
#[derive(Clone, Copy, Debug)]
pub struct InMemoryBrokerOptions {
    /// 单条消息的最大投递次数，超过后转入死信
    pub max_delivery_count: u32,
    /// 添加/删除规则前的模拟网络延迟
    pub rule_latency: Duration,
}

impl Default for InMemoryBrokerOptions {
    fn default() -> Self {
        Self {
            max_delivery_count: 10,
            rule_latency: Duration::ZERO,
        }
    }
}

/// 内存 Broker，可克隆共享
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    inner: Arc<BrokerState>,
}

#[derive(Default)]
struct BrokerState {
    options: InMemoryBrokerOptions,
    topics: Mutex<HashMap<String, Arc<TopicState>>>,
    topic_clients_created: AtomicUsize,
    subscription_clients_created: AtomicUsize,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: InMemoryBrokerOptions) -> Self {
        Self {
            inner: Arc::new(BrokerState {
                options,
                ..Default::default()
            }),
        }
    }

    /// 作为 `ClientFactory` 使用
    pub fn client_factory(&self) -> Arc<dyn ClientFactory> {
        Arc::new(self.clone())
    }

    /// 累计创建的 Topic 客户端数量
    pub fn topic_clients_created(&self) -> usize {
        self.inner.topic_clients_created.load(Ordering::SeqCst)
    }

    pub fn subscription_clients_created(&self) -> usize {
        self.inner.subscription_clients_created.load(Ordering::SeqCst)
    }

    /// 模拟连接中断：关闭该 Topic 上已创建的全部发送端客户端
    pub fn disconnect_topic_clients(&self, topic: &str) {
        if let Some(t) = self.find_topic(topic) {
            for flag in t.client_flags.lock().iter() {
                flag.store(true, Ordering::SeqCst);
            }
        }
    }

    /// 让该 Topic 的下一次发送失败
    pub fn fail_next_send(&self, topic: &str, reason: impl Into<String>) {
        let t = self.inner.topic(topic);
        *t.next_send_failure.lock() = Some(reason.into());
    }

    /// 让该 Subscription 的下一次回调注册失败
    pub fn fail_next_handler_registration(
        &self,
        topic: &str,
        subscription: &str,
        reason: impl Into<String>,
    ) {
        let s = self.inner.topic(topic).subscription(subscription);
        *s.next_registration_failure.lock() = Some(reason.into());
    }

    /// 已发送到 Topic 的消息（按发送顺序）
    pub fn sent(&self, topic: &str) -> Vec<OutboundMessage> {
        self.find_topic(topic)
            .map(|t| t.sent.lock().clone())
            .unwrap_or_default()
    }

    /// 已确认的消息
    pub fn completed(&self, topic: &str, subscription: &str) -> Vec<OutboundMessage> {
        self.find_subscription(topic, subscription)
            .map(|s| s.completed.lock().clone())
            .unwrap_or_default()
    }

    /// 已转入死信的消息
    pub fn dead_lettered(&self, topic: &str, subscription: &str) -> Vec<OutboundMessage> {
        self.find_subscription(topic, subscription)
            .map(|s| s.dead_letters.lock().clone())
            .unwrap_or_default()
    }

    /// Subscription 当前的过滤规则（按规则名排序）
    pub fn rules(&self, topic: &str, subscription: &str) -> Vec<RuleDescription> {
        self.find_subscription(topic, subscription)
            .map(|s| {
                s.rules
                    .lock()
                    .iter()
                    .map(|(name, filter)| RuleDescription {
                        name: name.clone(),
                        filter: filter.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// 调用 `register_message_handler` 的次数（含被拒绝的调用）
    pub fn handler_registrations(&self, topic: &str, subscription: &str) -> usize {
        self.find_subscription(topic, subscription)
            .map(|s| s.handler_registrations.load(Ordering::SeqCst))
            .unwrap_or_default()
    }

    fn find_topic(&self, topic: &str) -> Option<Arc<TopicState>> {
        self.inner.topics.lock().get(topic).cloned()
    }

    fn find_subscription(&self, topic: &str, subscription: &str) -> Option<Arc<SubscriptionState>> {
        self.find_topic(topic)
            .and_then(|t| t.subscriptions.read().get(subscription).cloned())
    }
}

impl BrokerState {
    fn topic(&self, name: &str) -> Arc<TopicState> {
        self.topics
            .lock()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(TopicState::new(name)))
            .clone()
    }
}

impl ClientFactory for InMemoryBroker {
    fn create_topic_client(
        &self,
        _connection: &str,
        topic: &str,
    ) -> Result<Box<dyn TopicClient>, BrokerError> {
        let state = self.inner.topic(topic);
        let closed = Arc::new(AtomicBool::new(false));
        {
            let mut flags = state.client_flags.lock();
            flags.retain(|f| !f.load(Ordering::SeqCst));
            flags.push(closed.clone());
        }
        self.inner
            .topic_clients_created
            .fetch_add(1, Ordering::SeqCst);

        debug!(topic, "Topic client created");

        Ok(Box::new(InMemoryTopicClient {
            topic: state,
            closed,
        }))
    }

    fn create_subscription_client(
        &self,
        _connection: &str,
        topic: &str,
        subscription: &str,
    ) -> Result<Arc<dyn SubscriptionClient>, BrokerError> {
        let state = self.inner.topic(topic).subscription(subscription);
        self.inner
            .subscription_clients_created
            .fetch_add(1, Ordering::SeqCst);

        debug!(path = %state.path, "Subscription client created");

        Ok(Arc::new(InMemorySubscriptionClient {
            state,
            max_delivery_count: self.inner.options.max_delivery_count,
            rule_latency: self.inner.options.rule_latency,
            handler_registered: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        }))
    }
}

// ============================================================================
// Topic
// ============================================================================

struct TopicState {
    name: String,
    subscriptions: RwLock<HashMap<String, Arc<SubscriptionState>>>,
    sent: Mutex<Vec<OutboundMessage>>,
    client_flags: Mutex<Vec<Arc<AtomicBool>>>,
    next_send_failure: Mutex<Option<String>>,
}

impl TopicState {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            subscriptions: RwLock::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            client_flags: Mutex::new(Vec::new()),
            next_send_failure: Mutex::new(None),
        }
    }

    fn subscription(&self, name: &str) -> Arc<SubscriptionState> {
        self.subscriptions
            .write()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(SubscriptionState::new(&self.name, name)))
            .clone()
    }

    fn fan_out(&self, message: &OutboundMessage) {
        for sub in self.subscriptions.read().values() {
            if sub.accepts(&message.label) {
                sub.enqueue(Delivery {
                    message: message.clone(),
                    delivery_count: 1,
                });
            } else {
                trace!(path = %sub.path, label = %message.label, "Message filtered out");
            }
        }
    }
}

struct InMemoryTopicClient {
    topic: Arc<TopicState>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl TopicClient for InMemoryTopicClient {
    fn path(&self) -> &str {
        &self.topic.name
    }

    async fn send(&self, message: OutboundMessage) -> Result<(), BrokerError> {
        if self.is_closed() {
            return Err(BrokerError::Closed {
                entity: self.topic.name.clone(),
            });
        }
        if let Some(reason) = self.topic.next_send_failure.lock().take() {
            return Err(BrokerError::transport(reason));
        }

        self.topic.sent.lock().push(message.clone());
        self.topic.fan_out(&message);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Subscription
// ============================================================================

#[derive(Clone, Debug)]
struct Delivery {
    message: OutboundMessage,
    delivery_count: u32,
}

struct SubscriptionState {
    path: String,
    rules: Mutex<BTreeMap<String, RuleFilter>>,
    tx: mpsc::UnboundedSender<Delivery>,
    // 投递任务运行期间被取走，任务结束时归还
    rx: Mutex<Option<mpsc::UnboundedReceiver<Delivery>>>,
    in_flight: Mutex<HashMap<LockToken, Delivery>>,
    completed: Mutex<Vec<OutboundMessage>>,
    dead_letters: Mutex<Vec<OutboundMessage>>,
    handler_registrations: AtomicUsize,
    next_registration_failure: Mutex<Option<String>>,
}

impl SubscriptionState {
    fn new(topic: &str, name: &str) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let default_rule = RuleDescription::default_rule();
        let mut rules = BTreeMap::new();
        rules.insert(default_rule.name, default_rule.filter);

        Self {
            path: format!("{topic}/subscriptions/{name}"),
            rules: Mutex::new(rules),
            tx,
            rx: Mutex::new(Some(rx)),
            in_flight: Mutex::new(HashMap::new()),
            completed: Mutex::new(Vec::new()),
            dead_letters: Mutex::new(Vec::new()),
            handler_registrations: AtomicUsize::new(0),
            next_registration_failure: Mutex::new(None),
        }
    }

    fn accepts(&self, label: &str) -> bool {
        self.rules.lock().values().any(|f| f.matches(label))
    }

    fn enqueue(&self, delivery: Delivery) {
        // 接收端始终由本结构持有或由投递任务借出，发送不会失败
        let _ = self.tx.send(delivery);
    }

    fn complete(&self, lock_token: &LockToken) -> Result<(), BrokerError> {
        let delivery = self
            .in_flight
            .lock()
            .remove(lock_token)
            .ok_or_else(|| BrokerError::LockLost {
                lock_token: lock_token.to_string(),
            })?;
        self.completed.lock().push(delivery.message);
        Ok(())
    }

    /// 未确认的消息：重新入队或转入死信
    fn abandon(&self, delivery: Delivery, max_delivery_count: u32) {
        if delivery.delivery_count >= max_delivery_count {
            debug!(
                path = %self.path,
                message_id = %delivery.message.message_id,
                delivery_count = delivery.delivery_count,
                "Message dead-lettered"
            );
            self.dead_letters.lock().push(delivery.message);
        } else {
            self.enqueue(Delivery {
                delivery_count: delivery.delivery_count + 1,
                ..delivery
            });
        }
    }

    async fn deliver(
        self: Arc<Self>,
        handler: Arc<dyn MessageHandler>,
        delivery: Delivery,
        options: MessageHandlerOptions,
        max_delivery_count: u32,
    ) {
        let lock_token = LockToken::new();
        let message_id = delivery.message.message_id.clone();
        let received = ReceivedMessage::new(
            message_id.clone(),
            delivery.message.label.clone(),
            delivery.message.body.clone(),
            lock_token.clone(),
            delivery.delivery_count,
        );
        self.in_flight.lock().insert(lock_token.clone(), delivery);

        let succeeded = match handler.on_message(received).await {
            Ok(()) => true,
            Err(error) => {
                handler
                    .on_error(ReceiveFault {
                        error,
                        action: FaultAction::UserCallback,
                        entity_path: self.path.clone(),
                        message_id: Some(message_id),
                    })
                    .await;
                false
            }
        };

        // 回调内已确认则不再处理
        let Some(pending) = self.in_flight.lock().remove(&lock_token) else {
            return;
        };

        if succeeded && options.auto_complete {
            self.completed.lock().push(pending.message);
        } else {
            self.abandon(pending, max_delivery_count);
        }
    }
}

struct InMemorySubscriptionClient {
    state: Arc<SubscriptionState>,
    max_delivery_count: u32,
    rule_latency: Duration,
    handler_registered: AtomicBool,
    cancel: CancellationToken,
}

impl InMemorySubscriptionClient {
    fn ensure_open(&self) -> Result<(), BrokerError> {
        if self.is_closed() {
            return Err(BrokerError::Closed {
                entity: self.state.path.clone(),
            });
        }
        Ok(())
    }

    async fn simulate_latency(&self) {
        if !self.rule_latency.is_zero() {
            tokio::time::sleep(self.rule_latency).await;
        }
    }
}

#[async_trait]
impl SubscriptionClient for InMemorySubscriptionClient {
    fn path(&self) -> &str {
        &self.state.path
    }

    async fn add_rule(&self, rule: RuleDescription) -> Result<(), BrokerError> {
        self.ensure_open()?;
        self.simulate_latency().await;
        let mut rules = self.state.rules.lock();
        if rules.contains_key(&rule.name) {
            return Err(BrokerError::AlreadyExists { entity: rule.name });
        }
        debug!(path = %self.state.path, rule = %rule.name, "Rule added");
        rules.insert(rule.name, rule.filter);
        Ok(())
    }

    async fn remove_rule(&self, name: &str) -> Result<(), BrokerError> {
        self.ensure_open()?;
        self.simulate_latency().await;
        match self.state.rules.lock().remove(name) {
            Some(_) => {
                debug!(path = %self.state.path, rule = name, "Rule removed");
                Ok(())
            }
            None => Err(BrokerError::NotFound {
                entity: name.to_string(),
            }),
        }
    }

    fn register_message_handler(
        &self,
        handler: Arc<dyn MessageHandler>,
        options: MessageHandlerOptions,
    ) -> Result<(), BrokerError> {
        self.state
            .handler_registrations
            .fetch_add(1, Ordering::SeqCst);
        self.ensure_open()?;

        if let Some(reason) = self.state.next_registration_failure.lock().take() {
            return Err(BrokerError::transport(reason));
        }
        // 失败路径均不占用注册名额
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| BrokerError::transport(e.to_string()))?;

        let already = || BrokerError::HandlerAlreadyRegistered {
            entity: self.state.path.clone(),
        };
        if self.handler_registered.swap(true, Ordering::SeqCst) {
            return Err(already());
        }
        let Some(rx) = self.state.rx.lock().take() else {
            // 同一 Subscription 已由另一客户端投递
            return Err(already());
        };

        runtime.spawn(pump(
            self.state.clone(),
            rx,
            handler,
            options,
            self.max_delivery_count,
            self.cancel.clone(),
        ));

        debug!(
            path = %self.state.path,
            max_concurrent_calls = options.max_concurrent_calls,
            auto_complete = options.auto_complete,
            "Message handler registered"
        );
        Ok(())
    }

    async fn complete(&self, lock_token: &LockToken) -> Result<(), BrokerError> {
        self.ensure_open()?;
        self.state.complete(lock_token)
    }

    fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.cancel.cancel();
        Ok(())
    }
}

async fn pump(
    state: Arc<SubscriptionState>,
    mut rx: mpsc::UnboundedReceiver<Delivery>,
    handler: Arc<dyn MessageHandler>,
    options: MessageHandlerOptions,
    max_delivery_count: u32,
    cancel: CancellationToken,
) {
    let permits = Arc::new(Semaphore::new(options.max_concurrent_calls.max(1)));

    loop {
        // 先取得并发许可再取消息，保证未处理的消息留在队列中
        let permit = tokio::select! {
            _ = cancel.cancelled() => break,
            permit = permits.clone().acquire_owned() => match permit {
                Ok(p) => p,
                Err(_) => break,
            },
        };
        let delivery = tokio::select! {
            _ = cancel.cancelled() => break,
            next = rx.recv() => match next {
                Some(d) => d,
                None => break,
            },
        };

        let state = state.clone();
        let handler = handler.clone();
        tokio::spawn(async move {
            state
                .deliver(handler, delivery, options, max_delivery_count)
                .await;
            drop(permit);
        });
    }

    trace!(path = %state.path, "Message pump stopped");
    *state.rx.lock() = Some(rx);
}
