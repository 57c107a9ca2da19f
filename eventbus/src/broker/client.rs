use super::{LockToken, OutboundMessage, ReceiveFault, ReceivedMessage, RuleDescription};
use crate::error::{BrokerError, EventBusResult};
use async_trait::async_trait;
use std::sync::Arc;

/// Topic 发送端客户端
#[async_trait]
pub trait TopicClient: Send + Sync {
    /// Topic 名称
    fn path(&self) -> &str;

    async fn send(&self, message: OutboundMessage) -> Result<(), BrokerError>;

    /// 客户端已关闭或正在关闭
    fn is_closed(&self) -> bool;

    async fn close(&self) -> Result<(), BrokerError>;
}

/// Subscription 接收端客户端
#[async_trait]
pub trait SubscriptionClient: Send + Sync {
    /// 形如 `topic/subscriptions/name`
    fn path(&self) -> &str;

    /// 添加过滤规则；同名规则已存在时返回 `AlreadyExists`
    async fn add_rule(&self, rule: RuleDescription) -> Result<(), BrokerError>;

    /// 删除过滤规则；规则不存在时返回 `NotFound`
    async fn remove_rule(&self, name: &str) -> Result<(), BrokerError>;

    /// 注册消息回调；每个客户端仅允许注册一次，重复注册返回 `HandlerAlreadyRegistered`
    fn register_message_handler(
        &self,
        handler: Arc<dyn MessageHandler>,
        options: MessageHandlerOptions,
    ) -> Result<(), BrokerError>;

    /// 确认消息已处理完成
    async fn complete(&self, lock_token: &LockToken) -> Result<(), BrokerError>;

    fn is_closed(&self) -> bool;

    async fn close(&self) -> Result<(), BrokerError>;
}

/// 按连接串创建客户端
pub trait ClientFactory: Send + Sync {
    fn create_topic_client(
        &self,
        connection: &str,
        topic: &str,
    ) -> Result<Box<dyn TopicClient>, BrokerError>;

    fn create_subscription_client(
        &self,
        connection: &str,
        topic: &str,
        subscription: &str,
    ) -> Result<Arc<dyn SubscriptionClient>, BrokerError>;
}

/// Broker 投递回调
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// 处理一条消息；返回错误时由 Broker 转交 `on_error`
    async fn on_message(&self, message: ReceivedMessage) -> EventBusResult<()>;

    /// 投递机制自身或回调中的异常
    async fn on_error(&self, fault: ReceiveFault);
}

/// 消息回调选项
#[derive(Clone, Copy, Debug)]
pub struct MessageHandlerOptions {
    /// 同时处理的消息数上限
    pub max_concurrent_calls: usize,
    /// 回调成功返回后是否自动确认
    pub auto_complete: bool,
}

impl Default for MessageHandlerOptions {
    fn default() -> Self {
        Self {
            max_concurrent_calls: 1,
            auto_complete: false,
        }
    }
}
