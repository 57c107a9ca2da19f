//! 消息中间件（Broker）协议
//!
//! 总线通过以下窄接口访问 Topic/Subscription 型消息服务：
//! - `TopicClient`：向 Topic 发送消息，可报告自身是否已关闭；
//! - `SubscriptionClient`：过滤规则增删、注册消息回调、确认消息；
//! - `ClientFactory`：按连接串与 Topic/Subscription 名创建客户端；
//! - `MessageHandler`：投递回调（消息处理 + 传输异常上报）。
//!
//! `in_memory` 提供进程内实现，用于测试、示例与本地开发。
//!
mod client;
#[cfg(feature = "in-memory")]
pub mod in_memory;
mod message;
mod rule;

pub use client::{
    ClientFactory, MessageHandler, MessageHandlerOptions, SubscriptionClient, TopicClient,
};
#[cfg(feature = "in-memory")]
pub use in_memory::{InMemoryBroker, InMemoryBrokerOptions};
pub use message::{FaultAction, LockToken, OutboundMessage, ReceiveFault, ReceivedMessage};
pub use rule::{DEFAULT_RULE_NAME, RuleDescription, RuleFilter};
