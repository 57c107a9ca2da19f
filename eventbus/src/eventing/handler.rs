//! 事件处理器（IntegrationEventHandler）
//!
//! 针对某一具体事件类型的处理逻辑。处理器实例不由总线创建，
//! 而是在每条消息的作用域内经 `HandlerLocator` 解析得到。
//!
use crate::integration_event::IntegrationEvent;
use async_trait::async_trait;

/// 事件处理器：处理某一类型的集成事件
#[async_trait]
pub trait IntegrationEventHandler<E>: Send + Sync + 'static
where
    E: IntegrationEvent,
{
    /// 处理事件；返回错误时消息不会被确认
    async fn handle(&self, event: &E) -> anyhow::Result<()>;
}
