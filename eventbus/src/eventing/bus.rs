//! 事件总线（EventBus）协议
//!
//! 以事件类型与处理器类型为泛型参数的发布/订阅接口，
//! 事件名由类型决定，处理器实例在消费时经 `HandlerLocator` 解析。
//!
use super::IntegrationEventHandler;
use crate::error::EventBusResult;
use crate::integration_event::IntegrationEvent;
use async_trait::async_trait;

/// 事件总线：发布集成事件、登记事件处理器
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish<E>(&self, event: &E) -> EventBusResult<()>
    where
        E: IntegrationEvent;

    /// 依次发布，遇到首个错误即停止
    async fn publish_batch<E>(&self, events: &[E]) -> EventBusResult<()>
    where
        E: IntegrationEvent,
    {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }

    /// 登记处理器；同一 (事件, 处理器) 重复登记不产生重复调用
    async fn subscribe<E, H>(&self) -> EventBusResult<()>
    where
        E: IntegrationEvent,
        H: IntegrationEventHandler<E>;

    /// 注销处理器；未登记时不报错
    async fn unsubscribe<E, H>(&self) -> EventBusResult<()>
    where
        E: IntegrationEvent,
        H: IntegrationEventHandler<E>;
}
