use crate::error::{EventBusError, EventBusResult};
use crate::eventing::{HandlerId, HandlerInstance, IntegrationEventHandler};
use crate::integration_event::IntegrationEvent;
use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// 反序列化后的事件（类型擦除，供同一消息的多个处理器共享）
pub type DecodedEvent = Arc<dyn Any + Send + Sync>;

type DecodeFn = fn(&[u8]) -> EventBusResult<DecodedEvent>;

type InvokeFuture = Pin<Box<dyn Future<Output = EventBusResult<()>> + Send>>;

type InvokeFn = fn(HandlerInstance, DecodedEvent) -> InvokeFuture;

/// 事件类型描述：事件名 + 绑定到具体类型的反序列化函数
#[derive(Clone)]
pub struct EventDescriptor {
    name: &'static str,
    type_name: &'static str,
    type_id: TypeId,
    decode: DecodeFn,
}

impl EventDescriptor {
    pub fn of<E: IntegrationEvent>() -> Self {
        Self {
            name: E::NAME,
            type_name: type_name::<E>(),
            type_id: TypeId::of::<E>(),
            decode: decode_event::<E>,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// 将消息体反序列化为该描述对应的具体事件类型
    pub fn decode(&self, payload: &[u8]) -> EventBusResult<DecodedEvent> {
        (self.decode)(payload)
    }
}

impl fmt::Debug for EventDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDescriptor")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .finish()
    }
}

impl PartialEq for EventDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.type_id == other.type_id
    }
}

fn decode_event<E: IntegrationEvent>(payload: &[u8]) -> EventBusResult<DecodedEvent> {
    let event: E = serde_json::from_slice(payload)?;
    Ok(Arc::new(event))
}

/// 单个处理器订阅：处理器标识 + 绑定到 (事件类型, 处理器类型) 的调用函数
#[derive(Clone)]
pub struct Subscription {
    handler: HandlerId,
    invoke: InvokeFn,
}

impl Subscription {
    pub fn of<E, H>() -> Self
    where
        E: IntegrationEvent,
        H: IntegrationEventHandler<E>,
    {
        Self {
            handler: HandlerId::of::<H>(),
            invoke: invoke_handler::<E, H>,
        }
    }

    pub fn handler(&self) -> &HandlerId {
        &self.handler
    }

    /// 以解析出的处理器实例处理已反序列化的事件
    pub async fn invoke(&self, instance: HandlerInstance, event: DecodedEvent) -> EventBusResult<()> {
        (self.invoke)(instance, event).await
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("handler", &self.handler)
            .finish()
    }
}

fn invoke_handler<E, H>(instance: HandlerInstance, event: DecodedEvent) -> InvokeFuture
where
    E: IntegrationEvent,
    H: IntegrationEventHandler<E>,
{
    Box::pin(async move {
        // 正常情况下 downcast 不会失败：函数与订阅键由同一组泛型参数生成
        let handler = instance
            .downcast::<H>()
            .map_err(|_| EventBusError::TypeMismatch {
                expected: type_name::<H>(),
                found: "resolved handler instance",
            })?;
        let event = event.downcast::<E>().map_err(|_| EventBusError::TypeMismatch {
            expected: type_name::<E>(),
            found: "decoded event",
        })?;

        handler
            .handle(&event)
            .await
            .map_err(|source| EventBusError::Handler {
                handler: type_name::<H>(),
                event_name: E::NAME.to_string(),
                source,
            })
    })
}
