//! 事件子系统（eventing）
//!
//! 集成事件的发布/订阅与消费分发：
//! - `EventBus`：统一发布/订阅接口；
//! - `IntegrationEventHandler`：针对某一事件类型的处理逻辑；
//! - `HandlerLocator` / `HandlerScope`：按处理器类型解析实例；
//! - `ServiceBusEventBus`：基于 Topic/Subscription 型 Broker 的实现，
//!   负责规则维护、回调激活、断线重建与消息分发。
//!
pub mod bus;
pub mod handler;
pub mod locator;
pub mod service_bus;

pub use bus::EventBus;
pub use handler::IntegrationEventHandler;
pub use locator::{HandlerId, HandlerInstance, HandlerLocator, HandlerScope};
pub use service_bus::{Dispatcher, ServiceBusEventBus};
