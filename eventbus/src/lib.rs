//! 集成事件总线（eventbus）
//!
//! 在 Topic/Subscription 型消息中间件之上提供类型化的发布/订阅：
//! - 集成事件（`integration_event`）与事件处理器（`eventing::IntegrationEventHandler`）
//! - 订阅表（`subscription`）：事件名到处理器与事件类型的映射
//! - 消息中间件协议（`broker`）及进程内实现（`broker::in_memory`）
//! - 事件总线（`eventing::ServiceBusEventBus`）：发布、订阅、消费分发与断线重建
//! - 配置（`config`）与统一错误（`error`）
//!
//! 典型用法：
//! 1. 用 `#[integration_event]` 定义事件，实现 `IntegrationEventHandler`；
//! 2. 提供 `HandlerLocator`（如 `eventbus-di` 的容器）与 `ClientFactory`；
//! 3. 通过 `ServiceBusEventBus::builder()...connect().await` 建立总线；
//! 4. 调用 `subscribe::<E, H>()` 登记处理器，`publish(&event)` 发布事件。
//!
pub mod broker;
pub mod config;
pub mod error;
pub mod eventing;
pub mod integration_event;
pub mod subscription;

pub use config::EventBusConfig;
pub use error::{BrokerError, EventBusError, EventBusResult};
pub use eventing::{EventBus, IntegrationEventHandler, ServiceBusEventBus};
pub use integration_event::IntegrationEvent;

// 允许在本 crate 内部通过 ::eventbus 进行自引用，
// 以便过程宏在本 crate 的测试中也能解析到 ::eventbus 路径。
extern crate self as eventbus;
