//! 事件处理器容器（eventbus-di）
//!
//! `HandlerContainer` 实现 `eventbus::eventing::HandlerLocator`：
//! 支持瞬时（transient）、作用域（scoped）、单例（singleton）三种生命周期，
//! 每条入站消息对应一个作用域。
//!
pub mod container;
pub mod error;

pub use container::HandlerContainer;
pub use error::DiError;
