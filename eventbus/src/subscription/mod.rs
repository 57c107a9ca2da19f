//! 订阅表（Subscription Registry）
//!
//! 进程内记录“事件名 → 处理器集合”与“事件名 → 事件类型描述”的纯内存状态：
//! - `EventDescriptor`：订阅时绑定的反序列化函数；
//! - `Subscription`：订阅时绑定的处理器调用函数；
//! - `SubscriptionRegistry`：两张映射表，键集合始终一致。
//!
//! 分发时直接调用订阅时绑定的函数，不做运行时类型反射。
//! 订阅表自身不加锁，由持有者（总线）负责串行化修改。
//!
mod descriptor;
mod registry;

pub use descriptor::{DecodedEvent, EventDescriptor, Subscription};
pub use registry::{Removal, SubscriptionRegistry};
