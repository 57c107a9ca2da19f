use super::{EventDescriptor, Subscription};
use crate::error::{EventBusError, EventBusResult};
use crate::eventing::HandlerId;
use std::collections::HashMap;

/// 移除订阅的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// 该事件名下没有此处理器
    NotSubscribed,
    /// 已移除处理器，事件名下仍有其他处理器
    HandlerRemoved,
    /// 已移除最后一个处理器，事件名随之注销
    EventRemoved,
}

/// 内存订阅表
///
/// - `handlers`：事件名 → 处理器订阅（按处理器标识去重，保留注册顺序）
/// - `event_types`：事件名 → 事件类型描述（首次订阅时写入）
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    handlers: HashMap<String, Vec<Subscription>>,
    event_types: HashMap<String, EventDescriptor>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记订阅；同一 (事件名, 处理器) 重复登记不产生新条目，返回 `false`
    ///
    /// 事件名已绑定到另一事件类型时返回 `TypeMismatch`。
    pub fn add_subscription(
        &mut self,
        descriptor: EventDescriptor,
        subscription: Subscription,
    ) -> EventBusResult<bool> {
        let name = descriptor.name();

        if let Some(existing) = self.event_types.get(name) {
            if existing.type_id() != descriptor.type_id() {
                return Err(EventBusError::TypeMismatch {
                    expected: existing.type_name(),
                    found: descriptor.type_name(),
                });
            }
        } else {
            self.event_types.insert(name.to_string(), descriptor);
        }

        let handlers = self.handlers.entry(name.to_string()).or_default();
        if handlers
            .iter()
            .any(|s| s.handler() == subscription.handler())
        {
            return Ok(false);
        }
        handlers.push(subscription);

        Ok(true)
    }

    /// 移除订阅；最后一个处理器被移除时同时删除事件类型描述
    pub fn remove_subscription(&mut self, event_name: &str, handler: &HandlerId) -> Removal {
        let Some(handlers) = self.handlers.get_mut(event_name) else {
            return Removal::NotSubscribed;
        };

        let before = handlers.len();
        handlers.retain(|s| s.handler() != handler);
        if handlers.len() == before {
            return Removal::NotSubscribed;
        }

        if handlers.is_empty() {
            self.handlers.remove(event_name);
            self.event_types.remove(event_name);
            Removal::EventRemoved
        } else {
            Removal::HandlerRemoved
        }
    }

    pub fn has_subscriptions_for_event(&self, event_name: &str) -> bool {
        self.handlers.contains_key(event_name)
    }

    /// 事件名下的全部处理器订阅；调用前应先检查 `has_subscriptions_for_event`
    pub fn handlers_for_event(&self, event_name: &str) -> EventBusResult<&[Subscription]> {
        self.handlers
            .get(event_name)
            .map(Vec::as_slice)
            .ok_or_else(|| EventBusError::not_found(event_name))
    }

    pub fn event_type_by_name(&self, event_name: &str) -> EventBusResult<&EventDescriptor> {
        self.event_types
            .get(event_name)
            .ok_or_else(|| EventBusError::not_found(event_name))
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// 已订阅的事件名（只读视图，无序）
    pub fn event_names(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }

    pub fn clear(&mut self) {
        self.handlers.clear();
        self.event_types.clear();
    }
}
