//! 事件总线统一错误定义
//!
//! 分为两层：
//! - `BrokerError`：消息中间件（Topic/Subscription 客户端、过滤规则）返回的错误；
//! - `EventBusError`：总线对调用方暴露的错误（传输、序列化、订阅表、处理器等）。
//!
//! 其中规则“已存在/不存在”在总线内部被容忍，仅记录告警。
//!
use thiserror::Error;

/// 消息中间件错误
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error("messaging entity already exists: {entity}")]
    AlreadyExists { entity: String },

    #[error("messaging entity not found: {entity}")]
    NotFound { entity: String },

    #[error("client closed: {entity}")]
    Closed { entity: String },

    #[error("message handler already registered: {entity}")]
    HandlerAlreadyRegistered { entity: String },

    #[error("message lock lost: lock_token={lock_token}")]
    LockLost { lock_token: String },

    #[error("transport error: {reason}")]
    Transport { reason: String },
}

impl BrokerError {
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// 事件总线错误
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum EventBusError {
    // --- 传输 ---
    #[error("transport: {0}")]
    Transport(#[from] BrokerError),

    // --- 序列化 ---
    #[error("serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },

    // --- 订阅表 ---
    #[error("no subscription for event: {event_name}")]
    NotFound { event_name: String },

    #[error("event bus on topic {topic} has no subscription client")]
    NotSubscriber { topic: String },

    #[error("type mismatch: expected={expected}, found={found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    // --- 处理器 ---
    #[error("event handler error: handler={handler}, event={event_name}, reason={source}")]
    Handler {
        handler: &'static str,
        event_name: String,
        #[source]
        source: anyhow::Error,
    },

    // --- 配置 ---
    #[error("config error: {reason}")]
    Config { reason: String },
}

impl EventBusError {
    pub fn not_found(event_name: impl Into<String>) -> Self {
        Self::NotFound {
            event_name: event_name.into(),
        }
    }

    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }
}

impl From<config::ConfigError> for EventBusError {
    fn from(err: config::ConfigError) -> Self {
        EventBusError::Config {
            reason: err.to_string(),
        }
    }
}

/// 统一 Result 类型别名
pub type EventBusResult<T> = Result<T, EventBusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broker_error_predicates() {
        let exists = BrokerError::AlreadyExists {
            entity: "ItemCreatedEvent".into(),
        };
        let missing = BrokerError::NotFound {
            entity: "$Default".into(),
        };

        assert!(exists.is_already_exists());
        assert!(!exists.is_not_found());
        assert!(missing.is_not_found());
        assert!(!BrokerError::transport("boom").is_already_exists());
    }

    #[test]
    fn broker_error_converts_into_transport() {
        let err: EventBusError = BrokerError::transport("connection reset").into();
        assert!(matches!(err, EventBusError::Transport(BrokerError::Transport { .. })));
        assert_eq!(err.to_string(), "transport: transport error: connection reset");
    }
}
