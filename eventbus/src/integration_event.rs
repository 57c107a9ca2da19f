//! 集成事件（Integration Event）
//!
//! 跨进程传播的不可变事实记录：唯一标识 + 创建时间 + 事件自身字段。
//! 事件名称由具体类型决定（默认即类型名），不在载荷中单独存储；
//! 一般通过 `#[integration_event]` 宏自动补齐字段与实现。
//!
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use uuid::Uuid;

/// 事件创建时间（UTC）
pub type Timestamp = DateTime<Utc>;

/// 集成事件需要满足的能力边界
pub trait IntegrationEvent:
    fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// 事件名称，用作消息标签与过滤规则名
    const NAME: &'static str;

    /// 事件唯一标识
    fn id(&self) -> &str;

    /// 事件创建时间
    fn created_at(&self) -> Timestamp;

    fn event_name(&self) -> &'static str {
        Self::NAME
    }
}

/// 事件类型对应的事件名称
pub fn event_name<E: IntegrationEvent>() -> &'static str {
    E::NAME
}

/// 生成新的事件标识（UUID v4）
pub fn new_event_id() -> String {
    Uuid::new_v4().to_string()
}

/// 当前 UTC 时间，用于构造事件时填充 `created_at`
pub fn now() -> Timestamp {
    Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct OrderShipped {
        id: String,
        created_at: Timestamp,
        tracking_no: String,
    }

    impl IntegrationEvent for OrderShipped {
        const NAME: &'static str = "OrderShipped";

        fn id(&self) -> &str {
            &self.id
        }

        fn created_at(&self) -> Timestamp {
            self.created_at
        }
    }

    #[test]
    fn event_name_comes_from_type() {
        let ev = OrderShipped {
            id: new_event_id(),
            created_at: now(),
            tracking_no: "TN-1".into(),
        };
        assert_eq!(ev.event_name(), "OrderShipped");
        assert_eq!(event_name::<OrderShipped>(), "OrderShipped");
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = new_event_id();
        let b = new_event_id();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn json_round_trip_keeps_identity() {
        let ev = OrderShipped {
            id: "abc".into(),
            created_at: now(),
            tracking_no: "TN-2".into(),
        };
        let json = serde_json::to_vec(&ev).unwrap();
        let back: OrderShipped = serde_json::from_slice(&json).unwrap();

        assert_eq!(back, ev);
        assert_eq!(back.id(), "abc");
        assert_eq!(back.created_at(), ev.created_at());
    }
}
