use crate::error::EventBusError;
use bytes::Bytes;
use std::fmt;
use uuid::Uuid;

/// 待发送消息
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    /// 每次发送新生成，与事件自身的 id 无关
    pub message_id: String,
    /// 消息标签，即事件名
    pub label: String,
    /// 事件 JSON
    pub body: Bytes,
}

impl OutboundMessage {
    pub fn new(label: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            label: label.into(),
            body: body.into(),
        }
    }
}

/// 消息锁令牌，用于确认（complete）一次具体的投递
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockToken(String);

impl LockToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for LockToken {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for LockToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 投递到订阅端的消息
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    message_id: String,
    label: String,
    body: Bytes,
    lock_token: LockToken,
    delivery_count: u32,
}

impl ReceivedMessage {
    pub fn new(
        message_id: impl Into<String>,
        label: impl Into<String>,
        body: impl Into<Bytes>,
        lock_token: LockToken,
        delivery_count: u32,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            label: label.into(),
            body: body.into(),
            lock_token,
            delivery_count,
        }
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn lock_token(&self) -> &LockToken {
        &self.lock_token
    }

    /// 第几次投递（从 1 开始）
    pub fn delivery_count(&self) -> u32 {
        self.delivery_count
    }
}

/// 异常发生时 Broker 正在执行的动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultAction {
    /// 执行消息回调
    UserCallback,
    /// 确认消息
    Complete,
}

impl fmt::Display for FaultAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::UserCallback => "UserCallback",
            Self::Complete => "Complete",
        };
        f.write_str(s)
    }
}

/// 投递过程中的异常及其上下文
#[derive(Debug)]
pub struct ReceiveFault {
    pub error: EventBusError,
    pub action: FaultAction,
    /// 形如 `topic/subscriptions/name`
    pub entity_path: String,
    pub message_id: Option<String>,
}
