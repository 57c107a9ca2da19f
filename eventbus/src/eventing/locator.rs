//! 处理器定位（HandlerLocator）
//!
//! 总线只依赖“按处理器类型标识解析实例”的能力，不关心实例如何创建：
//! - `HandlerLocator::open_scope`：每条入站消息打开一个作用域；
//! - `HandlerScope::resolve`：在该作用域内解析处理器实例，未注册时返回 `None`。
//!
//! 作用域以 RAII 方式释放（drop），保证所有退出路径上都会归还资源。
//!
use async_trait::async_trait;
use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// 类型擦除后的处理器实例
pub type HandlerInstance = Arc<dyn Any + Send + Sync>;

/// 处理器类型标识
#[derive(Clone, Copy)]
pub struct HandlerId {
    type_id: TypeId,
    name: &'static str,
}

impl HandlerId {
    pub fn of<H: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<H>(),
            name: type_name::<H>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// 完整类型路径
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 去掉模块路径后的类型名，用于日志
    pub fn short_name(&self) -> &'static str {
        self.name.rsplit("::").next().unwrap_or(self.name)
    }
}

impl PartialEq for HandlerId {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for HandlerId {}

impl Hash for HandlerId {
    fn hash<S: Hasher>(&self, state: &mut S) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// 单条消息范围内的处理器解析上下文
#[async_trait]
pub trait HandlerScope: Send + Sync {
    async fn resolve(&self, handler: &HandlerId) -> Option<HandlerInstance>;
}

/// 处理器定位器
pub trait HandlerLocator: Send + Sync {
    fn open_scope(&self) -> Box<dyn HandlerScope>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct Alpha;
    struct Beta;

    #[test]
    fn handler_id_identity_follows_type() {
        let a1 = HandlerId::of::<Alpha>();
        let a2 = HandlerId::of::<Alpha>();
        let b = HandlerId::of::<Beta>();

        assert_eq!(a1, a2);
        assert_ne!(a1, b);

        let set: HashSet<HandlerId> = [a1, a2, b].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn short_name_strips_module_path() {
        let id = HandlerId::of::<Alpha>();
        assert_eq!(id.short_name(), "Alpha");
        assert!(id.name().ends_with("::Alpha"));
        assert_eq!(id.to_string(), "Alpha");
    }
}
