use crate::error::DiError;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use eventbus::eventing::{HandlerId, HandlerInstance, HandlerLocator, HandlerScope};
use std::any::TypeId;
use std::sync::Arc;
use tracing::debug;

type Factory = Arc<dyn Fn() -> HandlerInstance + Send + Sync>;

/// 处理器生命周期
#[derive(Clone)]
enum Lifetime {
    /// 每次解析新建
    Transient(Factory),
    /// 同一作用域内共享，作用域结束即释放
    Scoped(Factory),
    /// 全局共享同一实例
    Singleton(HandlerInstance),
}

#[derive(Clone)]
struct Registration {
    id: HandlerId,
    lifetime: Lifetime,
}

/// 基于内存的处理器容器
/// - 通过 TypeId 注册处理器及其生命周期
/// - 每条入站消息打开一个作用域，在其中解析处理器实例
#[derive(Clone, Default)]
pub struct HandlerContainer {
    registrations: Arc<DashMap<TypeId, Registration>>,
}

impl HandlerContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册瞬时处理器：每次解析调用一次工厂
    pub fn add_transient<H, F>(&self, factory: F) -> Result<(), DiError>
    where
        H: Send + Sync + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        self.register::<H>(Lifetime::Transient(Arc::new(move || {
            Arc::new(factory()) as HandlerInstance
        })))
    }

    /// 注册作用域处理器：同一作用域内只创建一次
    pub fn add_scoped<H, F>(&self, factory: F) -> Result<(), DiError>
    where
        H: Send + Sync + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        self.register::<H>(Lifetime::Scoped(Arc::new(move || {
            Arc::new(factory()) as HandlerInstance
        })))
    }

    /// 注册单例处理器
    pub fn add_singleton<H>(&self, instance: H) -> Result<(), DiError>
    where
        H: Send + Sync + 'static,
    {
        self.register::<H>(Lifetime::Singleton(Arc::new(instance)))
    }

    pub fn contains<H: 'static>(&self) -> bool {
        self.registrations.contains_key(&TypeId::of::<H>())
    }

    /// 已注册的处理器（无序）
    pub fn registered_handlers(&self) -> Vec<HandlerId> {
        self.registrations.iter().map(|r| r.id).collect()
    }

    fn register<H: 'static>(&self, lifetime: Lifetime) -> Result<(), DiError> {
        let id = HandlerId::of::<H>();

        match self.registrations.entry(id.type_id()) {
            Entry::Occupied(_) => Err(DiError::AlreadyRegistered { handler: id.name() }),
            Entry::Vacant(slot) => {
                debug!(handler = %id, "Handler registered");
                slot.insert(Registration { id, lifetime });
                Ok(())
            }
        }
    }
}

impl HandlerLocator for HandlerContainer {
    fn open_scope(&self) -> Box<dyn HandlerScope> {
        Box::new(ContainerScope {
            registrations: self.registrations.clone(),
            scoped: DashMap::new(),
        })
    }
}

/// 单条消息的解析作用域；drop 时释放作用域处理器
struct ContainerScope {
    registrations: Arc<DashMap<TypeId, Registration>>,
    scoped: DashMap<TypeId, HandlerInstance>,
}

#[async_trait]
impl HandlerScope for ContainerScope {
    async fn resolve(&self, handler: &HandlerId) -> Option<HandlerInstance> {
        let key = handler.type_id();
        let lifetime = self.registrations.get(&key).map(|r| r.lifetime.clone())?;

        let instance = match lifetime {
            Lifetime::Transient(factory) => factory(),
            Lifetime::Singleton(instance) => instance,
            Lifetime::Scoped(factory) => self.scoped.entry(key).or_insert_with(|| factory()).clone(),
        };
        Some(instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter {
        seq: usize,
    }

    struct Unregistered;

    fn counting(created: &Arc<AtomicUsize>) -> impl Fn() -> Counter + Send + Sync + 'static {
        let created = created.clone();
        move || Counter {
            seq: created.fetch_add(1, Ordering::SeqCst),
        }
    }

    async fn resolve_counter(scope: &dyn HandlerScope) -> Arc<Counter> {
        scope
            .resolve(&HandlerId::of::<Counter>())
            .await
            .unwrap()
            .downcast::<Counter>()
            .unwrap()
    }

    #[tokio::test]
    async fn transient_handlers_are_created_per_resolution() {
        let created = Arc::new(AtomicUsize::new(0));
        let container = HandlerContainer::new();
        container.add_transient(counting(&created)).unwrap();

        let scope = container.open_scope();
        let a = resolve_counter(scope.as_ref()).await;
        let b = resolve_counter(scope.as_ref()).await;

        assert_ne!(a.seq, b.seq);
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn scoped_handlers_are_shared_within_scope_only() {
        let created = Arc::new(AtomicUsize::new(0));
        let container = HandlerContainer::new();
        container.add_scoped(counting(&created)).unwrap();

        let first = container.open_scope();
        let a = resolve_counter(first.as_ref()).await;
        let b = resolve_counter(first.as_ref()).await;
        assert!(Arc::ptr_eq(&a, &b));

        let second = container.open_scope();
        let c = resolve_counter(second.as_ref()).await;
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(created.load(Ordering::SeqCst), 2);

        // 作用域释放后仅剩外部持有的引用
        drop(first);
        assert_eq!(Arc::strong_count(&a), 2);
    }

    #[tokio::test]
    async fn singleton_is_shared_across_scopes() {
        let container = HandlerContainer::new();
        container.add_singleton(Counter { seq: 42 }).unwrap();

        let a = resolve_counter(container.open_scope().as_ref()).await;
        let b = resolve_counter(container.open_scope().as_ref()).await;

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.seq, 42);
    }

    #[tokio::test]
    async fn unregistered_handler_resolves_to_none() {
        let container = HandlerContainer::new();
        let scope = container.open_scope();

        assert!(scope.resolve(&HandlerId::of::<Unregistered>()).await.is_none());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let container = HandlerContainer::new();
        container.add_singleton(Counter { seq: 0 }).unwrap();

        let err = container
            .add_transient(|| Counter { seq: 1 })
            .unwrap_err();
        assert!(matches!(err, DiError::AlreadyRegistered { handler } if handler.ends_with("Counter")));

        assert!(container.contains::<Counter>());
        assert!(!container.contains::<Unregistered>());
        assert_eq!(container.registered_handlers(), vec![HandlerId::of::<Counter>()]);
    }
}
