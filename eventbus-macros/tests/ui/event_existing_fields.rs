use eventbus::integration_event::{IntegrationEvent, Timestamp, now};
use eventbus_macros::integration_event;

// 已声明的 id / created_at 保持原定义，不重复追加
#[integration_event]
struct Heartbeat {
    id: String,
    created_at: Timestamp,
    node: String,
}

fn main() {
    let at = now();
    let hb = Heartbeat {
        id: "fixed".into(),
        created_at: at,
        node: "n1".into(),
    };
    assert_eq!(hb.id(), "fixed");
    assert_eq!(hb.created_at(), at);
    assert_eq!(hb.node, "n1");

    let fresh = Heartbeat::new("n2".into());
    assert_ne!(fresh.id(), "fixed");
}
