use eventbus::integration_event::IntegrationEvent;
use eventbus_macros::integration_event;

#[integration_event]
struct ItemCreatedEvent {
    sku: String,
    quantity: u32,
}

fn main() {
    let ev = ItemCreatedEvent::new("SKU-1".to_string(), 3);

    assert_eq!(ItemCreatedEvent::NAME, "ItemCreatedEvent");
    assert_eq!(ev.event_name(), "ItemCreatedEvent");
    assert!(!ev.id().is_empty());
    assert_eq!(ev.quantity, 3);

    let json = serde_json::to_string(&ev).unwrap();
    let back: ItemCreatedEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(back.id, ev.id);
    assert_eq!(back.created_at(), ev.created_at);
    assert_eq!(back.sku, "SKU-1");
}
