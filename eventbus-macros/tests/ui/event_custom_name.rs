use eventbus::integration_event::IntegrationEvent;
use eventbus_macros::integration_event;
use serde::{Deserialize, Serialize};

#[integration_event(name = "inventory.item_deleted")]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDeletedEvent {
    pub sku: String,
}

fn main() {
    let ev = ItemDeletedEvent::new("SKU-9".into());
    let copy = ev.clone();

    assert_eq!(ev, copy);
    assert_eq!(ev.event_name(), "inventory.item_deleted");
    assert_eq!(
        eventbus::integration_event::event_name::<ItemDeletedEvent>(),
        "inventory.item_deleted"
    );
}
