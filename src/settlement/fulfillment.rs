//! Seller fulfillment updates on order groups and items.

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use crate::domain::events::{DomainEvent, FulfillmentEvent};
use crate::domain::status::{OrderGroupStatus, OrderItemStatus};
use crate::identity::Actor;
use crate::publisher::EventPublisher;
use crate::store::SettlementStore;
use crate::{Result, SettlementError};

#[derive(Debug, Clone, Copy, Serialize)]
pub struct StatusChange<S> {
    pub id: Uuid,
    pub from: S,
    pub to: S,
}

#[derive(Clone)]
pub struct FulfillmentService {
    store: Arc<dyn SettlementStore>,
    publisher: EventPublisher,
}

impl FulfillmentService {
    pub fn new(store: Arc<dyn SettlementStore>, publisher: EventPublisher) -> Self { Self { store, publisher } }

    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn update_order_group_status(&self, actor: &Actor, group_id: Uuid, to: OrderGroupStatus) -> Result<StatusChange<OrderGroupStatus>> {
        let group = self.store.find_group(group_id).await?.ok_or(SettlementError::OrderGroupNotFound(group_id))?;
        actor.ensure_manages(group.seller_id)?;
        let from = group.status;
        if from == to { return Ok(StatusChange { id: group_id, from, to }); }
        if !from.can_transition_to(to) {
            return Err(SettlementError::InvalidTransition { from: from.to_string(), to: to.to_string() });
        }
        if !self.store.set_group_status(group_id, from, to).await? {
            let current = self.store.find_group(group_id).await?.map(|g| g.status).unwrap_or(from);
            warn!(%group_id, %from, %current, "group status changed concurrently");
            return Err(SettlementError::InvalidTransition { from: current.to_string(), to: to.to_string() });
        }

        info!(%group_id, %from, %to, "order group status updated");
        self.publisher.publish(vec![DomainEvent::Fulfillment(FulfillmentEvent::GroupStatusChanged {
            group_id, seller_id: group.seller_id, from, to,
        })]).await;
        Ok(StatusChange { id: group_id, from, to })
    }

    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn update_order_item_status(&self, actor: &Actor, item_id: Uuid, to: OrderItemStatus) -> Result<StatusChange<OrderItemStatus>> {
        let (item, seller_id) = self.store.find_item(item_id).await?.ok_or(SettlementError::OrderItemNotFound(item_id))?;
        actor.ensure_manages(seller_id)?;
        let from = item.status;
        if from == to { return Ok(StatusChange { id: item_id, from, to }); }
        if !from.can_transition_to(to) {
            return Err(SettlementError::InvalidTransition { from: from.to_string(), to: to.to_string() });
        }
        if !self.store.set_item_status(item_id, from, to).await? {
            let current = self.store.find_item(item_id).await?.map(|(i, _)| i.status).unwrap_or(from);
            warn!(%item_id, %from, %current, "item status changed concurrently");
            return Err(SettlementError::InvalidTransition { from: current.to_string(), to: to.to_string() });
        }

        info!(%item_id, %from, %to, "order item status updated");
        self.publisher.publish(vec![DomainEvent::Fulfillment(FulfillmentEvent::ItemStatusChanged {
            item_id, group_id: item.group_id, from, to,
        })]).await;
        Ok(StatusChange { id: item_id, from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::Order;
    use crate::settlement::testing::{cart, Shop};
    use crate::settlement::OrderSettlementService;

    async fn order_for(shop: &Shop, seller: Uuid) -> Order {
        let line = shop.line(seller, 1000, 1, 5).await;
        OrderSettlementService::new(shop.store.clone(), EventPublisher::disabled(), "USD")
            .place_order(shop.buyer, shop.address, &cart(vec![line])).await.unwrap()
    }

    fn service(shop: &Shop) -> FulfillmentService { FulfillmentService::new(shop.store.clone(), EventPublisher::disabled()) }

    #[tokio::test]
    async fn test_seller_moves_own_group_forward() {
        let shop = Shop::new().await;
        let seller = Uuid::new_v4();
        let order = order_for(&shop, seller).await;
        let group_id = order.groups[0].id;
        let svc = service(&shop);

        let change = svc.update_order_group_status(&Actor::seller(seller), group_id, OrderGroupStatus::Shipped).await.unwrap();
        assert_eq!(change.from, OrderGroupStatus::Pending);
        assert_eq!(shop.store.find_group(group_id).await.unwrap().unwrap().status, OrderGroupStatus::Shipped);

        let err = svc.update_order_group_status(&Actor::seller(seller), group_id, OrderGroupStatus::Confirmed).await.unwrap_err();
        assert!(matches!(err, SettlementError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_other_seller_forbidden() {
        let shop = Shop::new().await;
        let order = order_for(&shop, Uuid::new_v4()).await;
        let err = service(&shop)
            .update_order_group_status(&Actor::seller(Uuid::new_v4()), order.groups[0].id, OrderGroupStatus::Confirmed).await.unwrap_err();
        assert!(matches!(err, SettlementError::Forbidden));
    }

    #[tokio::test]
    async fn test_admin_updates_item() {
        let shop = Shop::new().await;
        let order = order_for(&shop, Uuid::new_v4()).await;
        let item_id = order.groups[0].items[0].id;
        let change = service(&shop)
            .update_order_item_status(&Actor::admin(Uuid::new_v4()), item_id, OrderItemStatus::ReadyForShipment).await.unwrap();
        assert_eq!(change.to, OrderItemStatus::ReadyForShipment);
        assert_eq!(shop.store.find_item(item_id).await.unwrap().unwrap().0.status, OrderItemStatus::ReadyForShipment);
    }

    #[tokio::test]
    async fn test_unknown_item() {
        let shop = Shop::new().await;
        let err = service(&shop)
            .update_order_item_status(&Actor::admin(Uuid::new_v4()), Uuid::new_v4(), OrderItemStatus::Shipped).await.unwrap_err();
        assert!(matches!(err, SettlementError::OrderItemNotFound(_)));
    }
}
