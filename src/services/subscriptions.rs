use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::models::{
    notification::{subscription_messages, Outbound, SubscriptionEvent},
    order::Order,
    subscription::{
        CreateSubscriptionRequest, PauseSubscriptionRequest, Subscription, SubscriptionItem,
        SubscriptionItemRequest, UpdateSubscriptionRequest, MAX_SCHEDULE_LEAD_DAYS,
    },
};
use crate::services::{
    clock::Clock,
    repository::{OrderRepository, ProductRepository, Store, SubscriptionRepository},
};

/// Subscription lifecycle. Every mutating call returns the messages the
/// change should produce; delivering them is up to the caller.
#[derive(Clone)]
pub struct SubscriptionService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl SubscriptionService {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn create(&self, request: CreateSubscriptionRequest) -> Result<(Subscription, Vec<Outbound>), AppError> {
        request.validate()?;
        let now = self.clock.now();
        check_schedule_horizon(&request, now)?;

        let items = self.resolve_items(&request.business_id, &request.items).await?;
        let subscription = Subscription::new(request, items, now);
        let created = self.store.create_subscription(&subscription).await?;

        log::info!(
            "Created {} subscription {} for user {}, first delivery {}",
            created.frequency, created.id, created.user_id, created.next_delivery_date
        );
        let outbound = subscription_messages(&created, &SubscriptionEvent::Created);
        Ok((created, outbound))
    }

    pub async fn get(&self, subscription_id: &Uuid) -> Result<Subscription, AppError> {
        self.store
            .get_subscription(subscription_id)
            .await?
            .ok_or(AppError::NotFound("Subscription"))
    }

    pub async fn list_by_user(&self, user_id: &Uuid) -> Result<Vec<Subscription>, AppError> {
        Ok(self.store.get_subscriptions_by_user(user_id).await?)
    }

    pub async fn orders(&self, subscription_id: &Uuid) -> Result<Vec<Order>, AppError> {
        self.get(subscription_id).await?;
        Ok(self.store.get_orders_by_subscription(subscription_id).await?)
    }

    pub async fn update(&self, subscription_id: &Uuid, request: UpdateSubscriptionRequest) -> Result<Subscription, AppError> {
        request.validate()?;

        let mut subscription = self.get(subscription_id).await?;
        if !subscription.is_active {
            return Err(AppError::Validation("Cancelled subscriptions cannot be changed".to_string()));
        }

        let items = match &request.items {
            Some(items) => Some(self.resolve_items(&subscription.business_id, items).await?),
            None => None,
        };
        subscription.apply_update(request, items, self.clock.now());

        let updated = self.store.update_subscription(&subscription).await?;
        log::info!("Updated subscription {}", updated.id);
        Ok(updated)
    }

    pub async fn pause(&self, subscription_id: &Uuid, request: PauseSubscriptionRequest) -> Result<(Subscription, Vec<Outbound>), AppError> {
        let mut subscription = self.get(subscription_id).await?;
        subscription.pause(request.reason, request.paused_until, self.clock.now())?;
        self.persist_transition(subscription, SubscriptionEvent::Paused).await
    }

    pub async fn resume(&self, subscription_id: &Uuid) -> Result<(Subscription, Vec<Outbound>), AppError> {
        let mut subscription = self.get(subscription_id).await?;
        subscription.resume(self.clock.now())?;
        self.persist_transition(subscription, SubscriptionEvent::Resumed).await
    }

    pub async fn cancel(&self, subscription_id: &Uuid) -> Result<(Subscription, Vec<Outbound>), AppError> {
        let mut subscription = self.get(subscription_id).await?;
        subscription.cancel(self.clock.now())?;
        self.persist_transition(subscription, SubscriptionEvent::Cancelled).await
    }

    async fn persist_transition(&self, subscription: Subscription, event: SubscriptionEvent) -> Result<(Subscription, Vec<Outbound>), AppError> {
        let updated = self.store.update_subscription(&subscription).await?;
        log::info!("Subscription {} is now {:?}", updated.id, updated.state());
        let outbound = subscription_messages(&updated, &event);
        Ok((updated, outbound))
    }

    /// Looks each product up in the catalog and captures its current price.
    async fn resolve_items(&self, business_id: &Uuid, requests: &[SubscriptionItemRequest]) -> Result<Vec<SubscriptionItem>, AppError> {
        let mut items = Vec::with_capacity(requests.len());
        for request in requests {
            let product = self.store
                .get_product(&request.product_id)
                .await?
                .ok_or_else(|| AppError::Validation(format!("Product {} not found", request.product_id)))?;

            if product.business_id != *business_id {
                return Err(AppError::Validation(format!(
                    "Product {} is not sold by business {}",
                    product.id, business_id
                )));
            }
            if !product.is_available {
                return Err(AppError::Validation(format!("Product {} is not available", product.name)));
            }

            items.push(SubscriptionItem::from_product(&product, request.quantity));
        }
        Ok(items)
    }
}

fn check_schedule_horizon(request: &CreateSubscriptionRequest, now: DateTime<Utc>) -> Result<(), AppError> {
    let horizon = now + Duration::days(MAX_SCHEDULE_LEAD_DAYS);
    let beyond = |date: Option<DateTime<Utc>>| date.map_or(false, |d| d > horizon);

    if beyond(request.start_date) || beyond(request.end_date) {
        return Err(AppError::Validation(format!(
            "Schedule dates must be within {} days from now",
            MAX_SCHEDULE_LEAD_DAYS
        )));
    }
    // an omitted start means now
    if request.start_date.is_none() && request.end_date.map_or(false, |end| end < now) {
        return Err(AppError::Validation("End date must not be before the start date".to_string()));
    }
    Ok(())
}
