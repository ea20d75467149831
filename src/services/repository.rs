use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    notification::Notification,
    order::Order,
    product::Product,
    subscription::Subscription,
};

#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    async fn create_subscription(&self, subscription: &Subscription) -> Result<Subscription>;

    async fn get_subscription(&self, subscription_id: &Uuid) -> Result<Option<Subscription>>;

    async fn update_subscription(&self, subscription: &Subscription) -> Result<Subscription>;

    async fn get_subscriptions_by_user(&self, user_id: &Uuid) -> Result<Vec<Subscription>>;

    /// Active, unpaused subscriptions whose next delivery date is at or
    /// before `now`, oldest first. Must not mutate anything.
    async fn get_due_subscriptions(&self, now: DateTime<Utc>) -> Result<Vec<Subscription>>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn create_product(&self, product: &Product) -> Result<Product>;

    async fn get_product(&self, product_id: &Uuid) -> Result<Option<Product>>;

    async fn get_products_by_business(&self, business_id: &Uuid) -> Result<Vec<Product>>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn create_order(&self, order: &Order) -> Result<Order>;

    async fn get_order(&self, order_id: &Uuid) -> Result<Option<Order>>;

    async fn get_orders_by_user(&self, user_id: &Uuid) -> Result<Vec<Order>>;

    async fn get_orders_by_subscription(&self, subscription_id: &Uuid) -> Result<Vec<Order>>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn create_notification(&self, notification: &Notification) -> Result<Notification>;

    async fn get_notifications_by_user(&self, user_id: &Uuid) -> Result<Vec<Notification>>;

    async fn mark_notification_read(&self, notification_id: &Uuid) -> Result<Option<Notification>>;
}

/// Everything the HTTP layer reads and writes.
pub trait Store:
    SubscriptionRepository + ProductRepository + OrderRepository + NotificationRepository
{
}

impl<T> Store for T where
    T: SubscriptionRepository + ProductRepository + OrderRepository + NotificationRepository
{
}

pub(crate) fn sort_due(subscriptions: &mut [Subscription]) {
    subscriptions.sort_by(|a, b| {
        a.next_delivery_date
            .cmp(&b.next_delivery_date)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
}
