//! In-memory doubles shared by the unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{
    common::{DeliveryAddress, PaymentMethod},
    notification::{EmailMessage, Notification},
    order::Order,
    product::Product,
    subscription::{Frequency, Subscription, SubscriptionItem},
};
use crate::services::{
    clock::Clock,
    mailer::Mailer,
    repository::{sort_due, NotificationRepository, OrderRepository, ProductRepository, SubscriptionRepository},
};

#[derive(Default)]
pub struct MemoryStore {
    pub subscriptions: Mutex<HashMap<Uuid, Subscription>>,
    pub products: Mutex<HashMap<Uuid, Product>>,
    pub orders: Mutex<Vec<Order>>,
    pub notifications: Mutex<Vec<Notification>>,
}

#[async_trait]
impl SubscriptionRepository for MemoryStore {
    async fn create_subscription(&self, subscription: &Subscription) -> Result<Subscription> {
        let mut subscriptions = self.subscriptions.lock().unwrap();
        if subscriptions.contains_key(&subscription.id) {
            return Err(anyhow!("Subscription {} already exists", subscription.id));
        }
        subscriptions.insert(subscription.id, subscription.clone());
        Ok(subscription.clone())
    }

    async fn get_subscription(&self, subscription_id: &Uuid) -> Result<Option<Subscription>> {
        Ok(self.subscriptions.lock().unwrap().get(subscription_id).cloned())
    }

    async fn update_subscription(&self, subscription: &Subscription) -> Result<Subscription> {
        self.subscriptions
            .lock()
            .unwrap()
            .insert(subscription.id, subscription.clone());
        Ok(subscription.clone())
    }

    async fn get_subscriptions_by_user(&self, user_id: &Uuid) -> Result<Vec<Subscription>> {
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.user_id == *user_id)
            .cloned()
            .collect())
    }

    async fn get_due_subscriptions(&self, now: DateTime<Utc>) -> Result<Vec<Subscription>> {
        let mut due: Vec<Subscription> = self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.is_active && !s.is_paused && s.next_delivery_date <= now)
            .cloned()
            .collect();
        sort_due(&mut due);
        Ok(due)
    }
}

#[async_trait]
impl ProductRepository for MemoryStore {
    async fn create_product(&self, product: &Product) -> Result<Product> {
        let mut products = self.products.lock().unwrap();
        if products.contains_key(&product.id) {
            return Err(anyhow!("product {} already exists", product.id));
        }
        products.insert(product.id, product.clone());
        Ok(product.clone())
    }

    async fn get_product(&self, product_id: &Uuid) -> Result<Option<Product>> {
        Ok(self.products.lock().unwrap().get(product_id).cloned())
    }

    async fn get_products_by_business(&self, business_id: &Uuid) -> Result<Vec<Product>> {
        Ok(self
            .products
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.business_id == *business_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn create_order(&self, order: &Order) -> Result<Order> {
        self.orders.lock().unwrap().push(order.clone());
        Ok(order.clone())
    }

    async fn get_order(&self, order_id: &Uuid) -> Result<Option<Order>> {
        Ok(self.orders.lock().unwrap().iter().find(|o| o.id == *order_id).cloned())
    }

    async fn get_orders_by_user(&self, user_id: &Uuid) -> Result<Vec<Order>> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .iter()
            .filter(|o| o.user_id == *user_id)
            .cloned()
            .collect())
    }

    async fn get_orders_by_subscription(&self, subscription_id: &Uuid) -> Result<Vec<Order>> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .iter()
            .filter(|o| o.subscription_id == Some(*subscription_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl NotificationRepository for MemoryStore {
    async fn create_notification(&self, notification: &Notification) -> Result<Notification> {
        self.notifications.lock().unwrap().push(notification.clone());
        Ok(notification.clone())
    }

    async fn get_notifications_by_user(&self, user_id: &Uuid) -> Result<Vec<Notification>> {
        Ok(self
            .notifications
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.user_id == *user_id)
            .cloned()
            .collect())
    }

    async fn mark_notification_read(&self, notification_id: &Uuid) -> Result<Option<Notification>> {
        let mut notifications = self.notifications.lock().unwrap();
        Ok(notifications
            .iter_mut()
            .find(|n| n.id == *notification_id)
            .map(|n| {
                n.read = true;
                n.clone()
            }))
    }
}

pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<EmailMessage>>,
    pub fail: bool,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &EmailMessage) -> Result<()> {
        if self.fail {
            return Err(anyhow!("mail relay unavailable"));
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

pub fn sample_product(business_id: Uuid) -> Product {
    let now = Utc::now();
    Product {
        id: Uuid::new_v4(),
        business_id,
        name: "Sourdough loaf".to_string(),
        description: Some("Baked daily".to_string()),
        price: Decimal::new(4500, 2),
        is_available: true,
        created_at: now,
        updated_at: now,
    }
}

pub fn sample_address() -> DeliveryAddress {
    DeliveryAddress {
        street: "12 Long Street".to_string(),
        city: "Cape Town".to_string(),
        postal_code: "8001".to_string(),
        instructions: None,
    }
}

/// Active subscription for two loaves, first delivery at `start`.
pub fn sample_subscription(user_id: Uuid, frequency: Frequency, start: DateTime<Utc>) -> Subscription {
    Subscription {
        id: Uuid::new_v4(),
        user_id,
        business_id: Uuid::new_v4(),
        name: "Bread run".to_string(),
        items: vec![SubscriptionItem {
            product_id: Uuid::new_v4(),
            name: "Sourdough loaf".to_string(),
            quantity: 2,
            price: Decimal::new(4500, 2),
        }],
        frequency,
        start_date: start,
        end_date: None,
        is_active: true,
        is_paused: false,
        paused_until: None,
        pause_reason: None,
        next_delivery_date: start,
        last_order_date: None,
        total_orders: 0,
        total_spent: Decimal::ZERO,
        delivery_days: Vec::new(),
        delivery_address: sample_address(),
        delivery_time: Some("08:00-10:00".to_string()),
        payment_method: PaymentMethod::Card,
        contact_email: None,
        notes: None,
        created_at: start,
        updated_at: start,
    }
}
