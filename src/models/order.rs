use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;
use rust_decimal::Decimal;

use crate::models::common::{DeliveryAddress, PaymentMethod};
use crate::models::subscription::{Subscription, SubscriptionItem};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    OutForDelivery,
    Delivered,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub name: String,
    pub quantity: u32,
    pub price: Decimal,
}

impl From<&SubscriptionItem> for OrderItem {
    fn from(item: &SubscriptionItem) -> Self {
        Self {
            product_id: item.product_id,
            name: item.name.clone(),
            quantity: item.quantity,
            price: item.price,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub business_id: Uuid,
    pub subscription_id: Option<Uuid>,
    pub items: Vec<OrderItem>,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub delivery_address: DeliveryAddress,
    pub delivery_time: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Order for one delivery cycle of `subscription`, confirmed up front.
    pub fn from_subscription(subscription: &Subscription, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: subscription.user_id,
            business_id: subscription.business_id,
            subscription_id: Some(subscription.id),
            items: subscription.items.iter().map(OrderItem::from).collect(),
            total_amount: subscription.order_total(),
            status: OrderStatus::Confirmed,
            payment_method: subscription.payment_method,
            payment_status: PaymentStatus::Pending,
            delivery_address: subscription.delivery_address.clone(),
            delivery_time: subscription.delivery_time.clone(),
            notes: Some(format!("Subscription order: {}", subscription.name)),
            created_at: now,
            updated_at: now,
        }
    }
}
