use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;
use rust_decimal::Decimal;

use crate::models::order::Order;
use crate::models::subscription::Subscription;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Subscription,
    Order,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn new(new: NewNotification, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            kind: new.kind,
            title: new.title,
            message: new.message,
            read: false,
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// A side effect produced by an operation, delivered later by the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Notification(NewNotification),
    Email(EmailMessage),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionEvent {
    Created,
    Paused,
    Resumed,
    Cancelled,
    OrderPlaced { order_id: Uuid, total: Decimal },
}

impl SubscriptionEvent {
    fn title(&self) -> &'static str {
        match self {
            SubscriptionEvent::Created => "Subscription created",
            SubscriptionEvent::Paused => "Subscription paused",
            SubscriptionEvent::Resumed => "Subscription resumed",
            SubscriptionEvent::Cancelled => "Subscription cancelled",
            SubscriptionEvent::OrderPlaced { .. } => "Subscription order placed",
        }
    }

    fn kind(&self) -> NotificationKind {
        match self {
            SubscriptionEvent::OrderPlaced { .. } => NotificationKind::Order,
            _ => NotificationKind::Subscription,
        }
    }
}

impl From<&Order> for SubscriptionEvent {
    fn from(order: &Order) -> Self {
        SubscriptionEvent::OrderPlaced {
            order_id: order.id,
            total: order.total_amount,
        }
    }
}

/// One in-app notification for the owner, plus an email when the
/// subscription carries a contact address.
pub fn subscription_messages(subscription: &Subscription, event: &SubscriptionEvent) -> Vec<Outbound> {
    let message = match event {
        SubscriptionEvent::Created => format!(
            "Your {} subscription \"{}\" starts on {}.",
            subscription.frequency,
            subscription.name,
            subscription.next_delivery_date.format("%Y-%m-%d")
        ),
        SubscriptionEvent::Paused => match subscription.paused_until {
            Some(until) => format!(
                "Your {} subscription \"{}\" is paused until {}.",
                subscription.frequency,
                subscription.name,
                until.format("%Y-%m-%d")
            ),
            None => format!(
                "Your {} subscription \"{}\" is paused.",
                subscription.frequency, subscription.name
            ),
        },
        SubscriptionEvent::Resumed => format!(
            "Your {} subscription \"{}\" is active again. Next delivery: {}.",
            subscription.frequency,
            subscription.name,
            subscription.next_delivery_date.format("%Y-%m-%d")
        ),
        SubscriptionEvent::Cancelled => format!(
            "Your {} subscription \"{}\" has been cancelled.",
            subscription.frequency, subscription.name
        ),
        SubscriptionEvent::OrderPlaced { total, .. } => format!(
            "Your {} subscription \"{}\" has generated a new order of {}.",
            subscription.frequency, subscription.name, total
        ),
    };

    let mut outbound = vec![Outbound::Notification(NewNotification {
        user_id: subscription.user_id,
        kind: event.kind(),
        title: event.title().to_string(),
        message: message.clone(),
    })];

    if let Some(to) = &subscription.contact_email {
        let body = match event {
            SubscriptionEvent::OrderPlaced { order_id, .. } => format!(
                "{}\n\nOrder reference: {}\nDelivery address: {}",
                message, order_id, subscription.delivery_address
            ),
            _ => message,
        };
        outbound.push(Outbound::Email(EmailMessage {
            to: to.clone(),
            subject: event.title().to_string(),
            body,
        }));
    }

    outbound
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_subscription;
    use crate::models::subscription::Frequency;

    #[test]
    fn test_order_placed_message_names_subscription_and_frequency() {
        let subscription = sample_subscription(Uuid::new_v4(), Frequency::Weekly, Utc::now());
        let event = SubscriptionEvent::OrderPlaced {
            order_id: Uuid::new_v4(),
            total: Decimal::new(9000, 2),
        };

        let outbound = subscription_messages(&subscription, &event);
        assert_eq!(outbound.len(), 1);
        match &outbound[0] {
            Outbound::Notification(n) => {
                assert_eq!(n.user_id, subscription.user_id);
                assert_eq!(n.kind, NotificationKind::Order);
                assert_eq!(n.title, "Subscription order placed");
                assert!(n.message.contains("weekly"));
                assert!(n.message.contains(&subscription.name));
            }
            other => panic!("unexpected outbound message: {:?}", other),
        }
    }

    #[test]
    fn test_email_only_with_contact_address() {
        let mut subscription = sample_subscription(Uuid::new_v4(), Frequency::Daily, Utc::now());
        subscription.contact_email = Some("thandi@example.com".to_string());

        let outbound = subscription_messages(&subscription, &SubscriptionEvent::Cancelled);
        assert_eq!(outbound.len(), 2);
        assert!(matches!(
            &outbound[1],
            Outbound::Email(email) if email.to == "thandi@example.com" && email.subject == "Subscription cancelled"
        ));
    }
}
