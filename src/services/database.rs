use surrealdb::{Surreal, engine::any::{self, Any}, opt::auth::Root, sql::Datetime};
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::DatabaseConfig;
use crate::models::{
    notification::Notification,
    order::Order,
    product::Product,
    subscription::Subscription,
};
use crate::services::repository::{
    sort_due, NotificationRepository, OrderRepository, ProductRepository, SubscriptionRepository,
};

const SUBSCRIPTIONS: &str = "subscriptions";
const PRODUCTS: &str = "products";
const ORDERS: &str = "orders";
const NOTIFICATIONS: &str = "notifications";

const CREATE_SUBSCRIPTION: &str = "CREATE type::thing($tb, $id) SET doc = $doc, due_at = $due_at";
const UPDATE_SUBSCRIPTION: &str = "UPDATE type::thing($tb, $id) SET doc = $doc, due_at = $due_at";

/// Document store over SurrealDB. Each record keeps the serialized model
/// under `doc`, keyed by `table:<uuid>`. Subscriptions also carry `due_at`,
/// a native datetime copy of the next delivery date used by the due query.
#[derive(Clone)]
pub struct DatabaseService {
    db: Surreal<Any>,
}

impl DatabaseService {
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let db = any::connect(config.url.as_str()).await?;

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            db.signin(Root {
                username: username.as_str(),
                password: password.as_str(),
            })
            .await?;
        }

        db.use_ns(config.namespace.as_str()).use_db(config.database.as_str()).await?;

        let service = Self { db };
        service.initialize_schema().await?;

        log::info!("Connected to document store at {}", config.url);
        Ok(service)
    }

    async fn initialize_schema(&self) -> Result<()> {
        self.db
            .query(
                "
                DEFINE TABLE subscriptions SCHEMALESS;
                DEFINE INDEX subscriptions_user ON subscriptions FIELDS doc.user_id;
                DEFINE INDEX subscriptions_due ON subscriptions FIELDS due_at;
                DEFINE TABLE products SCHEMALESS;
                DEFINE INDEX products_business ON products FIELDS doc.business_id;
                DEFINE TABLE orders SCHEMALESS;
                DEFINE INDEX orders_user ON orders FIELDS doc.user_id;
                DEFINE INDEX orders_subscription ON orders FIELDS doc.subscription_id;
                DEFINE TABLE notifications SCHEMALESS;
                DEFINE INDEX notifications_user ON notifications FIELDS doc.user_id;
            ",
            )
            .await?
            .check()?;

        log::info!("Database schema initialized successfully");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<()> {
        self.db.health().await?;
        Ok(())
    }

    async fn insert<T: Serialize>(&self, table: &str, id: &Uuid, record: &T) -> Result<()> {
        let doc = serde_json::to_value(record)?;
        self.db
            .query("CREATE type::thing($tb, $id) SET doc = $doc")
            .bind(("tb", table.to_string()))
            .bind(("id", id.to_string()))
            .bind(("doc", doc))
            .await?
            .check()
            .map_err(|e| anyhow!("Failed to create {} record {}: {}", table, id, e))?;
        Ok(())
    }

    async fn replace<T: Serialize>(&self, table: &str, id: &Uuid, record: &T) -> Result<()> {
        let doc = serde_json::to_value(record)?;
        self.db
            .query("UPDATE type::thing($tb, $id) SET doc = $doc")
            .bind(("tb", table.to_string()))
            .bind(("id", id.to_string()))
            .bind(("doc", doc))
            .await?
            .check()
            .map_err(|e| anyhow!("Failed to update {} record {}: {}", table, id, e))?;
        Ok(())
    }

    async fn write_subscription(&self, statement: &str, subscription: &Subscription) -> Result<()> {
        let doc = serde_json::to_value(subscription)?;
        self.db
            .query(statement)
            .bind(("tb", SUBSCRIPTIONS))
            .bind(("id", subscription.id.to_string()))
            .bind(("doc", doc))
            .bind(("due_at", Datetime::from(subscription.next_delivery_date)))
            .await?
            .check()
            .map_err(|e| anyhow!("Failed to write subscription {}: {}", subscription.id, e))?;
        Ok(())
    }

    async fn fetch<T: DeserializeOwned>(&self, table: &str, id: &Uuid) -> Result<Option<T>> {
        let docs: Vec<serde_json::Value> = self.db
            .query("SELECT VALUE doc FROM type::thing($tb, $id)")
            .bind(("tb", table.to_string()))
            .bind(("id", id.to_string()))
            .await?
            .take(0)?;

        docs.into_iter()
            .next()
            .map(|doc| serde_json::from_value(doc).map_err(Into::into))
            .transpose()
    }

    async fn fetch_where<T: DeserializeOwned>(&self, sql: &str, field: &str, value: String) -> Result<Vec<T>> {
        let docs: Vec<serde_json::Value> = self.db
            .query(sql)
            .bind((field.to_string(), value))
            .await?
            .take(0)?;

        docs.into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(Into::into))
            .collect()
    }
}

#[async_trait]
impl SubscriptionRepository for DatabaseService {
    async fn create_subscription(&self, subscription: &Subscription) -> Result<Subscription> {
        self.write_subscription(CREATE_SUBSCRIPTION, subscription).await?;
        Ok(subscription.clone())
    }

    async fn get_subscription(&self, subscription_id: &Uuid) -> Result<Option<Subscription>> {
        self.fetch(SUBSCRIPTIONS, subscription_id).await
    }

    async fn update_subscription(&self, subscription: &Subscription) -> Result<Subscription> {
        self.write_subscription(UPDATE_SUBSCRIPTION, subscription).await?;
        Ok(subscription.clone())
    }

    async fn get_subscriptions_by_user(&self, user_id: &Uuid) -> Result<Vec<Subscription>> {
        let mut subscriptions: Vec<Subscription> = self
            .fetch_where(
                "SELECT VALUE doc FROM subscriptions WHERE doc.user_id = $user_id",
                "user_id",
                user_id.to_string(),
            )
            .await?;
        subscriptions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(subscriptions)
    }

    async fn get_due_subscriptions(&self, now: DateTime<Utc>) -> Result<Vec<Subscription>> {
        let docs: Vec<serde_json::Value> = self.db
            .query(
                "SELECT VALUE doc FROM subscriptions \
                 WHERE doc.is_active = true AND doc.is_paused = false AND due_at <= $now",
            )
            .bind(("now", Datetime::from(now)))
            .await?
            .take(0)?;

        let mut due = docs
            .into_iter()
            .map(serde_json::from_value::<Subscription>)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        sort_due(&mut due);
        Ok(due)
    }
}

#[async_trait]
impl ProductRepository for DatabaseService {
    async fn create_product(&self, product: &Product) -> Result<Product> {
        self.insert(PRODUCTS, &product.id, product).await?;
        Ok(product.clone())
    }

    async fn get_product(&self, product_id: &Uuid) -> Result<Option<Product>> {
        self.fetch(PRODUCTS, product_id).await
    }

    async fn get_products_by_business(&self, business_id: &Uuid) -> Result<Vec<Product>> {
        let mut products: Vec<Product> = self
            .fetch_where(
                "SELECT VALUE doc FROM products WHERE doc.business_id = $business_id",
                "business_id",
                business_id.to_string(),
            )
            .await?;
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }
}

#[async_trait]
impl OrderRepository for DatabaseService {
    async fn create_order(&self, order: &Order) -> Result<Order> {
        self.insert(ORDERS, &order.id, order).await?;
        Ok(order.clone())
    }

    async fn get_order(&self, order_id: &Uuid) -> Result<Option<Order>> {
        self.fetch(ORDERS, order_id).await
    }

    async fn get_orders_by_user(&self, user_id: &Uuid) -> Result<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .fetch_where(
                "SELECT VALUE doc FROM orders WHERE doc.user_id = $user_id",
                "user_id",
                user_id.to_string(),
            )
            .await?;
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn get_orders_by_subscription(&self, subscription_id: &Uuid) -> Result<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .fetch_where(
                "SELECT VALUE doc FROM orders WHERE doc.subscription_id = $subscription_id",
                "subscription_id",
                subscription_id.to_string(),
            )
            .await?;
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }
}

#[async_trait]
impl NotificationRepository for DatabaseService {
    async fn create_notification(&self, notification: &Notification) -> Result<Notification> {
        self.insert(NOTIFICATIONS, &notification.id, notification).await?;
        Ok(notification.clone())
    }

    async fn get_notifications_by_user(&self, user_id: &Uuid) -> Result<Vec<Notification>> {
        let mut notifications: Vec<Notification> = self
            .fetch_where(
                "SELECT VALUE doc FROM notifications WHERE doc.user_id = $user_id",
                "user_id",
                user_id.to_string(),
            )
            .await?;
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notifications)
    }

    async fn mark_notification_read(&self, notification_id: &Uuid) -> Result<Option<Notification>> {
        let Some(mut notification) = self.fetch::<Notification>(NOTIFICATIONS, notification_id).await? else {
            return Ok(None);
        };
        notification.read = true;
        self.replace(NOTIFICATIONS, notification_id, &notification).await?;
        Ok(Some(notification))
    }
}
