use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::models::{
    notification::{subscription_messages, Outbound, SubscriptionEvent},
    order::Order,
    subscription::Subscription,
};
use crate::services::{
    clock::Clock,
    dispatcher::Dispatcher,
    repository::{OrderRepository, SubscriptionRepository},
};

#[derive(Debug, Clone, PartialEq)]
pub struct SweepFailure {
    pub subscription_id: Uuid,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct SweepReport {
    pub ran_at: DateTime<Utc>,
    /// (subscription, order) pairs created this tick.
    pub fulfilled: Vec<(Uuid, Uuid)>,
    /// Candidates left alone: not due today (weekday gate), or paused or
    /// cancelled while their order was being placed.
    pub skipped: Vec<Uuid>,
    pub failed: Vec<SweepFailure>,
    pub outbound: Vec<Outbound>,
}

impl SweepReport {
    fn new(ran_at: DateTime<Utc>) -> Self {
        Self {
            ran_at,
            fulfilled: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
            outbound: Vec::new(),
        }
    }
}

/// Scans due subscriptions and generates one order per due cycle.
///
/// Subscriptions are processed one after another. A failure on one of them
/// is recorded and the sweep moves on; the failed subscription keeps its
/// schedule and is picked up again on the next tick.
#[derive(Clone)]
pub struct RecurrenceSweep {
    subscriptions: Arc<dyn SubscriptionRepository>,
    orders: Arc<dyn OrderRepository>,
    clock: Arc<dyn Clock>,
}

impl RecurrenceSweep {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        orders: Arc<dyn OrderRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            subscriptions,
            orders,
            clock,
        }
    }

    /// One sweep. Errors only when the candidate query itself fails.
    pub async fn run_once(&self) -> Result<SweepReport> {
        let now = self.clock.now();
        let candidates = self.subscriptions.get_due_subscriptions(now).await?;
        let mut report = SweepReport::new(now);

        log::debug!("Recurrence sweep at {}: {} candidate(s)", now, candidates.len());

        for subscription in candidates {
            if !subscription.is_due(now) {
                log::debug!("Subscription {} has no delivery on {}", subscription.id, now.format("%A"));
                report.skipped.push(subscription.id);
                continue;
            }
            self.fulfill(subscription, now, &mut report).await;
        }

        Ok(report)
    }

    async fn fulfill(&self, subscription: Subscription, now: DateTime<Utc>, report: &mut SweepReport) {
        let order = Order::from_subscription(&subscription, now);

        let order = match self.orders.create_order(&order).await {
            Ok(order) => order,
            Err(e) => {
                log::error!("Failed to create order for subscription {}: {}", subscription.id, e);
                report.failed.push(SweepFailure {
                    subscription_id: subscription.id,
                    error: e.to_string(),
                });
                return;
            }
        };

        report.outbound.extend(subscription_messages(&subscription, &SubscriptionEvent::from(&order)));

        // reload so a pause or cancel made while the order was written is kept
        let mut current = match self.subscriptions.get_subscription(&subscription.id).await {
            Ok(Some(current)) if current.is_active && !current.is_paused => current,
            Ok(_) => {
                log::warn!(
                    "Subscription {} was paused or cancelled while order {} was placed; schedule left as is",
                    subscription.id, order.id
                );
                report.skipped.push(subscription.id);
                return;
            }
            Err(e) => {
                log::error!(
                    "Order {} created but subscription {} could not be reloaded: {}",
                    order.id, subscription.id, e
                );
                report.failed.push(SweepFailure {
                    subscription_id: subscription.id,
                    error: e.to_string(),
                });
                return;
            }
        };

        current.record_fulfillment(now, order.total_amount);
        match self.subscriptions.update_subscription(&current).await {
            Ok(updated) => {
                log::info!(
                    "Created order {} for subscription {}, next delivery {}",
                    order.id, updated.id, updated.next_delivery_date
                );
                report.fulfilled.push((updated.id, order.id));
            }
            Err(e) => {
                // the order exists but the schedule did not move, so the next tick repeats it
                log::error!(
                    "Order {} created but subscription {} was not advanced: {}",
                    order.id, subscription.id, e
                );
                report.failed.push(SweepFailure {
                    subscription_id: subscription.id,
                    error: e.to_string(),
                });
            }
        }
    }

    /// Runs the sweep every `every`, handing each tick's messages to the
    /// dispatcher. Ticks missed while a sweep is still running are dropped.
    pub fn spawn(self, every: Duration, dispatcher: Dispatcher) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            log::info!("Recurrence sweep scheduled every {:?}", every);
            loop {
                interval.tick().await;

                match self.run_once().await {
                    Ok(report) => {
                        if !report.fulfilled.is_empty() || !report.failed.is_empty() {
                            log::info!(
                                "Recurrence sweep: {} fulfilled, {} skipped, {} failed",
                                report.fulfilled.len(),
                                report.skipped.len(),
                                report.failed.len()
                            );
                        }
                        if !report.outbound.is_empty() {
                            dispatcher.dispatch(report.outbound).await;
                        }
                    }
                    Err(e) => log::error!("Recurrence sweep aborted: {:#}", e),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use crate::models::subscription::{DeliveryDay, Frequency};
    use crate::services::repository::NotificationRepository;
    use crate::testing::{sample_subscription, FixedClock, MemoryStore, RecordingMailer};

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    /// Rejects orders for the listed subscriptions, delegates everything else.
    struct FlakyOrders {
        inner: Arc<MemoryStore>,
        reject: HashSet<Uuid>,
    }

    #[async_trait]
    impl OrderRepository for FlakyOrders {
        async fn create_order(&self, order: &Order) -> Result<Order> {
            match order.subscription_id {
                Some(id) if self.reject.contains(&id) => Err(anyhow!("order collection unavailable")),
                _ => self.inner.create_order(order).await,
            }
        }

        async fn get_order(&self, order_id: &Uuid) -> Result<Option<Order>> {
            self.inner.get_order(order_id).await
        }

        async fn get_orders_by_user(&self, user_id: &Uuid) -> Result<Vec<Order>> {
            self.inner.get_orders_by_user(user_id).await
        }

        async fn get_orders_by_subscription(&self, subscription_id: &Uuid) -> Result<Vec<Order>> {
            self.inner.get_orders_by_subscription(subscription_id).await
        }
    }

    struct BrokenSubscriptions;

    #[async_trait]
    impl SubscriptionRepository for BrokenSubscriptions {
        async fn create_subscription(&self, _: &Subscription) -> Result<Subscription> {
            Err(anyhow!("database offline"))
        }

        async fn get_subscription(&self, _: &Uuid) -> Result<Option<Subscription>> {
            Err(anyhow!("database offline"))
        }

        async fn update_subscription(&self, _: &Subscription) -> Result<Subscription> {
            Err(anyhow!("database offline"))
        }

        async fn get_subscriptions_by_user(&self, _: &Uuid) -> Result<Vec<Subscription>> {
            Err(anyhow!("database offline"))
        }

        async fn get_due_subscriptions(&self, _: DateTime<Utc>) -> Result<Vec<Subscription>> {
            Err(anyhow!("database offline"))
        }
    }

    /// Cancels the subscription while its order is being written.
    struct CancelDuringOrder {
        inner: Arc<MemoryStore>,
    }

    #[async_trait]
    impl OrderRepository for CancelDuringOrder {
        async fn create_order(&self, order: &Order) -> Result<Order> {
            if let Some(id) = order.subscription_id {
                let mut subscription = self.inner.get_subscription(&id).await?.unwrap();
                subscription.cancel(order.created_at)?;
                self.inner.update_subscription(&subscription).await?;
            }
            self.inner.create_order(order).await
        }

        async fn get_order(&self, order_id: &Uuid) -> Result<Option<Order>> {
            self.inner.get_order(order_id).await
        }

        async fn get_orders_by_user(&self, user_id: &Uuid) -> Result<Vec<Order>> {
            self.inner.get_orders_by_user(user_id).await
        }

        async fn get_orders_by_subscription(&self, subscription_id: &Uuid) -> Result<Vec<Order>> {
            self.inner.get_orders_by_subscription(subscription_id).await
        }
    }

    async fn seed(store: &MemoryStore, subscription: Subscription) -> Subscription {
        store.create_subscription(&subscription).await.unwrap()
    }

    fn sweep(store: &Arc<MemoryStore>, clock: &Arc<FixedClock>) -> RecurrenceSweep {
        RecurrenceSweep::new(store.clone(), store.clone(), clock.clone())
    }

    #[tokio::test]
    async fn test_daily_subscription_advances_after_fulfillment() {
        let store = Arc::new(MemoryStore::default());
        let swept_at = at(2024, 1, 1, 6);
        let clock = Arc::new(FixedClock::new(swept_at));
        let subscription = seed(&store, sample_subscription(Uuid::new_v4(), Frequency::Daily, at(2024, 1, 1, 0))).await;
        assert_eq!(subscription.next_delivery_date, at(2024, 1, 1, 0));

        let report = sweep(&store, &clock).run_once().await.unwrap();
        assert_eq!(report.fulfilled.len(), 1);
        assert!(report.failed.is_empty());

        let updated = store.get_subscription(&subscription.id).await.unwrap().unwrap();
        assert_eq!(updated.next_delivery_date, at(2024, 1, 2, 0));
        assert_eq!(updated.total_orders, 1);
        assert_eq!(updated.last_order_date, Some(swept_at));

        let orders = store.get_orders_by_subscription(&subscription.id).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].id, report.fulfilled[0].1);
        assert_eq!(orders[0].created_at, swept_at);
    }

    #[tokio::test]
    async fn test_one_notification_per_order() {
        let store = Arc::new(MemoryStore::default());
        let clock = Arc::new(FixedClock::new(at(2024, 1, 1, 6)));
        let user_id = Uuid::new_v4();
        let subscription = seed(&store, sample_subscription(user_id, Frequency::Monthly, at(2024, 1, 1, 0))).await;

        let report = sweep(&store, &clock).run_once().await.unwrap();
        assert_eq!(report.outbound.len(), 1);
        match &report.outbound[0] {
            Outbound::Notification(n) => {
                assert_eq!(n.user_id, user_id);
                assert!(n.message.contains(&subscription.name));
                assert!(n.message.contains("monthly"));
            }
            other => panic!("unexpected outbound message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_second_sweep_in_same_cycle_does_nothing() {
        let store = Arc::new(MemoryStore::default());
        let clock = Arc::new(FixedClock::new(at(2024, 1, 1, 6)));
        seed(&store, sample_subscription(Uuid::new_v4(), Frequency::Daily, at(2024, 1, 1, 0))).await;
        let sweep = sweep(&store, &clock);

        assert_eq!(sweep.run_once().await.unwrap().fulfilled.len(), 1);
        clock.advance(ChronoDuration::hours(1));
        assert!(sweep.run_once().await.unwrap().fulfilled.is_empty());
        assert_eq!(store.orders.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_paused_cancelled_and_future_are_ignored() {
        let store = Arc::new(MemoryStore::default());
        let now = at(2024, 2, 1, 6);
        let clock = Arc::new(FixedClock::new(now));
        let user_id = Uuid::new_v4();

        let mut paused = sample_subscription(user_id, Frequency::Daily, at(2024, 1, 1, 0));
        paused.pause(None, Some(at(2024, 1, 15, 0)), now).unwrap();
        let mut cancelled = sample_subscription(user_id, Frequency::Daily, at(2024, 1, 1, 0));
        cancelled.cancel(now).unwrap();
        let future = sample_subscription(user_id, Frequency::Daily, at(2024, 2, 2, 0));
        for subscription in [paused, cancelled, future] {
            seed(&store, subscription).await;
        }

        let report = sweep(&store, &clock).run_once().await.unwrap();
        assert!(report.fulfilled.is_empty());
        assert!(report.skipped.is_empty());
        assert!(store.orders.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_weekly_delivery_days_are_honoured_by_sweep() {
        let store = Arc::new(MemoryStore::default());
        // 2024-01-02 is a Tuesday
        let clock = Arc::new(FixedClock::new(at(2024, 1, 2, 6)));
        let mut subscription = sample_subscription(Uuid::new_v4(), Frequency::Weekly, at(2024, 1, 1, 0));
        subscription.delivery_days = vec![DeliveryDay::Monday];
        let subscription = seed(&store, subscription).await;
        let sweep = sweep(&store, &clock);

        let report = sweep.run_once().await.unwrap();
        assert_eq!(report.skipped, vec![subscription.id]);
        assert!(report.fulfilled.is_empty());

        // next Monday it fires and moves on by a week
        clock.set(at(2024, 1, 8, 6));
        let report = sweep.run_once().await.unwrap();
        assert_eq!(report.fulfilled.len(), 1);
        let updated = store.get_subscription(&subscription.id).await.unwrap().unwrap();
        assert_eq!(updated.next_delivery_date, at(2024, 1, 8, 0));
    }

    #[tokio::test]
    async fn test_failed_order_leaves_subscription_untouched() {
        let store = Arc::new(MemoryStore::default());
        let clock = Arc::new(FixedClock::new(at(2024, 1, 1, 6)));
        let a = seed(&store, sample_subscription(Uuid::new_v4(), Frequency::Daily, at(2024, 1, 1, 0))).await;
        let b = seed(&store, sample_subscription(Uuid::new_v4(), Frequency::Daily, at(2024, 1, 1, 1))).await;

        let orders = Arc::new(FlakyOrders {
            inner: store.clone(),
            reject: HashSet::from([a.id]),
        });
        let sweep = RecurrenceSweep::new(store.clone(), orders, clock.clone());

        let report = sweep.run_once().await.unwrap();
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].subscription_id, a.id);
        assert_eq!(report.fulfilled.len(), 1);
        assert_eq!(report.fulfilled[0].0, b.id);
        assert_eq!(report.outbound.len(), 1);

        let a_after = store.get_subscription(&a.id).await.unwrap().unwrap();
        assert_eq!(a_after, a);

        let b_after = store.get_subscription(&b.id).await.unwrap().unwrap();
        assert_eq!(b_after.next_delivery_date, at(2024, 1, 2, 1));
        assert_eq!(b_after.total_orders, 1);

        // A is retried on the next tick
        let candidates = store.get_due_subscriptions(clock.now()).await.unwrap();
        assert_eq!(candidates.iter().map(|s| s.id).collect::<Vec<_>>(), vec![a.id]);
    }

    #[tokio::test]
    async fn test_candidate_query_failure_aborts_tick() {
        let store = Arc::new(MemoryStore::default());
        let clock = Arc::new(FixedClock::new(at(2024, 1, 1, 6)));
        let sweep = RecurrenceSweep::new(Arc::new(BrokenSubscriptions), store.clone(), clock);

        assert!(sweep.run_once().await.is_err());
        assert!(store.orders.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_due_selection_is_idempotent() {
        let store = Arc::new(MemoryStore::default());
        let now = at(2024, 1, 5, 6);
        for day in 1..=4 {
            seed(&store, sample_subscription(Uuid::new_v4(), Frequency::Daily, at(2024, 1, day, 0))).await;
        }

        let first: Vec<Uuid> = store.get_due_subscriptions(now).await.unwrap().iter().map(|s| s.id).collect();
        let second: Vec<Uuid> = store.get_due_subscriptions(now).await.unwrap().iter().map(|s| s.id).collect();
        assert_eq!(first.len(), 4);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_spawned_sweep_dispatches_notifications() {
        let store = Arc::new(MemoryStore::default());
        let clock = Arc::new(FixedClock::new(at(2024, 1, 1, 6)));
        let user_id = Uuid::new_v4();
        seed(&store, sample_subscription(user_id, Frequency::Daily, at(2024, 1, 1, 0))).await;

        let dispatcher = Dispatcher::new(store.clone(), Arc::new(RecordingMailer::default()), clock.clone());
        let handle = sweep(&store, &clock).spawn(Duration::from_millis(20), dispatcher);

        let mut delivered = Vec::new();
        for _ in 0..50 {
            delivered = store.get_notifications_by_user(&user_id).await.unwrap();
            if !delivered.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        handle.abort();

        assert_eq!(delivered.len(), 1);
        assert_eq!(store.orders.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_during_sweep_is_not_overwritten() {
        let store = Arc::new(MemoryStore::default());
        let now = at(2024, 1, 1, 6);
        let clock = Arc::new(FixedClock::new(now));
        let subscription = seed(&store, sample_subscription(Uuid::new_v4(), Frequency::Daily, at(2024, 1, 1, 0))).await;

        let orders = Arc::new(CancelDuringOrder { inner: store.clone() });
        let report = RecurrenceSweep::new(store.clone(), orders, clock.clone()).run_once().await.unwrap();

        assert!(report.fulfilled.is_empty());
        assert!(report.failed.is_empty());
        assert_eq!(report.skipped, vec![subscription.id]);

        let stored = store.get_subscription(&subscription.id).await.unwrap().unwrap();
        assert!(!stored.is_active);
        assert_eq!(stored.end_date, Some(now));
        assert_eq!(stored.next_delivery_date, at(2024, 1, 1, 0));
        assert_eq!(stored.total_orders, 0);
        assert_eq!(store.orders.lock().unwrap().len(), 1);
    }
}
