use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Datelike, Duration, Months, Utc, Weekday};
use uuid::Uuid;
use rust_decimal::Decimal;
use regex::Regex;
use thiserror::Error;
use validator::{Validate, ValidationError};

use crate::models::common::{DeliveryAddress, PaymentMethod};
use crate::models::product::Product;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    /// Next occurrence after `from`. Monthly steps use calendar months and
    /// clamp to the end of shorter months (Jan 31 -> Feb 29 in a leap year).
    /// Saturates at the latest representable instant instead of overflowing.
    pub fn advance(&self, from: DateTime<Utc>) -> DateTime<Utc> {
        let next = match self {
            Frequency::Daily => from.checked_add_signed(Duration::days(1)),
            Frequency::Weekly => from.checked_add_signed(Duration::days(7)),
            Frequency::Monthly => from.checked_add_months(Months::new(1)),
        };
        next.unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Frequency::Daily => write!(f, "daily"),
            Frequency::Weekly => write!(f, "weekly"),
            Frequency::Monthly => write!(f, "monthly"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryDay {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl From<Weekday> for DeliveryDay {
    fn from(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Mon => DeliveryDay::Monday,
            Weekday::Tue => DeliveryDay::Tuesday,
            Weekday::Wed => DeliveryDay::Wednesday,
            Weekday::Thu => DeliveryDay::Thursday,
            Weekday::Fri => DeliveryDay::Friday,
            Weekday::Sat => DeliveryDay::Saturday,
            Weekday::Sun => DeliveryDay::Sunday,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionState {
    Active,
    Paused,
    Cancelled,
}

#[derive(Debug, Error, PartialEq)]
pub enum TransitionError {
    #[error("Subscription has been cancelled")]
    Cancelled,
    #[error("Subscription is already paused")]
    AlreadyPaused,
    #[error("Subscription is not paused")]
    NotPaused,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubscriptionItem {
    pub product_id: Uuid,
    pub name: String,
    pub quantity: u32,
    /// Unit price captured when the item was added to the subscription.
    pub price: Decimal,
}

impl SubscriptionItem {
    pub fn from_product(product: &Product, quantity: u32) -> Self {
        Self {
            product_id: product.id,
            name: product.name.clone(),
            quantity,
            price: product.price,
        }
    }

    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub business_id: Uuid,
    pub name: String,
    pub items: Vec<SubscriptionItem>,
    pub frequency: Frequency,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub is_paused: bool,
    pub paused_until: Option<DateTime<Utc>>,
    pub pause_reason: Option<String>,
    pub next_delivery_date: DateTime<Utc>,
    pub last_order_date: Option<DateTime<Utc>>,
    pub total_orders: u32,
    pub total_spent: Decimal,
    pub delivery_days: Vec<DeliveryDay>,
    pub delivery_address: DeliveryAddress,
    pub delivery_time: Option<String>,
    pub payment_method: PaymentMethod,
    pub contact_email: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionItemRequest {
    pub product_id: Uuid,
    pub quantity: u32,
}

/// How far ahead a subscription may be scheduled to start or end.
pub const MAX_SCHEDULE_LEAD_DAYS: i64 = 5 * 366;

#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_schedule"))]
pub struct CreateSubscriptionRequest {
    pub user_id: Uuid,
    pub business_id: Uuid,

    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: String,

    #[validate(length(min = 1, message = "At least one item is required"), custom = "validate_items")]
    pub items: Vec<SubscriptionItemRequest>,

    pub frequency: Frequency,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub delivery_days: Vec<DeliveryDay>,

    #[validate]
    pub delivery_address: DeliveryAddress,

    #[validate(custom = "validate_delivery_window")]
    pub delivery_time: Option<String>,

    pub payment_method: PaymentMethod,

    #[validate(email(message = "Invalid email format"))]
    pub contact_email: Option<String>,

    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateSubscriptionRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: Option<String>,

    #[validate(length(min = 1, message = "At least one item is required"), custom = "validate_items")]
    pub items: Option<Vec<SubscriptionItemRequest>>,

    pub frequency: Option<Frequency>,
    pub delivery_days: Option<Vec<DeliveryDay>>,

    #[validate]
    pub delivery_address: Option<DeliveryAddress>,

    #[validate(custom = "validate_delivery_window")]
    pub delivery_time: Option<String>,

    pub payment_method: Option<PaymentMethod>,

    #[validate(email(message = "Invalid email format"))]
    pub contact_email: Option<String>,

    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PauseSubscriptionRequest {
    pub reason: Option<String>,
    pub paused_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionStatusResponse {
    pub id: Uuid,
    pub name: String,
    pub state: SubscriptionState,
    pub frequency: Frequency,
    pub next_delivery_date: DateTime<Utc>,
    pub hours_until_next_delivery: i64,
    pub last_order_date: Option<DateTime<Utc>>,
    pub total_orders: u32,
    pub total_spent: Decimal,
    pub order_total: Decimal,
    pub is_due: bool,
    pub paused_until: Option<DateTime<Utc>>,
    pub pause_reason: Option<String>,
}

fn validate_items(items: &[SubscriptionItemRequest]) -> Result<(), ValidationError> {
    if items.iter().any(|item| item.quantity == 0 || item.quantity > 100) {
        let mut error = ValidationError::new("quantity_out_of_range");
        error.message = Some("Item quantity must be between 1 and 100".into());
        return Err(error);
    }
    Ok(())
}

fn validate_schedule(request: &CreateSubscriptionRequest) -> Result<(), ValidationError> {
    if let (Some(start), Some(end)) = (request.start_date, request.end_date) {
        if end < start {
            let mut error = ValidationError::new("end_before_start");
            error.message = Some("End date must not be before the start date".into());
            return Err(error);
        }
    }
    Ok(())
}

fn delivery_window_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([01]\d|2[0-3]):[0-5]\d-([01]\d|2[0-3]):[0-5]\d$")
            .expect("delivery window pattern is valid")
    })
}

/// Accepts windows such as `08:00-10:30`; the end must be after the start.
fn validate_delivery_window(window: &str) -> Result<(), ValidationError> {
    let invalid = || {
        let mut error = ValidationError::new("invalid_delivery_window");
        error.message = Some("Delivery time must look like HH:MM-HH:MM".into());
        error
    };

    if !delivery_window_pattern().is_match(window) {
        return Err(invalid());
    }
    let (start, end) = window.split_once('-').ok_or_else(invalid)?;
    if end <= start {
        return Err(invalid());
    }
    Ok(())
}

impl Subscription {
    pub fn new(request: CreateSubscriptionRequest, items: Vec<SubscriptionItem>, now: DateTime<Utc>) -> Self {
        let start_date = request.start_date.unwrap_or(now);
        Self {
            id: Uuid::new_v4(),
            user_id: request.user_id,
            business_id: request.business_id,
            name: request.name,
            items,
            frequency: request.frequency,
            start_date,
            end_date: request.end_date,
            is_active: true,
            is_paused: false,
            paused_until: None,
            pause_reason: None,
            next_delivery_date: start_date,
            last_order_date: None,
            total_orders: 0,
            total_spent: Decimal::ZERO,
            delivery_days: request.delivery_days,
            delivery_address: request.delivery_address,
            delivery_time: request.delivery_time,
            payment_method: request.payment_method,
            contact_email: request.contact_email,
            notes: request.notes,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn state(&self) -> SubscriptionState {
        if !self.is_active {
            SubscriptionState::Cancelled
        } else if self.is_paused {
            SubscriptionState::Paused
        } else {
            SubscriptionState::Active
        }
    }

    /// Whether the subscription should produce an order at `now`.
    ///
    /// Pause and cancellation always win. Weekly subscriptions with explicit
    /// delivery days also require `now` (UTC) to fall on one of those days;
    /// with no days configured only the date comparison applies.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if !self.is_active || self.is_paused {
            return false;
        }

        if self.frequency == Frequency::Weekly && !self.delivery_days.is_empty() {
            let today = DeliveryDay::from(now.weekday());
            return self.delivery_days.contains(&today) && now >= self.next_delivery_date;
        }

        now >= self.next_delivery_date
    }

    pub fn next_after_current(&self) -> DateTime<Utc> {
        self.frequency.advance(self.next_delivery_date)
    }

    pub fn order_total(&self) -> Decimal {
        self.items.iter().map(SubscriptionItem::line_total).sum()
    }

    pub fn pause(
        &mut self,
        reason: Option<String>,
        paused_until: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if !self.is_active {
            return Err(TransitionError::Cancelled);
        }
        if self.is_paused {
            return Err(TransitionError::AlreadyPaused);
        }

        // paused_until is informational; only an explicit resume lifts a pause
        self.is_paused = true;
        self.paused_until = paused_until;
        self.pause_reason = reason;
        self.updated_at = now;
        Ok(())
    }

    /// Lifts a pause and steps the schedule forward from the stored next
    /// delivery date, not from `now`, so missed cycles are not skipped.
    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if !self.is_active {
            return Err(TransitionError::Cancelled);
        }
        if !self.is_paused {
            return Err(TransitionError::NotPaused);
        }

        self.is_paused = false;
        self.paused_until = None;
        self.pause_reason = None;
        self.next_delivery_date = self.next_after_current();
        self.updated_at = now;
        Ok(())
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if !self.is_active {
            return Err(TransitionError::Cancelled);
        }

        self.is_active = false;
        self.end_date = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Bookkeeping after an order was generated for the current cycle.
    pub fn record_fulfillment(&mut self, now: DateTime<Utc>, order_total: Decimal) {
        self.last_order_date = Some(now);
        self.total_orders += 1;
        self.total_spent += order_total;
        self.next_delivery_date = self.next_after_current();
        self.updated_at = now;
    }

    pub fn apply_update(
        &mut self,
        request: UpdateSubscriptionRequest,
        items: Option<Vec<SubscriptionItem>>,
        now: DateTime<Utc>,
    ) {
        if let Some(name) = request.name {
            self.name = name;
        }
        if let Some(items) = items {
            self.items = items;
        }
        if let Some(frequency) = request.frequency {
            self.frequency = frequency;
        }
        if let Some(delivery_days) = request.delivery_days {
            self.delivery_days = delivery_days;
        }
        if let Some(address) = request.delivery_address {
            self.delivery_address = address;
        }
        if let Some(window) = request.delivery_time {
            self.delivery_time = Some(window);
        }
        if let Some(method) = request.payment_method {
            self.payment_method = method;
        }
        if let Some(email) = request.contact_email {
            self.contact_email = Some(email);
        }
        if let Some(notes) = request.notes {
            self.notes = Some(notes);
        }
        self.updated_at = now;
    }

    pub fn to_status_response(&self, now: DateTime<Utc>) -> SubscriptionStatusResponse {
        SubscriptionStatusResponse {
            id: self.id,
            name: self.name.clone(),
            state: self.state(),
            frequency: self.frequency,
            next_delivery_date: self.next_delivery_date,
            hours_until_next_delivery: self.next_delivery_date.signed_duration_since(now).num_hours(),
            last_order_date: self.last_order_date,
            total_orders: self.total_orders,
            total_spent: self.total_spent,
            order_total: self.order_total(),
            is_due: self.is_due(now),
            paused_until: self.paused_until,
            pause_reason: self.pause_reason.clone(),
        }
    }
}
