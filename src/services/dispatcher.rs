use std::sync::Arc;

use crate::models::notification::{Notification, Outbound};
use crate::services::clock::Clock;
use crate::services::mailer::Mailer;
use crate::services::repository::NotificationRepository;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    pub notifications: usize,
    pub emails: usize,
    pub failures: usize,
}

/// Delivers outbound messages. Delivery failures are logged and counted,
/// never returned to whoever produced the messages.
#[derive(Clone)]
pub struct Dispatcher {
    notifications: Arc<dyn NotificationRepository>,
    mailer: Arc<dyn Mailer>,
    clock: Arc<dyn Clock>,
}

impl Dispatcher {
    pub fn new(
        notifications: Arc<dyn NotificationRepository>,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            notifications,
            mailer,
            clock,
        }
    }

    pub async fn dispatch(&self, messages: Vec<Outbound>) -> DispatchSummary {
        let mut summary = DispatchSummary::default();

        for message in messages {
            match message {
                Outbound::Notification(new) => {
                    let user_id = new.user_id;
                    let notification = Notification::new(new, self.clock.now());
                    match self.notifications.create_notification(&notification).await {
                        Ok(_) => summary.notifications += 1,
                        Err(e) => {
                            log::error!("Failed to store notification for user {}: {}", user_id, e);
                            summary.failures += 1;
                        }
                    }
                }
                Outbound::Email(email) => match self.mailer.send(&email).await {
                    Ok(()) => summary.emails += 1,
                    Err(e) => {
                        log::error!("Failed to send email \"{}\" to {}: {}", email.subject, email.to, e);
                        summary.failures += 1;
                    }
                },
            }
        }

        summary
    }
}
