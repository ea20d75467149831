pub mod clock;
pub mod database;
pub mod dispatcher;
pub mod mailer;
pub mod repository;
pub mod subscriptions;
