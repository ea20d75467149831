pub mod health;
pub mod notifications;
pub mod orders;
pub mod products;
pub mod subscriptions;

use actix_web::{error::InternalError, web, HttpResponse};

use crate::models::common::ApiResponse;

/// Mounts the `/api/v1` surface. Literal segments (`/user/..`, `/business/..`)
/// are registered ahead of the `/{id}` routes they would otherwise collide with.
pub fn configure(cfg: &mut web::ServiceConfig) {
    let json = web::JsonConfig::default().error_handler(|err, _req| {
        let response = HttpResponse::BadRequest().json(ApiResponse::<()>::error(err.to_string()));
        InternalError::from_response(err, response).into()
    });

    cfg.service(
        web::scope("/api/v1")
            .app_data(json)
            .service(
                web::scope("/products")
                    .service(products::create_product)
                    .service(products::list_business_products)
                    .service(products::get_product)
            )
            .service(
                web::scope("/subscriptions")
                    .service(subscriptions::create_subscription)
                    .service(subscriptions::list_user_subscriptions)
                    .service(subscriptions::get_subscription_status)
                    .service(subscriptions::get_subscription_orders)
                    .service(subscriptions::pause_subscription)
                    .service(subscriptions::resume_subscription)
                    .service(subscriptions::cancel_subscription)
                    .service(subscriptions::get_subscription)
                    .service(subscriptions::update_subscription)
            )
            .service(
                web::scope("/orders")
                    .service(orders::list_user_orders)
                    .service(orders::get_order)
            )
            .service(
                web::scope("/notifications")
                    .service(notifications::get_notifications)
                    .service(notifications::mark_notification_read)
            )
            .route("/health", web::get().to(health::health_check))
    );
}
