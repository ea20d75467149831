use actix_web::{HttpResponse, get, post, put};
use actix_web::web::{Data, Json, Path};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::common::ApiResponse;
use crate::models::subscription::{
    CreateSubscriptionRequest, PauseSubscriptionRequest, UpdateSubscriptionRequest,
};
use crate::state::AppState;

#[post("")]
pub async fn create_subscription(
    state: Data<AppState>,
    payload: Json<CreateSubscriptionRequest>,
) -> Result<HttpResponse, AppError> {
    let (subscription, outbound) = state.subscriptions.create(payload.into_inner()).await?;
    state.dispatcher.dispatch(outbound).await;

    Ok(HttpResponse::Created().json(ApiResponse::success(subscription)))
}

#[get("/user/{user_id}")]
pub async fn list_user_subscriptions(
    state: Data<AppState>,
    path: Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let subscriptions = state.subscriptions.list_by_user(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(subscriptions)))
}

#[get("/{subscription_id}")]
pub async fn get_subscription(
    state: Data<AppState>,
    path: Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let subscription = state.subscriptions.get(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(subscription)))
}

#[get("/{subscription_id}/status")]
pub async fn get_subscription_status(
    state: Data<AppState>,
    path: Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let subscription = state.subscriptions.get(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(
        subscription.to_status_response(state.clock.now()),
    )))
}

#[put("/{subscription_id}")]
pub async fn update_subscription(
    state: Data<AppState>,
    path: Path<Uuid>,
    payload: Json<UpdateSubscriptionRequest>,
) -> Result<HttpResponse, AppError> {
    let subscription = state.subscriptions
        .update(&path.into_inner(), payload.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(subscription)))
}

#[post("/{subscription_id}/pause")]
pub async fn pause_subscription(
    state: Data<AppState>,
    path: Path<Uuid>,
    payload: Json<PauseSubscriptionRequest>,
) -> Result<HttpResponse, AppError> {
    let (subscription, outbound) = state.subscriptions
        .pause(&path.into_inner(), payload.into_inner())
        .await?;
    state.dispatcher.dispatch(outbound).await;

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        subscription,
        "Subscription paused".to_string(),
    )))
}

#[post("/{subscription_id}/resume")]
pub async fn resume_subscription(
    state: Data<AppState>,
    path: Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let (subscription, outbound) = state.subscriptions.resume(&path.into_inner()).await?;
    state.dispatcher.dispatch(outbound).await;

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        subscription,
        "Subscription resumed".to_string(),
    )))
}

#[post("/{subscription_id}/cancel")]
pub async fn cancel_subscription(
    state: Data<AppState>,
    path: Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let (subscription, outbound) = state.subscriptions.cancel(&path.into_inner()).await?;
    state.dispatcher.dispatch(outbound).await;

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        subscription,
        "Subscription cancelled".to_string(),
    )))
}

#[get("/{subscription_id}/orders")]
pub async fn get_subscription_orders(
    state: Data<AppState>,
    path: Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let orders = state.subscriptions.orders(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(orders)))
}
