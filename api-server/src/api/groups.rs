use super::error::ApiError;
use crate::models::context::ContextPointer;
use meetup_client::AggregateResult;
use rocket::serde::json::Json;
use rocket::{get, State};

/// Every group from the feed, with per-group failures listed in `Errors`
#[get("/groups")]
pub async fn groups(context: &State<ContextPointer>) -> Result<Json<AggregateResult>, ApiError> {
    let aggregate = context.meetup_client().build_aggregate().await?;
    Ok(Json(aggregate))
}
