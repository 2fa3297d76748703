/// Strand handlers - HTTP endpoints for strand operations
use crate::error::Result;
use crate::middleware::UserId;
use crate::services::StrandService;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tokio::sync::watch;
use uuid::Uuid;
use validator::Validate;

/// Receiver flipped to `true` when the server starts shutting down
pub type ShutdownFlag = watch::Receiver<bool>;

const HOME_PATH: &str = "/";

#[derive(Debug, Deserialize, Validate)]
pub struct CreateStrandRequest {
    #[validate(length(min = 3, message = "Minimum 3 characters."))]
    pub text: String,
    pub community_id: Option<Uuid>,
    pub path: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReplyRequest {
    #[validate(length(min = 3, message = "Minimum 3 characters."))]
    pub text: String,
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FeedParams {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PathHint {
    pub path: Option<String>,
}

/// Create a new top-level strand
pub async fn create_strand(
    service: web::Data<StrandService>,
    user_id: UserId,
    req: web::Json<CreateStrandRequest>,
) -> Result<HttpResponse> {
    req.validate()?;
    let path = req.path.as_deref().unwrap_or(HOME_PATH);

    let strand = service
        .create_strand(&req.text, user_id.0, req.community_id, path)
        .await?;

    Ok(HttpResponse::Created().json(strand))
}

/// Top-level feed, newest first
pub async fn get_feed(
    service: web::Data<StrandService>,
    query: web::Query<FeedParams>,
) -> Result<HttpResponse> {
    let page = query.page.unwrap_or(1);
    let page_size = query
        .page_size
        .unwrap_or(service.feed_limits().default_page_size);

    let feed = service.fetch_feed(page, page_size).await?;
    Ok(HttpResponse::Ok().json(feed))
}

/// A strand with two levels of replies
pub async fn get_strand(
    service: web::Data<StrandService>,
    strand_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let strand = service.fetch_strand(*strand_id).await?;
    Ok(HttpResponse::Ok().json(strand))
}

/// Reply to a strand
pub async fn add_reply(
    service: web::Data<StrandService>,
    user_id: UserId,
    strand_id: web::Path<Uuid>,
    req: web::Json<ReplyRequest>,
) -> Result<HttpResponse> {
    req.validate()?;
    let default_path = format!("/strand/{}", strand_id);
    let path = req.path.as_deref().unwrap_or(&default_path);

    let reply = service
        .add_reply(*strand_id, &req.text, user_id.0, path)
        .await?;

    Ok(HttpResponse::Created().json(reply))
}

/// Delete a strand and every reply below it (author only)
pub async fn delete_strand(
    service: web::Data<StrandService>,
    shutdown: Option<web::Data<ShutdownFlag>>,
    user_id: UserId,
    strand_id: web::Path<Uuid>,
    query: web::Query<PathHint>,
) -> Result<HttpResponse> {
    let path = query.path.as_deref().unwrap_or(HOME_PATH);
    let cancel = shutdown.as_ref().map(|flag| flag.get_ref());

    let deletion = service
        .delete_strand(*strand_id, user_id.0, path, cancel)
        .await?;

    Ok(HttpResponse::Ok().json(deletion))
}

/// Strands authored by a user
pub async fn get_user_strands(
    service: web::Data<StrandService>,
    user_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let strands = service.fetch_user_strands(*user_id).await?;
    Ok(HttpResponse::Ok().json(strands))
}

/// Strands published under a community
pub async fn get_community_strands(
    service: web::Data<StrandService>,
    community_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let strands = service.fetch_community_strands(*community_id).await?;
    Ok(HttpResponse::Ok().json(strands))
}
