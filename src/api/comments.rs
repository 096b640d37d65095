use crate::auth::{AuthenticatedUser, Policy};
use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::CreateCommentRequest;
use crate::services::comments;
use actix_web::{web, HttpResponse};

#[utoipa::path(
    post,
    path = "/comments/",
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment created", body = CommentResponse),
        (status = 400, description = "Rating outside 1-5 or unknown product"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "comments"
)]
pub async fn create_comment(
    req: web::Json<CreateCommentRequest>,
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    Policy::Authenticated.check(Some(&user), None)?;
    let comment = comments::create_comment(pool.get_ref(), user.user_id, &req).await?;
    Ok(HttpResponse::Created().json(comment))
}
