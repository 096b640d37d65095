use crate::auth::verify_token;
use crate::config::Config;
use crate::db::DbPool;
use crate::entities::{session, user};
use crate::error::AppError;
use actix_web::{web, FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;
use sea_orm::EntityTrait;

/// Caller resolved from a bearer token whose session is still open.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: i32,
    pub email: String,
    pub session_id: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.is_staff || self.is_superuser
    }
}

fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
}

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        let token = bearer_token(req);
        let config = req.app_data::<web::Data<Config>>().cloned();
        let pool = req.app_data::<web::Data<DbPool>>().cloned();

        Box::pin(async move {
            let token = token.ok_or_else(|| {
                AppError::authentication("Missing or invalid authorization header")
            })?;
            let (config, pool) = match (config, pool) {
                (Some(config), Some(pool)) => (config, pool),
                _ => {
                    return Err(AppError::Internal(anyhow::anyhow!(
                        "authentication state is not configured"
                    )))
                }
            };

            let claims = verify_token(&token, &config.jwt.secret)
                .map_err(|_| AppError::authentication("Invalid token"))?;
            let user_id = claims
                .user_id()
                .ok_or_else(|| AppError::authentication("Invalid token"))?;

            let session = session::Entity::find_by_id(claims.jti.clone())
                .one(pool.get_ref())
                .await?;
            match session {
                Some(session) if session.user_id == user_id => {}
                _ => return Err(AppError::authentication("Session has ended")),
            }

            let account = user::Entity::find_by_id(user_id)
                .one(pool.get_ref())
                .await?
                .ok_or_else(|| AppError::authentication("Invalid token"))?;
            if !account.is_active {
                return Err(AppError::authentication("Account is not activated"));
            }

            Ok(AuthenticatedUser {
                user_id: account.id,
                email: account.email,
                session_id: claims.jti,
                is_staff: account.is_staff,
                is_superuser: account.is_superuser,
            })
        })
    }
}
