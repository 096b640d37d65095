use crate::db::DbPool;
use crate::entities::like;
use crate::error::{constraint_violation, AppError, AppResult, Violation};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LikeState {
    Liked,
    Disliked,
}

impl LikeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LikeState::Liked => "liked",
            LikeState::Disliked => "disliked",
        }
    }
}

fn pair(product_slug: &str, user_id: i32) -> Condition {
    Condition::all()
        .add(like::Column::ProductSlug.eq(product_slug))
        .add(like::Column::UserId.eq(user_id))
}

async fn flip<C: ConnectionTrait>(db: &C, product_slug: &str, user_id: i32) -> AppResult<u64> {
    let result = like::Entity::update_many()
        .col_expr(like::Column::IsLiked, Expr::col(like::Column::IsLiked).not())
        .filter(pair(product_slug, user_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// Flip the like of `user_id` on a product, creating it as liked on first use.
///
/// Existing rows are flipped with one conditional UPDATE. When none exists a
/// liked row is inserted; the unique (product, user) index turns a concurrent
/// first toggle into a flip of the row the other request created.
pub async fn toggle_like(db: &DbPool, product_slug: &str, user_id: i32) -> AppResult<LikeState> {
    let txn = db.begin().await?;

    if flip(&txn, product_slug, user_id).await? == 0 {
        let inserted = like::ActiveModel {
            product_slug: Set(product_slug.to_string()),
            user_id: Set(user_id),
            is_liked: Set(true),
            ..Default::default()
        }
        .insert(&txn)
        .await;

        match inserted {
            Ok(_) => {}
            Err(e) => match constraint_violation(&e) {
                Some(Violation::Unique) => {
                    log::warn!(
                        "Concurrent first like on {} by user {}, flipping instead",
                        product_slug,
                        user_id
                    );
                    flip(&txn, product_slug, user_id).await?;
                }
                Some(Violation::ForeignKey) => {
                    txn.rollback().await?;
                    return Err(AppError::reference(format!(
                        "Product '{}' does not exist",
                        product_slug
                    )))
                }
                _ => {
                    txn.rollback().await?;
                    return Err(e.into());
                }
            },
        }
    }

    let row = like::Entity::find()
        .filter(pair(product_slug, user_id))
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("like row vanished during toggle")))?;
    txn.commit().await?;

    let state = if row.is_liked {
        LikeState::Liked
    } else {
        LikeState::Disliked
    };
    log::info!(
        "User {} {} product {}",
        user_id,
        state.as_str(),
        product_slug
    );
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_state_serializes_as_plain_string() {
        assert_eq!(serde_json::to_string(&LikeState::Liked).unwrap(), "\"liked\"");
        assert_eq!(
            serde_json::to_string(&LikeState::Disliked).unwrap(),
            "\"disliked\""
        );
    }
}
