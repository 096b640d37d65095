use crate::db::DbPool;
use crate::entities::{comment, product, user};
use crate::error::{constraint_violation, AppError, AppResult, Violation};
use crate::models::{CommentResponse, CreateCommentRequest};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};

fn rating_error() -> AppError {
    AppError::validation(format!(
        "Rating must be between {} and {}",
        comment::MIN_RATING,
        comment::MAX_RATING
    ))
}

pub fn check_rating(rating: i32) -> AppResult<i32> {
    if (comment::MIN_RATING..=comment::MAX_RATING).contains(&rating) {
        Ok(rating)
    } else {
        Err(rating_error())
    }
}

/// Store a comment written by `user_id`.
///
/// The rating is checked here and again by the CHECK constraint on the table;
/// a rejection from either side is reported as a validation error.
pub async fn create_comment(
    db: &DbPool,
    user_id: i32,
    req: &CreateCommentRequest,
) -> AppResult<CommentResponse> {
    let rating = check_rating(req.rating)?;
    if req.text.trim().is_empty() {
        return Err(AppError::validation("Text is required"));
    }

    let product_exists = product::Entity::find_by_id(req.product.clone())
        .one(db)
        .await?
        .is_some();
    if !product_exists {
        return Err(AppError::reference(format!(
            "Product '{}' does not exist",
            req.product
        )));
    }

    let author = user::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::reference("Comment author does not exist"))?;

    let inserted = comment::ActiveModel {
        text: Set(req.text.clone()),
        product_slug: Set(req.product.clone()),
        user_id: Set(user_id),
        rating: Set(rating),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await;

    match inserted {
        Ok(comment) => {
            log::info!(
                "User {} commented on {} (rating {})",
                author.email,
                comment.product_slug,
                comment.rating
            );
            Ok(CommentResponse::new(comment, author.email))
        }
        Err(e) => Err(match constraint_violation(&e) {
            Some(Violation::Check) => rating_error(),
            Some(Violation::ForeignKey) => {
                AppError::reference(format!("Product '{}' does not exist", req.product))
            }
            _ => e.into(),
        }),
    }
}

/// Comments of one product, newest first.
pub async fn list_for_product(db: &DbPool, product_slug: &str) -> AppResult<Vec<CommentResponse>> {
    let rows = comment::Entity::find()
        .filter(comment::Column::ProductSlug.eq(product_slug))
        .order_by_desc(comment::Column::CreatedAt)
        .order_by_desc(comment::Column::Id)
        .find_also_related(user::Entity)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(comment, author)| {
            let email = author.map(|u| u.email).unwrap_or_default();
            CommentResponse::new(comment, email)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_range() {
        for rating in 1..=5 {
            assert_eq!(check_rating(rating).unwrap(), rating);
        }
        for rating in [-1, 0, 6, 100] {
            assert!(matches!(check_rating(rating), Err(AppError::Validation(_))));
        }
    }
}
