use crate::db::DbPool;
use crate::entities::{category, tag};
use crate::error::{constraint_violation, AppError, AppResult, Violation};
use crate::models::{CreateCategoryRequest, CreateTagRequest};
use crate::services::slug::{is_valid_slug, slugify};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};

const DUPLICATE_TITLE: &str = "Title must not repeat";

/// Use the explicit slug when given, otherwise derive one from the title.
fn resolve_slug(title: &str, slug: Option<&str>) -> AppResult<String> {
    match slug.map(str::trim).filter(|s| !s.is_empty()) {
        Some(slug) if is_valid_slug(slug) => Ok(slug.to_string()),
        Some(slug) => Err(AppError::validation(format!(
            "Slug '{}' may only contain lowercase letters, digits, '-' and '_'",
            slug
        ))),
        None => {
            let derived = slugify(title);
            if derived.is_empty() {
                return Err(AppError::validation(
                    "Title must contain at least one letter or digit",
                ));
            }
            Ok(derived)
        }
    }
}

fn require_title(title: &str) -> AppResult<&str> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::validation("Title is required"));
    }
    Ok(title)
}

pub async fn create_category(
    db: &DbPool,
    req: &CreateCategoryRequest,
) -> AppResult<category::Model> {
    let title = require_title(&req.title)?;

    let title_taken = category::Entity::find()
        .filter(category::Column::Title.eq(title))
        .one(db)
        .await?
        .is_some();
    if title_taken {
        return Err(AppError::validation(DUPLICATE_TITLE));
    }

    let slug = resolve_slug(title, req.slug.as_deref())?;
    if category::Entity::find_by_id(slug.clone())
        .one(db)
        .await?
        .is_some()
    {
        return Err(AppError::validation(format!(
            "Category with slug '{}' already exists",
            slug
        )));
    }

    let created = category::ActiveModel {
        slug: Set(slug),
        title: Set(title.to_string()),
        image: Set(req.image.clone()),
    }
    .insert(db)
    .await;

    match created {
        Ok(category) => {
            log::info!("Created category {}", category.slug);
            Ok(category)
        }
        Err(e) if constraint_violation(&e) == Some(Violation::Unique) => {
            Err(AppError::validation(DUPLICATE_TITLE))
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn list_categories(db: &DbPool) -> AppResult<Vec<category::Model>> {
    Ok(category::Entity::find()
        .order_by_asc(category::Column::Title)
        .all(db)
        .await?)
}

pub async fn get_category(db: &DbPool, slug: &str) -> AppResult<category::Model> {
    category::Entity::find_by_id(slug.to_string())
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("Category not found"))
}

pub async fn create_tag(db: &DbPool, req: &CreateTagRequest) -> AppResult<tag::Model> {
    let title = require_title(&req.title)?;

    let title_taken = tag::Entity::find()
        .filter(tag::Column::Title.eq(title))
        .one(db)
        .await?
        .is_some();
    if title_taken {
        return Err(AppError::validation(DUPLICATE_TITLE));
    }

    let slug = resolve_slug(title, req.slug.as_deref())?;
    if tag::Entity::find_by_id(slug.clone()).one(db).await?.is_some() {
        return Err(AppError::validation(format!(
            "Tag with slug '{}' already exists",
            slug
        )));
    }

    let created = tag::ActiveModel {
        slug: Set(slug),
        title: Set(title.to_string()),
    }
    .insert(db)
    .await;

    match created {
        Ok(tag) => {
            log::info!("Created tag {}", tag.slug);
            Ok(tag)
        }
        Err(e) if constraint_violation(&e) == Some(Violation::Unique) => {
            Err(AppError::validation(DUPLICATE_TITLE))
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn list_tags(db: &DbPool) -> AppResult<Vec<tag::Model>> {
    Ok(tag::Entity::find()
        .order_by_asc(tag::Column::Title)
        .all(db)
        .await?)
}

pub async fn get_tag(db: &DbPool, slug: &str) -> AppResult<tag::Model> {
    tag::Entity::find_by_id(slug.to_string())
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("Tag not found"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_slug() {
        assert_eq!(resolve_slug("Books", None).unwrap(), "books");
        assert_eq!(resolve_slug("Books", Some("  ")).unwrap(), "books");
        assert_eq!(resolve_slug("Books", Some("my-books")).unwrap(), "my-books");
        assert!(matches!(
            resolve_slug("Books", Some("My Books")),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            resolve_slug("???", None),
            Err(AppError::Validation(_))
        ));
    }
}
