use crate::db::DbPool;
use crate::entities::{category, like, product, product_tag, tag, user};
use crate::error::{constraint_violation, AppError, AppResult, Violation};
use crate::models::{
    format_price, CategoryResponse, CreateProductRequest, PatchProductRequest,
    ProductDetailResponse, TagResponse,
};
use crate::services::comments;
use crate::services::slug::slugify;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, LikeExpr, Query};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, IntoActiveModel,
    ModelTrait, Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use std::collections::BTreeSet;
use std::str::FromStr;

const LIKE_ESCAPE: char = '\\';

/// Backslash-escape the LIKE wildcards in `term`.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | LIKE_ESCAPE) {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

/// Substring match on `term` taken literally.
fn contains_pattern(term: &str) -> LikeExpr {
    LikeExpr::new(format!("%{}%", escape_like(term))).escape(LIKE_ESCAPE)
}

/// How many slug candidates are tried before creation gives up.
pub const SLUG_ATTEMPTS: u32 = 10;

/// DECIMAL(10, 2): at most eight integer digits.
const MAX_PRICE_EXCLUSIVE: i64 = 100_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderField {
    CreatedAt,
    Title,
    Price,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductOrdering {
    pub field: OrderField,
    pub descending: bool,
}

impl Default for ProductOrdering {
    /// Newest first.
    fn default() -> Self {
        ProductOrdering {
            field: OrderField::CreatedAt,
            descending: true,
        }
    }
}

impl FromStr for ProductOrdering {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        let (descending, name) = match value.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, value),
        };
        let field = match name {
            "created_at" => OrderField::CreatedAt,
            "title" => OrderField::Title,
            "price" => OrderField::Price,
            other => {
                return Err(AppError::validation(format!(
                    "Cannot order by '{}'; use created_at, title or price",
                    other
                )))
            }
        };
        Ok(ProductOrdering { field, descending })
    }
}

/// Filters, search and ordering for the product collection. Each part is
/// optional and they combine freely.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub tag: Option<String>,
    pub category: Option<String>,
    /// Author email.
    pub author: Option<String>,
    pub price: Option<Decimal>,
    pub search: Option<String>,
    pub ordering: ProductOrdering,
    /// 1-based; only used together with `limit`.
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

pub fn parse_price(value: &str) -> AppResult<Decimal> {
    Decimal::from_str(value.trim())
        .map_err(|_| AppError::validation(format!("'{}' is not a valid price", value)))
}

/// Enforce the DECIMAL(10, 2) range for prices.
pub fn check_price(price: &Decimal) -> AppResult<()> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(AppError::validation("Price must not be negative"));
    }
    if price.normalize().scale() > 2 {
        return Err(AppError::validation(
            "Price must have at most 2 decimal places",
        ));
    }
    if *price >= Decimal::from(MAX_PRICE_EXCLUSIVE) {
        return Err(AppError::validation(
            "Price must have at most 8 digits before the decimal point",
        ));
    }
    Ok(())
}

fn require_title(title: &str) -> AppResult<&str> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::validation("Title is required"));
    }
    Ok(title)
}

/// Slug candidate for attempt `n` (1-based): `widget1700000000`, then `widget1700000000-2`, ...
fn slug_candidate(base: &str, timestamp: i64, attempt: u32) -> String {
    if attempt <= 1 {
        format!("{}{}", base, timestamp)
    } else {
        format!("{}{}-{}", base, timestamp, attempt)
    }
}

async fn title_taken<C: ConnectionTrait>(
    db: &C,
    title: &str,
    except_slug: Option<&str>,
) -> AppResult<bool> {
    let mut condition = Condition::all().add(product::Column::Title.eq(title));
    if let Some(slug) = except_slug {
        condition = condition.add(product::Column::Slug.ne(slug));
    }
    Ok(product::Entity::find()
        .filter(condition)
        .one(db)
        .await?
        .is_some())
}

async fn ensure_category<C: ConnectionTrait>(db: &C, slug: &str) -> AppResult<()> {
    if category::Entity::find_by_id(slug.to_string())
        .one(db)
        .await?
        .is_none()
    {
        return Err(AppError::reference(format!(
            "Category '{}' does not exist",
            slug
        )));
    }
    Ok(())
}

/// De-duplicate tag slugs and make sure every one of them exists.
async fn resolve_tags<C: ConnectionTrait>(db: &C, slugs: &[String]) -> AppResult<Vec<String>> {
    let wanted: BTreeSet<String> = slugs.iter().map(|s| s.trim().to_string()).collect();
    if wanted.is_empty() {
        return Ok(Vec::new());
    }

    let found: BTreeSet<String> = tag::Entity::find()
        .filter(tag::Column::Slug.is_in(wanted.iter().cloned()))
        .all(db)
        .await?
        .into_iter()
        .map(|t| t.slug)
        .collect();

    if let Some(missing) = wanted.difference(&found).next() {
        return Err(AppError::reference(format!(
            "Tag '{}' does not exist",
            missing
        )));
    }
    Ok(wanted.into_iter().collect())
}

async fn replace_tags<C: ConnectionTrait>(
    db: &C,
    product_slug: &str,
    tag_slugs: &[String],
) -> AppResult<()> {
    product_tag::Entity::delete_many()
        .filter(product_tag::Column::ProductSlug.eq(product_slug))
        .exec(db)
        .await?;

    if tag_slugs.is_empty() {
        return Ok(());
    }

    let rows = tag_slugs.iter().map(|tag_slug| product_tag::ActiveModel {
        product_slug: Set(product_slug.to_string()),
        tag_slug: Set(tag_slug.clone()),
    });
    product_tag::Entity::insert_many(rows)
        .exec_without_returning(db)
        .await?;
    Ok(())
}

/// Create a product owned by `author_id`.
///
/// The slug is the slugified title followed by the creation epoch seconds.
/// A candidate that is already taken is retried with a numeric suffix.
pub async fn create_product(
    db: &DbPool,
    author_id: i32,
    req: &CreateProductRequest,
) -> AppResult<product::Model> {
    let title = require_title(&req.title)?;
    check_price(&req.price)?;

    if title_taken(db, title, None).await? {
        return Err(AppError::validation("Product with this title already exists"));
    }
    ensure_category(db, &req.category).await?;
    let tag_slugs = resolve_tags(db, &req.tags).await?;

    let base = slugify(title);
    if base.is_empty() {
        return Err(AppError::validation(
            "Title must contain at least one letter or digit",
        ));
    }
    let timestamp = Utc::now().timestamp();

    for attempt in 1..=SLUG_ATTEMPTS {
        let slug = slug_candidate(&base, timestamp, attempt);
        if product::Entity::find_by_id(slug.clone())
            .one(db)
            .await?
            .is_some()
        {
            log::debug!("Product slug {} taken, trying next candidate", slug);
            continue;
        }

        let txn = db.begin().await?;
        let inserted = product::ActiveModel {
            slug: Set(slug.clone()),
            title: Set(title.to_string()),
            text: Set(req.text.clone()),
            price: Set(req.price),
            author_id: Set(author_id),
            category_slug: Set(req.category.clone()),
            image: Set(req.image.clone()),
            created_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await;

        match inserted {
            Ok(product) => {
                replace_tags(&txn, &product.slug, &tag_slugs).await?;
                txn.commit().await?;
                log::info!("Created product {} by user {}", product.slug, author_id);
                return Ok(product);
            }
            Err(e) if constraint_violation(&e) == Some(Violation::ForeignKey) => {
                txn.rollback().await?;
                return Err(AppError::reference(format!(
                    "Category '{}' or author {} does not exist",
                    req.category, author_id
                )));
            }
            Err(e) if constraint_violation(&e) == Some(Violation::Unique) => {
                txn.rollback().await?;
                if title_taken(db, title, None).await? {
                    return Err(AppError::validation(
                        "Product with this title already exists",
                    ));
                }
                log::warn!("Product slug {} collided on insert, retrying", slug);
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(AppError::Internal(anyhow::anyhow!(
        "could not allocate a unique slug for '{}' after {} attempts",
        title,
        SLUG_ATTEMPTS
    )))
}

pub async fn get_product(db: &DbPool, slug: &str) -> AppResult<product::Model> {
    product::Entity::find_by_id(slug.to_string())
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("Product not found"))
}

/// Apply the fields present in `changes`. Slug and author never change.
pub async fn update_product(
    db: &DbPool,
    product: product::Model,
    changes: &PatchProductRequest,
) -> AppResult<product::Model> {
    let slug = product.slug.clone();
    let mut active = product.into_active_model();

    if let Some(title) = &changes.title {
        let title = require_title(title)?;
        if title_taken(db, title, Some(&slug)).await? {
            return Err(AppError::validation("Product with this title already exists"));
        }
        active.title = Set(title.to_string());
    }
    if let Some(text) = &changes.text {
        active.text = Set(text.clone());
    }
    if let Some(price) = &changes.price {
        check_price(price)?;
        active.price = Set(*price);
    }
    if let Some(category) = &changes.category {
        ensure_category(db, category).await?;
        active.category_slug = Set(category.clone());
    }
    if let Some(image) = &changes.image {
        active.image = Set(image.clone());
    }
    let tag_slugs = match &changes.tags {
        Some(tags) => Some(resolve_tags(db, tags).await?),
        None => None,
    };

    let txn = db.begin().await?;
    if active.is_changed() {
        if let Err(e) = active.update(&txn).await {
            txn.rollback().await?;
            return Err(match constraint_violation(&e) {
                Some(Violation::Unique) => {
                    AppError::validation("Product with this title already exists")
                }
                Some(Violation::ForeignKey) => AppError::reference("Category does not exist"),
                _ => e.into(),
            });
        }
    }
    if let Some(tag_slugs) = tag_slugs {
        replace_tags(&txn, &slug, &tag_slugs).await?;
    }
    txn.commit().await?;

    log::info!("Updated product {}", slug);
    get_product(db, &slug).await
}

/// Remove a product with its tag links, comments and likes.
pub async fn delete_product(db: &DbPool, product: product::Model) -> AppResult<()> {
    let slug = product.slug.clone();
    let txn = db.begin().await?;

    product_tag::Entity::delete_many()
        .filter(product_tag::Column::ProductSlug.eq(slug.as_str()))
        .exec(&txn)
        .await?;
    crate::entities::comment::Entity::delete_many()
        .filter(crate::entities::comment::Column::ProductSlug.eq(slug.as_str()))
        .exec(&txn)
        .await?;
    like::Entity::delete_many()
        .filter(like::Column::ProductSlug.eq(slug.as_str()))
        .exec(&txn)
        .await?;
    product.delete(&txn).await?;

    txn.commit().await?;
    log::info!("Deleted product {}", slug);
    Ok(())
}

pub async fn list_products(db: &DbPool, filter: &ProductFilter) -> AppResult<Vec<product::Model>> {
    let mut select = product::Entity::find();

    if let Some(tag_slug) = &filter.tag {
        select = select.filter(
            product::Column::Slug.in_subquery(
                Query::select()
                    .column(product_tag::Column::ProductSlug)
                    .from(product_tag::Entity)
                    .and_where(Expr::col(product_tag::Column::TagSlug).eq(tag_slug.as_str()))
                    .to_owned(),
            ),
        );
    }
    if let Some(category_slug) = &filter.category {
        select = select.filter(product::Column::CategorySlug.eq(category_slug.as_str()));
    }
    if let Some(author) = &filter.author {
        select = select.filter(
            product::Column::AuthorId.in_subquery(
                Query::select()
                    .column(user::Column::Id)
                    .from(user::Entity)
                    .and_where(Expr::col(user::Column::Email).eq(author.trim()))
                    .to_owned(),
            ),
        );
    }
    if let Some(price) = filter.price {
        select = select.filter(product::Column::Price.eq(price));
    }
    if let Some(term) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        let tagged = Query::select()
            .column((product_tag::Entity, product_tag::Column::ProductSlug))
            .from(product_tag::Entity)
            .inner_join(
                tag::Entity,
                Expr::col((tag::Entity, tag::Column::Slug))
                    .equals((product_tag::Entity, product_tag::Column::TagSlug)),
            )
            .and_where(Expr::col((tag::Entity, tag::Column::Title)).like(contains_pattern(term)))
            .to_owned();

        select = select.filter(
            Condition::any()
                .add(Expr::col((product::Entity, product::Column::Title)).like(contains_pattern(term)))
                .add(Expr::col((product::Entity, product::Column::Text)).like(contains_pattern(term)))
                .add(product::Column::Slug.in_subquery(tagged)),
        );
    }

    let order = if filter.ordering.descending {
        Order::Desc
    } else {
        Order::Asc
    };
    let column = match filter.ordering.field {
        OrderField::CreatedAt => product::Column::CreatedAt,
        OrderField::Title => product::Column::Title,
        OrderField::Price => product::Column::Price,
    };
    select = select
        .order_by(column, order)
        .order_by_asc(product::Column::Slug);

    if let Some(limit) = filter.limit.filter(|l| *l > 0) {
        let page = filter.page.unwrap_or(1).max(1);
        let offset = (page - 1)
            .checked_mul(limit)
            .ok_or_else(|| AppError::validation("Page is out of range"))?;
        select = select.limit(limit).offset(offset);
    }

    Ok(select.all(db).await?)
}

/// Number of users whose like is currently on.
pub async fn likes_count(db: &DbPool, product_slug: &str) -> AppResult<u64> {
    Ok(like::Entity::find()
        .filter(like::Column::ProductSlug.eq(product_slug))
        .filter(like::Column::IsLiked.eq(true))
        .count(db)
        .await?)
}

/// Build the detail representation: category, tags, comments and like count
/// are read alongside the product.
pub async fn describe(db: &DbPool, product: product::Model) -> AppResult<ProductDetailResponse> {
    let category = category::Entity::find_by_id(product.category_slug.clone())
        .one(db)
        .await?
        .ok_or_else(|| {
            AppError::reference(format!(
                "Category '{}' does not exist",
                product.category_slug
            ))
        })?;

    let tags = product
        .find_related(tag::Entity)
        .order_by_asc(tag::Column::Title)
        .all(db)
        .await?;

    let author = user::Entity::find_by_id(product.author_id)
        .one(db)
        .await?
        .map(|u| u.email)
        .unwrap_or_default();

    let comments = comments::list_for_product(db, &product.slug).await?;
    let likes_count = likes_count(db, &product.slug).await?;

    Ok(ProductDetailResponse {
        price: format_price(&product.price),
        slug: product.slug,
        title: product.title,
        text: product.text,
        author,
        category: CategoryResponse::from(category),
        tags: tags.into_iter().map(TagResponse::from).collect(),
        comments,
        likes_count,
        image: product.image,
        created_at: product.created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_parse() {
        assert_eq!(
            "-price".parse::<ProductOrdering>().unwrap(),
            ProductOrdering {
                field: OrderField::Price,
                descending: true
            }
        );
        assert_eq!(
            "title".parse::<ProductOrdering>().unwrap(),
            ProductOrdering {
                field: OrderField::Title,
                descending: false
            }
        );
        assert!(matches!(
            "author".parse::<ProductOrdering>(),
            Err(AppError::Validation(_))
        ));
        assert_eq!(ProductOrdering::default().field, OrderField::CreatedAt);
        assert!(ProductOrdering::default().descending);
    }

    #[test]
    fn test_price_limits() {
        assert!(check_price(&parse_price("9.99").unwrap()).is_ok());
        assert!(check_price(&parse_price("9.990").unwrap()).is_ok());
        assert!(check_price(&parse_price("99999999.99").unwrap()).is_ok());
        assert!(check_price(&parse_price("100000000").unwrap()).is_err());
        assert!(check_price(&parse_price("1.999").unwrap()).is_err());
        assert!(check_price(&parse_price("-1").unwrap()).is_err());
        assert!(parse_price("cheap").is_err());
    }

    #[test]
    fn test_slug_candidates() {
        assert_eq!(slug_candidate("widget", 1700000000, 1), "widget1700000000");
        assert_eq!(slug_candidate("widget", 1700000000, 2), "widget1700000000-2");
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("go guide"), "go guide");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like("c:\\dir"), "c:\\\\dir");
    }
}
