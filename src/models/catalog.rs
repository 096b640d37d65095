use crate::entities::{category, comment, tag};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Prices are rendered with exactly two fractional digits.
pub fn format_price(price: &Decimal) -> String {
    format!("{:.2}", price)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCategoryRequest {
    pub title: String,
    /// Derived from the title when absent.
    pub slug: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CategoryResponse {
    pub title: String,
    pub slug: String,
    pub image: Option<String>,
}

impl From<category::Model> for CategoryResponse {
    fn from(category: category::Model) -> Self {
        CategoryResponse {
            title: category.title,
            slug: category.slug,
            image: category.image,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTagRequest {
    pub title: String,
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TagResponse {
    pub title: String,
    pub slug: String,
}

impl From<tag::Model> for TagResponse {
    fn from(tag: tag::Model) -> Self {
        TagResponse {
            title: tag.title,
            slug: tag.slug,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    pub title: String,
    pub text: String,
    #[schema(value_type = String, example = "9.99")]
    pub price: Decimal,
    /// Category slug.
    pub category: String,
    /// Tag slugs.
    #[serde(default)]
    pub tags: Vec<String>,
    pub image: Option<String>,
}

/// Full replacement (PUT). Slug and author are not part of the request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub title: String,
    pub text: String,
    #[schema(value_type = String, example = "9.99")]
    pub price: Decimal,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub image: Option<String>,
}

/// Partial update (PATCH); absent fields are left untouched.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct PatchProductRequest {
    pub title: Option<String>,
    pub text: Option<String>,
    #[schema(value_type = Option<String>, example = "9.99")]
    pub price: Option<Decimal>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    /// Absent leaves the image alone; `null` removes it.
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<String>)]
    pub image: Option<Option<String>>,
}

/// Marks a field that was sent, even as `null`, so it differs from one left out.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl From<UpdateProductRequest> for PatchProductRequest {
    fn from(req: UpdateProductRequest) -> Self {
        PatchProductRequest {
            title: Some(req.title),
            text: Some(req.text),
            price: Some(req.price),
            category: Some(req.category),
            tags: Some(req.tags),
            image: Some(req.image),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductDetailResponse {
    pub slug: String,
    pub title: String,
    pub text: String,
    #[schema(example = "9.99")]
    pub price: String,
    /// Author email.
    pub author: String,
    pub category: CategoryResponse,
    pub tags: Vec<TagResponse>,
    pub comments: Vec<CommentResponse>,
    /// Number of users currently liking the product.
    pub likes_count: u64,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductListItem {
    pub title: String,
    pub slug: String,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Absolute URL of the detail resource.
    pub details: String,
    #[schema(example = "9.99")]
    pub price: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCommentRequest {
    /// Product slug.
    pub product: String,
    pub text: String,
    #[schema(example = 5)]
    pub rating: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CommentResponse {
    pub id: i32,
    pub text: String,
    pub rating: i32,
    pub product: String,
    /// Author email.
    pub user: String,
    pub created_at: DateTime<Utc>,
}

impl CommentResponse {
    pub fn new(comment: comment::Model, user_email: String) -> Self {
        CommentResponse {
            id: comment.id,
            text: comment.text,
            rating: comment.rating,
            product: comment.product_slug,
            user: user_email,
            created_at: comment.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_format_price_pads_two_digits() {
        assert_eq!(format_price(&Decimal::from_str("9.99").unwrap()), "9.99");
        assert_eq!(format_price(&Decimal::from(10)), "10.00");
        assert_eq!(format_price(&Decimal::from_str("0.5").unwrap()), "0.50");
    }

    #[test]
    fn test_update_becomes_full_patch() {
        let patch: PatchProductRequest = UpdateProductRequest {
            title: "T".to_string(),
            text: "body".to_string(),
            price: Decimal::from(3),
            category: "books".to_string(),
            tags: vec![],
            image: None,
        }
        .into();
        assert_eq!(patch.title.as_deref(), Some("T"));
        assert_eq!(patch.tags, Some(vec![]));
        assert_eq!(patch.price, Some(Decimal::from(3)));
        assert_eq!(patch.image, Some(None), "a replacement without image clears it");
    }

    #[test]
    fn test_patch_image_absent_null_or_set() {
        let absent: PatchProductRequest = serde_json::from_str(r#"{"title": "T"}"#).unwrap();
        assert_eq!(absent.image, None);
        let cleared: PatchProductRequest = serde_json::from_str(r#"{"image": null}"#).unwrap();
        assert_eq!(cleared.image, Some(None));
        let set: PatchProductRequest =
            serde_json::from_str(r#"{"image": "products/a.png"}"#).unwrap();
        assert_eq!(set.image, Some(Some("products/a.png".to_string())));
    }
}
