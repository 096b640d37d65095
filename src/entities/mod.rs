pub mod category;
pub mod comment;
pub mod like;
pub mod password_reset_token;
pub mod product;
pub mod product_tag;
pub mod session;
pub mod tag;
pub mod user;
