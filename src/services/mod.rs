pub mod accounts;
pub mod catalog;
pub mod comments;
pub mod likes;
pub mod mailer;
pub mod products;
pub mod slug;
