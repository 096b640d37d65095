use crate::entities::{
    category, comment, like, password_reset_token, product, product_tag, session, tag, user,
};
use sea_orm::sea_query::{Expr, Index, TableCreateStatement};
use sea_orm::{ConnectionTrait, DbErr, Schema};

/// Create every table the service needs if it is missing.
///
/// Tables are derived from the entity definitions so the same bootstrap runs on
/// MySQL and SQLite. Constraints the entity attributes cannot express are added
/// here: the rating range check and the one-like-row-per-user index.
pub async fn create_schema<C: ConnectionTrait>(db: &C) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut comments = schema.create_table_from_entity(comment::Entity);
    comments.check(
        Expr::col(comment::Column::Rating).between(comment::MIN_RATING, comment::MAX_RATING),
    );

    let mut likes = schema.create_table_from_entity(like::Entity);
    likes.index(
        Index::create()
            .name("uq_likes_product_user")
            .col(like::Column::ProductSlug)
            .col(like::Column::UserId)
            .unique(),
    );

    // Referenced tables first.
    let statements: Vec<TableCreateStatement> = vec![
        schema.create_table_from_entity(user::Entity),
        schema.create_table_from_entity(session::Entity),
        schema.create_table_from_entity(password_reset_token::Entity),
        schema.create_table_from_entity(category::Entity),
        schema.create_table_from_entity(tag::Entity),
        schema.create_table_from_entity(product::Entity),
        schema.create_table_from_entity(product_tag::Entity),
        comments,
        likes,
    ];

    for mut statement in statements {
        statement.if_not_exists();
        db.execute(backend.build(&statement)).await?;
    }

    Ok(())
}
