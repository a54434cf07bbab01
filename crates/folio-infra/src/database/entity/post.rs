//! Post entity for SeaORM.

use sea_orm::Set;
use sea_orm::entity::prelude::*;

use folio_core::domain::Post;
use folio_core::error::RepoError;

use super::count_from_db;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "posts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub title: String,
    #[sea_orm(unique)]
    pub slug: String,
    pub excerpt: String,
    #[sea_orm(column_type = "Text")]
    pub content: String,
    pub cover_image: String,
    pub category: String,
    #[sea_orm(column_type = "JsonBinary")]
    pub tags: Json,
    pub featured: bool,
    pub author_id: Uuid,
    pub like_count: i64,
    pub comment_count: i64,
    pub view_count: i64,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::AuthorId",
        to = "super::user::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Author,
    #[sea_orm(has_many = "super::comment::Entity")]
    Comments,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Author.def()
    }
}

impl Related<super::comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Conversion from SeaORM Model to Domain Post. Fails on values the domain
/// cannot represent (unknown category, negative counter).
impl TryFrom<Model> for Post {
    type Error = RepoError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let category = model
            .category
            .parse()
            .map_err(|e| RepoError::Query(format!("post {}: {}", model.id, e)))?;
        let tags = serde_json::from_value(model.tags)
            .map_err(|e| RepoError::Query(format!("post {} tags: {}", model.id, e)))?;

        Ok(Self {
            id: model.id,
            title: model.title,
            slug: model.slug,
            excerpt: model.excerpt,
            content: model.content,
            cover_image: model.cover_image,
            category,
            tags,
            featured: model.featured,
            author_id: model.author_id,
            like_count: count_from_db("like_count", model.like_count)?,
            comment_count: count_from_db("comment_count", model.comment_count)?,
            view_count: count_from_db("view_count", model.view_count)?,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        })
    }
}

/// Conversion from Domain Post to SeaORM ActiveModel.
impl From<Post> for ActiveModel {
    fn from(post: Post) -> Self {
        Self {
            id: Set(post.id),
            title: Set(post.title),
            slug: Set(post.slug),
            excerpt: Set(post.excerpt),
            content: Set(post.content),
            cover_image: Set(post.cover_image),
            category: Set(post.category.as_str().to_string()),
            tags: Set(Json::from(post.tags.into_iter().collect::<Vec<_>>())),
            featured: Set(post.featured),
            author_id: Set(post.author_id),
            like_count: Set(post.like_count as i64),
            comment_count: Set(post.comment_count as i64),
            view_count: Set(post.view_count as i64),
            created_at: Set(post.created_at.into()),
            updated_at: Set(post.updated_at.into()),
        }
    }
}
