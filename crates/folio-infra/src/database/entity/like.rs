//! Like entity for SeaORM. One row per (user, target); the target is
//! polymorphic, so its existence is checked in the repository.

use sea_orm::{Condition, Set};
use sea_orm::entity::prelude::*;

use folio_core::domain::{Like, LikeTarget};
use folio_core::error::RepoError;

pub const KIND_POST: &str = "post";
pub const KIND_COMMENT: &str = "comment";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "likes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: Uuid,
    #[sea_orm(primary_key, auto_increment = false)]
    pub target_kind: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub target_id: Uuid,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Condition selecting the like rows of one target.
pub fn on_target(target: LikeTarget) -> Condition {
    Condition::all()
        .add(Column::TargetKind.eq(target.kind()))
        .add(Column::TargetId.eq(target.id()))
}

impl TryFrom<Model> for Like {
    type Error = RepoError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let target = match model.target_kind.as_str() {
            KIND_POST => LikeTarget::Post(model.target_id),
            KIND_COMMENT => LikeTarget::Comment(model.target_id),
            other => {
                return Err(RepoError::Query(format!("unknown like target kind '{}'", other)));
            }
        };
        Ok(Self {
            user_id: model.user_id,
            target,
            created_at: model.created_at.into(),
        })
    }
}

impl From<Like> for ActiveModel {
    fn from(like: Like) -> Self {
        Self {
            user_id: Set(like.user_id),
            target_kind: Set(like.target.kind().to_string()),
            target_id: Set(like.target.id()),
            created_at: Set(like.created_at.into()),
        }
    }
}
