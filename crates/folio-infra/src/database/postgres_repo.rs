//! PostgreSQL repository implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict, Order, SimpleExpr};
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, Condition, ConnectionTrait, DatabaseTransaction,
    DbConn, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    Select, SqlErr, TransactionTrait, Value,
};
use tracing::{debug, instrument};
use uuid::Uuid;

use folio_core::domain::{Comment, Like, LikeKey, LikeTarget, Post, User};
use folio_core::error::RepoError;
use folio_core::ports::{ContentRepository, Counter, Mutation, UserRepository, WriteBatch};
use folio_core::query::{FilterValue, Op, Page, PostField, PostQuery, Predicate};

use super::entity::comment::{self, Entity as CommentEntity};
use super::entity::like::{self, Entity as LikeEntity};
use super::entity::post::{self, Entity as PostEntity};
use super::entity::user::{self, Entity as UserEntity};

fn db_err(e: DbErr) -> RepoError {
    match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(msg))
        | Some(SqlErr::ForeignKeyConstraintViolation(msg)) => RepoError::Constraint(msg),
        _ => match e {
            DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => RepoError::Connection(e.to_string()),
            other => RepoError::Query(other.to_string()),
        },
    }
}

/// On deletes, a foreign key violation means a dependent row appeared.
fn delete_err(e: DbErr) -> RepoError {
    match e.sql_err() {
        Some(SqlErr::ForeignKeyConstraintViolation(msg)) => RepoError::Integrity(msg),
        _ => db_err(e),
    }
}

fn column_of(field: PostField) -> post::Column {
    match field {
        PostField::Id => post::Column::Id,
        PostField::Title => post::Column::Title,
        PostField::Slug => post::Column::Slug,
        PostField::Excerpt => post::Column::Excerpt,
        PostField::Content => post::Column::Content,
        PostField::CoverImage => post::Column::CoverImage,
        PostField::Category => post::Column::Category,
        PostField::Tags => post::Column::Tags,
        PostField::Featured => post::Column::Featured,
        PostField::Author => post::Column::AuthorId,
        PostField::LikeCount => post::Column::LikeCount,
        PostField::CommentCount => post::Column::CommentCount,
        PostField::ViewCount => post::Column::ViewCount,
        PostField::CreatedAt => post::Column::CreatedAt,
        PostField::UpdatedAt => post::Column::UpdatedAt,
    }
}

fn db_value(value: &FilterValue) -> Value {
    match value {
        FilterValue::Id(id) => (*id).into(),
        FilterValue::Text(text) => text.clone().into(),
        FilterValue::Category(category) => category.as_str().into(),
        FilterValue::Flag(flag) => (*flag).into(),
        FilterValue::Count(count) => (*count as i64).into(),
        FilterValue::Timestamp(ts) => (*ts).into(),
    }
}

fn tag_contains(value: &FilterValue) -> SimpleExpr {
    let tag = match value {
        FilterValue::Text(tag) => tag.clone(),
        other => format!("{:?}", other),
    };
    let needle: Value = serde_json::json!([tag]).into();
    Expr::cust_with_values("\"posts\".\"tags\" @> ?::jsonb", [needle])
}

/// Translate a validated predicate. Multi-valued `Eq`/`In` match any value.
fn predicate_condition(predicate: &Predicate) -> Result<Condition, RepoError> {
    if predicate.field == PostField::Tags {
        let any = predicate
            .values
            .iter()
            .fold(Condition::any(), |cond, v| cond.add(tag_contains(v)));
        return match predicate.op {
            Op::Eq | Op::In => Ok(any),
            Op::Ne => Ok(any.not()),
            op => Err(RepoError::Query(format!("{:?} is not supported on tags", op))),
        };
    }

    let column = column_of(predicate.field);
    let values: Vec<Value> = predicate.values.iter().map(db_value).collect();
    let bound = values
        .first()
        .cloned()
        .ok_or_else(|| RepoError::Query(format!("empty filter on {}", predicate.field.name())))?;

    let expr = match predicate.op {
        Op::Eq | Op::In => column.is_in(values),
        Op::Ne => column.is_not_in(values),
        Op::Gt => column.gt(bound),
        Op::Gte => column.gte(bound),
        Op::Lt => column.lt(bound),
        Op::Lte => column.lte(bound),
    };
    Ok(Condition::all().add(expr))
}

fn filtered_posts(query: &PostQuery) -> Result<Select<PostEntity>, RepoError> {
    let mut condition = Condition::all();
    for predicate in &query.predicates {
        condition = condition.add(predicate_condition(predicate)?);
    }
    Ok(PostEntity::find().filter(condition))
}

fn sorted(mut select: Select<PostEntity>, query: &PostQuery) -> Select<PostEntity> {
    for key in &query.sort {
        if matches!(
            key.field,
            PostField::Excerpt | PostField::Content | PostField::CoverImage | PostField::Tags
        ) {
            continue;
        }
        let order = if key.descending { Order::Desc } else { Order::Asc };
        select = select.order_by(column_of(key.field), order);
    }
    select.order_by_asc(post::Column::Id)
}

fn posts_from(models: Vec<post::Model>) -> Result<Vec<Post>, RepoError> {
    models.into_iter().map(Post::try_from).collect()
}

fn comments_from(models: Vec<comment::Model>) -> Result<Vec<Comment>, RepoError> {
    models.into_iter().map(Comment::try_from).collect()
}

async fn count_likes_on<C: ConnectionTrait>(db: &C, target: LikeTarget) -> Result<u64, RepoError> {
    LikeEntity::find()
        .filter(like::on_target(target))
        .count(db)
        .await
        .map_err(db_err)
}

async fn count_comments_on<C: ConnectionTrait>(db: &C, post_id: Uuid) -> Result<u64, RepoError> {
    CommentEntity::find()
        .filter(comment::Column::PostId.eq(post_id))
        .count(db)
        .await
        .map_err(db_err)
}

async fn target_exists<C: ConnectionTrait>(db: &C, target: LikeTarget) -> Result<bool, RepoError> {
    let found = match target {
        LikeTarget::Post(id) => PostEntity::find_by_id(id).count(db).await,
        LikeTarget::Comment(id) => CommentEntity::find_by_id(id).count(db).await,
    };
    Ok(found.map_err(db_err)? > 0)
}

/// Lock the row that owns `counter` for the rest of the transaction.
async fn lock_owner(txn: &DatabaseTransaction, counter: Counter) -> Result<(), RepoError> {
    let found = match counter {
        Counter::PostLikes(id) | Counter::PostComments(id) => PostEntity::find_by_id(id)
            .lock_exclusive()
            .one(txn)
            .await
            .map_err(db_err)?
            .is_some(),
        Counter::CommentLikes(id) => CommentEntity::find_by_id(id)
            .lock_exclusive()
            .one(txn)
            .await
            .map_err(db_err)?
            .is_some(),
    };
    if found { Ok(()) } else { Err(RepoError::NotFound) }
}

/// Guarded in-place `col = col + delta`; rows that would go negative are not
/// matched. Returns the number of rows updated.
async fn add_to<E: EntityTrait>(
    txn: &DatabaseTransaction,
    pk: E::Column,
    col: E::Column,
    id: Uuid,
    delta: i64,
) -> Result<u64, DbErr> {
    let mut update = E::update_many()
        .col_expr(col, Expr::col(col).add(delta))
        .filter(pk.eq(id));
    if delta < 0 {
        update = update.filter(col.gte(-delta));
    }
    Ok(update.exec(txn).await?.rows_affected)
}

async fn set_to<E: EntityTrait>(
    txn: &DatabaseTransaction,
    pk: E::Column,
    col: E::Column,
    id: Uuid,
    value: i64,
) -> Result<u64, DbErr> {
    let result = E::update_many()
        .col_expr(col, Expr::value(value))
        .filter(pk.eq(id))
        .exec(txn)
        .await?;
    Ok(result.rows_affected)
}

async fn adjust_counter(
    txn: &DatabaseTransaction,
    counter: Counter,
    delta: i64,
) -> Result<(), RepoError> {
    let updated = match counter {
        Counter::PostLikes(id) => {
            add_to::<PostEntity>(txn, post::Column::Id, post::Column::LikeCount, id, delta).await
        }
        Counter::PostComments(id) => {
            add_to::<PostEntity>(txn, post::Column::Id, post::Column::CommentCount, id, delta)
                .await
        }
        Counter::CommentLikes(id) => {
            add_to::<CommentEntity>(txn, comment::Column::Id, comment::Column::LikeCount, id, delta)
                .await
        }
    }
    .map_err(db_err)?;

    if updated > 0 {
        return Ok(());
    }
    lock_owner(txn, counter).await?;
    Err(RepoError::Integrity(format!(
        "{:?} would go negative ({:+})",
        counter, delta
    )))
}

async fn recount(txn: &DatabaseTransaction, counter: Counter) -> Result<(), RepoError> {
    lock_owner(txn, counter).await?;
    let result = match counter {
        Counter::PostLikes(id) => {
            let actual = count_likes_on(txn, LikeTarget::Post(id)).await?;
            set_to::<PostEntity>(txn, post::Column::Id, post::Column::LikeCount, id, actual as i64)
                .await
        }
        Counter::PostComments(id) => {
            let actual = count_comments_on(txn, id).await?;
            set_to::<PostEntity>(
                txn,
                post::Column::Id,
                post::Column::CommentCount,
                id,
                actual as i64,
            )
            .await
        }
        Counter::CommentLikes(id) => {
            let actual = count_likes_on(txn, LikeTarget::Comment(id)).await?;
            set_to::<CommentEntity>(
                txn,
                comment::Column::Id,
                comment::Column::LikeCount,
                id,
                actual as i64,
            )
            .await
        }
    };
    result.map_err(db_err)?;
    Ok(())
}

async fn apply(txn: &DatabaseTransaction, mutation: Mutation) -> Result<(), RepoError> {
    match mutation {
        Mutation::InsertPost(post) => {
            PostEntity::insert(post::ActiveModel::from(post))
                .exec_without_returning(txn)
                .await
                .map_err(db_err)?;
        }
        Mutation::UpdatePost(post) => {
            let tags: Vec<String> = post.tags.into_iter().collect();
            let model = post::ActiveModel {
                id: ActiveValue::Unchanged(post.id),
                title: ActiveValue::Set(post.title),
                slug: ActiveValue::Set(post.slug),
                excerpt: ActiveValue::Set(post.excerpt),
                content: ActiveValue::Set(post.content),
                cover_image: ActiveValue::Set(post.cover_image),
                category: ActiveValue::Set(post.category.as_str().to_string()),
                tags: ActiveValue::Set(serde_json::Value::from(tags)),
                featured: ActiveValue::Set(post.featured),
                updated_at: ActiveValue::Set(post.updated_at.into()),
                ..Default::default()
            };
            model.update(txn).await.map_err(|e| match e {
                DbErr::RecordNotUpdated => RepoError::NotFound,
                other => db_err(other),
            })?;
        }
        Mutation::DeletePost(id) => {
            if !target_exists(txn, LikeTarget::Post(id)).await? {
                return Err(RepoError::NotFound);
            }
            let comments = count_comments_on(txn, id).await?;
            let likes = count_likes_on(txn, LikeTarget::Post(id)).await?;
            if comments > 0 || likes > 0 {
                return Err(RepoError::Integrity(format!(
                    "post {} still has {} comments and {} likes",
                    id, comments, likes
                )));
            }
            let result = PostEntity::delete_by_id(id)
                .exec(txn)
                .await
                .map_err(delete_err)?;
            if result.rows_affected == 0 {
                return Err(RepoError::NotFound);
            }
        }
        Mutation::InsertComment(comment) => {
            if let Some(parent_id) = comment.parent_id {
                let parent = CommentEntity::find_by_id(parent_id)
                    .one(txn)
                    .await
                    .map_err(db_err)?;
                if parent.is_none_or(|p| p.post_id != comment.post_id) {
                    return Err(RepoError::Constraint(format!(
                        "parent comment {} is not on post {}",
                        parent_id, comment.post_id
                    )));
                }
            }
            CommentEntity::insert(comment::ActiveModel::from(comment))
                .exec_without_returning(txn)
                .await
                .map_err(db_err)?;
        }
        Mutation::UpdateComment(comment) => {
            let model = comment::ActiveModel {
                id: ActiveValue::Unchanged(comment.id),
                content: ActiveValue::Set(comment.content),
                updated_at: ActiveValue::Set(comment.updated_at.into()),
                ..Default::default()
            };
            model.update(txn).await.map_err(|e| match e {
                DbErr::RecordNotUpdated => RepoError::NotFound,
                other => db_err(other),
            })?;
        }
        Mutation::DeleteComment(id) => {
            if !target_exists(txn, LikeTarget::Comment(id)).await? {
                return Err(RepoError::NotFound);
            }
            let replies = CommentEntity::find()
                .filter(comment::Column::ParentId.eq(id))
                .count(txn)
                .await
                .map_err(db_err)?;
            let likes = count_likes_on(txn, LikeTarget::Comment(id)).await?;
            if replies > 0 || likes > 0 {
                return Err(RepoError::Integrity(format!(
                    "comment {} still has {} replies and {} likes",
                    id, replies, likes
                )));
            }
            let result = CommentEntity::delete_by_id(id)
                .exec(txn)
                .await
                .map_err(delete_err)?;
            if result.rows_affected == 0 {
                return Err(RepoError::NotFound);
            }
        }
        Mutation::InsertLike(like) => {
            if !target_exists(txn, like.target).await? {
                return Err(RepoError::Constraint(format!("{} does not exist", like.target)));
            }
            LikeEntity::insert(like::ActiveModel::from(like))
                .exec_without_returning(txn)
                .await
                .map_err(db_err)?;
        }
        Mutation::DeleteLike(key) => {
            let result = LikeEntity::delete_many()
                .filter(like::Column::UserId.eq(key.user_id))
                .filter(like::on_target(key.target))
                .exec(txn)
                .await
                .map_err(db_err)?;
            if result.rows_affected == 0 {
                return Err(RepoError::NotFound);
            }
        }
        Mutation::DeleteLikesOf(target) => {
            LikeEntity::delete_many()
                .filter(like::on_target(target))
                .exec(txn)
                .await
                .map_err(db_err)?;
        }
        Mutation::AdjustCounter { counter, delta } => adjust_counter(txn, counter, delta).await?,
        Mutation::Recount(counter) => recount(txn, counter).await?,
    }
    Ok(())
}

/// PostgreSQL content repository. Each batch runs in one transaction.
pub struct PostgresContentRepository {
    pub(crate) db: DbConn,
}

impl PostgresContentRepository {
    pub fn new(db: DbConn) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ContentRepository for PostgresContentRepository {
    async fn find_post(&self, id: Uuid) -> Result<Option<Post>, RepoError> {
        let model = PostEntity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        model.map(Post::try_from).transpose()
    }

    async fn find_post_by_slug(&self, slug: &str) -> Result<Option<Post>, RepoError> {
        let model = PostEntity::find()
            .filter(post::Column::Slug.eq(slug))
            .one(&self.db)
            .await
            .map_err(db_err)?;
        model.map(Post::try_from).transpose()
    }

    #[instrument(skip(self, query), fields(page = query.page.page, limit = query.page.limit))]
    async fn query_posts(&self, query: &PostQuery) -> Result<Page<Post>, RepoError> {
        let filtered = filtered_posts(query)?;
        let total = filtered.clone().count(&self.db).await.map_err(db_err)?;
        let models = sorted(filtered, query)
            .offset(query.page.offset())
            .limit(query.page.limit)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        debug!(total, returned = models.len(), "posts queried");
        Ok(Page {
            items: posts_from(models)?,
            total,
        })
    }

    async fn post_ids(&self) -> Result<Vec<Uuid>, RepoError> {
        PostEntity::find()
            .select_only()
            .column(post::Column::Id)
            .into_tuple()
            .all(&self.db)
            .await
            .map_err(db_err)
    }

    async fn count_posts(&self, since: Option<DateTime<Utc>>) -> Result<u64, RepoError> {
        let mut select = PostEntity::find();
        if let Some(since) = since {
            select = select.filter(post::Column::CreatedAt.gte(since));
        }
        select.count(&self.db).await.map_err(db_err)
    }

    async fn find_comment(&self, id: Uuid) -> Result<Option<Comment>, RepoError> {
        let model = CommentEntity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        model.map(Comment::try_from).transpose()
    }

    async fn comments_of_post(&self, post_id: Uuid) -> Result<Vec<Comment>, RepoError> {
        let models = CommentEntity::find()
            .filter(comment::Column::PostId.eq(post_id))
            .order_by_asc(comment::Column::CreatedAt)
            .order_by_asc(comment::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        comments_from(models)
    }

    async fn replies_to(&self, comment_id: Uuid) -> Result<Vec<Comment>, RepoError> {
        let models = CommentEntity::find()
            .filter(comment::Column::ParentId.eq(comment_id))
            .order_by_asc(comment::Column::CreatedAt)
            .order_by_asc(comment::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        comments_from(models)
    }

    async fn recent_comments(&self, limit: u64) -> Result<Vec<Comment>, RepoError> {
        let models = CommentEntity::find()
            .order_by_desc(comment::Column::CreatedAt)
            .order_by_desc(comment::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        comments_from(models)
    }

    async fn comment_ids(&self) -> Result<Vec<Uuid>, RepoError> {
        CommentEntity::find()
            .select_only()
            .column(comment::Column::Id)
            .into_tuple()
            .all(&self.db)
            .await
            .map_err(db_err)
    }

    async fn count_comments(&self, since: Option<DateTime<Utc>>) -> Result<u64, RepoError> {
        let mut select = CommentEntity::find();
        if let Some(since) = since {
            select = select.filter(comment::Column::CreatedAt.gte(since));
        }
        select.count(&self.db).await.map_err(db_err)
    }

    async fn find_like(&self, key: LikeKey) -> Result<Option<Like>, RepoError> {
        let model = LikeEntity::find()
            .filter(like::Column::UserId.eq(key.user_id))
            .filter(like::on_target(key.target))
            .one(&self.db)
            .await
            .map_err(db_err)?;
        model.map(Like::try_from).transpose()
    }

    async fn count_likes(&self, target: LikeTarget) -> Result<u64, RepoError> {
        count_likes_on(&self.db, target).await
    }

    async fn increment_views(&self, post_id: Uuid) -> Result<Option<Post>, RepoError> {
        let result = PostEntity::update_many()
            .col_expr(
                post::Column::ViewCount,
                Expr::col(post::Column::ViewCount).add(1),
            )
            .filter(post::Column::Id.eq(post_id))
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        if result.rows_affected == 0 {
            return Ok(None);
        }
        self.find_post(post_id).await
    }

    #[instrument(skip(self, batch), fields(steps = batch.len()))]
    async fn commit(&self, batch: WriteBatch) -> Result<(), RepoError> {
        let txn = self.db.begin().await.map_err(db_err)?;
        for mutation in batch.into_steps() {
            // Dropping `txn` on error rolls the batch back.
            apply(&txn, mutation).await?;
        }
        txn.commit().await.map_err(db_err)
    }
}

/// PostgreSQL user repository.
pub struct PostgresUserRepository {
    pub(crate) db: DbConn,
}

impl PostgresUserRepository {
    pub fn new(db: DbConn) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        let result = UserEntity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(result.map(Into::into))
    }

    async fn recent(&self, limit: u64) -> Result<Vec<User>, RepoError> {
        let result = UserEntity::find()
            .order_by_desc(user::Column::CreatedAt)
            .order_by_desc(user::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(result.into_iter().map(Into::into).collect())
    }

    async fn count(&self, since: Option<DateTime<Utc>>) -> Result<u64, RepoError> {
        let mut select = UserEntity::find();
        if let Some(since) = since {
            select = select.filter(user::Column::CreatedAt.gte(since));
        }
        select.count(&self.db).await.map_err(db_err)
    }

    async fn save(&self, user: User) -> Result<User, RepoError> {
        UserEntity::insert(user::ActiveModel::from(user.clone()))
            .on_conflict(
                OnConflict::column(user::Column::Id)
                    .update_columns([
                        user::Column::Name,
                        user::Column::Email,
                        user::Column::Role,
                        user::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(db_err)?;
        Ok(user)
    }
}
