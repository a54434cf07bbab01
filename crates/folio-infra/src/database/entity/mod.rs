//! SeaORM entities, one per table.

pub mod comment;
pub mod like;
pub mod post;
pub mod user;

use folio_core::error::RepoError;

fn count_from_db(column: &'static str, value: i64) -> Result<u64, RepoError> {
    u64::try_from(value).map_err(|_| RepoError::Query(format!("negative {} in storage: {}", column, value)))
}
