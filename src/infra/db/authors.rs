use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::{
    application::repos::{AuthorQuery, AuthorsRepo, RepoError},
    domain::entities::{AuthorRecord, ItemOverrides},
};

use super::{PostgresRepositories, map_sqlx_error};

const AUTHOR_COLUMNS: &str = "a.id, a.slug, a.display_name, a.path, a.overrides, \
    (SELECT MAX(COALESCE(c.modified_at, c.published_at)) FROM content_items c \
     WHERE c.author_id = a.id AND c.content_type = 'post' AND c.status = 'published') \
     AS last_post_modified";

#[derive(sqlx::FromRow)]
struct AuthorRow {
    id: i64,
    slug: String,
    display_name: String,
    path: String,
    overrides: Json<ItemOverrides>,
    last_post_modified: Option<OffsetDateTime>,
}

impl From<AuthorRow> for AuthorRecord {
    fn from(row: AuthorRow) -> Self {
        Self {
            id: row.id,
            slug: row.slug,
            display_name: row.display_name,
            path: row.path,
            last_post_modified: row.last_post_modified,
            overrides: row.overrides.0,
        }
    }
}

#[async_trait]
impl AuthorsRepo for PostgresRepositories {
    async fn list_authors(&self, query: &AuthorQuery) -> Result<Vec<AuthorRecord>, RepoError> {
        if query.only_ids.is_empty() {
            return Ok(Vec::new());
        }
        let limit = Self::convert_limit(query.limit)?;

        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(AUTHOR_COLUMNS);
        qb.push(" FROM authors a WHERE a.id = ANY(");
        qb.push_bind(query.only_ids.clone());
        qb.push(")");
        Self::push_indexable(&mut qb, "a");
        if !query.exclude_ids.is_empty() {
            qb.push(" AND NOT (a.id = ANY(");
            qb.push_bind(query.exclude_ids.clone());
            qb.push("))");
        }
        qb.push(" ORDER BY a.display_name, a.id LIMIT ");
        qb.push_bind(limit);

        let rows = qb
            .build_query_as::<AuthorRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(AuthorRecord::from).collect())
    }

    async fn find_author(&self, id: i64) -> Result<Option<AuthorRecord>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(AUTHOR_COLUMNS);
        qb.push(" FROM authors a WHERE a.id = ");
        qb.push_bind(id);

        let row = qb
            .build_query_as::<AuthorRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(AuthorRecord::from))
    }

    async fn save_overrides(&self, id: i64, overrides: &ItemOverrides) -> Result<(), RepoError> {
        let result = sqlx::query("UPDATE authors SET overrides = $1 WHERE id = $2")
            .bind(Json(overrides))
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
