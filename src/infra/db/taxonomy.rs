use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::{
    application::repos::{RepoError, TaxonomyRepo, TermQuery},
    domain::entities::{ItemOverrides, TermRecord},
    domain::types::Taxonomy,
};

use super::{PostgresRepositories, map_sqlx_error};

const TERM_COLUMNS: &str =
    "t.id, t.taxonomy, t.slug, t.name, t.path, t.parent_id, t.modified_at, t.overrides";

#[derive(sqlx::FromRow)]
struct TermRow {
    id: i64,
    taxonomy: String,
    slug: String,
    name: String,
    path: String,
    parent_id: Option<i64>,
    modified_at: Option<OffsetDateTime>,
    overrides: Json<ItemOverrides>,
}

impl TryFrom<TermRow> for TermRecord {
    type Error = RepoError;

    fn try_from(row: TermRow) -> Result<Self, Self::Error> {
        let taxonomy = Taxonomy::try_from(row.taxonomy.as_str()).map_err(|_| {
            RepoError::from_persistence(format!(
                "term {} has unknown taxonomy `{}`",
                row.id, row.taxonomy
            ))
        })?;
        Ok(Self {
            id: row.id,
            taxonomy,
            slug: row.slug,
            name: row.name,
            path: row.path,
            parent_id: row.parent_id,
            modified_at: row.modified_at,
            overrides: row.overrides.0,
        })
    }
}

impl PostgresRepositories {
    async fn find_term_where(
        &self,
        taxonomy: Taxonomy,
        column: &'static str,
        value: &str,
    ) -> Result<Option<TermRecord>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(TERM_COLUMNS);
        qb.push(" FROM terms t WHERE t.taxonomy = ");
        qb.push_bind(taxonomy.as_str());
        qb.push(format!(" AND t.{column} = "));
        qb.push_bind(value.to_string());
        qb.push(" ORDER BY t.id LIMIT 1");

        qb.build_query_as::<TermRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .map(TermRecord::try_from)
            .transpose()
    }
}

#[async_trait]
impl TaxonomyRepo for PostgresRepositories {
    async fn find_by_slug(
        &self,
        taxonomy: Taxonomy,
        slug: &str,
    ) -> Result<Option<TermRecord>, RepoError> {
        self.find_term_where(taxonomy, "slug", slug).await
    }

    async fn find_by_name(
        &self,
        taxonomy: Taxonomy,
        name: &str,
    ) -> Result<Option<TermRecord>, RepoError> {
        self.find_term_where(taxonomy, "name", name).await
    }

    async fn descendants_of(&self, taxonomy: Taxonomy, id: i64) -> Result<Vec<i64>, RepoError> {
        // UNION (not UNION ALL) stops on parent cycles.
        sqlx::query_scalar::<_, i64>(
            r#"
            WITH RECURSIVE tree AS (
                SELECT id FROM terms WHERE taxonomy = $1 AND parent_id = $2
                UNION
                SELECT t.id
                FROM terms t
                INNER JOIN tree ON t.parent_id = tree.id
                WHERE t.taxonomy = $1
            )
            SELECT id FROM tree WHERE id <> $2 ORDER BY id
            "#,
        )
        .bind(taxonomy.as_str())
        .bind(id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn list_terms(&self, query: &TermQuery) -> Result<Vec<TermRecord>, RepoError> {
        if query.only_ids.as_ref().is_some_and(Vec::is_empty) {
            return Ok(Vec::new());
        }
        let limit = Self::convert_limit(query.limit)?;

        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(TERM_COLUMNS);
        qb.push(" FROM terms t WHERE t.taxonomy = ");
        qb.push_bind(query.taxonomy.as_str());
        Self::push_indexable(&mut qb, "t");
        if let Some(ids) = query.only_ids.as_ref() {
            qb.push(" AND t.id = ANY(");
            qb.push_bind(ids.clone());
            qb.push(")");
        }
        if !query.exclude_ids.is_empty() {
            qb.push(" AND NOT (t.id = ANY(");
            qb.push_bind(query.exclude_ids.clone());
            qb.push("))");
        }
        qb.push(" ORDER BY t.name, t.id LIMIT ");
        qb.push_bind(limit);

        qb.build_query_as::<TermRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .into_iter()
            .map(TermRecord::try_from)
            .collect()
    }

    async fn find_term(&self, id: i64) -> Result<Option<TermRecord>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(TERM_COLUMNS);
        qb.push(" FROM terms t WHERE t.id = ");
        qb.push_bind(id);

        qb.build_query_as::<TermRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .map(TermRecord::try_from)
            .transpose()
    }

    async fn save_overrides(&self, id: i64, overrides: &ItemOverrides) -> Result<(), RepoError> {
        let result = sqlx::query("UPDATE terms SET overrides = $1 WHERE id = $2")
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
