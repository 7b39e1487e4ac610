//! Postgres-backed repository implementations.

mod authors;
mod content;
mod settings;
mod taxonomy;
mod util;

pub use util::map_sqlx_error;

use std::sync::Arc;

use sqlx::{
    Postgres, QueryBuilder,
    postgres::{PgPool, PgPoolOptions},
    query,
};

use crate::application::repos::{ContentQuery, LanguageFilter, RepoError};

/// Robots directives are a comma-separated list; only an explicit `noindex`
/// removes a row.
const NOT_NOINDEX_EXPR: &str = "NOT EXISTS (SELECT 1 FROM unnest(string_to_array(lower(COALESCE({alias}.overrides->>'robots', '')), ',')) AS d(directive) WHERE btrim(d.directive) = 'noindex')";

/// Only a JSON `true` excludes; any other value leaves the row in.
const NOT_EXCLUDED_EXPR: &str = "({alias}.overrides->'excluded') IS DISTINCT FROM 'true'::jsonb";

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(pool).await
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }

    /// Appends ` AND <indexable>` for rows aliased as `alias`.
    fn push_indexable(qb: &mut QueryBuilder<'_, Postgres>, alias: &str) {
        qb.push(" AND ");
        qb.push(NOT_NOINDEX_EXPR.replace("{alias}", alias));
        qb.push(" AND ");
        qb.push(NOT_EXCLUDED_EXPR.replace("{alias}", alias));
    }

    /// Appends the `WHERE` clause equivalent of [`ContentQuery::matches`]
    /// for `content_items c`.
    fn push_content_filter(qb: &mut QueryBuilder<'_, Postgres>, query: &ContentQuery) {
        qb.push(" WHERE c.status = 'published' AND c.content_type = ");
        qb.push_bind(query.content_type.as_str().to_string());
        Self::push_indexable(qb, "c");

        match &query.language {
            LanguageFilter::Any => {}
            LanguageFilter::Nothing => {
                qb.push(" AND FALSE");
            }
            LanguageFilter::Field(iso2) => {
                qb.push(" AND lower(c.language) = ");
                qb.push_bind(iso2.to_ascii_lowercase());
            }
            LanguageFilter::Taxonomy {
                category_ids,
                tag_id,
            } => {
                let mut term_ids = category_ids.clone();
                term_ids.extend(tag_id.iter().copied());
                if term_ids.is_empty() {
                    qb.push(" AND FALSE");
                } else {
                    qb.push(
                        " AND EXISTS (SELECT 1 FROM content_item_terms ct WHERE ct.content_id = c.id AND ct.term_id = ANY(",
                    );
                    qb.push_bind(term_ids);
                    qb.push("))");
                }
            }
        }

        if !query.exclude_ids.is_empty() {
            qb.push(" AND NOT (c.id = ANY(");
            qb.push_bind(query.exclude_ids.clone());
            qb.push("))");
        }
    }

    fn convert_limit(limit: usize) -> Result<i64, RepoError> {
        i64::try_from(limit).map_err(|_| RepoError::InvalidInput {
            message: format!("limit {limit} exceeds supported range"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::ContentType;

    fn sql_for(query: &ContentQuery) -> String {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT c.id FROM content_items c");
        PostgresRepositories::push_content_filter(&mut qb, query);
        qb.sql().to_string()
    }

    #[test]
    fn unresolved_languages_select_nothing() {
        let mut query = ContentQuery::new(ContentType::post(), 10);
        query.language = LanguageFilter::Taxonomy {
            category_ids: Vec::new(),
            tag_id: None,
        };
        assert!(sql_for(&query).contains("AND FALSE"));

        query.language = LanguageFilter::Nothing;
        assert!(sql_for(&query).contains("AND FALSE"));
    }

    #[test]
    fn taxonomy_filter_checks_terms_and_exclusions() {
        let mut query = ContentQuery::new(ContentType::post(), 10);
        query.language = LanguageFilter::Taxonomy {
            category_ids: vec![12, 13],
            tag_id: Some(9),
        };
        query.exclude_ids = vec![4];
        let sql = sql_for(&query);
        assert!(sql.contains("ct.term_id = ANY($2)"));
        assert!(sql.contains("NOT (c.id = ANY($3))"));
        assert!(sql.contains("c.overrides->>'robots'"));
        assert!(sql.contains("(c.overrides->'excluded') IS DISTINCT FROM 'true'::jsonb"));
        assert!(!sql.contains("::boolean"));
    }

    #[test]
    fn field_filter_compares_lowercase() {
        let mut query = ContentQuery::new(ContentType::page(), 10);
        query.language = LanguageFilter::Field("FR".into());
        assert!(sql_for(&query).contains("lower(c.language) = $2"));
    }
}
