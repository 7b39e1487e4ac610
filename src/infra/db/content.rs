use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::{
    application::repos::{ContentQuery, ContentRepo, RepoError},
    domain::entities::{ContentRecord, ImageRef, ItemOverrides},
    domain::types::{ContentStatus, ContentType, Taxonomy},
};

use super::{PostgresRepositories, map_sqlx_error};

const CONTENT_COLUMNS: &str = "c.id, c.content_type, c.slug, c.title, c.path, c.parent_id, \
    c.author_id, c.status, c.published_at, c.modified_at, c.language, c.translation_group, \
    c.images, c.overrides, \
    ARRAY(SELECT ct.term_id FROM content_item_terms ct INNER JOIN terms t ON t.id = ct.term_id \
          WHERE ct.content_id = c.id AND t.taxonomy = 'category' ORDER BY ct.term_id) AS category_ids, \
    ARRAY(SELECT ct.term_id FROM content_item_terms ct INNER JOIN terms t ON t.id = ct.term_id \
          WHERE ct.content_id = c.id AND t.taxonomy = 'tag' ORDER BY ct.term_id) AS tag_ids";

#[derive(sqlx::FromRow)]
struct ContentRow {
    id: i64,
    content_type: String,
    slug: String,
    title: String,
    path: String,
    parent_id: Option<i64>,
    author_id: Option<i64>,
    status: String,
    published_at: Option<OffsetDateTime>,
    modified_at: Option<OffsetDateTime>,
    language: Option<String>,
    translation_group: Option<String>,
    images: Json<Vec<ImageRef>>,
    overrides: Json<ItemOverrides>,
    category_ids: Vec<i64>,
    tag_ids: Vec<i64>,
}

impl TryFrom<ContentRow> for ContentRecord {
    type Error = RepoError;

    fn try_from(row: ContentRow) -> Result<Self, Self::Error> {
        let content_type = ContentType::new(row.content_type).map_err(RepoError::from_persistence)?;
        let status = ContentStatus::try_from(row.status.as_str()).map_err(|_| {
            RepoError::from_persistence(format!(
                "content {} has unknown status `{}`",
                row.id, row.status
            ))
        })?;

        Ok(Self {
            id: row.id,
            content_type,
            slug: row.slug,
            title: row.title,
            path: row.path,
            parent_id: row.parent_id,
            author_id: row.author_id,
            status,
            published_at: row.published_at,
            modified_at: row.modified_at,
            language: row.language,
            category_ids: row.category_ids,
            tag_ids: row.tag_ids,
            translation_group: row.translation_group,
            images: row.images.0,
            overrides: row.overrides.0,
        })
    }
}

fn into_records(rows: Vec<ContentRow>) -> Result<Vec<ContentRecord>, RepoError> {
    rows.into_iter().map(ContentRecord::try_from).collect()
}

#[async_trait]
impl ContentRepo for PostgresRepositories {
    async fn list_published(&self, query: &ContentQuery) -> Result<Vec<ContentRecord>, RepoError> {
        let limit = Self::convert_limit(query.limit)?;
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(CONTENT_COLUMNS);
        qb.push(" FROM content_items c");
        Self::push_content_filter(&mut qb, query);
        qb.push(" ORDER BY c.published_at DESC NULLS LAST, c.id DESC LIMIT ");
        qb.push_bind(limit);

        let rows = qb
            .build_query_as::<ContentRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        into_records(rows)
    }

    async fn term_ids_in_use(
        &self,
        query: &ContentQuery,
        taxonomy: Taxonomy,
    ) -> Result<Vec<i64>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT DISTINCT ct.term_id FROM content_item_terms ct \
             INNER JOIN terms t ON t.id = ct.term_id \
             INNER JOIN content_items c ON c.id = ct.content_id",
        );
        Self::push_content_filter(&mut qb, query);
        qb.push(" AND t.taxonomy = ");
        qb.push_bind(taxonomy.as_str());
        qb.push(" ORDER BY ct.term_id");

        qb.build_query_scalar::<i64>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn author_ids_in_use(&self, query: &ContentQuery) -> Result<Vec<i64>, RepoError> {
        let mut qb =
            QueryBuilder::<Postgres>::new("SELECT DISTINCT c.author_id FROM content_items c");
        Self::push_content_filter(&mut qb, query);
        qb.push(" AND c.author_id IS NOT NULL ORDER BY c.author_id");

        qb.build_query_scalar::<i64>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn list_translations(&self, groups: &[String]) -> Result<Vec<ContentRecord>, RepoError> {
        if groups.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(CONTENT_COLUMNS);
        qb.push(" FROM content_items c WHERE c.status = 'published' AND c.translation_group = ANY(");
        qb.push_bind(groups.to_vec());
        qb.push(")");
        Self::push_indexable(&mut qb, "c");
        qb.push(" ORDER BY c.id");

        let rows = qb
            .build_query_as::<ContentRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        into_records(rows)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<ContentRecord>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(CONTENT_COLUMNS);
        qb.push(" FROM content_items c WHERE c.id = ");
        qb.push_bind(id);

        qb.build_query_as::<ContentRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .map(ContentRecord::try_from)
            .transpose()
    }

    async fn save_overrides(&self, id: i64, overrides: &ItemOverrides) -> Result<(), RepoError> {
        let result = sqlx::query("UPDATE content_items SET overrides = $1 WHERE id = $2")
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
