use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pocketlegal_common::{AppError, Page, PageRequest};
use rust_decimal::Decimal;
use sqlx::{FromRow, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{convert_rows, into_page, PgStore};
use crate::models::*;
use crate::store::CatalogStore;

const CATEGORY_COLUMNS: &str =
    "id, name, description, icon, parent_category, sort_order, is_active, created_at, updated_at";

const SERVICE_COLUMNS: &str = "id, name, description, short_description, category_id, base_price, \
                               duration, is_active, lawyers, rating, number_of_ratings, tags, \
                               featured, popularity_score, created_at, updated_at";

#[derive(FromRow)]
struct CategoryRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    icon: Option<String>,
    parent_category: Option<Uuid>,
    sort_order: i32,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CategoryRow> for Category {
    type Error = AppError;

    fn try_from(row: CategoryRow) -> Result<Self, Self::Error> {
        Ok(Category {
            id: row.id,
            name: row.name,
            description: row.description,
            icon: row.icon,
            parent_category: row.parent_category,
            order: row.sort_order,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct ServiceRow {
    id: Uuid,
    name: String,
    description: String,
    short_description: Option<String>,
    category_id: Uuid,
    base_price: Decimal,
    duration: i32,
    is_active: bool,
    lawyers: Vec<Uuid>,
    rating: f64,
    number_of_ratings: i32,
    tags: Vec<String>,
    featured: bool,
    popularity_score: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ServiceRow> for Service {
    type Error = AppError;

    fn try_from(row: ServiceRow) -> Result<Self, Self::Error> {
        Ok(Service {
            id: row.id,
            name: row.name,
            description: row.description,
            short_description: row.short_description,
            category_id: row.category_id,
            base_price: row.base_price,
            duration: row.duration,
            is_active: row.is_active,
            lawyers: row.lawyers,
            rating: row.rating,
            number_of_ratings: row.number_of_ratings,
            tags: row.tags,
            featured: row.featured,
            popularity_score: row.popularity_score,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn push_service_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &ServiceFilter) {
    qb.push(" WHERE is_active = TRUE");
    if let Some(category_id) = filter.category_id {
        qb.push(" AND category_id = ").push_bind(category_id);
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", search);
        qb.push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR EXISTS (SELECT 1 FROM UNNEST(tags) AS tag WHERE tag ILIKE ")
            .push_bind(pattern)
            .push("))");
    }
    if let Some(min_price) = filter.min_price {
        qb.push(" AND base_price >= ").push_bind(min_price);
    }
    if let Some(max_price) = filter.max_price {
        qb.push(" AND base_price <= ").push_bind(max_price);
    }
    if let Some(featured) = filter.featured {
        qb.push(" AND featured = ").push_bind(featured);
    }
}

fn service_order(sort: ServiceSort) -> &'static str {
    match sort {
        ServiceSort::Newest => " ORDER BY created_at DESC, id",
        ServiceSort::PriceAsc => " ORDER BY base_price ASC, id",
        ServiceSort::PriceDesc => " ORDER BY base_price DESC, id",
        ServiceSort::Rating => " ORDER BY rating DESC, number_of_ratings DESC, id",
        ServiceSort::Popularity => " ORDER BY popularity_score DESC, id",
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn list_categories(&self) -> Result<Vec<Category>, AppError> {
        let rows: Vec<CategoryRow> = sqlx::query_as(&format!(
            "SELECT {} FROM categories WHERE is_active = TRUE ORDER BY sort_order, name",
            CATEGORY_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        convert_rows(rows)
    }

    async fn find_category(&self, id: Uuid) -> Result<Option<Category>, AppError> {
        let row: Option<CategoryRow> =
            sqlx::query_as(&format!("SELECT {} FROM categories WHERE id = $1", CATEGORY_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Category::try_from).transpose()
    }

    async fn create_category(&self, new: NewCategory) -> Result<Category, AppError> {
        let row: CategoryRow = sqlx::query_as(&format!(
            "INSERT INTO categories (id, name, description, icon, parent_category, sort_order) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            CATEGORY_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.description)
        .bind(&new.icon)
        .bind(new.parent_category)
        .bind(new.order)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn update_category(&self, id: Uuid, update: CategoryUpdate) -> Result<Category, AppError> {
        let row: Option<CategoryRow> = sqlx::query_as(&format!(
            "UPDATE categories SET \
                name = COALESCE($2, name), \
                description = COALESCE($3, description), \
                icon = COALESCE($4, icon), \
                parent_category = COALESCE($5, parent_category), \
                sort_order = COALESCE($6, sort_order), \
                is_active = COALESCE($7, is_active), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            CATEGORY_COLUMNS
        ))
        .bind(id)
        .bind(update.name)
        .bind(update.description)
        .bind(update.icon)
        .bind(update.parent_category)
        .bind(update.order)
        .bind(update.is_active)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| AppError::NotFound("Category not found".to_string()))?
            .try_into()
    }

    async fn delete_category(&self, id: Uuid) -> Result<bool, AppError> {
        let in_use: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM services WHERE category_id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        if in_use {
            return Err(AppError::Conflict(
                "Category still has services assigned".to_string(),
            ));
        }

        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_services(
        &self,
        filter: ServiceFilter,
        page: PageRequest,
    ) -> Result<Page<Service>, AppError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM services");
        push_service_filters(&mut count, &filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut query =
            QueryBuilder::<Postgres>::new(format!("SELECT {} FROM services", SERVICE_COLUMNS));
        push_service_filters(&mut query, &filter);
        query
            .push(service_order(filter.sort))
            .push(" LIMIT ")
            .push_bind(page.limit as i64)
            .push(" OFFSET ")
            .push_bind(page.offset() as i64);
        let rows: Vec<ServiceRow> = query.build_query_as().fetch_all(&self.pool).await?;

        into_page(rows, total)
    }

    async fn find_service(&self, id: Uuid) -> Result<Option<Service>, AppError> {
        let row: Option<ServiceRow> =
            sqlx::query_as(&format!("SELECT {} FROM services WHERE id = $1", SERVICE_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Service::try_from).transpose()
    }

    async fn view_service(&self, id: Uuid) -> Result<Option<Service>, AppError> {
        let row: Option<ServiceRow> = sqlx::query_as(&format!(
            "UPDATE services SET popularity_score = popularity_score + 1 \
             WHERE id = $1 RETURNING {}",
            SERVICE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Service::try_from).transpose()
    }

    async fn create_service(&self, new: NewService) -> Result<Service, AppError> {
        let row: ServiceRow = sqlx::query_as(&format!(
            "INSERT INTO services \
                (id, name, description, short_description, category_id, base_price, duration, \
                 lawyers, tags, featured) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {}",
            SERVICE_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.description)
        .bind(&new.short_description)
        .bind(new.category_id)
        .bind(new.base_price)
        .bind(new.duration)
        .bind(&new.lawyers)
        .bind(&new.tags)
        .bind(new.featured)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn update_service(&self, id: Uuid, update: ServiceUpdate) -> Result<Service, AppError> {
        let row: Option<ServiceRow> = sqlx::query_as(&format!(
            "UPDATE services SET \
                name = COALESCE($2, name), \
                description = COALESCE($3, description), \
                short_description = COALESCE($4, short_description), \
                category_id = COALESCE($5, category_id), \
                base_price = COALESCE($6, base_price), \
                duration = COALESCE($7, duration), \
                is_active = COALESCE($8, is_active), \
                tags = COALESCE($9, tags), \
                featured = COALESCE($10, featured), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            SERVICE_COLUMNS
        ))
        .bind(id)
        .bind(update.name)
        .bind(update.description)
        .bind(update.short_description)
        .bind(update.category_id)
        .bind(update.base_price)
        .bind(update.duration)
        .bind(update.is_active)
        .bind(update.tags)
        .bind(update.featured)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| AppError::NotFound("Service not found".to_string()))?
            .try_into()
    }

    async fn delete_service(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM services WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_service_lawyers(&self, id: Uuid, lawyers: Vec<Uuid>) -> Result<Service, AppError> {
        let row: Option<ServiceRow> = sqlx::query_as(&format!(
            "UPDATE services SET lawyers = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            SERVICE_COLUMNS
        ))
        .bind(id)
        .bind(&lawyers)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| AppError::NotFound("Service not found".to_string()))?
            .try_into()
    }
}
