use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use pocketlegal_common::{AppError, Page, PageRequest, UserRole};
use rust_decimal::Decimal;
use sqlx::{FromRow, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{into_page, PgStore};
use crate::models::*;
use crate::store::{LawyerStore, UserStore};

const USER_COLUMNS: &str = "id, name, email, password_hash, role, phone, profile_picture, \
                            is_active, created_at, updated_at";

const LAWYER_COLUMNS: &str = "id, user_id, qualifications, experience, areas_of_expertise, \
                              license_number, license_issued_by, license_expiry_date, bio, \
                              hourly_rate, languages, rating, number_of_ratings, is_verified, \
                              documents_verified, documents_uploaded_at, is_active, \
                              created_at, updated_at";

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: Option<String>,
    role: String,
    phone: Option<String>,
    profile_picture: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            role: row.role.parse()?,
            phone: row.phone,
            profile_picture: row.profile_picture,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct LawyerRow {
    id: Uuid,
    user_id: Uuid,
    qualifications: Vec<String>,
    experience: i32,
    areas_of_expertise: Vec<String>,
    license_number: Option<String>,
    license_issued_by: Option<String>,
    license_expiry_date: Option<NaiveDate>,
    bio: Option<String>,
    hourly_rate: Decimal,
    languages: Vec<String>,
    rating: f64,
    number_of_ratings: i32,
    is_verified: bool,
    documents_verified: bool,
    documents_uploaded_at: Option<DateTime<Utc>>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<LawyerRow> for Lawyer {
    type Error = AppError;

    fn try_from(row: LawyerRow) -> Result<Self, Self::Error> {
        Ok(Lawyer {
            id: row.id,
            user_id: row.user_id,
            qualifications: row.qualifications,
            experience: row.experience,
            areas_of_expertise: row.areas_of_expertise,
            license_number: row.license_number,
            license_issued_by: row.license_issued_by,
            license_expiry_date: row.license_expiry_date,
            bio: row.bio,
            hourly_rate: row.hourly_rate,
            languages: row.languages,
            rating: row.rating,
            number_of_ratings: row.number_of_ratings,
            is_verified: row.is_verified,
            documents_verified: row.documents_verified,
            documents_uploaded_at: row.documents_uploaded_at,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, new: NewUser) -> Result<User, AppError> {
        let mut tx = self.pool.begin().await?;

        let row: UserRow = sqlx::query_as(&format!(
            "INSERT INTO users (id, name, email, password_hash, role, phone) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(new.role.as_str())
        .bind(&new.phone)
        .fetch_one(&mut *tx)
        .await?;

        if new.role == UserRole::Lawyer {
            sqlx::query("INSERT INTO lawyers (id, user_id) VALUES ($1, $2)")
                .bind(Uuid::new_v4())
                .bind(row.id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        row.try_into()
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(User::try_from).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {} FROM users WHERE LOWER(email) = LOWER($1)",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.map(User::try_from).transpose()
    }

    async fn update_user(&self, id: Uuid, update: UserUpdate) -> Result<User, AppError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "UPDATE users SET \
                name = COALESCE($2, name), \
                phone = COALESCE($3, phone), \
                profile_picture = COALESCE($4, profile_picture), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(id)
        .bind(update.name)
        .bind(update.phone)
        .bind(update.profile_picture)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| AppError::NotFound("User not found".to_string()))?
            .try_into()
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl LawyerStore for PgStore {
    async fn find_lawyer(&self, id: Uuid) -> Result<Option<Lawyer>, AppError> {
        let row: Option<LawyerRow> =
            sqlx::query_as(&format!("SELECT {} FROM lawyers WHERE id = $1", LAWYER_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Lawyer::try_from).transpose()
    }

    async fn find_lawyer_by_user(&self, user_id: Uuid) -> Result<Option<Lawyer>, AppError> {
        let row: Option<LawyerRow> = sqlx::query_as(&format!(
            "SELECT {} FROM lawyers WHERE user_id = $1",
            LAWYER_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Lawyer::try_from).transpose()
    }

    async fn update_lawyer(&self, id: Uuid, update: LawyerUpdate) -> Result<Lawyer, AppError> {
        let row: Option<LawyerRow> = sqlx::query_as(&format!(
            "UPDATE lawyers SET \
                qualifications = COALESCE($2, qualifications), \
                experience = COALESCE($3, experience), \
                areas_of_expertise = COALESCE($4, areas_of_expertise), \
                license_number = COALESCE($5, license_number), \
                license_issued_by = COALESCE($6, license_issued_by), \
                license_expiry_date = COALESCE($7, license_expiry_date), \
                bio = COALESCE($8, bio), \
                hourly_rate = COALESCE($9, hourly_rate), \
                languages = COALESCE($10, languages), \
                documents_uploaded_at = COALESCE($11, documents_uploaded_at), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            LAWYER_COLUMNS
        ))
        .bind(id)
        .bind(update.qualifications)
        .bind(update.experience)
        .bind(update.areas_of_expertise)
        .bind(update.license_number)
        .bind(update.license_issued_by)
        .bind(update.license_expiry_date)
        .bind(update.bio)
        .bind(update.hourly_rate)
        .bind(update.languages)
        .bind(update.documents_uploaded_at)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| AppError::NotFound("Lawyer not found".to_string()))?
            .try_into()
    }

    async fn list_lawyers(
        &self,
        filter: LawyerFilter,
        page: PageRequest,
    ) -> Result<Page<Lawyer>, AppError> {
        fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &LawyerFilter) {
            qb.push(" WHERE is_active = TRUE");
            if let Some(expertise) = &filter.expertise {
                qb.push(" AND EXISTS (SELECT 1 FROM UNNEST(areas_of_expertise) AS area WHERE area ILIKE ")
                    .push_bind(format!("%{}%", expertise))
                    .push(")");
            }
        }

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM lawyers");
        push_filters(&mut count, &filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut query = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM lawyers", LAWYER_COLUMNS));
        push_filters(&mut query, &filter);
        query
            .push(" ORDER BY rating DESC, created_at DESC LIMIT ")
            .push_bind(page.limit as i64)
            .push(" OFFSET ")
            .push_bind(page.offset() as i64);
        let rows: Vec<LawyerRow> = query.build_query_as().fetch_all(&self.pool).await?;

        into_page(rows, total)
    }
}
