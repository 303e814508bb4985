//! PostgreSQL backend. Queries are built at runtime; each multi-row store
//! operation runs inside one transaction.

mod bookings;
mod catalog;
mod cart;
mod notifications;
mod payments;
mod reviews;
mod users;

use pocketlegal_common::{AppError, Page};

use crate::connection::DbPool;

#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

/// Converts fetched rows into domain models.
fn convert_rows<R, T>(rows: Vec<R>) -> Result<Vec<T>, AppError>
where
    T: TryFrom<R, Error = AppError>,
{
    rows.into_iter().map(T::try_from).collect()
}

fn into_page<R, T>(rows: Vec<R>, total: i64) -> Result<Page<T>, AppError>
where
    T: TryFrom<R, Error = AppError>,
{
    Ok(Page {
        items: convert_rows(rows)?,
        total: total.max(0) as u64,
    })
}

fn parse_opt<T>(value: Option<String>) -> Result<Option<T>, AppError>
where
    T: std::str::FromStr<Err = AppError>,
{
    value.map(|v| v.parse()).transpose()
}
