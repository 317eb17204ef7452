use super::models::Provider;
use super::{now, DatabasePool};
use crate::error::StoreResult;

/// CRUD for provider rows, keyed naturally by `(name, model, temperature)`.
pub struct ProviderRepository;

impl ProviderRepository {
    /// Insert a new provider. Fails on a duplicate natural key.
    pub async fn create(
        pool: &DatabasePool,
        name: &str,
        model: &str,
        temperature: f64,
    ) -> StoreResult<Provider> {
        let provider = sqlx::query_as::<_, Provider>(
            "INSERT INTO providers (name, model, temperature, created_at)
             VALUES (?, ?, ?, ?)
             RETURNING *",
        )
        .bind(name)
        .bind(model)
        .bind(temperature)
        .bind(now())
        .fetch_one(pool)
        .await?;
        Ok(provider)
    }

    /// Find or create by natural key.
    pub async fn upsert(
        pool: &DatabasePool,
        name: &str,
        model: &str,
        temperature: f64,
    ) -> StoreResult<Provider> {
        sqlx::query(
            "INSERT INTO providers (name, model, temperature, created_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT (name, model, temperature) DO NOTHING",
        )
        .bind(name)
        .bind(model)
        .bind(temperature)
        .bind(now())
        .execute(pool)
        .await?;

        let provider = sqlx::query_as::<_, Provider>(
            "SELECT * FROM providers WHERE name = ? AND model = ? AND temperature = ?",
        )
        .bind(name)
        .bind(model)
        .bind(temperature)
        .fetch_one(pool)
        .await?;
        Ok(provider)
    }

    pub async fn find_by_id(pool: &DatabasePool, id: i64) -> StoreResult<Option<Provider>> {
        let provider = sqlx::query_as::<_, Provider>("SELECT * FROM providers WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(provider)
    }

    /// All rows for a vendor name, any model or temperature.
    pub async fn find_by_name(pool: &DatabasePool, name: &str) -> StoreResult<Vec<Provider>> {
        let providers = sqlx::query_as::<_, Provider>(
            "SELECT * FROM providers WHERE name = ? ORDER BY model ASC, temperature ASC",
        )
        .bind(name)
        .fetch_all(pool)
        .await?;
        Ok(providers)
    }

    /// Exact lookup by natural key.
    pub async fn find_by_natural_key(
        pool: &DatabasePool,
        name: &str,
        model: &str,
        temperature: f64,
    ) -> StoreResult<Option<Provider>> {
        let provider = sqlx::query_as::<_, Provider>(
            "SELECT * FROM providers WHERE name = ? AND model = ? AND temperature = ?",
        )
        .bind(name)
        .bind(model)
        .bind(temperature)
        .fetch_optional(pool)
        .await?;
        Ok(provider)
    }

    /// Every row for `name/model`, coldest first.
    pub async fn list_by_name_and_model(
        pool: &DatabasePool,
        name: &str,
        model: &str,
    ) -> StoreResult<Vec<Provider>> {
        let providers = sqlx::query_as::<_, Provider>(
            "SELECT * FROM providers WHERE name = ? AND model = ? ORDER BY temperature ASC",
        )
        .bind(name)
        .bind(model)
        .fetch_all(pool)
        .await?;
        Ok(providers)
    }

    pub async fn list(pool: &DatabasePool) -> StoreResult<Vec<Provider>> {
        let providers = sqlx::query_as::<_, Provider>(
            "SELECT * FROM providers ORDER BY name ASC, model ASC, temperature ASC",
        )
        .fetch_all(pool)
        .await?;
        Ok(providers)
    }

    /// Returns whether a row was deleted.
    pub async fn delete(pool: &DatabasePool, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM providers WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
