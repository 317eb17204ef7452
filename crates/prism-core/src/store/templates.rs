use super::models::{Placeholder, Template};
use super::{now, DatabasePool};
use crate::error::StoreResult;
use crate::template::PromptTemplate;

/// Versioned prompt templates and their extracted placeholders.
pub struct TemplateRepository;

impl TemplateRepository {
    /// Save `template` as the next version for `task_id`.
    ///
    /// Versions start at 1. One placeholder row is written per variable the
    /// template references.
    pub async fn save(
        pool: &DatabasePool,
        task_id: i64,
        template: &PromptTemplate,
    ) -> StoreResult<Template> {
        let mut tx = pool.begin().await?;

        let version: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(version), 0) + 1 FROM templates WHERE task_id = ?",
        )
        .bind(task_id)
        .fetch_one(&mut *tx)
        .await?;

        let saved = sqlx::query_as::<_, Template>(
            "INSERT INTO templates (task_id, version, body, created_at)
             VALUES (?, ?, ?, ?)
             RETURNING *",
        )
        .bind(task_id)
        .bind(version)
        .bind(template.body())
        .bind(now())
        .fetch_one(&mut *tx)
        .await?;

        for name in template.placeholders() {
            sqlx::query("INSERT INTO placeholders (template_id, name) VALUES (?, ?)")
                .bind(saved.id)
                .bind(name)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        tracing::debug!(
            "Saved template v{} for task {} ({} placeholders)",
            saved.version,
            task_id,
            template.placeholders().len()
        );
        Ok(saved)
    }

    pub async fn find_by_id(pool: &DatabasePool, id: i64) -> StoreResult<Option<Template>> {
        let template = sqlx::query_as::<_, Template>("SELECT * FROM templates WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(template)
    }

    /// Highest version for the task.
    pub async fn latest_for_task(
        pool: &DatabasePool,
        task_id: i64,
    ) -> StoreResult<Option<Template>> {
        let template = sqlx::query_as::<_, Template>(
            "SELECT * FROM templates WHERE task_id = ? ORDER BY version DESC LIMIT 1",
        )
        .bind(task_id)
        .fetch_optional(pool)
        .await?;
        Ok(template)
    }

    /// All versions for the task, oldest first.
    pub async fn versions(pool: &DatabasePool, task_id: i64) -> StoreResult<Vec<Template>> {
        let templates = sqlx::query_as::<_, Template>(
            "SELECT * FROM templates WHERE task_id = ? ORDER BY version ASC",
        )
        .bind(task_id)
        .fetch_all(pool)
        .await?;
        Ok(templates)
    }

    pub async fn list(pool: &DatabasePool) -> StoreResult<Vec<Template>> {
        let templates = sqlx::query_as::<_, Template>(
            "SELECT * FROM templates ORDER BY task_id ASC, version ASC",
        )
        .fetch_all(pool)
        .await?;
        Ok(templates)
    }

    /// Placeholder names for a template, sorted.
    pub async fn placeholders(pool: &DatabasePool, template_id: i64) -> StoreResult<Vec<String>> {
        let rows = sqlx::query_as::<_, Placeholder>(
            "SELECT * FROM placeholders WHERE template_id = ? ORDER BY name ASC",
        )
        .bind(template_id)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|p| p.name).collect())
    }

    pub async fn delete(pool: &DatabasePool, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM templates WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
