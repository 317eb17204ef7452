use super::models::{EvaluationResult, NewEvaluation, ScoreSummary};
use super::{now, DatabasePool};
use crate::error::StoreResult;

/// Judge and human scores for generated outputs.
pub struct EvaluationRepository;

impl EvaluationRepository {
    pub async fn record(
        pool: &DatabasePool,
        evaluation: &NewEvaluation,
    ) -> StoreResult<EvaluationResult> {
        let result = sqlx::query_as::<_, EvaluationResult>(
            "INSERT INTO evaluation_results
                (task_id, provider_id, item_key, output, score, reasoning, source, evaluator,
                 created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING *",
        )
        .bind(evaluation.task_id)
        .bind(evaluation.provider_id)
        .bind(&evaluation.item_key)
        .bind(&evaluation.output)
        .bind(evaluation.score)
        .bind(&evaluation.reasoning)
        .bind(evaluation.source.as_str())
        .bind(&evaluation.evaluator)
        .bind(now())
        .fetch_one(pool)
        .await?;
        Ok(result)
    }

    pub async fn find_by_id(pool: &DatabasePool, id: i64) -> StoreResult<Option<EvaluationResult>> {
        let result =
            sqlx::query_as::<_, EvaluationResult>("SELECT * FROM evaluation_results WHERE id = ?")
                .bind(id)
                .fetch_optional(pool)
                .await?;
        Ok(result)
    }

    /// Results for a task, newest first.
    pub async fn list_for_task(
        pool: &DatabasePool,
        task_id: i64,
    ) -> StoreResult<Vec<EvaluationResult>> {
        let results = sqlx::query_as::<_, EvaluationResult>(
            "SELECT * FROM evaluation_results WHERE task_id = ? ORDER BY id DESC",
        )
        .bind(task_id)
        .fetch_all(pool)
        .await?;
        Ok(results)
    }

    /// Results for one item across tasks, newest first.
    pub async fn list_for_item(
        pool: &DatabasePool,
        item_key: &str,
    ) -> StoreResult<Vec<EvaluationResult>> {
        let results = sqlx::query_as::<_, EvaluationResult>(
            "SELECT * FROM evaluation_results WHERE item_key = ? ORDER BY id DESC",
        )
        .bind(item_key)
        .fetch_all(pool)
        .await?;
        Ok(results)
    }

    pub async fn list(pool: &DatabasePool, limit: i64) -> StoreResult<Vec<EvaluationResult>> {
        let results = sqlx::query_as::<_, EvaluationResult>(
            "SELECT * FROM evaluation_results ORDER BY id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(results)
    }

    pub async fn delete(pool: &DatabasePool, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM evaluation_results WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Count and mean score per task, provider row and source.
    ///
    /// Providers are grouped by row id, so the same `name/model` at two
    /// temperatures reports two rows.
    pub async fn score_summary(pool: &DatabasePool) -> StoreResult<Vec<ScoreSummary>> {
        let rows = sqlx::query_as::<_, ScoreSummary>(
            "SELECT t.name AS task,
                    CASE WHEN p.id IS NULL THEN NULL ELSE p.name || '/' || p.model END AS provider,
                    p.temperature AS temperature,
                    e.source AS source,
                    COUNT(*) AS count,
                    AVG(e.score) AS mean_score
             FROM evaluation_results e
             JOIN tasks t ON t.id = e.task_id
             LEFT JOIN providers p ON p.id = e.provider_id
             GROUP BY t.id, p.id, e.source
             ORDER BY t.name ASC, provider ASC, temperature ASC, e.source ASC",
        )
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }
}
