use super::models::{Task, Template};
use super::templates::TemplateRepository;
use super::{now, DatabasePool};
use crate::config::TaskDefinition;
use crate::error::{Result, StoreResult};
use crate::template::PromptTemplate;

/// CRUD for task rows, unique by name.
pub struct TaskRepository;

impl TaskRepository {
    /// Insert a task. Fails if the name is taken.
    pub async fn create(pool: &DatabasePool, definition: &TaskDefinition) -> StoreResult<Task> {
        let task = sqlx::query_as::<_, Task>(
            "INSERT INTO tasks (name, kind, output_format, description, system_prompt, created_at)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING *",
        )
        .bind(&definition.name)
        .bind(definition.kind.as_str())
        .bind(definition.output_format.as_str())
        .bind(&definition.description)
        .bind(&definition.system)
        .bind(now())
        .fetch_one(pool)
        .await?;
        Ok(task)
    }

    /// Insert or update the task's attributes, keeping its id.
    pub async fn upsert(pool: &DatabasePool, definition: &TaskDefinition) -> StoreResult<Task> {
        let task = sqlx::query_as::<_, Task>(
            "INSERT INTO tasks (name, kind, output_format, description, system_prompt, created_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT (name) DO UPDATE SET
                kind = excluded.kind,
                output_format = excluded.output_format,
                description = excluded.description,
                system_prompt = excluded.system_prompt
             RETURNING *",
        )
        .bind(&definition.name)
        .bind(definition.kind.as_str())
        .bind(definition.output_format.as_str())
        .bind(&definition.description)
        .bind(&definition.system)
        .bind(now())
        .fetch_one(pool)
        .await?;
        Ok(task)
    }

    pub async fn find_by_id(pool: &DatabasePool, id: i64) -> StoreResult<Option<Task>> {
        let task = sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(task)
    }

    pub async fn find_by_name(pool: &DatabasePool, name: &str) -> StoreResult<Option<Task>> {
        let task = sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE name = ?")
            .bind(name)
            .fetch_optional(pool)
            .await?;
        Ok(task)
    }

    pub async fn list(pool: &DatabasePool) -> StoreResult<Vec<Task>> {
        let tasks = sqlx::query_as::<_, Task>("SELECT * FROM tasks ORDER BY name ASC")
            .fetch_all(pool)
            .await?;
        Ok(tasks)
    }

    /// Delete a task with its templates and evaluation results.
    pub async fn delete(pool: &DatabasePool, name: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE name = ?")
            .bind(name)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Every task that has a template, combined with its latest version.
    pub async fn definitions(pool: &DatabasePool) -> StoreResult<Vec<TaskDefinition>> {
        let mut definitions = Vec::new();
        for task in Self::list(pool).await? {
            match TemplateRepository::latest_for_task(pool, task.id).await? {
                Some(template) => definitions.push(task.to_definition(&template.body)?),
                None => tracing::debug!("Task {} has no template, skipping", task.name),
            }
        }
        Ok(definitions)
    }

    /// Store a definition: upsert the task and save its template as a new
    /// version when the body differs from the latest one.
    ///
    /// Returns the task and the template version created, if any.
    pub async fn sync_definition(
        pool: &DatabasePool,
        definition: &TaskDefinition,
    ) -> Result<(Task, Option<Template>)> {
        let template = PromptTemplate::new(&definition.name, &definition.template)?;
        let task = Self::upsert(pool, definition).await?;

        let latest = TemplateRepository::latest_for_task(pool, task.id).await?;
        if latest.is_some_and(|t| t.body == definition.template) {
            return Ok((task, None));
        }
        let saved = TemplateRepository::save(pool, task.id, &template).await?;
        Ok((task, Some(saved)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ResponseFormat, TaskKind};
    use crate::error::PrismError;
    use crate::testing::memory_database;

    fn definition(name: &str, template: &str) -> TaskDefinition {
        TaskDefinition::new(name, template)
    }

    #[tokio::test]
    async fn test_create_and_find_by_name() {
        let db = memory_database().await;
        let def = definition("attribute_extraction", "{{ item_title }}")
            .with_output_format(ResponseFormat::Json);
        let task = TaskRepository::create(db.pool(), &def).await.unwrap();
        assert_eq!(task.output_format, "json");
        assert_eq!(task.kind, "enrichment");

        let found = TaskRepository::find_by_name(db.pool(), "attribute_extraction")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, task.id);
        assert!(TaskRepository::find_by_name(db.pool(), "missing")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_name_is_unique() {
        let db = memory_database().await;
        let def = definition("title_enhancement", "{{ item_title }}");
        TaskRepository::create(db.pool(), &def).await.unwrap();
        let err = TaskRepository::create(db.pool(), &def).await.unwrap_err();
        assert!(err.is_constraint_violation());
    }

    #[tokio::test]
    async fn test_upsert_updates_in_place() {
        let db = memory_database().await;
        let mut def = definition("title_enhancement", "{{ item_title }}");
        let first = TaskRepository::upsert(db.pool(), &def).await.unwrap();

        def.kind = TaskKind::Evaluation;
        def.description = Some("Judge titles".into());
        let second = TaskRepository::upsert(db.pool(), &def).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.kind, "evaluation");
        assert_eq!(second.description.as_deref(), Some("Judge titles"));
    }

    #[tokio::test]
    async fn test_sync_definition_versions_only_on_change() {
        let db = memory_database().await;
        let mut def = definition("title_enhancement", "Improve {{ item_title }}");

        let (_, created) = TaskRepository::sync_definition(db.pool(), &def).await.unwrap();
        assert_eq!(created.unwrap().version, 1);

        let (_, unchanged) = TaskRepository::sync_definition(db.pool(), &def).await.unwrap();
        assert!(unchanged.is_none());

        def.template = "Improve {{ item_title }} for {{ item_product_type }}".into();
        let (task, changed) = TaskRepository::sync_definition(db.pool(), &def).await.unwrap();
        assert_eq!(changed.unwrap().version, 2);

        let definitions = TaskRepository::definitions(db.pool()).await.unwrap();
        assert_eq!(definitions.len(), 1);
        assert_eq!(definitions[0].template, def.template);
        assert_eq!(definitions[0].name, task.name);
    }

    #[tokio::test]
    async fn test_sync_definition_rejects_invalid_template() {
        let db = memory_database().await;
        let def = definition("broken", "{{ item_title");
        let err = TaskRepository::sync_definition(db.pool(), &def).await.unwrap_err();
        assert!(matches!(err, PrismError::Template(_)));
        assert!(TaskRepository::list(db.pool()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_definitions_skip_tasks_without_templates() {
        let db = memory_database().await;
        TaskRepository::create(db.pool(), &definition("bare", "x"))
            .await
            .unwrap();
        assert!(TaskRepository::definitions(db.pool()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_cascades_to_templates() {
        let db = memory_database().await;
        let def = definition("title_enhancement", "{{ item_title }}");
        let (task, template) = TaskRepository::sync_definition(db.pool(), &def).await.unwrap();
        let template = template.unwrap();

        assert!(TaskRepository::delete(db.pool(), "title_enhancement").await.unwrap());
        assert!(TemplateRepository::find_by_id(db.pool(), template.id)
            .await
            .unwrap()
            .is_none());
        assert!(TemplateRepository::placeholders(db.pool(), template.id)
            .await
            .unwrap()
            .is_empty());
        assert!(TaskRepository::find_by_id(db.pool(), task.id)
            .await
            .unwrap()
            .is_none());
    }
}
