use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use super::store::{parse_dt, SqliteStore};
use crate::domain::errors::StoreResult;
use crate::domain::models::{Schedule, Template};
use crate::domain::ports::ScheduleStore;

#[async_trait]
impl ScheduleStore for SqliteStore {
    async fn create_schedule(&self, schedule: &Schedule) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO schedules (id, name, cron_expr, task_template_ids, repository, enabled,
                last_run, next_run, retries, retry_delay_ms)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(schedule.id.to_string())
        .bind(&schedule.name)
        .bind(&schedule.cron_expr)
        .bind(serde_json::to_string(&schedule.task_template_ids)?)
        .bind(&schedule.repository)
        .bind(schedule.enabled)
        .bind(schedule.last_run.map(|d| d.to_rfc3339()))
        .bind(schedule.next_run.map(|d| d.to_rfc3339()))
        .bind(schedule.retries as i64)
        .bind(schedule.retry_delay_ms as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_schedules(&self, enabled_only: bool) -> StoreResult<Vec<Schedule>> {
        let rows = if enabled_only {
            sqlx::query("SELECT * FROM schedules WHERE enabled = 1").fetch_all(&self.pool).await?
        } else {
            sqlx::query("SELECT * FROM schedules").fetch_all(&self.pool).await?
        };
        Ok(rows.into_iter().map(row_to_schedule).collect())
    }

    async fn update_schedule_run(&self, id: Uuid, last_run: DateTime<Utc>, next_run: Option<DateTime<Utc>>) -> StoreResult<()> {
        sqlx::query("UPDATE schedules SET last_run = ?, next_run = ? WHERE id = ?")
            .bind(last_run.to_rfc3339())
            .bind(next_run.map(|d| d.to_rfc3339()))
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_schedule_enabled(&self, id: Uuid, enabled: bool) -> StoreResult<()> {
        sqlx::query("UPDATE schedules SET enabled = ? WHERE id = ?")
            .bind(enabled)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_schedule(&self, schedule: &Schedule) -> StoreResult<()> {
        sqlx::query(
            "UPDATE schedules SET name = ?, cron_expr = ?, task_template_ids = ?, repository = ?,
                enabled = ?, retries = ?, retry_delay_ms = ? WHERE id = ?",
        )
        .bind(&schedule.name)
        .bind(&schedule.cron_expr)
        .bind(serde_json::to_string(&schedule.task_template_ids)?)
        .bind(&schedule.repository)
        .bind(schedule.enabled)
        .bind(schedule.retries as i64)
        .bind(schedule.retry_delay_ms as i64)
        .bind(schedule.id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_schedule(&self, id: Uuid) -> StoreResult<()> {
        sqlx::query("DELETE FROM schedules WHERE id = ?").bind(id.to_string()).execute(&self.pool).await?;
        Ok(())
    }

    async fn create_template(&self, template: &Template) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO templates (id, name, description, category, role, prompt_template,
                estimated_minutes, required_context) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(template.id.to_string())
        .bind(&template.name)
        .bind(&template.description)
        .bind(&template.category)
        .bind(&template.role)
        .bind(&template.prompt_template)
        .bind(template.estimated_minutes.map(|m| m as i64))
        .bind(serde_json::to_string(&template.required_context)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_template(&self, id: Uuid) -> StoreResult<Option<Template>> {
        let row = sqlx::query("SELECT * FROM templates WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(row_to_template))
    }

    async fn list_templates(&self) -> StoreResult<Vec<Template>> {
        let rows = sqlx::query("SELECT * FROM templates").fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(row_to_template).collect())
    }

    async fn update_template(&self, template: &Template) -> StoreResult<()> {
        sqlx::query(
            "UPDATE templates SET name = ?, description = ?, category = ?, role = ?, prompt_template = ?,
                estimated_minutes = ?, required_context = ? WHERE id = ?",
        )
        .bind(&template.name)
        .bind(&template.description)
        .bind(&template.category)
        .bind(&template.role)
        .bind(&template.prompt_template)
        .bind(template.estimated_minutes.map(|m| m as i64))
        .bind(serde_json::to_string(&template.required_context)?)
        .bind(template.id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_template(&self, id: Uuid) -> StoreResult<()> {
        sqlx::query("DELETE FROM templates WHERE id = ?").bind(id.to_string()).execute(&self.pool).await?;
        Ok(())
    }
}

fn row_to_schedule(row: sqlx::sqlite::SqliteRow) -> Schedule {
    Schedule {
        id: Uuid::parse_str(&row.get::<String, _>("id")).unwrap_or_else(|_| Uuid::nil()),
        name: row.get("name"),
        cron_expr: row.get("cron_expr"),
        task_template_ids: serde_json::from_str(&row.get::<String, _>("task_template_ids")).unwrap_or_default(),
        repository: row.get("repository"),
        enabled: row.get("enabled"),
        last_run: row.get::<Option<String>, _>("last_run").map(|s| parse_dt(&s)),
        next_run: row.get::<Option<String>, _>("next_run").map(|s| parse_dt(&s)),
        retries: row.get::<i64, _>("retries") as u32,
        retry_delay_ms: row.get::<i64, _>("retry_delay_ms") as u64,
    }
}

fn row_to_template(row: sqlx::sqlite::SqliteRow) -> Template {
    Template {
        id: Uuid::parse_str(&row.get::<String, _>("id")).unwrap_or_else(|_| Uuid::nil()),
        name: row.get("name"),
        description: row.get("description"),
        category: row.get("category"),
        role: row.get("role"),
        prompt_template: row.get("prompt_template"),
        estimated_minutes: row.get::<Option<i64>, _>("estimated_minutes").map(|m| m as u32),
        required_context: serde_json::from_str(&row.get::<String, _>("required_context")).unwrap_or_default(),
    }
}
