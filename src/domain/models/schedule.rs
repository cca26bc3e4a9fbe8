//! Auto-scheduler Schedule & Template entities (spec §3, §4.F).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: Uuid,
    pub name: String,
    pub cron_expr: String,
    pub task_template_ids: Vec<Uuid>,
    pub repository: Option<String>,
    pub enabled: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub retries: u32,
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub category: String,
    pub role: String,
    pub prompt_template: String,
    pub estimated_minutes: Option<u32>,
    pub required_context: Vec<String>,
}

/// Placeholders recognised in `promptTemplate` (spec §4.F).
pub const PLACEHOLDERS: &[&str] = &["repository", "branch", "prNumber", "files", "labels"];

/// Substitute `{placeholder}` tokens in a template's prompt with literal
/// values from `context`. Fails if any of `required_context` is absent.
pub fn render_prompt(
    template: &Template,
    context: &std::collections::HashMap<String, String>,
) -> Result<String, String> {
    for required in &template.required_context {
        if !context.contains_key(required) {
            return Err(format!("missing required context: {required}"));
        }
    }
    let mut rendered = template.prompt_template.clone();
    for placeholder in PLACEHOLDERS {
        if let Some(value) = context.get(*placeholder) {
            rendered = rendered.replace(&format!("{{{placeholder}}}"), value);
        }
    }
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> Template {
        Template {
            id: Uuid::new_v4(),
            name: "pr-review".into(),
            description: "review a PR".into(),
            category: "review".into(),
            role: "worker".into(),
            prompt_template: "Review PR #{prNumber} on {repository}".into(),
            estimated_minutes: Some(10),
            required_context: vec!["prNumber".into(), "repository".into()],
        }
    }

    #[test]
    fn renders_with_all_required_context() {
        let t = template();
        let mut ctx = std::collections::HashMap::new();
        ctx.insert("prNumber".into(), "42".into());
        ctx.insert("repository".into(), "acme/widget".into());
        let rendered = render_prompt(&t, &ctx).unwrap();
        assert_eq!(rendered, "Review PR #42 on acme/widget");
    }

    #[test]
    fn fails_on_missing_required_context() {
        let t = template();
        let ctx = std::collections::HashMap::new();
        assert!(render_prompt(&t, &ctx).is_err());
    }
}
