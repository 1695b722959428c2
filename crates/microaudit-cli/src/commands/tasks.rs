//! Tasks commands

use anyhow::{Context, Result};
use clap::Subcommand;

use microaudit_core::config::Config;
use microaudit_core::domain::{task_progress, EditableRecord, Entity, RecordId, Task};
use microaudit_sync::{InputField, SyncController};

use super::session::{describe_mutation, describe_save, key_for, AppSession};
use crate::output::{get_formatter, OutputFormat, OutputFormatter};

#[derive(Debug, Subcommand)]
pub enum TasksCommand {
    /// List tasks
    List {
        /// Only tasks in this workspace
        #[arg(long, short)]
        workspace: Option<String>,
    },
    /// Add a task
    Add {
        title: String,
        /// Workspace the task belongs to
        #[arg(long, short)]
        workspace: Option<String>,
    },
    /// Mark a task done, or open again
    Toggle { id: String },
    /// Change a task's title
    Rename { id: String, title: String },
    /// Delete a task
    Delete { id: String },
}

impl TasksCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let fmt = get_formatter(format == OutputFormat::Json);
        let app = AppSession::connect(config)?;
        app.require_user().await?;
        let tasks: SyncController<Task> = app.controller().await?;

        let result = self.run(&tasks, &*fmt, format).await;
        app.report(&*fmt);
        result
    }

    async fn run(
        &self,
        tasks: &SyncController<Task>,
        fmt: &dyn OutputFormatter,
        format: OutputFormat,
    ) -> Result<()> {
        match self {
            TasksCommand::List { workspace } => {
                let workspace = workspace
                    .as_deref()
                    .map(RecordId::new)
                    .transpose()
                    .context("Invalid workspace id")?;
                let records: Vec<_> = tasks
                    .records()
                    .await
                    .into_iter()
                    .filter(|r| in_workspace(r, workspace.as_ref()))
                    .collect();
                let progress = task_progress(records.iter().map(|r| r.value()));

                if format == OutputFormat::Json {
                    let items: Vec<_> = records.iter().map(task_json).collect();
                    fmt.print_json(&serde_json::json!({
                        "tasks": items,
                        "progress": progress,
                    }));
                    return Ok(());
                }
                if records.is_empty() {
                    fmt.info("No tasks");
                    return Ok(());
                }
                fmt.success(&format!("{} tasks, {progress}% done", records.len()));
                for record in &records {
                    fmt.info(&task_line(record));
                }
                Ok(())
            }
            TasksCommand::Add { title, workspace } => {
                let workspace = workspace
                    .as_deref()
                    .map(RecordId::new)
                    .transpose()
                    .context("Invalid workspace id")?;
                let input = InputField::new(title.as_str());
                let outcome = tasks.add(&input, workspace).await?;
                fmt.success(&describe_mutation(Task::LABEL, "Added", &outcome)?);
                Ok(())
            }
            TasksCommand::Toggle { id } => {
                let key = key_for(tasks, id).await?;
                let outcome = tasks.toggle_done(key).await?;
                let done = tasks.get(key).await.map(|r| r.value().done).unwrap_or(false);
                let verb = if done { "Completed" } else { "Reopened" };
                fmt.success(&describe_mutation(Task::LABEL, verb, &outcome)?);
                Ok(())
            }
            TasksCommand::Rename { id, title } => {
                let key = key_for(tasks, id).await?;
                tasks.edit(key, |task| task.title = title.clone()).await?;
                let outcome = tasks.flush(key).await;
                fmt.success(&describe_save(Task::LABEL, &outcome)?);
                Ok(())
            }
            TasksCommand::Delete { id } => {
                let key = key_for(tasks, id).await?;
                let outcome = tasks.delete(key).await?;
                fmt.success(&describe_mutation(Task::LABEL, "Deleted", &outcome)?);
                Ok(())
            }
        }
    }
}

fn in_workspace(record: &EditableRecord<Task>, workspace: Option<&RecordId>) -> bool {
    match workspace {
        Some(id) => record.value().workspace_id.as_ref() == Some(id),
        None => true,
    }
}

fn task_json(record: &EditableRecord<Task>) -> serde_json::Value {
    let task = record.value();
    serde_json::json!({
        "id": record.id().map(|id| id.as_str()),
        "title": task.title,
        "done": task.done,
        "workspace_id": task.workspace_id.as_ref().map(|id| id.as_str()),
    })
}

fn task_line(record: &EditableRecord<Task>) -> String {
    let task = record.value();
    let id = record.id().map(|id| id.as_str()).unwrap_or("-");
    let mark = if task.done { "[x]" } else { "[ ]" };
    format!("{mark} {id}  {}", task.title)
}
