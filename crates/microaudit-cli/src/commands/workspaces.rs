//! Workspaces commands

use anyhow::{Context, Result};
use clap::Subcommand;

use microaudit_core::config::Config;
use microaudit_core::domain::{
    Color, EditableRecord, Entity, RecordId, Resource, ResourceKind, Workspace,
};
use microaudit_sync::{InputField, SyncController};

use super::session::{describe_mutation, key_for, AppSession};
use crate::output::{get_formatter, OutputFormat, OutputFormatter};

#[derive(Debug, Subcommand)]
pub enum WorkspacesCommand {
    /// List workspaces
    List {
        /// Only workspaces whose title contains this text
        #[arg(long, short)]
        query: Option<String>,
    },
    /// Create a workspace
    New { title: String },
    /// Rename a workspace
    Rename { id: String, title: String },
    /// Set a workspace's emoji icon
    Icon { id: String, icon: String },
    /// Set a workspace's color (#RRGGBB)
    Color { id: String, color: String },
    /// Delete a workspace
    Delete { id: String },
    /// List the links and images saved in a workspace
    Resources { id: String },
    /// Save a link in a workspace
    Link {
        id: String,
        url: String,
        /// Title shown instead of the URL
        #[arg(long, short, default_value = "")]
        title: String,
    },
}

impl WorkspacesCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let fmt = get_formatter(format == OutputFormat::Json);
        let app = AppSession::connect(config)?;
        app.require_user().await?;
        let workspaces: SyncController<Workspace> = app.controller().await?;

        let result = self.run(&app, &workspaces, &*fmt, format).await;
        app.report(&*fmt);
        result
    }

    async fn run(
        &self,
        app: &AppSession,
        workspaces: &SyncController<Workspace>,
        fmt: &dyn OutputFormatter,
        format: OutputFormat,
    ) -> Result<()> {
        let label = Workspace::LABEL;
        let outcome = match self {
            WorkspacesCommand::List { query } => {
                let query = query.as_deref().unwrap_or_default();
                let records: Vec<_> = workspaces
                    .records()
                    .await
                    .into_iter()
                    .filter(|r| r.value().matches_query(query))
                    .collect();
                if format == OutputFormat::Json {
                    let items: Vec<_> = records.iter().map(workspace_json).collect();
                    fmt.print_json(&serde_json::json!({ "workspaces": items }));
                } else if records.is_empty() {
                    fmt.info("No workspaces");
                } else {
                    for record in &records {
                        fmt.info(&workspace_line(record));
                    }
                }
                return Ok(());
            }
            WorkspacesCommand::New { title } => {
                let input = InputField::new(title.as_str());
                let outcome = workspaces.create(&input, Workspace::new).await?;
                ("Created", outcome)
            }
            WorkspacesCommand::Rename { id, title } => {
                let key = key_for(workspaces, id).await?;
                ("Renamed", workspaces.rename(key, title).await?)
            }
            WorkspacesCommand::Icon { id, icon } => {
                let key = key_for(workspaces, id).await?;
                ("Updated", workspaces.set_icon(key, icon).await?)
            }
            WorkspacesCommand::Color { id, color } => {
                let color = Color::new(color.as_str()).context("Invalid color")?;
                let key = key_for(workspaces, id).await?;
                ("Recolored", workspaces.set_color(key, color).await?)
            }
            WorkspacesCommand::Delete { id } => {
                let key = key_for(workspaces, id).await?;
                ("Deleted", workspaces.delete(key).await?)
            }
            WorkspacesCommand::Resources { id } => {
                let workspace = existing_workspace(workspaces, id).await?;
                let resources: SyncController<Resource> = app.controller().await?;
                let records = resources.in_workspace(&workspace).await;
                if format == OutputFormat::Json {
                    let items: Vec<_> = records.iter().map(resource_json).collect();
                    fmt.print_json(&serde_json::json!({ "resources": items }));
                } else if records.is_empty() {
                    fmt.info("No resources");
                } else {
                    for record in &records {
                        fmt.info(&resource_line(record));
                    }
                }
                return Ok(());
            }
            WorkspacesCommand::Link { id, url, title } => {
                let workspace = existing_workspace(workspaces, id).await?;
                let resources: SyncController<Resource> = app.controller().await?;
                let input = InputField::new(url.as_str());
                let outcome = resources.add_link(workspace, title, &input).await?;
                fmt.success(&describe_mutation(Resource::LABEL, "Saved", &outcome)?);
                return Ok(());
            }
        };
        let (verb, outcome) = outcome;
        fmt.success(&describe_mutation(label, verb, &outcome)?);
        Ok(())
    }
}

/// Identifier of a workspace known to the signed-in user
async fn existing_workspace(workspaces: &SyncController<Workspace>, id: &str) -> Result<RecordId> {
    key_for(workspaces, id).await?;
    RecordId::new(id).context("Invalid workspace id")
}

fn resource_json(record: &EditableRecord<Resource>) -> serde_json::Value {
    let resource = record.value();
    serde_json::json!({
        "id": record.id().map(|id| id.as_str()),
        "workspace_id": resource.workspace_id.as_str(),
        "type": resource.kind,
        "title": resource.title,
        "url": resource.url,
    })
}

fn resource_line(record: &EditableRecord<Resource>) -> String {
    let resource = record.value();
    let id = record.id().map(|id| id.as_str()).unwrap_or("-");
    let kind = match resource.kind {
        ResourceKind::Image => "image",
        ResourceKind::Link => "link ",
    };
    let name = resource.display_name();
    if name == resource.url {
        format!("{kind} {id}  {name}")
    } else {
        format!("{kind} {id}  {name}  {}", resource.url)
    }
}

fn workspace_json(record: &EditableRecord<Workspace>) -> serde_json::Value {
    let workspace = record.value();
    serde_json::json!({
        "id": record.id().map(|id| id.as_str()),
        "title": workspace.title,
        "icon": workspace.icon,
        "color": workspace.color.as_str(),
    })
}

fn workspace_line(record: &EditableRecord<Workspace>) -> String {
    let workspace = record.value();
    let id = record.id().map(|id| id.as_str()).unwrap_or("-");
    format!("{} {id}  {}", workspace.icon, workspace.title)
}
