mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use commands::Command;
use modelsmith_core::models::{Attachment, StoreResult, encode_files};
use modelsmith_core::repositories::{WorkspaceJsonRepository, WorkspaceRepository};
use modelsmith_core::services::SessionEvent;
use modelsmith_core::settings::{SettingsJsonRepository, SettingsRepository};
use modelsmith_core::{ChatSession, GeminiGateway, ModelType, ProjectsStore, SendOutcome};

/// Interactive DDD and database modeling assistant
#[derive(Parser, Debug)]
#[command(name = "modelsmith", version)]
struct Args {
    /// Settings file (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Model to start with: expert or fast
    #[arg(long)]
    model: Option<ModelType>,

    /// Workspace file holding projects and conversations
    #[arg(long)]
    workspace: Option<PathBuf>,

    /// Keep everything in memory; nothing is written to disk
    #[arg(long)]
    no_persist: bool,
}

/// A running send, tagged with the project it was sent to
type PendingSend = JoinHandle<(String, StoreResult<SendOutcome>)>;

struct Shell {
    session: ChatSession,
    workspace: Option<WorkspaceJsonRepository>,
    model: ModelType,
    staged: Vec<Attachment>,
    pending: Option<PendingSend>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so they do not interleave with the conversation
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings_repo = match &args.config {
        Some(path) => SettingsJsonRepository::at(path),
        None => SettingsJsonRepository::new().context("Failed to locate settings")?,
    };
    let mut settings = settings_repo
        .load()
        .await
        .with_context(|| format!("Failed to load settings from {}", settings_repo.path().display()))?;
    settings.apply_env_overrides();
    if settings.api_key.is_none() {
        warn!("No Gemini API key configured; requests will fail until one is set");
    }

    let workspace = if args.no_persist {
        None
    } else {
        match args.workspace.clone().or_else(|| settings.workspace_path.clone()) {
            Some(path) => Some(WorkspaceJsonRepository::at(path)),
            None => Some(WorkspaceJsonRepository::new().context("Failed to locate workspace")?),
        }
    };

    let store = match &workspace {
        Some(repo) => match repo.load().await {
            Ok(Some(snapshot)) => ProjectsStore::from_snapshot(snapshot),
            Ok(None) => ProjectsStore::with_default_project(),
            Err(e) => {
                warn!(error = %e, path = %repo.path().display(), "Failed to load workspace, starting fresh");
                ProjectsStore::with_default_project()
            }
        },
        None => ProjectsStore::with_default_project(),
    };

    let gateway = Arc::new(GeminiGateway::new(settings.api_key.clone()));
    let mut session = ChatSession::new(store, gateway);
    if let Some(limit) = settings.request_timeout() {
        session = session.with_request_timeout(limit);
    }

    info!("Starting modelsmith");

    let mut shell = Shell {
        session,
        workspace,
        model: args.model.unwrap_or(settings.default_model),
        staged: Vec::new(),
        pending: None,
    };
    shell.run().await
}

/// Resolves when the pending send finishes; never resolves when idle
async fn wait_pending(
    pending: &mut Option<PendingSend>,
) -> Result<(String, StoreResult<SendOutcome>), tokio::task::JoinError> {
    match pending {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

/// Content of the newest message in `project_id`, which need not be active
fn last_reply(session: &ChatSession, project_id: &str) -> Option<String> {
    session.read(|store| {
        store
            .get(project_id)?
            .last_message()
            .map(|m| m.content.clone())
    })
}

impl Shell {
    async fn run(&mut self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut events = self.session.subscribe();

        self.print_active();
        println!("Type /help for commands.");

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line.context("Failed to read input")? else {
                        break;
                    };
                    match commands::parse(&line) {
                        Ok(Some(Command::Quit)) => break,
                        Ok(Some(command)) => self.execute(command).await,
                        Ok(None) => {}
                        Err(e) => println!("{e}"),
                    }
                }
                joined = wait_pending(&mut self.pending) => {
                    self.pending = None;
                    match joined {
                        Ok((project_id, Ok(outcome))) => self.report(&project_id, outcome),
                        Ok((_, Err(e))) => println!("Could not send: {e}"),
                        Err(e) => warn!(error = %e, "Send task failed"),
                    }
                    self.persist().await;
                }
                event = events.recv() => match event {
                    Ok(SessionEvent::SchemaUpdated { project_id }) => {
                        info!(project_id = %project_id, "Schema updated");
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Missed session events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }

        if self.session.stop() {
            info!("Stopped pending request on exit");
        }
        self.persist().await;
        Ok(())
    }

    async fn execute(&mut self, command: Command) {
        let result = match command {
            Command::Send(text) => {
                self.send(text);
                return;
            }
            Command::Stop => {
                if !self.session.stop() {
                    println!("Nothing to stop.");
                }
                return;
            }
            Command::Help => {
                println!("{}", commands::HELP);
                return;
            }
            Command::Quit => return,
            Command::ListProjects => {
                self.print_projects();
                return;
            }
            Command::ListDocs => {
                self.print_documents();
                return;
            }
            Command::ShowDoc(id) => {
                self.print_document(&id);
                return;
            }
            Command::ShowSchema => {
                println!("{}", self.session.active_project().schema_code());
                return;
            }
            Command::Attach(paths) => {
                let attachments = encode_files(&paths).await;
                if attachments.len() < paths.len() {
                    println!("Some files could not be attached (see log).");
                }
                for a in &attachments {
                    println!("Attached {} ({})", a.name, a.mime_type);
                }
                self.staged.extend(attachments);
                return;
            }
            Command::Model(None) => {
                for model in ModelType::ALL {
                    let marker = if model == self.model { "*" } else { " " };
                    println!("{marker} {} - {}", model.label(), model.description());
                }
                return;
            }
            Command::Model(Some(model)) => {
                self.model = model;
                println!("Using {}", model.label());
                return;
            }
            Command::NewProject(name) => self.session.create_project(&name).map(|_| ()),
            Command::UseProject(key) => match self.resolve_project(&key) {
                Some(id) => self.session.select_project(&id),
                None => {
                    println!("No project matches {key}.");
                    return;
                }
            },
            Command::Rename { name, description } => {
                let project = self.session.active_project();
                let description = description.unwrap_or_else(|| project.description().to_string());
                self.session.update_project(project.id(), &name, &description)
            }
            Command::Delete(key) => {
                let id = match key {
                    Some(key) => match self.resolve_project(&key) {
                        Some(id) => id,
                        None => {
                            println!("No project matches {key}.");
                            return;
                        }
                    },
                    None => self.session.active_project().id().to_string(),
                };
                self.session.delete_project(&id)
            }
            Command::AddDoc { title, content } => self
                .session
                .add_document(&title, &content)
                .map(|id| println!("Added document {id}")),
            Command::EditDoc { id, content } => self.session.update_document(&id, &content),
            Command::DeleteDoc(id) => self.session.delete_document(&id),
            Command::SetSchema(code) => self.session.update_schema(&code),
        };

        match result {
            Ok(()) => {
                self.print_active();
                self.persist().await;
            }
            Err(e) => println!("{e}"),
        }
    }

    fn send(&mut self, text: String) {
        if self.pending.is_some() {
            println!("A request is still running; /stop it first.");
            return;
        }

        let session = self.session.clone();
        let project_id = session.active_project().id().to_string();
        let model = self.model;
        let attachments = std::mem::take(&mut self.staged);
        println!("... thinking ({})", model.label());
        self.pending = Some(tokio::spawn(async move {
            let result = session.send_to(&project_id, &text, model, attachments).await;
            (project_id, result)
        }));
    }

    fn report(&self, project_id: &str, outcome: SendOutcome) {
        match outcome {
            SendOutcome::Discarded => println!("(response discarded)"),
            SendOutcome::Completed | SendOutcome::Failed(_) => {
                if let Some(reply) = last_reply(&self.session, project_id) {
                    println!("\n{reply}\n");
                }
            }
        }
    }

    /// Accept either a project id or its 1-based position in `/projects`
    fn resolve_project(&self, key: &str) -> Option<String> {
        self.session.read(|store| {
            if let Some(p) = store.get(key) {
                return Some(p.id().to_string());
            }
            let index = key.parse::<usize>().ok()?.checked_sub(1)?;
            store.list().get(index).map(|p| p.id().to_string())
        })
    }

    fn print_active(&self) {
        let project = self.session.active_project();
        println!(
            "[{}] {} messages, {} documents",
            project.name(),
            project.messages().len(),
            project.documents().len()
        );
    }

    fn print_projects(&self) {
        self.session.read(|store| {
            for (i, p) in store.list().iter().enumerate() {
                let marker = if p.id() == store.active_id() { "*" } else { " " };
                println!("{marker} {}. {} ({})", i + 1, p.name(), p.id());
            }
        });
    }

    fn print_documents(&self) {
        let project = self.session.active_project();
        if project.documents().is_empty() {
            println!("No documents.");
        }
        for doc in project.documents() {
            println!("  {} {}", doc.id, doc.title);
        }
    }

    fn print_document(&self, id: &str) {
        match self.session.active_project().document(id) {
            Some(doc) => println!("{}", doc.content),
            None => println!("No document {id}."),
        }
    }

    async fn persist(&self) {
        let Some(repo) = &self.workspace else {
            return;
        };
        if let Err(e) = repo.save(self.session.snapshot()).await {
            warn!(error = %e, path = %repo.path().display(), "Failed to save workspace");
        }
    }
}
