use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use tracing::debug;

use crate::cli::{
    CliCommand, ForumCommand, GroupKey, ListArgs, LoginArgs, ProfileCommand, ProjectCommand,
    TaskCommand, TeamCommand,
};
use crate::config::AppConfig;
use crate::core::model::{Task, TopicCriteria, ViewCriteria};
use crate::core::recycle::BinEntry;
use crate::core::services::{AccountService, ProjectTasksService, TasksService, TodosService};
use crate::core::{
    Backend, Dashboard, HttpBackend, LoadOutcome, MemoryBackend, MutationOutcome, SessionStore,
    TaskInput, ViewSnapshot,
};
use crate::output::{self, labelled, Format, GroupView, ProjectLine, TaskLine};

/// Runs parsed commands against one backend. The dashboard is built on first
/// use and kept, so a shell session shares loaded lists and bins across lines.
pub struct Runner {
    backend: Arc<dyn Backend>,
    account: AccountService,
    dashboard: Option<Dashboard>,
    interactive: bool,
}

impl Runner {
    pub fn new(config: &AppConfig, backend: Arc<dyn Backend>) -> Self {
        let store = SessionStore::new(config.session_path());
        Self {
            account: AccountService::new(Arc::clone(&backend), store),
            backend,
            dashboard: None,
            interactive: false,
        }
    }

    /// Mark the runner as driving a shell, where the dashboard and its
    /// session bins outlive a single command.
    pub fn set_interactive(&mut self, interactive: bool) {
        self.interactive = interactive;
    }

    /// Pick the sample backend for `--demo`, otherwise talk HTTP to the configured server.
    pub fn connect(config: &AppConfig, demo: bool) -> Result<Self> {
        let backend: Arc<dyn Backend> = if demo {
            debug!("using in-memory sample backend");
            Arc::new(MemoryBackend::with_sample_data())
        } else {
            Arc::new(HttpBackend::new(
                config.api_base_url(),
                config.request_timeout(),
            )?)
        };
        Ok(Self::new(config, backend))
    }

    fn dashboard(&mut self) -> Result<Dashboard> {
        if let Some(dashboard) = &self.dashboard {
            return Ok(dashboard.clone());
        }
        let session = self.account.require()?;
        let dashboard = Dashboard::new(Arc::clone(&self.backend), session);
        self.dashboard = Some(dashboard.clone());
        Ok(dashboard)
    }

    pub fn close(&mut self) {
        if let Some(dashboard) = self.dashboard.take() {
            dashboard.close();
        }
    }

    pub async fn execute<W: Write>(
        &mut self,
        command: CliCommand,
        format: Format,
        writer: &mut W,
    ) -> Result<()> {
        match command {
            CliCommand::Login(args) => self.login(args, writer).await,
            CliCommand::Logout => {
                self.close();
                if self.account.logout()? {
                    writeln!(writer, "Signed out.")?;
                } else {
                    writeln!(writer, "No session to sign out of.")?;
                }
                Ok(())
            }
            CliCommand::Whoami => self.whoami(format, writer),
            CliCommand::Todo { action } => {
                let board = Board::Todos(self.dashboard()?.todos().clone());
                run_board(&board, action, self.interactive, format, writer).await
            }
            CliCommand::Task { action } => {
                let board = Board::Tasks(self.dashboard()?.tasks().clone());
                run_board(&board, action, self.interactive, format, writer).await
            }
            CliCommand::Project { action } => {
                let dashboard = self.dashboard()?;
                run_project(&dashboard, action, self.interactive, format, writer).await
            }
            CliCommand::Forum { action } => {
                let dashboard = self.dashboard()?;
                run_forum(&dashboard, action, format, writer).await
            }
            CliCommand::Team { action } => {
                let team = self.dashboard()?.team().clone();
                match action {
                    TeamCommand::Employees => {
                        output::write_employees(writer, format, &team.employees().await?)
                    }
                    TeamCommand::Workload => {
                        output::write_workload(writer, format, &team.workload().await?)
                    }
                }
            }
            CliCommand::Profile { action } => self.profile(action, writer).await,
            CliCommand::Shell => Err(anyhow!("already inside the shell")),
        }
    }

    async fn login<W: Write>(&mut self, args: LoginArgs, writer: &mut W) -> Result<()> {
        let password = match args.password {
            Some(password) => password,
            None => prompt(writer, "Password: ")?,
        };
        let session = self.account.login(&args.user_id, &password).await?;
        self.close();
        writeln!(
            writer,
            "Signed in as {} ({})",
            session.display_name(),
            session.role
        )?;
        Ok(())
    }

    fn whoami<W: Write>(&self, format: Format, writer: &mut W) -> Result<()> {
        let session = self.account.require()?;
        if format == Format::Json {
            return output::write_json(writer, &session);
        }
        let caps = session.capabilities();
        writeln!(
            writer,
            "{} (id {}, {})",
            session.display_name(),
            session.user_id,
            session.role
        )?;
        let mut allowed = Vec::new();
        if caps.assign_tasks {
            allowed.push("assign tasks");
        }
        if caps.manage_projects {
            allowed.push("manage projects");
        }
        if caps.manage_project_tasks {
            allowed.push("manage project tasks");
        }
        if caps.view_workload {
            allowed.push("view workload");
        }
        if !allowed.is_empty() {
            writeln!(writer, "May {}", allowed.join(", "))?;
        }
        Ok(())
    }

    async fn profile<W: Write>(&mut self, action: ProfileCommand, writer: &mut W) -> Result<()> {
        let session = self.account.require()?;
        match action {
            ProfileCommand::Rename { name, password } => {
                let password = match password {
                    Some(password) => password,
                    None => prompt(writer, "Current password: ")?,
                };
                let updated = self
                    .account
                    .rename(&session, &password, &name.join(" "))
                    .await?;
                // Services hold the session by value.
                self.close();
                writeln!(writer, "Display name is now {}", updated.display_name())?;
            }
            ProfileCommand::Password {
                current,
                new_password,
            } => {
                let current = match current {
                    Some(current) => current,
                    None => prompt(writer, "Current password: ")?,
                };
                self.account
                    .change_password(&session, &current, &new_password)
                    .await?;
                writeln!(writer, "Password changed.")?;
            }
        }
        Ok(())
    }
}

fn prompt<W: Write>(writer: &mut W, label: &str) -> Result<String> {
    write!(writer, "{label}")?;
    writer.flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Fail the command when the initial load did not succeed.
fn loaded(outcome: LoadOutcome) -> Result<()> {
    match outcome {
        LoadOutcome::Failed(err) => Err(err.into()),
        LoadOutcome::Applied(_) | LoadOutcome::Discarded => Ok(()),
    }
}

/// The three task-shaped collections behind `todo`, `task` and `project task`.
enum Board {
    Todos(TodosService),
    Tasks(TasksService),
    Project(ProjectTasksService),
}

impl Board {
    fn noun(&self) -> &'static str {
        match self {
            Board::Todos(_) => "to-do",
            Board::Tasks(_) => "task",
            Board::Project(_) => "project task",
        }
    }

    fn command(&self) -> &'static str {
        match self {
            Board::Todos(_) => "todo",
            Board::Tasks(_) => "task",
            Board::Project(_) => "project task <PROJECT>",
        }
    }

    fn plural(&self) -> &'static str {
        match self {
            Board::Todos(_) => "to-dos",
            Board::Tasks(_) => "tasks",
            Board::Project(_) => "project tasks",
        }
    }

    async fn refresh(&self) -> LoadOutcome {
        match self {
            Board::Todos(service) => service.refresh().await,
            Board::Tasks(service) => service.refresh().await,
            Board::Project(service) => service.refresh().await,
        }
    }

    fn list(&self, criteria: &ViewCriteria) -> ViewSnapshot<Task> {
        match self {
            Board::Todos(service) => service.list(criteria),
            Board::Tasks(service) => service.list(criteria),
            Board::Project(service) => service.list(criteria),
        }
    }

    fn group(&self, key: GroupKey, criteria: &ViewCriteria) -> Result<Vec<GroupView<Task>>> {
        let groups = match (self, key) {
            (Board::Todos(service), GroupKey::Status) => labelled(&service.by_status(criteria)),
            (Board::Todos(service), GroupKey::Priority) => labelled(&service.by_priority(criteria)),
            (Board::Tasks(service), GroupKey::Status) => labelled(&service.by_status(criteria)),
            (Board::Tasks(service), GroupKey::Assignee) => labelled(&service.by_assignee(criteria)),
            (Board::Project(service), GroupKey::Status) => labelled(&service.by_status(criteria)),
            (Board::Project(service), GroupKey::Assignee) => {
                labelled(&service.by_assignee(criteria))
            }
            _ => bail!("{} cannot be grouped by {}", self.plural(), key.as_str()),
        };
        Ok(groups)
    }

    fn bin(&self) -> Vec<BinEntry<Task>> {
        match self {
            Board::Todos(service) => service.bin(),
            Board::Tasks(service) => service.bin(),
            Board::Project(service) => service.bin(),
        }
    }

    async fn add(&self, input: TaskInput) -> Result<MutationOutcome> {
        match self {
            Board::Todos(service) => {
                if input.assignee.is_some() {
                    bail!("to-dos cannot be assigned; use `task add --to` instead");
                }
                service.add(input).await
            }
            Board::Tasks(service) => service.assign(input).await,
            Board::Project(service) => service.add(input).await,
        }
    }

    async fn edit(&self, id: &str, input: TaskInput) -> Result<MutationOutcome> {
        match self {
            Board::Todos(service) => service.edit(id, input).await,
            Board::Tasks(service) => service.edit(id, input).await,
            Board::Project(service) => service.edit(id, input).await,
        }
    }

    async fn toggle(&self, id: &str) -> Result<MutationOutcome> {
        match self {
            Board::Todos(service) => service.toggle(id).await,
            Board::Tasks(service) => service.toggle(id).await,
            Board::Project(service) => service.toggle(id).await,
        }
    }

    async fn delete(&self, id: &str) -> Result<MutationOutcome> {
        match self {
            Board::Todos(service) => service.delete(id).await,
            Board::Tasks(service) => service.delete(id).await,
            Board::Project(service) => service.delete(id).await,
        }
    }

    async fn restore(&self, id: &str) -> Result<MutationOutcome> {
        match self {
            Board::Todos(service) => service.restore(id).await,
            Board::Tasks(service) => service.restore(id).await,
            Board::Project(service) => service.restore(id).await,
        }
    }

    async fn purge(&self, id: &str) -> Result<MutationOutcome> {
        match self {
            Board::Todos(service) => service.purge(id).await,
            Board::Tasks(service) => service.purge(id).await,
            Board::Project(service) => service.purge(id).await,
        }
    }
}

/// Runs one task-shaped command. Outside the shell the bin dies with the
/// process, so only `delete --permanent` may remove anything.
async fn run_board<W: Write>(
    board: &Board,
    action: TaskCommand,
    interactive: bool,
    format: Format,
    writer: &mut W,
) -> Result<()> {
    loaded(board.refresh().await)?;
    let noun = board.noun();
    let outcome = match action {
        TaskCommand::List(args) => return list_board(board, &args, format, writer),
        TaskCommand::Bin => {
            return output::write_bin(writer, format, &board.bin(), |task| {
                TaskLine(task).to_string()
            })
        }
        TaskCommand::Add(args) => board.add(args.into()).await?,
        TaskCommand::Edit(args) => {
            let (id, input) = args.split();
            board.edit(&id, input).await?
        }
        TaskCommand::Toggle(arg) => board.toggle(&arg.id).await?,
        TaskCommand::Delete(args) if args.permanent => {
            board.delete(&args.id).await?;
            board.purge(&args.id).await?
        }
        TaskCommand::Delete(_) | TaskCommand::Restore(_) | TaskCommand::Purge(_)
            if !interactive =>
        {
            bail!(
                "the {noun} bin only lasts for one `teamdesk shell` session; \
                 use `{} delete <ID> --permanent` to delete right away",
                board.command()
            )
        }
        TaskCommand::Delete(args) => board.delete(&args.id).await?,
        TaskCommand::Restore(arg) => board.restore(&arg.id).await?,
        TaskCommand::Purge(arg) => board.purge(&arg.id).await?,
    };
    output::write_outcome(writer, format, noun, &outcome)
}

fn list_board<W: Write>(
    board: &Board,
    args: &ListArgs,
    format: Format,
    writer: &mut W,
) -> Result<()> {
    let criteria = args.criteria();
    match args.group {
        Some(key) => output::write_task_groups(writer, format, &board.group(key, &criteria)?),
        None => output::write_tasks(writer, format, &board.list(&criteria), board.plural()),
    }
}

async fn run_project<W: Write>(
    dashboard: &Dashboard,
    action: ProjectCommand,
    interactive: bool,
    format: Format,
    writer: &mut W,
) -> Result<()> {
    let projects = dashboard.projects();
    loaded(projects.refresh().await)?;
    let outcome = match action {
        ProjectCommand::List(args) => {
            if args.group.is_some() {
                bail!("projects are listed by state; use `project list` without --group");
            }
            return output::write_projects(writer, format, &projects.list(&args.criteria()));
        }
        ProjectCommand::Summary(args) => {
            return output::write_summaries(writer, format, &projects.summaries(&args.criteria()))
        }
        ProjectCommand::Bin => {
            return output::write_bin(writer, format, &projects.bin(), |project| {
                ProjectLine(project).to_string()
            })
        }
        ProjectCommand::Leader(arg) => {
            return match projects.team_leader(&arg.id).await? {
                Some(leader) if format == Format::Json => output::write_json(writer, &leader),
                Some(leader) => {
                    writeln!(writer, "{} (id {}, {})", leader.name, leader.id, leader.job_title)?;
                    Ok(())
                }
                None => {
                    writeln!(writer, "Project {} has no team leader.", arg.id)?;
                    Ok(())
                }
            };
        }
        ProjectCommand::Task { project_id, action } => {
            let board = Board::Project(projects.tasks(&project_id)?);
            return run_board(&board, action, interactive, format, writer).await;
        }
        ProjectCommand::Create(args) => projects.create(args.into()).await?,
        ProjectCommand::Edit(args) => {
            let (id, input) = args.split();
            let mut project = projects
                .get(&id)
                .ok_or_else(|| anyhow!("No visible project with id {id}"))?;
            input.apply_to(&mut project)?;
            projects.update(project).await?
        }
        ProjectCommand::Toggle(arg) => projects.toggle_complete(&arg.id).await?,
        ProjectCommand::Delete(arg) => projects.delete(&arg.id).await?,
        ProjectCommand::Restore(arg) => projects.restore(&arg.id).await?,
        ProjectCommand::Purge(arg) => projects.purge(&arg.id).await?,
    };
    output::write_outcome(writer, format, "project", &outcome)
}

async fn run_forum<W: Write>(
    dashboard: &Dashboard,
    action: ForumCommand,
    format: Format,
    writer: &mut W,
) -> Result<()> {
    let forum = dashboard.forum();
    let criteria = match &action {
        ForumCommand::Topics(args) => args.criteria(),
        _ => TopicCriteria::default(),
    };
    loaded(forum.search(&criteria).await)?;
    match action {
        ForumCommand::Topics(_) => output::write_topics(writer, format, &forum.topics(&criteria)),
        ForumCommand::Post(args) => {
            let outcome = forum
                .create_topic(&args.title.join(" "), &args.description, args.technical)
                .await?;
            output::write_outcome(writer, format, "topic", &outcome)
        }
        ForumCommand::Delete(arg) => {
            let outcome = forum.delete_topic(&arg.id).await?;
            output::write_outcome(writer, format, "topic", &outcome)
        }
        ForumCommand::Thread(arg) => {
            let thread = forum.thread(&arg.id)?;
            loaded(thread.refresh().await)?;
            output::write_posts(writer, format, &thread.posts())
        }
        ForumCommand::Reply { topic_id, text } => {
            let thread = forum.thread(&topic_id)?;
            loaded(thread.refresh().await)?;
            let outcome = thread.reply(&text.join(" ")).await?;
            output::write_outcome(writer, format, "reply", &outcome)
        }
        ForumCommand::Edit {
            topic_id,
            post_id,
            text,
        } => {
            let thread = forum.thread(&topic_id)?;
            loaded(thread.refresh().await)?;
            let outcome = thread.edit(&post_id, &text.join(" ")).await?;
            output::write_outcome(writer, format, "reply", &outcome)
        }
        ForumCommand::Remove { topic_id, post_id } => {
            let thread = forum.thread(&topic_id)?;
            loaded(thread.refresh().await)?;
            let outcome = thread.delete(&post_id).await?;
            output::write_outcome(writer, format, "reply", &outcome)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use crate::core::{ClientError, ValidationError};
    use clap::Parser;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    struct Harness {
        runner: Runner,
        backend: Arc<MemoryBackend>,
        _dir: TempDir,
    }

    impl Harness {
        fn new() -> Self {
            let dir = TempDir::new().expect("temp dir");
            let config = AppConfig::from_parts(
                dir.path().to_path_buf(),
                "http://127.0.0.1:9/api",
                std::time::Duration::from_secs(1),
            )
            .expect("config");
            let backend = Arc::new(MemoryBackend::with_sample_data());
            let mut runner = Runner::new(&config, backend.clone());
            runner.set_interactive(true);
            Self {
                runner,
                backend,
                _dir: dir,
            }
        }

        async fn run(&mut self, line: &str) -> Result<String> {
            let cli = Cli::try_parse_from(std::iter::once("teamdesk").chain(line.split_whitespace()))?;
            let command = cli.command.ok_or_else(|| anyhow!("no command"))?;
            let mut out = Vec::new();
            self.runner
                .execute(command, Format::from_flag(cli.json), &mut out)
                .await?;
            Ok(String::from_utf8(out)?)
        }
    }

    #[tokio::test]
    async fn commands_require_login() {
        let mut harness = Harness::new();

        let err = harness.run("todo list").await.unwrap_err();

        assert!(err.to_string().contains("Not signed in"));
    }

    #[tokio::test]
    async fn todo_lifecycle_in_one_session() {
        let mut harness = Harness::new();
        harness.run("login 3 --password demo").await.unwrap();

        let added = harness
            .run("todo add Write report --priority high")
            .await
            .unwrap();
        assert!(added.starts_with("Created to-do "));
        let id = added.trim().rsplit(' ').next().unwrap().to_string();

        harness.run(&format!("todo toggle {id}")).await.unwrap();
        let done = harness.run("todo list --status completed").await.unwrap();
        assert!(done.contains("[x]"));
        assert!(done.contains("Write report"));

        harness.run(&format!("todo delete {id}")).await.unwrap();
        let bin = harness.run("todo bin").await.unwrap();
        assert!(bin.contains("Write report"));

        harness.run(&format!("todo restore {id}")).await.unwrap();
        let pending = harness.run("todo list --search report").await.unwrap();
        assert!(pending.contains("Write report"));
        assert!(pending.contains("0 in bin"));
    }

    #[tokio::test]
    async fn one_shot_delete_needs_permanent_flag() {
        let mut harness = Harness::new();
        harness.runner.set_interactive(false);
        harness.run("login 3 --password demo").await.unwrap();
        let added = harness.run("todo add Shred drafts").await.unwrap();
        let id = added.trim().rsplit(' ').next().unwrap().to_string();
        harness.runner.close();

        let err = harness.run(&format!("todo delete {id}")).await.unwrap_err();
        assert!(err.to_string().contains("teamdesk shell"));
        assert!(err.to_string().contains("todo delete <ID> --permanent"));
        harness.runner.close();
        let listed = harness.run("todo list --search shred").await.unwrap();
        assert!(listed.contains("Shred drafts"));
        harness.runner.close();

        let deleted = harness
            .run(&format!("todo delete {id} --permanent"))
            .await
            .unwrap();
        assert_eq!(deleted, format!("Deleted permanently: to-do {id}\n"));
        harness.runner.close();

        let listed = harness.run("todo list --search shred").await.unwrap();
        assert!(!listed.contains("Shred drafts"));
        let err = harness.run(&format!("todo restore {id}")).await.unwrap_err();
        assert!(err.to_string().contains("teamdesk shell"));
    }

    #[tokio::test]
    async fn todos_reject_assignee() {
        let mut harness = Harness::new();
        harness.run("login 3 --password demo").await.unwrap();

        let err = harness.run("todo add Call vendor --to 4").await.unwrap_err();

        assert!(err.to_string().contains("cannot be assigned"));
    }

    #[tokio::test]
    async fn employees_cannot_assign_tasks() {
        let mut harness = Harness::new();
        harness.run("login 3 --password demo").await.unwrap();
        let before = harness.backend.request_count();

        let err = harness
            .run("task add Review budget --to 4")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("assign tasks"));
        // Only the list refresh reached the backend.
        assert_eq!(harness.backend.request_count(), before + 1);
    }

    #[tokio::test]
    async fn manager_groups_tasks_by_assignee() {
        let mut harness = Harness::new();
        harness.run("login 1 --password demo").await.unwrap();

        let out = harness.run("task list --group assignee").await.unwrap();

        assert!(out.contains("3 (1)"));
        assert!(out.contains("4 (2)"));
    }

    #[tokio::test]
    async fn unsupported_grouping_is_an_error() {
        let mut harness = Harness::new();
        harness.run("login 3 --password demo").await.unwrap();

        let err = harness.run("todo list --group assignee").await.unwrap_err();

        assert_eq!(err.to_string(), "to-dos cannot be grouped by assignee");
    }

    #[tokio::test]
    async fn failed_load_surfaces_as_error() {
        let mut harness = Harness::new();
        harness.run("login 3 --password demo").await.unwrap();
        harness.backend.fail_next(ClientError::Status {
            status: 500,
            body: None,
        });

        let err = harness.run("todo list").await.unwrap_err();

        assert_eq!(
            err.downcast_ref::<ClientError>(),
            Some(&ClientError::Status {
                status: 500,
                body: None
            })
        );
    }

    #[tokio::test]
    async fn json_list_is_parseable() {
        let mut harness = Harness::new();
        harness.run("login 1 --password demo").await.unwrap();

        let out = harness.run("project list --json").await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();

        assert_eq!(value["collection"], "projects");
        assert_eq!(value["items"][0]["name"], "Helpdesk revamp");
        assert_eq!(value["binned"], 1);
    }

    #[tokio::test]
    async fn project_tasks_enforce_membership() {
        let mut harness = Harness::new();
        harness.run("login 1 --password demo").await.unwrap();
        let listing = harness.run("project list --json").await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&listing).unwrap();
        let project_id = value["items"][0]["id"].as_str().unwrap().to_string();

        let err = harness
            .run(&format!("project task {project_id} add Draft agenda --to 2"))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ClientError>(),
            Some(ClientError::Validation(
                ValidationError::AssigneeNotInProject { .. }
            ))
        ));

        let ok = harness
            .run(&format!("project task {project_id} add Draft agenda --to 3"))
            .await
            .unwrap();
        assert!(ok.starts_with("Created project task "));
    }

    #[tokio::test]
    async fn logout_forgets_session() {
        let mut harness = Harness::new();
        harness.run("login 2 --password demo").await.unwrap();
        let who = harness.run("whoami").await.unwrap();
        assert!(who.starts_with("Sam Carter (id 2, "));

        assert_eq!(harness.run("logout").await.unwrap(), "Signed out.\n");
        assert!(harness.run("whoami").await.is_err());
    }

    #[tokio::test]
    async fn manager_sees_workload() {
        let mut harness = Harness::new();
        harness.run("login 1 --password demo").await.unwrap();

        let out = harness.run("team workload").await.unwrap();

        assert!(out.lines().next().unwrap().starts_with("3 "));
        assert!(out.contains("Tom Becker"));
    }

    #[tokio::test]
    async fn topic_search_is_sent_to_the_server() {
        let mut harness = Harness::new();
        harness.run("login 3 --password demo").await.unwrap();

        let out = harness.run("forum topics --search lunch --json").await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["total"], 1);
        assert_eq!(value["items"][0]["title"], "Friday lunch");

        let out = harness.run("forum topics --json").await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["total"], 2);
    }
}
