use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::core::model::{
    Choice, Priority, SortDirection, SortField, SortSpec, TaskStatus, TopicCriteria, ViewCriteria,
};
use crate::core::{ProjectInput, TaskInput};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "teamdesk",
    version,
    about = "Role-based team dashboard: to-dos, assigned tasks, projects and the team forum.",
    after_help = "Examples:\n  teamdesk --demo login 3 --password demo\n  teamdesk todo add Write report --priority high --due fri\n  teamdesk task list --status pending --sort due\n  teamdesk project task 7 add Draft agenda --to 3\n  teamdesk shell"
)]
pub struct Cli {
    /// Override the data directory (defaults to platform-specific app dir)
    #[arg(long, value_name = "PATH", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Backend base URL (defaults to TEAMDESK_API_URL or the local server)
    #[arg(long = "api-url", value_name = "URL", global = true)]
    pub api_url: Option<String>,

    /// Tracing filter written to stderr (e.g. "warn", "teamdesk_core=debug")
    #[arg(long = "log", value_name = "DIRECTIVE", global = true)]
    pub log_filter: Option<String>,

    /// Run against built-in sample data instead of a server
    #[arg(long, global = true)]
    pub demo: bool,

    /// Print list output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

/// One line typed into `teamdesk shell`.
#[derive(Parser, Debug, Clone)]
#[command(name = "teamdesk", no_binary_name = true, disable_version_flag = true)]
pub struct ShellLine {
    /// Print list output as JSON
    #[arg(long)]
    pub json: bool,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CliCommand {
    /// Check credentials with the backend and remember the session
    Login(LoginArgs),
    /// Forget the stored session
    Logout,
    /// Show who is signed in and what they may do
    Whoami,
    /// Personal to-do list
    Todo {
        #[command(subcommand)]
        action: TaskCommand,
    },
    /// Individual tasks assigned by managers
    Task {
        #[command(subcommand)]
        action: TaskCommand,
    },
    /// Projects and their tasks
    Project {
        #[command(subcommand)]
        action: ProjectCommand,
    },
    /// Discussion topics and replies
    Forum {
        #[command(subcommand)]
        action: ForumCommand,
    },
    /// Employee directory and workload
    Team {
        #[command(subcommand)]
        action: TeamCommand,
    },
    /// Change your display name or password
    Profile {
        #[command(subcommand)]
        action: ProfileCommand,
    },
    /// Interactive session that keeps loaded lists and the bin in memory
    Shell,
}

#[derive(Args, Debug, Clone)]
pub struct LoginArgs {
    /// Employee id
    #[arg(value_name = "USER_ID")]
    pub user_id: String,

    /// Password (read from stdin when omitted)
    #[arg(long, short)]
    pub password: Option<String>,
}

/// Actions shared by to-dos, assigned tasks and project tasks.
#[derive(Subcommand, Debug, Clone)]
pub enum TaskCommand {
    /// Show the filtered, sorted list
    List(ListArgs),
    /// Create a new entry (tasks need --to)
    Add(TaskArgs),
    /// Change fields of an existing entry
    Edit(EditTaskArgs),
    /// Flip between pending and completed
    Toggle(IdArg),
    /// Move to the shell session's bin, or delete for good with --permanent
    Delete(DeleteArgs),
    /// Bring back from the bin
    Restore(IdArg),
    /// Delete for good
    Purge(IdArg),
    /// List what is in the bin
    Bin,
}

#[derive(Args, Debug, Clone)]
pub struct IdArg {
    #[arg(value_name = "ID")]
    pub id: String,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    #[arg(value_name = "ID")]
    pub id: String,

    /// Skip the bin and delete on the server right away
    #[arg(long)]
    pub permanent: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// Priority filter (low, medium, high or all)
    #[arg(long, value_name = "PRIORITY", default_value = "all")]
    pub priority: Choice<Priority>,

    /// Status filter (pending, completed or all)
    #[arg(long, value_name = "STATUS", default_value = "all")]
    pub status: Choice<TaskStatus>,

    /// Only entries assigned to this employee id
    #[arg(long, value_name = "ID")]
    pub assignee: Option<String>,

    /// Case-insensitive text match on name and description
    #[arg(long, value_name = "TEXT")]
    pub search: Option<String>,

    /// Sort by due, priority or name
    #[arg(long, value_name = "FIELD")]
    pub sort: Option<SortField>,

    /// Sort descending
    #[arg(long, requires = "sort")]
    pub desc: bool,

    /// Group the output
    #[arg(long, value_enum)]
    pub group: Option<GroupKey>,
}

impl ListArgs {
    pub fn criteria(&self) -> ViewCriteria {
        let assignee = match self.assignee.as_deref().map(str::trim) {
            None | Some("") => Choice::All,
            Some(id) if id.eq_ignore_ascii_case("all") => Choice::All,
            Some(id) => Choice::Only(id.to_string()),
        };
        let direction = if self.desc {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        };
        ViewCriteria {
            priority: self.priority.clone(),
            status: self.status.clone(),
            assignee,
            search: self.search.clone(),
            sort: self.sort.map(|field| SortSpec::new(field, direction)),
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKey {
    Status,
    Priority,
    Assignee,
}

impl GroupKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupKey::Status => "status",
            GroupKey::Priority => "priority",
            GroupKey::Assignee => "assignee",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct TaskArgs {
    /// Task name
    #[arg(value_name = "TEXT", required = true)]
    pub text: Vec<String>,

    /// Longer description
    #[arg(long)]
    pub description: Option<String>,

    #[arg(long, value_enum)]
    pub priority: Option<Priority>,

    /// Set status explicitly (defaults to pending)
    #[arg(long, value_enum)]
    pub status: Option<TaskStatus>,

    /// Due date (ISO e.g. 2025-03-01, today, tomorrow, +3d, fri)
    #[arg(long, value_name = "DATE")]
    pub due: Option<String>,

    /// Employee id to assign the task to
    #[arg(long = "to", value_name = "ID")]
    pub assignee: Option<String>,
}

impl From<TaskArgs> for TaskInput {
    fn from(args: TaskArgs) -> Self {
        TaskInput {
            text: args.text,
            description: args.description,
            priority: args.priority,
            status: args.status,
            due: args.due,
            assignee: args.assignee,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct EditTaskArgs {
    #[arg(value_name = "ID")]
    pub id: String,

    /// New name
    #[arg(long, num_args = 1.., value_name = "TEXT")]
    pub name: Vec<String>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long, value_enum)]
    pub priority: Option<Priority>,

    #[arg(long, value_enum)]
    pub status: Option<TaskStatus>,

    /// New due date, or "none" to clear it
    #[arg(long, value_name = "DATE")]
    pub due: Option<String>,

    /// Reassign to another employee id
    #[arg(long = "to", value_name = "ID")]
    pub assignee: Option<String>,
}

impl EditTaskArgs {
    pub fn split(self) -> (String, TaskInput) {
        let input = TaskInput {
            text: self.name,
            description: self.description,
            priority: self.priority,
            status: self.status,
            due: self.due,
            assignee: self.assignee,
        };
        (self.id, input)
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum ProjectCommand {
    /// Show visible projects
    List(ListArgs),
    /// Task totals and progress per project
    Summary(ListArgs),
    /// Create a project (managers only)
    Create(ProjectArgs),
    /// Change fields of a project (managers only)
    Edit(EditProjectArgs),
    /// Mark completed or reopen
    Toggle(IdArg),
    /// Move to the bin
    Delete(IdArg),
    /// Bring back from the bin
    Restore(IdArg),
    /// Delete for good
    Purge(IdArg),
    /// List binned projects
    Bin,
    /// Show the project's team leader
    Leader(IdArg),
    /// Work with the tasks of one project
    Task {
        #[arg(value_name = "PROJECT_ID")]
        project_id: String,
        #[command(subcommand)]
        action: TaskCommand,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ProjectArgs {
    /// Project name
    #[arg(value_name = "NAME", required = true)]
    pub name: Vec<String>,

    #[arg(long)]
    pub description: Option<String>,

    /// Team leader employee id
    #[arg(long = "leader", value_name = "ID")]
    pub team_leader: Option<String>,

    /// Member employee ids (comma-separated or repeated flag)
    #[arg(long = "member", value_name = "ID", value_delimiter = ',', action = ArgAction::Append)]
    pub employees: Vec<String>,

    #[arg(long, value_enum)]
    pub priority: Option<Priority>,

    /// Deadline (ISO e.g. 2025-06-30, +2w, fri)
    #[arg(long, value_name = "DATE")]
    pub deadline: Option<String>,
}

impl From<ProjectArgs> for ProjectInput {
    fn from(args: ProjectArgs) -> Self {
        ProjectInput {
            name: args.name,
            description: args.description,
            team_leader: args.team_leader,
            employees: args.employees,
            priority: args.priority,
            deadline: args.deadline,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct EditProjectArgs {
    #[arg(value_name = "ID")]
    pub id: String,

    #[arg(long, num_args = 1.., value_name = "NAME")]
    pub name: Vec<String>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long = "leader", value_name = "ID")]
    pub team_leader: Option<String>,

    /// Replace the member list (comma-separated or repeated flag)
    #[arg(long = "member", value_name = "ID", value_delimiter = ',', action = ArgAction::Append)]
    pub employees: Vec<String>,

    #[arg(long, value_enum)]
    pub priority: Option<Priority>,

    /// New deadline, or "none" to clear it
    #[arg(long, value_name = "DATE")]
    pub deadline: Option<String>,
}

impl EditProjectArgs {
    pub fn split(self) -> (String, ProjectInput) {
        let input = ProjectInput {
            name: self.name,
            description: self.description,
            team_leader: self.team_leader,
            employees: self.employees,
            priority: self.priority,
            deadline: self.deadline,
        };
        (self.id, input)
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum ForumCommand {
    /// List topics, newest first
    Topics(TopicArgs),
    /// Start a new topic
    Post(PostArgs),
    /// Remove a topic you started (managers may remove any)
    Delete(IdArg),
    /// Show a topic's replies, oldest first
    Thread(IdArg),
    /// Reply to a topic
    Reply {
        #[arg(value_name = "TOPIC_ID")]
        topic_id: String,
        #[arg(value_name = "TEXT", required = true)]
        text: Vec<String>,
    },
    /// Rewrite one of your replies
    Edit {
        #[arg(value_name = "TOPIC_ID")]
        topic_id: String,
        #[arg(value_name = "POST_ID")]
        post_id: String,
        #[arg(value_name = "TEXT", required = true)]
        text: Vec<String>,
    },
    /// Remove a reply
    Remove {
        #[arg(value_name = "TOPIC_ID")]
        topic_id: String,
        #[arg(value_name = "POST_ID")]
        post_id: String,
    },
}

#[derive(Args, Debug, Clone)]
pub struct TopicArgs {
    /// Only technical topics
    #[arg(long, conflicts_with = "general")]
    pub technical: bool,

    /// Only non-technical topics
    #[arg(long)]
    pub general: bool,

    /// Case-insensitive text match on title and description
    #[arg(long, value_name = "TEXT")]
    pub search: Option<String>,

    /// Oldest first
    #[arg(long)]
    pub oldest: bool,
}

impl TopicArgs {
    pub fn criteria(&self) -> TopicCriteria {
        let technical = if self.technical {
            Choice::Only(true)
        } else if self.general {
            Choice::Only(false)
        } else {
            Choice::All
        };
        TopicCriteria {
            technical,
            search: self.search.clone(),
            newest_first: !self.oldest,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct PostArgs {
    /// Topic title
    #[arg(value_name = "TITLE", required = true)]
    pub title: Vec<String>,

    /// Opening message
    #[arg(long, default_value = "")]
    pub description: String,

    /// Mark the topic as technical
    #[arg(long)]
    pub technical: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum TeamCommand {
    /// Everyone in the directory
    Employees,
    /// Tasks per employee (managers only)
    Workload,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ProfileCommand {
    /// Change your display name
    Rename {
        #[arg(value_name = "NAME", required = true)]
        name: Vec<String>,
        /// Current password
        #[arg(long, short)]
        password: Option<String>,
    },
    /// Change your password
    Password {
        /// Current password
        #[arg(long)]
        current: Option<String>,
        /// New password
        #[arg(long = "new")]
        new_password: String,
    },
}
