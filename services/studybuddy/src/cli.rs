use clap::{Parser, Subcommand};

pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Personalized AI tutor with an adaptive student model.
#[derive(Parser, Debug)]
#[command(name = "studybuddy", version, about)]
pub struct Cli {
    /// Student profile to use; overrides STUDENT_ID.
    #[arg(long, global = true)]
    pub student: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start an interactive tutoring session (default).
    Tutor,
    /// Serve the student model as MCP tools over stdio.
    Mcp,
    /// Show the stored student profile and goal progress.
    Profile,
    /// List recent sessions.
    History {
        #[arg(long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: usize,
    },
}

impl Cli {
    pub fn selected(&self) -> Command {
        self.command.clone().unwrap_or(Command::Tutor)
    }

    pub fn student_id<'a>(&'a self, configured: &'a str) -> &'a str {
        self.student.as_deref().unwrap_or(configured)
    }
}
