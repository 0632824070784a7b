//! Main Entrypoint for the StudyBuddy Tutor
//!
//! This binary is responsible for:
//! 1. Parsing the command line and loading configuration from the environment.
//! 2. Opening the SQLite database and running migrations.
//! 3. Loading the student profile and building the learning path.
//! 4. Running the selected command, saving progress on every exit path.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use chrono::Utc;
use clap::Parser;
use rmcp::{ServiceExt, transport::stdio};
use std::sync::Arc;
use studybuddy_core::{
    agent::StudyBuddyService,
    analyzer::{LLMAnswerEvaluator, ResponseAnalyzer},
    llm_client::{LLMClient, OpenAICompatibleClient},
    material::{Flashcard, load_flashcards, render_study_material},
    path::AdaptiveLearningPath,
    session::{TutorSession, resume_path},
    skills::{DEFAULT_GOAL, LearningGoal, update_skill_mastery},
    store::{ProfileStore, load_or_create},
};
use studybuddy_service::{
    cli::{Cli, Command},
    config::Config,
    db::Db,
    display,
    prompts::Prompts,
    transcriber::LineTranscriber,
    tutor::{Tutor, save_session},
};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Loads the profile and the study material and opens a session on them.
async fn open_session(
    config: &Config,
    store: &dyn ProfileStore,
    student_id: &str,
) -> anyhow::Result<(TutorSession, Vec<Flashcard>)> {
    let cards = load_flashcards(&config.flashcards_path)?;
    let student = load_or_create(store, student_id).await?;
    let fresh = AdaptiveLearningPath::from_flashcards(&cards);
    let path = resume_path(store.load_path(student_id).await?, fresh);
    Ok((TutorSession::start(student, path, Utc::now()), cards))
}

fn openai_config(config: &Config, api_key: &str) -> OpenAIConfig {
    info!(provider = ?config.provider, "Using {} for text generation", config.provider.api_base());
    OpenAIConfig::new()
        .with_api_key(api_key)
        .with_api_base(config.provider.api_base())
}

/// Grades answers with the evaluation model, falling back to keywords.
fn answer_analyzer(config: &Config, openai_config: OpenAIConfig, prompts: &Prompts) -> ResponseAnalyzer {
    let eval_client: Arc<dyn LLMClient> = Arc::new(OpenAICompatibleClient::new(
        openai_config,
        config.eval_model.clone(),
    ));
    let evaluator = LLMAnswerEvaluator::new(eval_client, prompts.evaluate_answer.clone());
    ResponseAnalyzer::new(Some(Arc::new(evaluator)))
}

async fn run_tutor(config: &Config, db: &Db, student_id: &str) -> anyhow::Result<()> {
    let openai_config = openai_config(config, config.api_key()?);
    let chat_client: Arc<dyn LLMClient> = Arc::new(OpenAICompatibleClient::new(
        openai_config.clone(),
        config.chat_model.clone(),
    ));

    let prompts = Prompts::load(&config.prompts_path)?;
    let analyzer = answer_analyzer(config, openai_config, &prompts);

    let (mut session, cards) = open_session(config, db, student_id).await?;
    let tutor = Tutor::new(chat_client, analyzer, prompts, render_study_material(&cards));

    println!("StudyBuddy - Personalized AI Tutor");
    println!("Type your answers; enter 'quit' or press Ctrl+C to end and save.\n");
    println!("{}", display::profile(session.student()));
    println!("{}", display::goal(session.goal()));

    let mut stdout = std::io::stdout();
    let mut transcriber = LineTranscriber::stdin();
    let outcome = tokio::select! {
        result = tutor.converse(&mut session, &mut transcriber, &mut stdout) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Received interrupt. Saving progress...");
            Ok(())
        }
    };
    if let Err(e) = &outcome {
        warn!(error = %e, "Session ended with an error; saving progress");
    }

    tutor.finish(&mut session, db, &mut stdout).await?;
    outcome
}

async fn run_mcp(config: &Config, db: &Db, student_id: &str) -> anyhow::Result<()> {
    let analyzer = match config.api_key() {
        Ok(api_key) => {
            let prompts = Prompts::load(&config.prompts_path)?;
            answer_analyzer(config, openai_config(config, api_key), &prompts)
        }
        Err(e) => {
            warn!(error = %e, "No API key; evaluate_answer will grade by keywords only");
            ResponseAnalyzer::default()
        }
    };
    let (session, _) = open_session(config, db, student_id).await?;
    let shared = Arc::new(Mutex::new(session));

    info!(student_id, "Serving MCP tools over stdio");
    let service = StudyBuddyService::new(shared.clone(), Arc::new(db.clone()), analyzer)
        .serve(stdio())
        .await
        .context("Failed to start MCP server")?;
    let interrupted = tokio::select! {
        result = service.waiting() => {
            let reason = result.context("MCP server task failed")?;
            info!(?reason, "MCP transport closed");
            false
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received interrupt. Saving progress...");
            true
        }
    };

    let mut session = shared.lock().await;
    let record = session.finish(Utc::now());
    save_session(db, &session, &record).await?;
    if interrupted {
        // The stdio transport can still be parked in a blocking stdin read.
        std::process::exit(0);
    }
    Ok(())
}

async fn show_profile(db: &Db, student_id: &str) -> anyhow::Result<()> {
    let Some(student) = db.load(student_id).await? else {
        println!("No profile stored for '{}' yet.", student_id);
        return Ok(());
    };
    let goal_name = student
        .learning_goals
        .first()
        .map(String::as_str)
        .unwrap_or(DEFAULT_GOAL);
    let mut goal = LearningGoal::from_catalogue(goal_name);
    update_skill_mastery(&mut goal.required_skills, &student.cognitive);

    println!("{}", display::profile(&student));
    println!("{}", display::goal(&goal));
    Ok(())
}

async fn show_history(db: &Db, student_id: &str, limit: usize) -> anyhow::Result<()> {
    let records = db.recent_sessions(student_id, limit).await?;
    print!("{}", display::history(&records));
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Parse Arguments and Load Configuration ---
    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    // Logs go to stderr; stdout carries the dialogue or the MCP transport.
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();
    info!("Configuration loaded.");

    // --- 3. Initialize Database ---
    let db = Db::connect(&config.database_url).await?;
    db.run_migrations().await?;
    info!("Database ready and migrations are up-to-date.");

    // --- 4. Dispatch ---
    let student_id = cli.student_id(&config.student_id).to_string();
    match cli.selected() {
        Command::Tutor => run_tutor(&config, &db, &student_id).await,
        Command::Mcp => run_mcp(&config, &db, &student_id).await,
        Command::Profile => show_profile(&db, &student_id).await,
        Command::History { limit } => show_history(&db, &student_id, limit).await,
    }
}
