//! The interactive tutoring loop.
//!
//! Each interaction runs strictly in sequence: listen, ask the text generator
//! for a reply, apply the turn signals, grade the exchange, apply the verdict.
//! The system prompt is re-rendered from the student model before every call,
//! so the next reply always reflects the latest directives.

use crate::display;
use crate::prompts::Prompts;
use crate::transcriber::{Transcriber, Utterance};
use anyhow::{Context, Result};
use chrono::Utc;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use studybuddy_core::analyzer::{ResponseAnalyzer, TurnSignals};
use studybuddy_core::directives::render_system_prompt;
use studybuddy_core::llm_client::{ChatMessage, LLMClient, collect_stream};
use studybuddy_core::session::TutorSession;
use studybuddy_core::store::{ProfileStore, SessionRecord};
use studybuddy_core::summary::summarize_session;
use tracing::{info, warn};

const UNAVAILABLE: &str = "The tutor is unavailable right now. Please try again.";

pub struct Tutor {
    llm: Arc<dyn LLMClient>,
    analyzer: ResponseAnalyzer,
    prompts: Prompts,
    study_material: String,
}

impl Tutor {
    pub fn new(
        llm: Arc<dyn LLMClient>,
        analyzer: ResponseAnalyzer,
        prompts: Prompts,
        study_material: String,
    ) -> Self {
        Self {
            llm,
            analyzer,
            prompts,
            study_material,
        }
    }

    fn system_prompt(&self, session: &TutorSession) -> String {
        render_system_prompt(
            &self.prompts.system_prompt,
            &self.study_material,
            &session.directives(),
        )
    }

    /// Streams one reply to `out` and returns the full text.
    async fn speak<W: Write>(&self, messages: Vec<ChatMessage>, out: &mut W) -> Result<String> {
        let stream = self.llm.stream(messages).await?;
        writeln!(out, "Study Buddy:")?;
        let mut write_error = None;
        let reply = collect_stream(stream, |chunk| {
            if write_error.is_none() {
                if let Err(e) = out.write_all(chunk.as_bytes()).and_then(|_| out.flush()) {
                    write_error = Some(e);
                }
            }
        })
        .await?;
        if let Some(e) = write_error {
            return Err(e.into());
        }
        writeln!(out, "\n")?;
        Ok(reply)
    }

    /// The tutor's greeting and first question.
    pub async fn open<W: Write>(&self, session: &mut TutorSession, out: &mut W) -> Result<()> {
        let messages = session.opening_messages(&self.system_prompt(session));
        match self.speak(messages, out).await {
            Ok(reply) => session.record_tutor_turn(&reply),
            Err(e) => {
                warn!(error = %e, "Opening turn failed");
                writeln!(out, "{}", UNAVAILABLE)?;
            }
        }
        Ok(())
    }

    /// Handles one student utterance end to end.
    ///
    /// When the text generator fails the model is left untouched and the
    /// student is asked to try again.
    pub async fn take_turn<W: Write>(
        &self,
        session: &mut TutorSession,
        student_text: &str,
        elapsed: Duration,
        out: &mut W,
    ) -> Result<()> {
        let messages = session.messages_for(&self.system_prompt(session), student_text);
        let reply = match self.speak(messages, out).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "Text generation failed; model left unchanged");
                writeln!(out, "{}", UNAVAILABLE)?;
                return Ok(());
            }
        };

        session.apply_turn(&TurnSignals::from_utterance(student_text, elapsed));
        let interaction = session.record_exchange(student_text, &reply, elapsed);
        let verdict = self.analyzer.judge(&interaction).await;
        session
            .apply_verdict(verdict)
            .context("Failed to update the learning path")?;

        if session.student().cognitive.total_answers > 0 {
            writeln!(out, "{}\n", display::metrics(session.student()))?;
        }
        Ok(())
    }

    /// Runs the dialogue until the student stops or input ends.
    pub async fn converse<T: Transcriber + ?Sized, W: Write>(
        &self,
        session: &mut TutorSession,
        transcriber: &mut T,
        out: &mut W,
    ) -> Result<()> {
        self.open(session, out).await?;
        loop {
            match transcriber.listen().await? {
                Utterance::Speech { text, elapsed } => {
                    self.take_turn(session, &text, elapsed, out).await?;
                }
                Utterance::NoSpeech => {
                    writeln!(out, "No speech detected. Please try again.\n")?;
                }
                Utterance::Closed => {
                    info!("Student ended the session");
                    return Ok(());
                }
            }
        }
    }

    /// Summarizes, closes and persists the session. Runs on every exit path.
    pub async fn finish<W: Write>(
        &self,
        session: &mut TutorSession,
        store: &dyn ProfileStore,
        out: &mut W,
    ) -> Result<SessionRecord> {
        writeln!(out, "\nEnding Study Session...\n")?;
        let now = Utc::now();
        let snapshot = session.snapshot(now);
        match summarize_session(
            self.llm.as_ref(),
            &self.prompts.session_summary,
            &snapshot,
            &session.directives(),
        )
        .await
        {
            Ok(Some(summary)) => writeln!(out, "Session Summary\n{}\n", summary)?,
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "Session summary failed");
                writeln!(out, "Could not generate summary.\n")?;
            }
        }

        let record = session.finish(now);
        save_session(store, session, &record).await?;
        writeln!(out, "{}", display::session_stats(&record, session.student()))?;
        writeln!(out, "Progress saved! See you next time!")?;
        Ok(record)
    }
}

/// Persists the profile, the path and the history record, in that order.
pub async fn save_session(
    store: &dyn ProfileStore,
    session: &TutorSession,
    record: &SessionRecord,
) -> Result<()> {
    let student = session.student();
    store
        .save(student)
        .await
        .context("Failed to save student profile")?;
    store
        .save_path(&student.student_id, session.path())
        .await
        .context("Failed to save learning path")?;
    store
        .record_session(record)
        .await
        .context("Failed to record session history")?;
    info!(student_id = %student.student_id, "Progress saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_openai::error::OpenAIError;
    use async_trait::async_trait;
    use futures::stream;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use studybuddy_core::llm_client::{LLMStream, LLMStreamEvent};
    use studybuddy_core::material::Flashcard;
    use studybuddy_core::path::AdaptiveLearningPath;
    use studybuddy_core::store::MemoryStore;
    use studybuddy_core::student::StudentModel;

    /// Replies from a fixed script; `None` entries simulate an outage.
    struct ScriptedClient {
        replies: Mutex<VecDeque<Option<&'static str>>>,
        summary: Option<&'static str>,
    }

    impl ScriptedClient {
        fn new(replies: Vec<Option<&'static str>>, summary: Option<&'static str>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                summary,
            }
        }
    }

    #[async_trait]
    impl LLMClient for ScriptedClient {
        async fn complete(&self, _messages: Vec<ChatMessage>) -> Result<String> {
            self.summary
                .map(str::to_string)
                .context("summary service unavailable")
        }

        async fn stream(&self, _messages: Vec<ChatMessage>) -> Result<LLMStream> {
            let next = self.replies.lock().unwrap().pop_front().flatten();
            let reply = next.context("chat service unavailable")?;
            let (head, tail) = reply.split_at(reply.len() / 2);
            let chunks: Vec<Result<LLMStreamEvent, OpenAIError>> = vec![
                Ok(LLMStreamEvent::TextChunk(head.to_string())),
                Ok(LLMStreamEvent::TextChunk(tail.to_string())),
            ];
            Ok(Box::pin(stream::iter(chunks)))
        }
    }

    struct ScriptedInput(VecDeque<Utterance>);

    #[async_trait]
    impl Transcriber for ScriptedInput {
        async fn listen(&mut self) -> Result<Utterance> {
            Ok(self.0.pop_front().unwrap_or(Utterance::Closed))
        }
    }

    fn speech(text: &str, secs: u64) -> Utterance {
        Utterance::Speech {
            text: text.to_string(),
            elapsed: Duration::from_secs(secs),
        }
    }

    fn prompts() -> Prompts {
        Prompts {
            system_prompt: "Tutor.\n{study_material}\n{directives}".into(),
            session_summary: "Answered {answers_given}".into(),
            evaluate_answer: "{question} {answer} {tutor_reply}".into(),
        }
    }

    fn session() -> TutorSession {
        let path = AdaptiveLearningPath::from_flashcards(&[
            Flashcard::new("What does fork() return in the child?", "0")
                .with_topic("Process Management"),
        ]);
        TutorSession::start(StudentModel::new("alice"), path, Utc::now())
    }

    fn tutor(client: ScriptedClient) -> Tutor {
        Tutor::new(
            Arc::new(client),
            ResponseAnalyzer::default(),
            prompts(),
            "# Cards".into(),
        )
    }

    #[tokio::test]
    async fn test_conversation_updates_model() {
        let tutor = tutor(ScriptedClient::new(
            vec![
                Some("Hi! What does fork() return in the child?"),
                Some("Exactly right, well done!"),
            ],
            None,
        ));
        let mut session = session();
        let mut input = ScriptedInput(VecDeque::from([speech("It returns zero to the child", 5)]));
        let mut out = Vec::new();

        tutor.converse(&mut session, &mut input, &mut out).await.unwrap();

        assert_eq!(session.answers_given(), 1);
        assert_eq!(session.correct_answers(), 1);
        let cognitive = &session.student().cognitive;
        assert!(cognitive.mastered_topics.contains("Process Management"));
        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains("Hi! What does fork() return in the child?"));
        assert!(printed.contains("Learning Metrics: Knowledge: 65%"));
    }

    #[tokio::test]
    async fn test_outage_leaves_model_untouched() {
        let tutor = tutor(ScriptedClient::new(vec![Some("Hello!"), None], None));
        let mut session = session();
        let before = session.student().clone();
        let mut input = ScriptedInput(VecDeque::from([speech("ok", 40), Utterance::NoSpeech]));
        let mut out = Vec::new();

        tutor.converse(&mut session, &mut input, &mut out).await.unwrap();

        assert_eq!(session.student(), &before);
        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains(UNAVAILABLE));
        assert!(printed.contains("No speech detected"));
    }

    #[tokio::test]
    async fn test_finish_persists_everything() {
        let tutor = tutor(ScriptedClient::new(
            vec![Some("Question?"), Some("That's incorrect, it returns 0.")],
            Some("Keep practising process creation."),
        ));
        let store = MemoryStore::new();
        let mut session = session();
        let mut input = ScriptedInput(VecDeque::from([speech("It returns the parent's PID", 9)]));
        let mut out = Vec::new();

        tutor.converse(&mut session, &mut input, &mut out).await.unwrap();
        let record = tutor.finish(&mut session, &store, &mut out).await.unwrap();

        assert_eq!(record.questions_answered, 1);
        assert_eq!(record.correct_answers, 0);
        let saved = store.load("alice").await.unwrap().unwrap();
        assert_eq!(&saved, session.student());
        assert!(saved.cognitive.struggling_topics.contains("Process Management"));
        assert_eq!(store.load_path("alice").await.unwrap().as_ref(), Some(session.path()));
        assert_eq!(store.recent_sessions("alice", 10).await.unwrap(), vec![record]);

        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains("Keep practising process creation."));
        assert!(printed.contains("Progress saved!"));
    }

    #[tokio::test]
    async fn test_finish_without_answers_skips_summary() {
        let tutor = tutor(ScriptedClient::new(vec![], Some("should not appear")));
        let store = MemoryStore::new();
        let mut session = session();
        let mut out = Vec::new();

        let record = tutor.finish(&mut session, &store, &mut out).await.unwrap();

        assert_eq!(record.questions_answered, 0);
        assert!(store.load("alice").await.unwrap().is_some());
        let printed = String::from_utf8(out).unwrap();
        assert!(!printed.contains("should not appear"));
    }
}
