// Interaction Controller: one user action per submission.
// Each transition validates its inputs, then runs preprocess -> gateway -> render.
// Missing inputs warn and stop before any gateway call; every failure becomes an
// `Outcome` shown to the user, never an HTTP error.

pub mod handlers;
pub mod session;
pub mod views;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tracing::{info, warn};

use crate::document::{DocumentError, DocumentPreprocessor, EncodedPayload};
use crate::fonts::FontStore;
use crate::llm_client::{CompletionGateway, GatewayError};
use crate::prompts::{Level, PromptRequest, QuestionCount, Topic};
use crate::render::{self, Artifact, ArtifactKind, GlyphPolicy, PageConfig, RenderError};

pub use session::{SessionState, SessionStore};

pub const UPDATED_RESUME_FILE: &str = "Updated_Resume.pdf";

// ────────────────────────────────────────────────────────────────────────────
// Actions and inputs
// ────────────────────────────────────────────────────────────────────────────

/// The buttons on the form. Exactly one runs per submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Review,
    MatchScore,
    LearningPath,
    Rewrite,
    InterviewQuestions,
    ToggleQuestionBank,
    QuestionBank,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Review => "review",
            Action::MatchScore => "match_score",
            Action::LearningPath => "learning_path",
            Action::Rewrite => "rewrite",
            Action::InterviewQuestions => "interview_questions",
            Action::ToggleQuestionBank => "toggle_question_bank",
            Action::QuestionBank => "question_bank",
        }
    }

    fn title(&self) -> &'static str {
        match self {
            Action::Review => "Resume Review",
            Action::MatchScore => "Percentage Match",
            Action::LearningPath => "Personalized Learning Path",
            Action::Rewrite => "Updated Resume",
            Action::InterviewQuestions => "Generated Interview Questions",
            Action::ToggleQuestionBank => "Question Bank",
            Action::QuestionBank => "Question Bank",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "review" => Ok(Action::Review),
            "match_score" => Ok(Action::MatchScore),
            "learning_path" => Ok(Action::LearningPath),
            "rewrite" => Ok(Action::Rewrite),
            "interview_questions" => Ok(Action::InterviewQuestions),
            "toggle_question_bank" => Ok(Action::ToggleQuestionBank),
            "question_bank" => Ok(Action::QuestionBank),
            other => Err(format!("unknown action '{other}'")),
        }
    }
}

/// Raw form state for one submission. Text fields are kept as typed.
#[derive(Debug, Clone, Default)]
pub struct FormInputs {
    pub job_description: String,
    pub update_instruction: String,
    pub question_count: Option<String>,
    pub topic: Option<String>,
    pub level: Option<String>,
    pub resume: Option<Bytes>,
}

// ────────────────────────────────────────────────────────────────────────────
// Outcomes
// ────────────────────────────────────────────────────────────────────────────

/// What the user sees after an action.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Nothing submitted yet.
    Idle,
    /// Recoverable input problem; no gateway call was made.
    Warning(String),
    /// A downstream failure. No partial output is shown.
    Error(String),
    PanelToggled { visible: bool },
    Generated(Generated),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Generated {
    pub action: Action,
    pub prompt_key: &'static str,
    pub title: String,
    pub text: String,
    pub artifacts: Vec<Artifact>,
}

/// Failures after validation, flattened into a user-facing message.
#[derive(Debug, thiserror::Error)]
enum StepError {
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Font(#[from] crate::fonts::FontError),
    #[error("Rendering task failed: {0}")]
    Join(String),
}

impl StepError {
    fn user_message(&self) -> String {
        match self {
            StepError::Document(DocumentError::NoDocumentProvided) => {
                "Please upload your resume (PDF).".to_string()
            }
            StepError::Document(DocumentError::UnreadableDocument(_)) => {
                "The uploaded PDF could not be read. Please upload a valid resume PDF.".to_string()
            }
            StepError::Document(DocumentError::RasterizerUnavailable(_)) => {
                "The resume could not be processed right now. Please try again later.".to_string()
            }
            StepError::Gateway(GatewayError::Timeout { .. }) => {
                "The AI service took too long to respond. Please try again.".to_string()
            }
            StepError::Gateway(GatewayError::Unavailable(_)) => {
                "The AI service is unavailable right now. Please try again.".to_string()
            }
            StepError::Gateway(GatewayError::EmptyResponse) => {
                "The AI service returned an empty response. Please try again.".to_string()
            }
            StepError::Render(RenderError::UnsupportedGlyph(c)) => {
                format!("The generated text contains a character ({c:?}) that cannot be written to PDF.")
            }
            StepError::Render(_) | StepError::Join(_) => {
                "The PDF could not be generated.".to_string()
            }
            StepError::Font(_) => {
                "The PDF font could not be loaded, so no PDF was produced. Please try again."
                    .to_string()
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Controller
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Controller {
    gateway: Arc<dyn CompletionGateway>,
    preprocessor: DocumentPreprocessor,
    fonts: Arc<FontStore>,
    page_config: PageConfig,
    glyph_policy: GlyphPolicy,
}

impl Controller {
    pub fn new(
        gateway: Arc<dyn CompletionGateway>,
        preprocessor: DocumentPreprocessor,
        fonts: Arc<FontStore>,
        page_config: PageConfig,
    ) -> Self {
        Self {
            gateway,
            preprocessor,
            fonts,
            page_config,
            glyph_policy: GlyphPolicy::default(),
        }
    }

    pub fn with_glyph_policy(mut self, policy: GlyphPolicy) -> Self {
        self.glyph_policy = policy;
        self
    }

    /// Runs one action against the caller's session.
    pub async fn dispatch(
        &self,
        session: &mut SessionState,
        action: Action,
        inputs: FormInputs,
    ) -> Outcome {
        session.remember(&inputs);
        info!("Dispatching action '{action}'");

        let request = match self.validate(session, action, &inputs) {
            Ok(Some(request)) => request,
            Ok(None) => {
                session.show_question_bank = !session.show_question_bank;
                return Outcome::PanelToggled {
                    visible: session.show_question_bank,
                };
            }
            Err(message) => {
                info!("Action '{action}' rejected: {message}");
                return Outcome::Warning(message);
            }
        };

        match self.run(action, request, inputs).await {
            Ok(generated) => Outcome::Generated(generated),
            Err(e @ StepError::Document(DocumentError::NoDocumentProvided)) => {
                Outcome::Warning(e.user_message())
            }
            Err(e) => {
                warn!("Action '{action}' failed: {e}");
                Outcome::Error(e.user_message())
            }
        }
    }

    /// Checks required inputs. `Ok(None)` means the action needs no model call.
    fn validate(
        &self,
        session: &SessionState,
        action: Action,
        inputs: &FormInputs,
    ) -> Result<Option<PromptRequest>, String> {
        let has_jd = !inputs.job_description.trim().is_empty();
        let has_resume = inputs.resume.as_ref().is_some_and(|r| !r.is_empty());
        let require_resume = || {
            if has_resume {
                Ok(())
            } else {
                Err("Please upload your resume (PDF).".to_string())
            }
        };

        match action {
            Action::ToggleQuestionBank => Ok(None),
            Action::Review => require_resume().map(|_| Some(PromptRequest::Review)),
            Action::MatchScore => require_resume().map(|_| Some(PromptRequest::MatchScore)),
            Action::LearningPath => {
                if !has_jd {
                    return Err("Please provide a job description to build a learning path.".into());
                }
                require_resume().map(|_| Some(PromptRequest::LearningPath))
            }
            Action::Rewrite => {
                let instruction = inputs.update_instruction.trim();
                if instruction.is_empty() {
                    return Err("Please describe how you want your resume updated.".into());
                }
                require_resume()?;
                Ok(Some(PromptRequest::Rewrite {
                    instruction: instruction.to_string(),
                }))
            }
            Action::InterviewQuestions => {
                if !has_jd {
                    return Err("Please provide a job description to generate questions.".into());
                }
                let count = match inputs.question_count.as_deref().map(str::trim) {
                    None | Some("") => QuestionCount::default(),
                    Some(raw) => raw
                        .parse::<i64>()
                        .map_err(|_| format!("'{raw}' is not a number of questions."))
                        .and_then(QuestionCount::new)?,
                };
                Ok(Some(PromptRequest::InterviewQuestions { count }))
            }
            Action::QuestionBank => {
                if !session.show_question_bank {
                    return Err("Open the question bank panel to choose a topic and level.".into());
                }
                let topic: Topic = inputs
                    .topic
                    .as_deref()
                    .ok_or_else(|| "Please select a topic.".to_string())?
                    .parse()?;
                let level: Level = inputs
                    .level
                    .as_deref()
                    .ok_or_else(|| "Please select a difficulty level.".to_string())?
                    .parse()?;
                Ok(Some(PromptRequest::TopicBank { topic, level }))
            }
        }
    }

    async fn run(
        &self,
        action: Action,
        request: PromptRequest,
        inputs: FormInputs,
    ) -> Result<Generated, StepError> {
        let payload: Option<EncodedPayload> = match action {
            Action::Review | Action::MatchScore | Action::LearningPath | Action::Rewrite => {
                Some(self.preprocessor.prepare(inputs.resume.as_deref()).await?)
            }
            _ => None,
        };

        // Only job-description driven actions carry context.
        let context = match request {
            PromptRequest::TopicBank { .. } => "",
            _ => inputs.job_description.as_str(),
        };

        let response = self
            .gateway
            .complete(&request.render(), payload.as_ref(), context)
            .await?;
        let text = response.into_text();

        let artifacts = match &request {
            PromptRequest::Rewrite { .. } => {
                vec![self.pdf_artifact(&text, "Updated Resume", UPDATED_RESUME_FILE).await?]
            }
            PromptRequest::TopicBank { topic, level } => {
                let stem = format!("{}_{}_Questions", topic.label(), level.label()).replace(' ', "_");
                let title = format!("{} ({}) Interview Questions", topic.label(), level.label());
                vec![
                    Artifact {
                        file_name: format!("{stem}.txt"),
                        kind: ArtifactKind::Text,
                        bytes: render::render_text(&text),
                    },
                    self.pdf_artifact(&text, &title, &format!("{stem}.pdf")).await?,
                ]
            }
            _ => Vec::new(),
        };

        let title = match &request {
            PromptRequest::TopicBank { topic, level } => {
                format!("{} Interview Questions ({})", topic.label(), level.label())
            }
            _ => action.title().to_string(),
        };

        info!(
            "Action '{action}' produced {} chars and {} artifact(s)",
            text.len(),
            artifacts.len()
        );

        Ok(Generated {
            action,
            prompt_key: request.key(),
            title,
            text,
            artifacts,
        })
    }

    async fn pdf_artifact(
        &self,
        text: &str,
        title: &str,
        file_name: &str,
    ) -> Result<Artifact, StepError> {
        let font = self.fonts.get().await?;
        let content = text.to_string();
        let title = title.to_string();
        let config = self.page_config.clone();
        let policy = self.glyph_policy;

        let bytes = tokio::task::spawn_blocking(move || {
            render::render_pdf(&content, &title, &font, &config, policy)
        })
        .await
        .map_err(|e| StepError::Join(e.to_string()))??;

        Ok(Artifact {
            file_name: file_name.to_string(),
            kind: ArtifactKind::Pdf,
            bytes,
        })
    }
}
