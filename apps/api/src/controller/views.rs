use askama::Template;
use serde::Serialize;

use super::{Outcome, SessionState};
use crate::prompts::{Level, Topic, MAX_QUESTIONS, MIN_QUESTIONS};
use crate::render::{Artifact, ArtifactKind};

pub struct SelectOption {
    pub value: &'static str,
    pub selected: bool,
}

pub struct Notice {
    pub kind: &'static str,
    pub message: String,
}

pub struct ResultView {
    pub title: String,
    pub text: String,
    pub links: Vec<String>,
}

/// The single form page.
#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexPage {
    pub job_description: String,
    pub update_instruction: String,
    pub question_count: u8,
    pub min_questions: u8,
    pub max_questions: u8,
    pub show_question_bank: bool,
    pub topics: Vec<SelectOption>,
    pub levels: Vec<SelectOption>,
    pub notice: Option<Notice>,
    pub result: Option<ResultView>,
}

impl IndexPage {
    pub fn new(session: &SessionState, outcome: &Outcome) -> Self {
        let (notice, result) = match outcome {
            Outcome::Idle => (None, None),
            Outcome::Warning(message) => (
                Some(Notice {
                    kind: "warning",
                    message: message.clone(),
                }),
                None,
            ),
            Outcome::Error(message) => (
                Some(Notice {
                    kind: "error",
                    message: message.clone(),
                }),
                None,
            ),
            Outcome::PanelToggled { .. } => (None, None),
            Outcome::Generated(generated) => (
                None,
                Some(ResultView {
                    title: generated.title.clone(),
                    text: generated.text.clone(),
                    links: generated.artifacts.iter().map(link_for).collect(),
                }),
            ),
        };

        Self {
            job_description: session.job_description.clone(),
            update_instruction: session.update_instruction.clone(),
            question_count: session.question_count,
            min_questions: MIN_QUESTIONS,
            max_questions: MAX_QUESTIONS,
            show_question_bank: session.show_question_bank,
            topics: Topic::ALL
                .iter()
                .map(|t| SelectOption {
                    value: t.label(),
                    selected: session.topic.as_deref() == Some(t.label()),
                })
                .collect(),
            levels: Level::ALL
                .iter()
                .map(|l| SelectOption {
                    value: l.label(),
                    selected: session.level.as_deref() == Some(l.label()),
                })
                .collect(),
            notice,
            result,
        }
    }
}

fn link_for(artifact: &Artifact) -> String {
    artifact.download_link(&format!("Download {}", artifact.file_name))
}

// ────────────────────────────────────────────────────────────────────────────
// JSON view
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ArtifactJson {
    pub file_name: String,
    pub kind: ArtifactKind,
    pub mime_type: &'static str,
    pub size_bytes: usize,
    pub data_uri: String,
}

impl From<&Artifact> for ArtifactJson {
    fn from(artifact: &Artifact) -> Self {
        Self {
            file_name: artifact.file_name.clone(),
            kind: artifact.kind,
            mime_type: artifact.kind.mime(),
            size_bytes: artifact.bytes.len(),
            data_uri: artifact.data_uri(),
        }
    }
}

/// JSON body for `POST /api/v1/actions`.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionResponse {
    Idle,
    Warning {
        message: String,
    },
    Error {
        message: String,
    },
    PanelToggled {
        show_question_bank: bool,
    },
    Generated {
        action: super::Action,
        prompt_key: &'static str,
        title: String,
        text: String,
        artifacts: Vec<ArtifactJson>,
        generated_at: chrono::DateTime<chrono::Utc>,
    },
}

impl From<Outcome> for ActionResponse {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Idle => ActionResponse::Idle,
            Outcome::Warning(message) => ActionResponse::Warning { message },
            Outcome::Error(message) => ActionResponse::Error { message },
            Outcome::PanelToggled { visible } => ActionResponse::PanelToggled {
                show_question_bank: visible,
            },
            Outcome::Generated(generated) => ActionResponse::Generated {
                action: generated.action,
                prompt_key: generated.prompt_key,
                artifacts: generated.artifacts.iter().map(ArtifactJson::from).collect(),
                title: generated.title,
                text: generated.text,
                generated_at: chrono::Utc::now(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{Action, Generated};

    fn generated_with_pdf() -> Outcome {
        Outcome::Generated(Generated {
            action: Action::Rewrite,
            prompt_key: "rewrite",
            title: "Updated Resume".into(),
            text: "<b>Jane</b>".into(),
            artifacts: vec![Artifact {
                file_name: "Updated_Resume.pdf".into(),
                kind: ArtifactKind::Pdf,
                bytes: b"%PDF-1.3".to_vec(),
            }],
        })
    }

    #[test]
    fn test_page_escapes_model_text_and_links_artifacts() {
        let html = IndexPage::new(&SessionState::default(), &generated_with_pdf())
            .render()
            .unwrap();
        assert!(html.contains("&lt;b&gt;Jane"));
        assert!(!html.contains("<b>Jane"));
        assert!(html.contains(r#"download="Updated_Resume.pdf""#));
        assert!(html.contains("data:application/pdf;base64,"));
    }

    #[test]
    fn test_panel_hidden_by_default() {
        let html = IndexPage::new(&SessionState::default(), &Outcome::Idle)
            .render()
            .unwrap();
        assert!(!html.contains(r#"name="topic""#));

        let open = SessionState {
            show_question_bank: true,
            topic: Some("Deep Learning".into()),
            ..SessionState::default()
        };
        let html = IndexPage::new(&open, &Outcome::Idle).render().unwrap();
        assert!(html.contains(r#"name="topic""#));
        assert!(html.contains(r#"<option value="Deep Learning" selected>"#));
    }

    #[test]
    fn test_warning_notice_rendered() {
        let html = IndexPage::new(
            &SessionState::default(),
            &Outcome::Warning("Please provide a job description.".into()),
        )
        .render()
        .unwrap();
        assert!(html.contains(r#"class="notice warning""#));
        assert!(html.contains("Please provide a job description."));
    }

    #[test]
    fn test_json_response_shape() {
        let json = serde_json::to_value(ActionResponse::from(generated_with_pdf())).unwrap();
        assert_eq!(json["status"], "generated");
        assert_eq!(json["action"], "rewrite");
        assert_eq!(json["artifacts"][0]["mime_type"], "application/pdf");
        assert_eq!(json["artifacts"][0]["size_bytes"], 8);

        let json = serde_json::to_value(ActionResponse::from(Outcome::Warning("x".into()))).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "warning", "message": "x" }));
    }
}
