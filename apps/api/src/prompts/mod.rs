//! Prompt catalog: the fixed instruction templates sent to the model.
//!
//! Templates are immutable text. Parameterized entries use plain `{slot}` interpolation;
//! the result is only ever read by the model, so nothing is escaped.

use std::fmt;
use std::str::FromStr;

// ────────────────────────────────────────────────────────────────────────────
// Templates
// ────────────────────────────────────────────────────────────────────────────

pub const REVIEW_PROMPT: &str = "\
You are an experienced HR with tech expertise in Data Science, Full Stack, Web Development, Big Data Engineering, DevOps, or Data Analysis.
Your task is to review the provided resume against the job description for these roles.
Please evaluate the candidate's profile, highlighting strengths and weaknesses in relation to the specified job role.";

pub const MATCH_SCORE_PROMPT: &str = "\
You are a skilled ATS (Applicant Tracking System) scanner with expertise in Data Science, Full Stack, Web Development, Big Data Engineering, DevOps, and Data Analysis.
Your task is to evaluate the resume against the job description. Provide:
1. The percentage match.
2. Keywords missing.
3. Final evaluation.";

pub const LEARNING_PATH_PROMPT: &str = "\
You are an experienced learning coach and technical expert. Create a 6-month personalized study plan for an individual aiming to excel in [Job Role],
focusing on the skills, topics, and tools specified in the provided job description. Ensure the study plan includes:
- A list of topics and tools for each month.
- Suggested resources (books, online courses, documentation).
- Recommended practical exercises or projects.
- Periodic assessments or milestones.
- Tips for real-world applications.";

pub const REWRITE_PROMPT: &str = "\
You are an expert resume writer with deep knowledge of Data Science, Full Stack, Web Development, Big Data Engineering, DevOps, and Data Analysis.
Your task is to refine and optimize the provided resume according to the job description.
Ensure the new resume:
- Highlights relevant experience and skills.
- Optimizes for ATS (Applicant Tracking Systems).
- Uses strong action words and quantifiable achievements.
- Incorporates key industry keywords.";

/// Appended to `REWRITE_PROMPT` when the candidate describes the changes they want.
const REWRITE_INSTRUCTION_SUFFIX: &str = "\n\nApply these changes requested by the candidate:\n{instruction}";

pub const INTERVIEW_QUESTIONS_PROMPT: &str = "\
You are an AI-powered interview coach.
Generate {num_questions} interview questions based on the given job description,
focusing on the required skills and expertise.";

pub const TOPIC_BANK_PROMPT: &str =
    "Generate 10 interview questions on {topic} of {level}, covering topics such as {focus} with answers";

// ────────────────────────────────────────────────────────────────────────────
// Parameters
// ────────────────────────────────────────────────────────────────────────────

pub const MIN_QUESTIONS: u8 = 1;
pub const MAX_QUESTIONS: u8 = 30;
pub const DEFAULT_QUESTIONS: u8 = 5;

/// Number of interview questions to request, always within 1..=30.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestionCount(u8);

impl QuestionCount {
    /// Rejects counts outside 1..=30.
    pub fn new(n: i64) -> Result<Self, String> {
        if (i64::from(MIN_QUESTIONS)..=i64::from(MAX_QUESTIONS)).contains(&n) {
            Ok(Self(n as u8))
        } else {
            Err(format!(
                "question count must be between {MIN_QUESTIONS} and {MAX_QUESTIONS}, got {n}"
            ))
        }
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl Default for QuestionCount {
    fn default() -> Self {
        Self(DEFAULT_QUESTIONS)
    }
}

/// Question-bank subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    CorePython,
    MachineLearning,
    DeepLearning,
    GenerativeAi,
}

impl Topic {
    pub const ALL: [Topic; 4] = [
        Topic::CorePython,
        Topic::MachineLearning,
        Topic::DeepLearning,
        Topic::GenerativeAi,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Topic::CorePython => "Core Python",
            Topic::MachineLearning => "Machine Learning",
            Topic::DeepLearning => "Deep Learning",
            Topic::GenerativeAi => "Generative AI",
        }
    }

    /// Sub-areas the question bank should cover for this topic.
    pub fn focus(&self) -> &'static str {
        match self {
            Topic::CorePython => "Data Structures and OOP",
            Topic::MachineLearning => "Supervised Learning and Model Evaluation",
            Topic::DeepLearning => "Neural Networks and CNNs",
            Topic::GenerativeAi => "LLMs and Prompt Engineering",
        }
    }
}

/// Question-bank difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Easy,
    Intermediate,
    Difficult,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::Easy, Level::Intermediate, Level::Difficult];

    pub fn label(&self) -> &'static str {
        match self {
            Level::Easy => "Easy",
            Level::Intermediate => "Intermediate",
            Level::Difficult => "Difficult",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Topic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Topic::ALL
            .into_iter()
            .find(|t| t.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown topic '{s}'"))
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Level::ALL
            .into_iter()
            .find(|l| l.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown level '{s}'"))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Catalog
// ────────────────────────────────────────────────────────────────────────────

/// A catalog entry with its parameters filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptRequest {
    Review,
    MatchScore,
    LearningPath,
    Rewrite { instruction: String },
    InterviewQuestions { count: QuestionCount },
    TopicBank { topic: Topic, level: Level },
}

impl PromptRequest {
    /// Catalog key, used in logs and JSON responses.
    pub fn key(&self) -> &'static str {
        match self {
            PromptRequest::Review => "review",
            PromptRequest::MatchScore => "match_score",
            PromptRequest::LearningPath => "learning_path",
            PromptRequest::Rewrite { .. } => "rewrite",
            PromptRequest::InterviewQuestions { .. } => "interview_questions",
            PromptRequest::TopicBank { .. } => "topic_bank",
        }
    }

    /// Renders the final instruction text.
    pub fn render(&self) -> String {
        match self {
            PromptRequest::Review => REVIEW_PROMPT.to_string(),
            PromptRequest::MatchScore => MATCH_SCORE_PROMPT.to_string(),
            PromptRequest::LearningPath => LEARNING_PATH_PROMPT.to_string(),
            PromptRequest::Rewrite { instruction } => {
                let instruction = instruction.trim();
                if instruction.is_empty() {
                    REWRITE_PROMPT.to_string()
                } else {
                    let mut prompt = REWRITE_PROMPT.to_string();
                    prompt.push_str(&REWRITE_INSTRUCTION_SUFFIX.replace("{instruction}", instruction));
                    prompt
                }
            }
            PromptRequest::InterviewQuestions { count } => {
                INTERVIEW_QUESTIONS_PROMPT.replace("{num_questions}", &count.get().to_string())
            }
            PromptRequest::TopicBank { topic, level } => TOPIC_BANK_PROMPT
                .replace("{topic}", topic.label())
                .replace("{level}", level.label())
                .replace("{focus}", topic.focus()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_bank_deep_learning_difficult_exact_text() {
        let prompt = PromptRequest::TopicBank {
            topic: Topic::DeepLearning,
            level: Level::Difficult,
        }
        .render();
        assert_eq!(
            prompt,
            "Generate 10 interview questions on Deep Learning of Difficult, covering topics such as Neural Networks and CNNs with answers"
        );
    }

    #[test]
    fn test_every_topic_level_pair_renders_without_slots() {
        for topic in Topic::ALL {
            for level in Level::ALL {
                let prompt = PromptRequest::TopicBank { topic, level }.render();
                assert!(!prompt.contains('{'), "unfilled slot in {prompt}");
                assert!(prompt.contains(topic.label()));
                assert!(prompt.contains(level.label()));
            }
        }
    }

    #[test]
    fn test_interview_questions_count_interpolated() {
        let count = QuestionCount::new(12).unwrap();
        let prompt = PromptRequest::InterviewQuestions { count }.render();
        assert!(prompt.contains("Generate 12 interview questions"));
        assert!(!prompt.contains("{num_questions}"));
    }

    #[test]
    fn test_question_count_bounds() {
        assert!(QuestionCount::new(0).is_err());
        assert!(QuestionCount::new(31).is_err());
        assert!(QuestionCount::new(-4).is_err());
        assert_eq!(QuestionCount::new(1).unwrap().get(), 1);
        assert_eq!(QuestionCount::new(30).unwrap().get(), 30);
        assert_eq!(QuestionCount::default().get(), 5);
    }

    #[test]
    fn test_rewrite_with_and_without_instruction() {
        let plain = PromptRequest::Rewrite {
            instruction: "   ".into(),
        }
        .render();
        assert_eq!(plain, REWRITE_PROMPT);

        let guided = PromptRequest::Rewrite {
            instruction: "Emphasize Kubernetes work".into(),
        }
        .render();
        assert!(guided.starts_with(REWRITE_PROMPT));
        assert!(guided.ends_with("Emphasize Kubernetes work"));
    }

    #[test]
    fn test_topic_and_level_parse_labels() {
        assert_eq!("generative ai".parse::<Topic>().unwrap(), Topic::GenerativeAi);
        assert_eq!("Intermediate".parse::<Level>().unwrap(), Level::Intermediate);
        assert!("Rust".parse::<Topic>().is_err());
        assert!("Expert".parse::<Level>().is_err());
    }

    #[test]
    fn test_static_keys() {
        assert_eq!(PromptRequest::Review.key(), "review");
        assert_eq!(PromptRequest::MatchScore.key(), "match_score");
        assert_eq!(PromptRequest::LearningPath.key(), "learning_path");
    }
}
