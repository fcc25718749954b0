//! Quiz and Interview JSON Repair
//!
//! Model replies that should contain a JSON array of questions arrive bare,
//! wrapped in a fenced code block with prose around it, or embedded somewhere in
//! the middle of a longer text. Each recovery strategy below is tried in order
//! and reports why it failed instead of raising.
//!
//! Two policies sit on top of the shared parser. Quizzes are lenient: the
//! requested question count is advisory, and items are only renamed, never
//! defaulted. When the agent gave up before producing a final answer, the quiz
//! is looked for in the output of its text-generation tool steps instead (see
//! [`quiz_from_tool_steps`]). Interview questions are strict: exactly
//! [`INTERVIEW_QUESTION_COUNT`] complete items or a single synthetic error item.

use crate::response::RawResponse;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::debug;

/// Number of questions the interview generator must return.
pub const INTERVIEW_QUESTION_COUNT: usize = 5;

const FENCE: &str = "```";
const JSON_FENCE: &str = "```json";
const AGENT_STOPPED: &str = "Agent stopped";
const TEXT_GENERATION_TOOL: &str = "text-generation";

/// Errors raised while recovering or validating quiz questions.
#[derive(Debug, thiserror::Error)]
pub enum QuizError {
    #[error("no valid quiz JSON found")]
    NoValidJson,
    #[error("quiz item {index} is malformed: {reason}")]
    MalformedItem { index: usize, reason: String },
    #[error("No intermediate steps available to extract quiz data")]
    NoIntermediateSteps,
    #[error("No valid quiz output found in intermediate steps")]
    NoToolStepOutput,
}

/// Strategies for locating a question array, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairStrategy {
    Direct,
    Fenced,
    Balanced,
}

impl RepairStrategy {
    pub const ORDER: [RepairStrategy; 3] = [
        RepairStrategy::Direct,
        RepairStrategy::Fenced,
        RepairStrategy::Balanced,
    ];

    fn attempt(self, text: &str) -> Result<Vec<Value>, String> {
        match self {
            RepairStrategy::Direct => parse_array(text.trim()),
            RepairStrategy::Fenced => parse_fenced(text),
            RepairStrategy::Balanced => parse_balanced(text),
        }
    }
}

impl fmt::Display for RepairStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepairStrategy::Direct => write!(f, "direct"),
            RepairStrategy::Fenced => write!(f, "fenced"),
            RepairStrategy::Balanced => write!(f, "balanced"),
        }
    }
}

/// Difficulty of a quiz question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// A fully-formed quiz question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer_index: u8,
    pub difficulty: Difficulty,
    pub points: u8,
}

impl QuizQuestion {
    /// Checks the ranges that the JSON shape alone cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if self.options.len() != 4 {
            return Err(format!("expected 4 options, found {}", self.options.len()));
        }
        if self.correct_answer_index > 3 {
            return Err(format!(
                "correctAnswerIndex {} is outside 0..=3",
                self.correct_answer_index
            ));
        }
        if !(5..=15).contains(&self.points) {
            return Err(format!("points {} is outside 5..=15", self.points));
        }
        Ok(())
    }

    /// Decodes and validates one repaired item.
    pub fn from_item(index: usize, item: &Value) -> Result<Self, QuizError> {
        let question: QuizQuestion =
            serde_json::from_value(item.clone()).map_err(|e| QuizError::MalformedItem {
                index,
                reason: e.to_string(),
            })?;
        question
            .validate()
            .map_err(|reason| QuizError::MalformedItem { index, reason })?;
        Ok(question)
    }
}

/// An interview question with guidance for the candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewQuestion {
    pub question: String,
    pub explanation: String,
    pub sample_answer: String,
}

impl InterviewQuestion {
    /// The synthetic item reported in place of a question list.
    pub fn error(headline: &str, detail: impl Into<String>) -> Self {
        Self {
            question: format!("Error: {}", headline),
            explanation: detail.into(),
            sample_answer: String::new(),
        }
    }
}

/// Locates a question array in `text` using every [`RepairStrategy`] in turn.
pub fn parse_question_array(text: &str) -> Result<Vec<Value>, QuizError> {
    for strategy in RepairStrategy::ORDER {
        match strategy.attempt(text) {
            Ok(items) => {
                debug!(%strategy, count = items.len(), "recovered question array");
                return Ok(items);
            }
            Err(reason) => debug!(%strategy, %reason, "repair strategy failed"),
        }
    }
    Err(QuizError::NoValidJson)
}

/// Recovers quiz items and renames `correct_answer` to `correctAnswerIndex`.
///
/// Missing fields are left missing; use [`audit_quiz`] to find malformed items.
pub fn repair_quiz(text: &str) -> Result<Vec<Value>, QuizError> {
    let items = parse_question_array(text)?;
    Ok(items.into_iter().map(rename_answer_key).collect())
}

/// Returns one error per item that is not a valid [`QuizQuestion`].
pub fn audit_quiz(items: &[Value]) -> Vec<QuizError> {
    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| QuizQuestion::from_item(index, item).err())
        .collect()
}

/// Recovers exactly [`INTERVIEW_QUESTION_COUNT`] interview questions, or a
/// single synthetic error item describing what went wrong.
pub fn repair_interview(text: &str) -> Vec<InterviewQuestion> {
    let Ok(items) = parse_question_array(text) else {
        return vec![InterviewQuestion::error(
            "Failed to parse response as JSON",
            text,
        )];
    };
    if items.len() != INTERVIEW_QUESTION_COUNT {
        return vec![InterviewQuestion::error("Unexpected response format", text)];
    }
    let questions: Result<Vec<InterviewQuestion>, _> = items
        .into_iter()
        .map(serde_json::from_value::<InterviewQuestion>)
        .collect();
    match questions {
        Ok(questions) => questions,
        Err(_) => vec![InterviewQuestion::error("Unexpected response format", text)],
    }
}

/// True when the agent's final output cannot hold a quiz: it is blank or the
/// agent reports that it stopped early.
pub fn needs_tool_step_recovery(output: &str) -> bool {
    output.trim().is_empty() || output.contains(AGENT_STOPPED)
}

/// Recovers quiz text from `data.intermediate_steps[].tool_steps[]`.
///
/// The first `text-generation` tool step whose output holds a ```` ```json ````
/// block wins; the text between that fence and the last fence is returned.
pub fn quiz_from_tool_steps(raw: &RawResponse) -> Result<String, QuizError> {
    let RawResponse::Mapping(map) = raw else {
        return Err(QuizError::NoIntermediateSteps);
    };
    let steps = map
        .get("data")
        .and_then(|data| data.get("intermediate_steps"))
        .and_then(Value::as_array)
        .ok_or(QuizError::NoIntermediateSteps)?;

    steps
        .iter()
        .filter_map(|step| step.get("tool_steps").and_then(Value::as_array))
        .flatten()
        .filter(|tool_step| {
            tool_step.get("tool").and_then(Value::as_str) == Some(TEXT_GENERATION_TOOL)
        })
        .filter_map(|tool_step| tool_step.get("output").and_then(Value::as_str))
        .find_map(fenced_json_body)
        .map(|body| {
            debug!(chars = body.len(), "recovered quiz from a tool step");
            body.to_string()
        })
        .ok_or(QuizError::NoToolStepOutput)
}

fn fenced_json_body(output: &str) -> Option<&str> {
    let start = output.find(JSON_FENCE)? + JSON_FENCE.len();
    let end = output.rfind(FENCE)?;
    (end > start).then(|| output[start..end].trim())
}

fn rename_answer_key(mut item: Value) -> Value {
    if let Some(object) = item.as_object_mut() {
        if let Some(answer) = object.remove("correct_answer") {
            object.insert("correctAnswerIndex".to_string(), answer);
        }
    }
    item
}

fn parse_array(candidate: &str) -> Result<Vec<Value>, String> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Array(items)) => Ok(items),
        Ok(other) => Err(format!("expected a JSON array, found {}", kind_of(&other))),
        Err(e) => Err(e.to_string()),
    }
}

fn parse_fenced(text: &str) -> Result<Vec<Value>, String> {
    let mut rest = text;
    let mut found_block = false;
    while let Some(open) = rest.find(FENCE) {
        let after_open = &rest[open + FENCE.len()..];
        // The fence line may carry a language tag such as `json`.
        let body_start = after_open.find('\n').map_or(0, |i| i + 1);
        let tag = after_open[..body_start].trim();
        let (body_offset, body) = if tag.is_empty() || tag.eq_ignore_ascii_case("json") {
            (body_start, &after_open[body_start..])
        } else {
            (0, after_open)
        };
        let Some(close) = body.find(FENCE) else {
            break;
        };
        found_block = true;
        if let Ok(items) = parse_array(body[..close].trim()) {
            return Ok(items);
        }
        rest = &after_open[body_offset + close + FENCE.len()..];
    }
    if found_block {
        Err("no fenced block holds a JSON array".to_string())
    } else {
        Err("no fenced code block".to_string())
    }
}

fn parse_balanced(text: &str) -> Result<Vec<Value>, String> {
    for (start, _) in text.match_indices('[') {
        let Some(end) = balanced_end(&text[start..]) else {
            continue;
        };
        if let Ok(items) = parse_array(&text[start..start + end]) {
            if !items.is_empty() && items.iter().all(Value::is_object) {
                return Ok(items);
            }
        }
    }
    Err("no balanced span holds an array of objects".to_string())
}

/// Byte length of the bracket-balanced span opening at the start of `text`.
/// Brackets inside JSON strings do not count.
fn balanced_end(text: &str) -> Option<usize> {
    let mut depth: usize = 0;
    let mut in_string = false;
    let mut escaped = false;
    for (index, byte) in text.bytes().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'[' => depth += 1,
            b']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(index + 1);
                }
            }
            _ => {}
        }
    }
    None
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const QUIZ: &str = r#"[
        {"question": "2+2?", "options": ["3", "4", "5", "6"], "correctAnswerIndex": 1, "difficulty": "easy", "points": 5},
        {"question": "Capital of France?", "options": ["Rome", "Paris", "Oslo", "Bern"], "correctAnswerIndex": 1, "difficulty": "medium", "points": 10}
    ]"#;

    fn interview_items(count: usize) -> String {
        let items: Vec<Value> = (0..count)
            .map(|i| {
                json!({
                    "question": format!("Q{}", i),
                    "explanation": "looking for depth",
                    "sample_answer": "an answer",
                })
            })
            .collect();
        Value::Array(items).to_string()
    }

    #[test]
    fn test_recovers_bare_array() {
        let items = repair_quiz(QUIZ).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1]["question"], "Capital of France?");
    }

    #[test]
    fn test_recovers_fenced_array_with_prose() {
        let text = format!(
            "Sure! Here is your quiz:\n```json\n{}\n```\nGood luck with [the test].",
            QUIZ
        );
        let items = repair_quiz(&text).unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_recovers_untagged_fence() {
        let text = format!("```\n{}\n```", QUIZ);
        assert_eq!(repair_quiz(&text).unwrap().len(), 2);
    }

    #[test]
    fn test_skips_fenced_blocks_without_arrays() {
        let text = format!("```python\nprint([1)\n```\n```json\n{}\n```", QUIZ);
        assert_eq!(repair_quiz(&text).unwrap().len(), 2);
    }

    #[test]
    fn test_picks_the_valid_balanced_span() {
        let text = format!(
            "See [section 2] and the config {{\"a\": [1, 2}} then: {} and finally [x].",
            QUIZ
        );
        let items = repair_quiz(&text).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["question"], "2+2?");
    }

    #[test]
    fn test_brackets_inside_strings_do_not_unbalance() {
        let text = r#"Answer: [{"question": "What does ] mean?", "options": ["a", "b", "c", "d"], "correctAnswerIndex": 0, "difficulty": "hard", "points": 15}] done"#;
        let items = repair_quiz(text).unwrap();
        assert_eq!(items[0]["question"], "What does ] mean?");
    }

    #[test]
    fn test_reports_no_valid_json() {
        let err = repair_quiz("I could not produce a quiz today.").unwrap_err();
        assert!(matches!(err, QuizError::NoValidJson));
        assert_eq!(err.to_string(), "no valid quiz JSON found");
    }

    #[test]
    fn test_direct_object_is_not_an_array() {
        assert!(matches!(
            repair_quiz(r#"{"question": "x"}"#),
            Err(QuizError::NoValidJson)
        ));
    }

    #[test]
    fn test_renames_correct_answer() {
        let text = r#"[{"question": "q", "options": ["a","b","c","d"], "correct_answer": 2, "difficulty": "easy", "points": 5}]"#;
        let items = repair_quiz(text).unwrap();
        assert_eq!(items[0]["correctAnswerIndex"], 2);
        assert!(items[0].get("correct_answer").is_none());
        assert!(audit_quiz(&items).is_empty());
    }

    #[test]
    fn test_count_mismatch_is_not_an_error() {
        // Five were requested, two came back: still a successful repair.
        assert_eq!(repair_quiz(QUIZ).unwrap().len(), 2);
    }

    #[test]
    fn test_missing_fields_are_not_defaulted() {
        let items = repair_quiz(r#"[{"question": "only a question"}]"#).unwrap();
        assert!(items[0].get("options").is_none());
        let problems = audit_quiz(&items);
        assert_eq!(problems.len(), 1);
        assert!(matches!(problems[0], QuizError::MalformedItem { index: 0, .. }));
    }

    #[test]
    fn test_validate_ranges() {
        let mut question: QuizQuestion =
            serde_json::from_value(repair_quiz(QUIZ).unwrap()[0].clone()).unwrap();
        assert!(question.validate().is_ok());

        question.points = 20;
        assert!(question.validate().unwrap_err().contains("points"));

        question.points = 10;
        question.correct_answer_index = 4;
        assert!(question.validate().is_err());

        question.correct_answer_index = 0;
        question.options.pop();
        assert!(question.validate().is_err());
    }

    fn stopped_with_steps(steps: Value) -> RawResponse {
        RawResponse::from_value(json!({
            "data": {
                "output": "Agent stopped due to iteration limit or time limit.",
                "intermediate_steps": steps,
            }
        }))
    }

    #[test]
    fn test_needs_tool_step_recovery() {
        assert!(needs_tool_step_recovery("   \n"));
        assert!(needs_tool_step_recovery(
            "Agent stopped due to iteration limit or time limit."
        ));
        assert!(!needs_tool_step_recovery(QUIZ));
    }

    #[test]
    fn test_quiz_from_tool_steps_picks_text_generation_output() {
        let raw = stopped_with_steps(json!([
            {"agent": "planner"},
            {"tool_steps": [
                {"tool": "search", "output": "```json\n[1]\n```"},
                {"tool": "text-generation", "output": "no fence here"},
            ]},
            {"tool_steps": [
                {"tool": "text-generation", "output": format!("Quiz:\n```json\n{}\n```\nDone", QUIZ)},
            ]},
        ]));
        let text = quiz_from_tool_steps(&raw).unwrap();
        assert!(text.starts_with('['));
        assert_eq!(repair_quiz(&text).unwrap().len(), 2);
    }

    #[test]
    fn test_quiz_from_tool_steps_errors() {
        let missing = RawResponse::DirectOutput("Agent stopped".to_string());
        assert!(matches!(
            quiz_from_tool_steps(&missing),
            Err(QuizError::NoIntermediateSteps)
        ));

        let unmatched = stopped_with_steps(json!([
            {"tool_steps": [{"tool": "text-generation", "output": "```json unterminated"}]},
        ]));
        let err = quiz_from_tool_steps(&unmatched).unwrap_err();
        assert_eq!(err.to_string(), "No valid quiz output found in intermediate steps");
    }

    #[test]
    fn test_interview_accepts_exactly_five() {
        let questions = repair_interview(&interview_items(5));
        assert_eq!(questions.len(), 5);
        assert_eq!(questions[4].question, "Q4");
    }

    #[test]
    fn test_interview_rejects_wrong_arity() {
        let questions = repair_interview(&interview_items(4));
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].question, "Error: Unexpected response format");
        assert_eq!(questions[0].sample_answer, "");
    }

    #[test]
    fn test_interview_rejects_missing_keys() {
        let mut items: Vec<Value> = serde_json::from_str(&interview_items(5)).unwrap();
        items[2].as_object_mut().unwrap().remove("sample_answer");
        let questions = repair_interview(&Value::Array(items).to_string());
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].question, "Error: Unexpected response format");
    }

    #[test]
    fn test_interview_reports_unparseable_reply() {
        let questions = repair_interview("no json at all");
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].question, "Error: Failed to parse response as JSON");
        assert_eq!(questions[0].explanation, "no json at all");
    }
}
