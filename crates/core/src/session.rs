//! Request Session
//!
//! Drives one input stream to completion. Each line is handled fully, history
//! included, before its response unit is written and the next line is read.

use crate::agent::{AgentAdapter, OutputFormat};
use crate::extract::extract_content;
use crate::history::{ConversationTurn, HistoryStore};
use crate::normalize::{NormalizeContext, normalize};
use crate::protocol::{FrameError, Framing, LineFramer, Payload, ResponseWriter, decode_request};
use crate::quiz::{
    InterviewQuestion, audit_quiz, needs_tool_step_recovery, quiz_from_tool_steps,
    repair_interview, repair_quiz,
};
use crate::request::{AudioData, Feature, Request};
use crate::router::{Route, TRANSCRIPTION_MARKER, route, transcription_parameters};
use chrono::Local;
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tracing::{Instrument, Span, error, field, info, info_span, warn};

/// Model used for voice transcription unless configured otherwise.
pub const DEFAULT_TRANSCRIPTION_MODEL_ID: &str = "6610617ff1278441b6482530";

/// Interview requests without both inputs are answered with this error.
pub const INTERVIEW_INPUT_REQUIRED: &str = "Job details and company info are required";

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub transcription_model_id: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            transcription_model_id: DEFAULT_TRANSCRIPTION_MODEL_ID.to_string(),
        }
    }
}

/// One response unit, ready for the writer.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub payload: Payload,
    pub framing: Framing,
}

impl Reply {
    fn rejected(error: &FrameError) -> Self {
        Self {
            payload: Payload::Text(match error {
                FrameError::Transcription(_) => error.to_string(),
                _ => format!("Error: {}", error),
            }),
            framing: Framing::Inline,
        }
    }
}

/// The pipeline plus the conversation history it feeds.
pub struct Session {
    agent: Arc<dyn AgentAdapter>,
    settings: SessionSettings,
    history: HistoryStore,
}

impl Session {
    pub fn new(
        agent: Arc<dyn AgentAdapter>,
        settings: SessionSettings,
        history: HistoryStore,
    ) -> Self {
        Self {
            agent,
            settings,
            history,
        }
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Processes lines from `input` until it ends, writing one response unit
    /// per non-blank line to `output`.
    ///
    /// Only I/O failures on the streams themselves end the loop early.
    pub async fn run<R, W>(&mut self, input: R, output: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut framer = LineFramer::new(input);
        let mut writer = ResponseWriter::new(output);
        while let Some(line) = framer.next_line().await? {
            let reply = self.handle(&line).await;
            writer.write(&reply.payload, reply.framing).await?;
        }
        info!(turns = self.history.len(), "Input closed");
        Ok(())
    }

    /// Handles one input line. Never fails: every problem becomes a reply.
    pub async fn handle(&mut self, line: &str) -> Reply {
        let request = match decode_request(line) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Rejected input line");
                return Reply::rejected(&e);
            }
        };
        let span = info_span!(
            "request",
            request_id = %request.request_id(),
            feature = field::Empty
        );
        self.process(request).instrument(span).await
    }

    /// Writes the final history snapshot. Failures are logged.
    pub fn shutdown(&self) -> Option<PathBuf> {
        match self.history.flush() {
            Ok(path) => {
                info!(path = %path.display(), turns = self.history.len(), "Final history flush");
                Some(path)
            }
            Err(e) => {
                error!(error = %e, "Final history flush failed");
                None
            }
        }
    }

    async fn process(&mut self, request: Request) -> Reply {
        let prompt = match self.resolve_prompt(&request).await {
            Ok(prompt) => prompt,
            Err(e) => return Reply::rejected(&e),
        };

        let route = route(&request, &prompt);
        Span::current().record("feature", field::display(route.feature));
        info!(prompt_len = prompt.len(), "Processing request");

        let (payload, assistant) = self.respond(&request, route).await;
        self.history.append(ConversationTurn::new(
            prompt,
            assistant,
            request.request_id(),
            request.language(),
        ));

        let framing = match payload {
            Payload::Text(_) => Framing::Inline,
            Payload::Json(_) => Framing::Line,
        };
        Reply { payload, framing }
    }

    /// The prompt to work on, replaced by a transcription for voice input.
    async fn resolve_prompt(&self, request: &Request) -> Result<String, FrameError> {
        let Some(audio) = request.voice_audio() else {
            return Ok(request.prompt().to_string());
        };
        match self.transcribe(audio).await {
            Ok(transcribed) => {
                let text = if transcribed.trim().is_empty() {
                    request.prompt()
                } else {
                    transcribed.as_str()
                };
                Ok(format!("{}{}", TRANSCRIPTION_MARKER, text))
            }
            Err(e) if !request.prompt().is_empty() => {
                warn!(error = %e, "Transcription failed; using the typed prompt");
                Ok(request.prompt().to_string())
            }
            Err(e) => {
                error!(error = %e, "Transcription failed and no prompt was supplied");
                Err(FrameError::Transcription(e.to_string()))
            }
        }
    }

    async fn transcribe(&self, audio: &AudioData) -> anyhow::Result<String> {
        let raw = self
            .agent
            .run(
                audio.to_query(),
                OutputFormat::Text,
                transcription_parameters(&self.settings.transcription_model_id),
            )
            .await?;
        let text = extract_content(&raw);
        info!(chars = text.chars().count(), "Transcribed voice input");
        Ok(text)
    }

    /// Runs the adapter for `route` and shapes its answer for the branch.
    /// Returns the payload and the text recorded as the assistant's turn.
    async fn respond(&self, request: &Request, route: Route) -> (Payload, String) {
        let feature = route.feature;
        let missing_interview_input = request.job_details().trim().is_empty()
            || request.company_info().trim().is_empty();
        if feature == Feature::Interview && missing_interview_input {
            warn!("Interview request without job details or company info");
            return json_reply(json!({ "error": INTERVIEW_INPUT_REQUIRED }));
        }

        let result = self
            .agent
            .run(route.query, route.output_format, route.parameters)
            .await;
        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                error!(error = %e, "Agent call failed");
                return failure(feature, &e.to_string());
            }
        };
        let content = extract_content(&raw);

        match feature {
            Feature::Text | Feature::Translation => {
                text_reply(normalize(&content, NormalizeContext::General))
            }
            Feature::Image => text_reply(content),
            Feature::Summary => {
                let summary = normalize(&content, NormalizeContext::TextOnly);
                let payload = json!({
                    "success": true,
                    "summary": summary,
                    "language": request.language(),
                    "summaryLevel": request.summary_level(),
                });
                (Payload::Json(payload), summary)
            }
            Feature::Quiz => {
                let text = if needs_tool_step_recovery(&content) {
                    info!("Agent stopped without a quiz; searching its tool steps");
                    quiz_from_tool_steps(&raw)
                } else {
                    Ok(content)
                };
                match text.and_then(|text| repair_quiz(&text)) {
                    Ok(questions) => {
                        for problem in audit_quiz(&questions) {
                            warn!(%problem, "Quiz item does not match the question schema");
                        }
                        if questions.len() != request.question_count() as usize {
                            info!(
                                requested = request.question_count(),
                                received = questions.len(),
                                "Quiz question count differs from the request"
                            );
                        }
                        json_reply(json!({ "success": true, "questions": questions }))
                    }
                    Err(e) => {
                        warn!(error = %e, "Quiz repair failed");
                        failure(feature, &e.to_string())
                    }
                }
            }
            Feature::Interview => interview_reply(repair_interview(&content)),
        }
    }
}

/// The error payload for `feature`.
fn failure(feature: Feature, message: &str) -> (Payload, String) {
    match feature {
        Feature::Text | Feature::Translation | Feature::Image => text_reply(format!(
            "I'm sorry, I encountered an error processing your request: {}",
            message
        )),
        Feature::Summary => json_reply(json!({ "success": false, "error": message })),
        Feature::Quiz => json_reply(json!({
            "success": false,
            "error": message,
            "questions": [],
        })),
        Feature::Interview => interview_reply(vec![InterviewQuestion::error(
            "Failed to generate questions",
            message,
        )]),
    }
}

fn text_reply(text: String) -> (Payload, String) {
    (Payload::Text(text.clone()), text)
}

fn json_reply(value: Value) -> (Payload, String) {
    let payload = Payload::Json(value);
    let recorded = payload.encode();
    (payload, recorded)
}

fn interview_reply(questions: Vec<InterviewQuestion>) -> (Payload, String) {
    json_reply(json!({
        "questions": questions,
        "timestamp": Local::now().to_rfc3339(),
    }))
}
