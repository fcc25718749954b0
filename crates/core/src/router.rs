//! Request Routing and Prompt Templates
//!
//! Branch selection is the only decision made here; each template is plain
//! interpolation of request fields.

use crate::agent::{OutputFormat, Parameters};
use crate::request::{Feature, Request};
use serde_json::json;

/// Words in a prompt that signal an image request when no feature is declared.
pub const IMAGE_KEYWORDS: &[&str] = &["image", "picture", "photo", "generate", "create", "draw"];

/// Prefix added to a prompt recovered from voice input.
pub const TRANSCRIPTION_MARKER: &str = "[Transcribed from voice] ";

/// Default token budget for text generation.
pub const TEXT_MAX_TOKENS: u32 = 8192;
/// Token budget for question generation.
pub const QUESTION_MAX_TOKENS: u32 = 2048;

/// Everything needed to call the agent adapter for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub feature: Feature,
    pub query: String,
    pub output_format: OutputFormat,
    pub parameters: Parameters,
}

/// Picks the branch: a declared feature wins, otherwise the prompt is scanned
/// for image keywords.
pub fn select_feature(request: &Request, prompt: &str) -> Feature {
    if let Some(feature) = request.declared_feature() {
        return feature;
    }
    let lowered = prompt.to_lowercase();
    if IMAGE_KEYWORDS.iter().any(|keyword| lowered.contains(keyword)) {
        Feature::Image
    } else {
        Feature::Text
    }
}

/// Builds the adapter call for `request`, using `prompt` as the user's text
/// (which may come from a transcription).
pub fn route(request: &Request, prompt: &str) -> Route {
    let feature = select_feature(request, prompt);
    let language = request.language();
    let (query, parameters) = match feature {
        Feature::Text => (text_prompt(prompt, &language), text_parameters()),
        Feature::Translation => (translation_prompt(prompt, &language), text_parameters()),
        Feature::Image => (image_prompt(prompt), text_parameters()),
        Feature::Summary => (
            summary_prompt(prompt, request.summary_level(), &language),
            text_parameters(),
        ),
        Feature::Quiz => (
            quiz_prompt(
                prompt,
                request.question_count(),
                request.question_type(),
                request.category(),
                &language,
            ),
            quiz_parameters(),
        ),
        Feature::Interview => (
            interview_prompt(request.job_details(), request.company_info()),
            interview_parameters(),
        ),
    };
    Route {
        feature,
        query,
        output_format: OutputFormat::Text,
        parameters,
    }
}

/// Parameters for the voice transcription sub-step.
pub fn transcription_parameters(model_id: &str) -> Parameters {
    let mut parameters = Parameters::new();
    parameters.insert("model_id".to_string(), json!(model_id));
    parameters
}

fn text_parameters() -> Parameters {
    let mut parameters = Parameters::new();
    parameters.insert("max_tokens".to_string(), json!(TEXT_MAX_TOKENS));
    parameters
}

fn quiz_parameters() -> Parameters {
    let mut parameters = Parameters::new();
    parameters.insert("max_tokens".to_string(), json!(QUESTION_MAX_TOKENS));
    parameters.insert("temperature".to_string(), json!(0.7));
    parameters
}

fn interview_parameters() -> Parameters {
    let mut parameters = Parameters::new();
    parameters.insert("max_tokens".to_string(), json!(QUESTION_MAX_TOKENS));
    parameters
}

pub fn text_prompt(prompt: &str, language: &str) -> String {
    format!(
        "Please respond to the following prompt with well-formatted content.
Format your response with:
- Use proper HTML formatting: <strong>for bold text</strong> instead of **text**
- Use bullet points with • symbol
- Proper paragraph spacing
- If the response should be in {language}, please ensure the entire response is in {language}

Here is the prompt: {prompt}"
    )
}

pub fn translation_prompt(prompt: &str, language: &str) -> String {
    format!(
        "Translate the following content into {language}.
Keep the meaning, tone and formatting of the source text. Reply with the translation only.

Content to translate: {prompt}"
    )
}

pub fn image_prompt(prompt: &str) -> String {
    format!(
        "Generate an image based on this description: {prompt}

When returning the image, please format your response as follows:
1. A brief description of what was generated
2. The image URL clearly marked with [IMAGE_URL: <a href=\"URL_HERE\">Image Link</a>]"
    )
}

pub fn summary_prompt(prompt: &str, summary_level: &str, language: &str) -> String {
    format!(
        "SYSTEM INSTRUCTION: You are a specialized educational summarizer that creates text-only summaries.

USER REQUEST: Create a {summary_level} educational summary in {language} language of the following content.

IMPORTANT CONSTRAINTS:
- DO NOT generate or include any images
- DO NOT include any image URLs or HTML img tags
- DO NOT include any markdown image syntax
- Focus ONLY on creating a TEXT summary
- Format with clear paragraphs and bullet points
- If the summary level is 'simple', use simpler language and shorter sentences
- If the summary level is 'detailed', provide more comprehensive information
- If the summary level is 'advanced', include technical terms and deeper analysis

CONTENT TO SUMMARIZE:
{prompt}"
    )
}

pub fn quiz_prompt(
    topic: &str,
    question_count: u32,
    question_type: &str,
    category: &str,
    language: &str,
) -> String {
    format!(
        "Generate {question_count} {question_type} questions about {topic} for a {category} quiz in {language} language.
For each question, provide:
1. The question text
2. Four answer options (for multiple choice) or true/false options
3. The correct answer index (0-based)
4. A difficulty level (easy, medium, or hard)
5. Points value (between 5-15 based on difficulty)

Format the response as a JSON array of question objects with the following structure:
[
  {{
    \"question\": \"Question text here\",
    \"options\": [\"Option 1\", \"Option 2\", \"Option 3\", \"Option 4\"],
    \"correctAnswerIndex\": 0,
    \"difficulty\": \"medium\",
    \"points\": 10
  }}
]"
    )
}

pub fn interview_prompt(job_details: &str, company_info: &str) -> String {
    format!(
        "You are an expert interviewer for {company_info}.

Based on the following job details, generate 5 interview questions that would be asked during a job interview:

Job Details:
{job_details}

Please format your response as a JSON array, where each element is an object with:
{{
    \"question\": \"The interview question\",
    \"explanation\": \"What the interviewer is looking for\",
    \"sample_answer\": \"A sample good answer\"
}}

Ensure the response is valid JSON and contains exactly 5 questions. If the job details are insufficient, make reasonable assumptions based on the context."
    )
}
