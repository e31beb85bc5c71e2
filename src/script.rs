//! Storyboard scripts: the page structure the renderer consumes, plus the
//! text-model call that drafts them.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::constants::{SCRIPT_API_BASE, SCRIPT_MAX_TOKENS, SCRIPT_MODEL, SCRIPT_TEMPERATURE};
use crate::error::ScriptError;
use crate::style::{ComicStyle, Language};

/// One panel of a row.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Panel {
    /// What the panel shows
    #[serde(default)]
    pub text: String,
}

/// A row of panels. `height` is a layout hint like `"250px"`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Row {
    /// Layout hint, not validated
    #[serde(default)]
    pub height: String,
    /// Panels left to right
    pub panels: Vec<Panel>,
}

/// One comic page.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct PageScript {
    /// Shown once at the top
    #[serde(default)]
    pub title: String,
    /// Rows top to bottom
    pub rows: Vec<Row>,
}

#[derive(Debug, Deserialize, Serialize)]
struct ComicScript {
    pages: Vec<PageScript>,
}

/// Checks the shape of a script: one page or a list of pages.
pub fn validate_script(script: &Value) -> Result<(), String> {
    let empty = match script {
        Value::Null => true,
        Value::Array(pages) => pages.is_empty(),
        Value::Object(page) => page.is_empty(),
        _ => false,
    };
    if empty {
        return Err("No script provided".to_string());
    }

    let valid = match script {
        Value::Array(pages) => pages.iter().all(is_valid_page),
        page => is_valid_page(page),
    };
    if valid {
        Ok(())
    } else {
        Err("Invalid page structure".to_string())
    }
}

fn is_valid_page(page: &Value) -> bool {
    let Some(rows) = page.get("rows").and_then(Value::as_array) else {
        return false;
    };
    rows.iter().all(|row| {
        row.get("panels")
            .and_then(Value::as_array)
            .is_some_and(|panels| !panels.is_empty() && panels.iter().all(Value::is_object))
    })
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

/// Drafts storyboard scripts with an OpenAI-compatible chat model.
#[derive(Clone, Debug)]
pub struct ScriptGenerator {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    style: ComicStyle,
    language: Language,
}

impl ScriptGenerator {
    /// Generator with default base URL, model, style and language.
    pub fn new(http: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            base_url: SCRIPT_API_BASE.to_string(),
            model: SCRIPT_MODEL.to_string(),
            style: ComicStyle::default(),
            language: Language::Chinese,
        }
    }

    /// Points at a different OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim().trim_end_matches('/').to_string();
        self
    }

    /// Uses a different chat model.
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Sets the style the storyboard is written for.
    pub fn with_style(mut self, style: ComicStyle) -> Self {
        self.style = style;
        self
    }

    /// Sets the language of titles and panel text.
    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    /// The system prompt for a `page_count`-page script.
    pub fn system_prompt(&self, page_count: u32) -> String {
        let style_desc = self.style.description();
        let language_instruction = self.language.instruction();
        let style_key = self.style.key();
        format!(
            r#"You are a professional comic storyboard script assistant. Please generate a {page_count}-page comic storyboard script based on the user's description.

**IMPORTANT: Please use {style_desc} to design the storyboard content.**

**Language Requirement: {language_instruction}**

Please strictly follow the provided Schema structure to generate the storyboard script:

1. **Story Structure**:
   - Generate a complete and coherent {page_count}-page story.
   - Each page (ComicPage) should contain 3-5 rows (Rows).
   - **Pacing Control**: Each row can contain 1-3 panels (Panels). Avoid having only 1 panel per row entirely; use rows with 2-3 panels frequently to add dynamism and pacing variation.

2. **Visual Design (Critical)**:
   - **Row Height**: Dynamically adjust `height` based on the importance of the panels.
     - Standard shots/dialogue: Use '250px'.
     - Key actions/emphasis shots: Use '350px' or '400px'.
     - Avoid using the same height for all rows.
   - **Panel Description**: The `text` field MUST contain specific visual descriptions (e.g., camera angle, facial expressions, body language, background details).
   - Descriptions should fully reflect the visual style of {style_key}.

3. **Language**:
   - All content (titles, descriptions) must follow the language requirement: {language_instruction}"#
        )
    }

    /// Asks the model for a script and returns its pages.
    pub async fn generate(&self, prompt: &str, page_count: u32) -> Result<Vec<PageScript>, ScriptError> {
        info!(
            "Generating {}-page script with {} ({}, {})",
            page_count, self.model, self.style, self.language
        );
        let req_body = json!({
            "model": self.model,
            "temperature": SCRIPT_TEMPERATURE,
            "max_tokens": SCRIPT_MAX_TOKENS,
            "messages": [
                {"role": "system", "content": self.system_prompt(page_count)},
                {"role": "user", "content": prompt}
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": "comic_script",
                    "strict": true,
                    "schema": comic_script_schema()
                }
            }
        });

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&req_body)
            .send()
            .await?;

        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            return Err(ScriptError::Api {
                status,
                body: String::from_utf8_lossy(&bytes).chars().take(512).collect(),
            });
        }

        let parsed: ChatCompletionResponse = serde_json::from_slice(&bytes)?;
        let message = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or(ScriptError::EmptyCompletion)?;
        if let Some(refusal) = message.refusal {
            return Err(ScriptError::Refusal(refusal));
        }
        let content = message
            .content
            .filter(|content| !content.trim().is_empty())
            .ok_or(ScriptError::EmptyCompletion)?;
        debug!("Script completion: {}", content);

        let script: ComicScript = serde_json::from_str(&content)?;
        Ok(script.pages)
    }
}

fn comic_script_schema() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "pages": {
                "type": "array",
                "description": "Comic pages",
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "properties": {
                        "title": {"type": "string", "description": "Page title"},
                        "rows": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "additionalProperties": false,
                                "properties": {
                                    "height": {"type": "string", "description": "Row height, eg '250px'"},
                                    "panels": {
                                        "type": "array",
                                        "items": {
                                            "type": "object",
                                            "additionalProperties": false,
                                            "properties": {
                                                "text": {"type": "string", "description": "Panel description"}
                                            },
                                            "required": ["text"]
                                        }
                                    }
                                },
                                "required": ["height", "panels"]
                            }
                        }
                    },
                    "required": ["title", "rows"]
                }
            }
        },
        "required": ["pages"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::MockServer;

    #[test]
    fn validate_accepts_page_or_list() {
        let page = json!({"title": "T", "rows": [{"height": "250px", "panels": [{"text": "a"}]}]});
        assert_eq!(validate_script(&page), Ok(()));
        assert_eq!(validate_script(&json!([page.clone(), page])), Ok(()));
    }

    #[test]
    fn validate_rejects_bad_shapes() {
        assert_eq!(validate_script(&Value::Null), Err("No script provided".to_string()));
        assert_eq!(validate_script(&json!([])), Err("No script provided".to_string()));
        let invalid = Err("Invalid page structure".to_string());
        assert_eq!(validate_script(&json!({"title": "no rows"})), invalid);
        assert_eq!(validate_script(&json!({"rows": [{"height": "1px"}]})), invalid);
        assert_eq!(validate_script(&json!({"rows": [{"panels": []}]})), invalid);
        assert_eq!(validate_script(&json!({"rows": [{"panels": ["text"]}]})), invalid);
        assert_eq!(validate_script(&json!([{"rows": []}, 5])), invalid);
    }

    #[test]
    fn page_script_tolerates_missing_optional_fields() {
        let page: PageScript =
            serde_json::from_value(json!({"rows": [{"panels": [{"text": "hero jumps"}]}]}))
                .expect("parse page");
        assert_eq!(page.title, "");
        assert_eq!(page.rows[0].height, "");
        assert_eq!(page.rows[0].panels[0].text, "hero jumps");
    }

    #[test]
    fn system_prompt_reflects_style_and_language() {
        let generator = ScriptGenerator::new(reqwest::Client::new(), "k")
            .with_style(ComicStyle::Watercolor)
            .with_language(Language::English);
        let prompt = generator.system_prompt(4);
        assert!(prompt.contains("generate a 4-page comic storyboard"));
        assert!(prompt.contains(ComicStyle::Watercolor.description()));
        assert!(prompt.contains(Language::English.instruction()));
        assert!(prompt.contains("visual style of watercolor"));
    }

    #[tokio::test]
    async fn generate_parses_structured_completion() {
        let server = MockServer::start_async().await;
        let content = json!({"pages": [{"title": "One", "rows": [{"height": "250px", "panels": [{"text": "a"}, {"text": "b"}]}]}]})
            .to_string();
        let mock = server
            .mock_async(|when, then| {
                when.method("POST")
                    .path("/v1/chat/completions")
                    .header("authorization", "Bearer sk-test");
                then.status(200).json_body(json!({
                    "choices": [{"message": {"role": "assistant", "content": content}}]
                }));
            })
            .await;

        let pages = ScriptGenerator::new(reqwest::Client::new(), "sk-test")
            .with_base_url(&server.url("/v1/"))
            .generate("a cat learns to fly", 1)
            .await
            .expect("generate");
        mock.assert_async().await;
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].title, "One");
        assert_eq!(pages[0].rows[0].panels.len(), 2);
    }

    #[tokio::test]
    async fn generate_surfaces_api_errors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("POST").path("/chat/completions");
                then.status(401).body("bad key");
            })
            .await;

        let err = ScriptGenerator::new(reqwest::Client::new(), "nope")
            .with_base_url(&server.base_url())
            .generate("x", 1)
            .await
            .expect_err("should fail");
        assert!(err.to_string().starts_with("AI generation failed"));
        assert!(err.to_string().contains("bad key"));
    }
}
