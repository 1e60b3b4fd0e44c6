//! OpenAI-compatible chat-completions client answering locate prompts.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::client::JsonClient;
use crate::{ApiConfig, Completer, LocatePrompt, LocateResponse, SemanticError};

/// Remote completion capability.
///
/// The model is asked for a JSON object; anything else in the reply (prose,
/// code fences) is tolerated as long as one JSON object can be pulled out.
#[derive(Debug)]
pub struct ApiCompleter {
    client: JsonClient,
}

impl ApiCompleter {
    pub fn new(config: ApiConfig) -> Result<Self, SemanticError> {
        Ok(Self {
            client: JsonClient::new(config)?,
        })
    }

    pub fn config(&self) -> &ApiConfig {
        self.client.config()
    }
}

#[async_trait]
impl Completer for ApiCompleter {
    async fn complete(&self, prompt: &LocatePrompt) -> Result<LocateResponse, SemanticError> {
        let payload = build_payload(self.config(), prompt);
        let response = self.client.post(&payload).await?;
        let content = message_content(&response)?;
        parse_locate_reply(content)
    }
}

fn build_payload(cfg: &ApiConfig, prompt: &LocatePrompt) -> Value {
    json!({
        "model": cfg.model,
        "temperature": 0,
        "response_format": { "type": "json_object" },
        "messages": [
            { "role": "system", "content": prompt.system_message() },
            { "role": "user", "content": prompt.user_message() },
        ],
    })
}

fn message_content(response: &Value) -> Result<&str, SemanticError> {
    response
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            SemanticError::MalformedResponse("missing choices[0].message.content".into())
        })
}

/// Pull `{found, start_offset, end_offset}` out of a model reply.
pub(crate) fn parse_locate_reply(content: &str) -> Result<LocateResponse, SemanticError> {
    let body = strip_code_fence(content.trim());
    if let Ok(parsed) = serde_json::from_str::<LocateResponse>(body) {
        return Ok(parsed);
    }
    let start = body.find('{');
    let end = body.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if start < end => {
            serde_json::from_str::<LocateResponse>(&body[start..=end]).map_err(|e| {
                SemanticError::MalformedResponse(format!("locate reply is not valid JSON: {e}"))
            })
        }
        _ => Err(SemanticError::MalformedResponse(
            "locate reply contained no JSON object".into(),
        )),
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop an optional language tag on the opening fence.
    let rest = rest.split_once('\n').map_or(rest, |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}
