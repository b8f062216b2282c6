use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::{Error, Result};

#[derive(Debug, Deserialize)]
struct CompletionResponse {
	choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
	message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
	content: String,
}

/// Run a chat completion and return the first choice's message content.
pub async fn complete(cfg: &sift_config::ChatProviderConfig, messages: &[Value]) -> Result<String> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"messages": messages,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let parsed: CompletionResponse =
		serde_json::from_value(res.error_for_status()?.json().await?).map_err(|err| {
			Error::InvalidResponse { message: format!("Malformed completion response: {err}") }
		})?;

	parsed
		.choices
		.into_iter()
		.next()
		.map(|choice| choice.message.content)
		.ok_or_else(|| Error::InvalidResponse {
			message: "Completion response contained no choices.".to_string(),
		})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn first_choice_content_is_extracted() {
		let raw = serde_json::json!({
			"choices": [
				{ "message": { "content": "a hypothetical answer" } },
				{ "message": { "content": "ignored" } }
			]
		});
		let parsed: CompletionResponse = serde_json::from_value(raw).expect("parse failed");

		assert_eq!(parsed.choices[0].message.content, "a hypothetical answer");
	}

	#[test]
	fn missing_choices_fails_to_parse() {
		assert!(serde_json::from_value::<CompletionResponse>(serde_json::json!({})).is_err());
	}
}
