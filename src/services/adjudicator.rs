//! Evidence adjudicator service implementation
//!
//! This service submits identity claims and evidence (a public website URL or
//! an uploaded document image) to the reasoning/vision API and parses the
//! structured judgment it returns. Failures here are recoverable: the caller
//! treats them as a rejected attempt, never as a crash.

use std::time::Duration;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, debug};

use crate::config::settings::Settings;
use crate::models::judgment::{Judgment, WebsiteJudgment, DocumentJudgment};
use crate::utils::errors::{MedGuardError, AdjudicatorError, Result};

const WEBSITE_SYSTEM_PROMPT: &str = "You verify medical professionals. Search the \
given organization website for the claimed person. The full name must match \
EXACTLY: surname, given name and patronymic alike. Any difference in any part \
means no match. Return found=true only on an absolutely exact match of all \
parts, put the exact name you located into found_name, and be honest about \
your confidence. Respond with a JSON object with fields: found (boolean), \
confidence (\"high\"|\"medium\"|\"low\"), explanation (string), sources \
(array of strings), found_name (string).";

const DOCUMENT_SYSTEM_PROMPT: &str = "You analyze medical credential documents. \
The full name must match EXACTLY: surname, given name and patronymic alike; \
any difference in any part means no match. Verify the document is genuinely \
medical: it must carry medical institution names, medical terminology, \
official seals, license or registration numbers, or authorized signatures. \
Do not accept driver licenses, passports, generic employment letters or \
home-made documents. Respond with a JSON object with fields: found (boolean), \
confidence (\"high\"|\"medium\"|\"low\"), explanation (string), document_type \
(string), found_name (string), is_medical_document (boolean), \
medical_indicators (array of strings), issuing_organization (string).";

/// Chat-completions response envelope
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: String,
}

/// Adjudicator service for evidence evaluation
#[derive(Clone)]
#[derive(Debug)]
pub struct AdjudicatorService {
    client: Client,
    settings: Settings,
}

impl AdjudicatorService {
    /// Create a new AdjudicatorService instance
    pub fn new(settings: Settings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.adjudicator.timeout_seconds))
            .user_agent("MedGuard-Bot/1.0")
            .build()
            .map_err(MedGuardError::Http)?;

        Ok(Self { client, settings })
    }

    /// Evaluate a claim against a public website. Returns the parsed judgment
    /// together with the raw payload for the audit log.
    pub async fn verify_by_website(
        &self,
        full_name: &str,
        workplace: &str,
        website_url: &str,
    ) -> Result<(Judgment, String)> {
        info!(full_name = %full_name, website_url = %website_url, "Requesting website adjudication");

        let user_prompt = format!(
            "Check whether {} works at the medical organization {}. \
             Look for the person on {} or other official sources and report \
             the exact name you find.",
            full_name, workplace, website_url
        );

        let body = json!({
            "model": self.settings.adjudicator.model,
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": WEBSITE_SYSTEM_PROMPT},
                {"role": "user", "content": user_prompt},
            ],
        });

        let payload = self.submit(body).await?;
        let judgment: WebsiteJudgment = serde_json::from_str(&payload).map_err(|e| {
            AdjudicatorError::InvalidResponse(format!("website judgment: {}", e))
        })?;

        Ok((Judgment::Website(judgment), payload))
    }

    /// Evaluate a claim against an uploaded document image. Returns the
    /// parsed judgment together with the raw payload for the audit log.
    pub async fn verify_by_document(
        &self,
        full_name: &str,
        workplace: &str,
        image_data: &[u8],
        mime_type: &str,
    ) -> Result<(Judgment, String)> {
        info!(full_name = %full_name, bytes = image_data.len(), mime_type = %mime_type,
              "Requesting document adjudication");

        let encoded = base64::engine::general_purpose::STANDARD.encode(image_data);
        let user_prompt = format!(
            "Analyze this document for medical education or qualification. \
             Look for the name: {}. Claimed workplace: {}. Check the medical \
             markers of the document (terminology, institution names, seals, \
             signatures) and report everything you find.",
            full_name, workplace
        );

        let body = json!({
            "model": self.settings.adjudicator.model,
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": DOCUMENT_SYSTEM_PROMPT},
                {"role": "user", "content": [
                    {"type": "text", "text": user_prompt},
                    {"type": "image_url", "image_url": {
                        "url": format!("data:{};base64,{}", mime_type, encoded)
                    }},
                ]},
            ],
        });

        let payload = self.submit(body).await?;
        let judgment: DocumentJudgment = serde_json::from_str(&payload).map_err(|e| {
            AdjudicatorError::InvalidResponse(format!("document judgment: {}", e))
        })?;

        Ok((Judgment::Document(judgment), payload))
    }

    /// Post a completion request and extract the structured content
    async fn submit(&self, body: serde_json::Value) -> Result<String> {
        let url = format!(
            "{}/chat/completions",
            self.settings.adjudicator.api_url.trim_end_matches('/')
        );
        debug!(url = %url, "Submitting adjudication request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.settings.adjudicator.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MedGuardError::Adjudicator(AdjudicatorError::Timeout)
                } else if e.is_connect() {
                    MedGuardError::Adjudicator(AdjudicatorError::ServiceUnavailable)
                } else {
                    MedGuardError::Adjudicator(AdjudicatorError::RequestFailed(e.to_string()))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(MedGuardError::Adjudicator(AdjudicatorError::RequestFailed(
                format!("HTTP {}: {}", status, error_text),
            )));
        }

        let completion: CompletionResponse = response.json().await.map_err(|e| {
            MedGuardError::Adjudicator(AdjudicatorError::InvalidResponse(e.to_string()))
        })?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| {
                MedGuardError::Adjudicator(AdjudicatorError::InvalidResponse(
                    "empty choices in completion response".to_string(),
                ))
            })?;

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{MockServer, Mock, ResponseTemplate};
    use wiremock::matchers::{method, path};

    fn test_settings(api_url: String) -> Settings {
        let mut settings = Settings::default();
        settings.adjudicator.api_url = api_url;
        settings.adjudicator.api_key = "sk-test".to_string();
        settings.adjudicator.timeout_seconds = 5;
        settings
    }

    fn completion_body(content: serde_json::Value) -> serde_json::Value {
        json!({
            "choices": [
                {"message": {"role": "assistant", "content": content.to_string()}}
            ]
        })
    }

    #[tokio::test]
    async fn test_website_judgment_is_parsed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(json!({
                "found": true,
                "confidence": "high",
                "explanation": "Listed on the staff page",
                "sources": ["https://hospital1.ru/staff"],
                "found_name": "Ivanov Ivan Ivanovich"
            }))))
            .mount(&server)
            .await;

        let service = AdjudicatorService::new(test_settings(server.uri())).unwrap();
        let (judgment, payload) = service
            .verify_by_website("Ivanov Ivan Ivanovich", "City Hospital", "https://hospital1.ru")
            .await
            .unwrap();

        assert!(judgment.found());
        assert_eq!(judgment.found_name(), "Ivanov Ivan Ivanovich");
        assert!(payload.contains("staff page"));
    }

    #[tokio::test]
    async fn test_document_judgment_is_parsed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(json!({
                "found": true,
                "confidence": "medium",
                "explanation": "Diploma carries the name",
                "document_type": "diploma",
                "found_name": "Ivanov Ivan Ivanovich",
                "is_medical_document": true,
                "medical_indicators": ["medical university seal"],
                "issuing_organization": "Medical University"
            }))))
            .mount(&server)
            .await;

        let service = AdjudicatorService::new(test_settings(server.uri())).unwrap();
        let (judgment, _) = service
            .verify_by_document("Ivanov Ivan Ivanovich", "City Hospital", b"fake-image", "image/jpeg")
            .await
            .unwrap();

        match judgment {
            Judgment::Document(doc) => {
                assert!(doc.is_medical_document);
                assert_eq!(doc.medical_indicators.len(), 1);
            }
            Judgment::Website(_) => panic!("expected a document judgment"),
        }
    }

    #[tokio::test]
    async fn test_malformed_content_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"choices": [{"message": {"role": "assistant", "content": "not json"}}]})),
            )
            .mount(&server)
            .await;

        let service = AdjudicatorService::new(test_settings(server.uri())).unwrap();
        let result = service
            .verify_by_website("Ivanov Ivan", "City Hospital", "https://hospital1.ru")
            .await;

        assert!(matches!(
            result,
            Err(MedGuardError::Adjudicator(AdjudicatorError::InvalidResponse(_)))
        ));
    }

    #[tokio::test]
    async fn test_http_error_is_request_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let service = AdjudicatorService::new(test_settings(server.uri())).unwrap();
        let result = service
            .verify_by_website("Ivanov Ivan", "City Hospital", "https://hospital1.ru")
            .await;

        assert!(matches!(
            result,
            Err(MedGuardError::Adjudicator(AdjudicatorError::RequestFailed(_)))
        ));
    }
}
