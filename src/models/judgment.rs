//! Adjudicator judgment model
//!
//! The evidence adjudicator returns one of two structured shapes depending on
//! the evidence channel. They are modeled as an explicit tagged union selected
//! by which endpoint produced them, not inferred from field presence.

use serde::{Deserialize, Serialize};

/// Adjudicator confidence in its own finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Judgment produced by a public website lookup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebsiteJudgment {
    pub found: bool,
    pub confidence: Confidence,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub found_name: String,
}

/// Judgment produced by document analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentJudgment {
    pub found: bool,
    pub confidence: Confidence,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub document_type: String,
    #[serde(default)]
    pub found_name: String,
    #[serde(default)]
    pub is_medical_document: bool,
    #[serde(default)]
    pub medical_indicators: Vec<String>,
    #[serde(default)]
    pub issuing_organization: String,
}

/// A structured adjudicator response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Judgment {
    Website(WebsiteJudgment),
    Document(DocumentJudgment),
}

impl Judgment {
    pub fn found(&self) -> bool {
        match self {
            Judgment::Website(j) => j.found,
            Judgment::Document(j) => j.found,
        }
    }

    pub fn confidence(&self) -> Confidence {
        match self {
            Judgment::Website(j) => j.confidence,
            Judgment::Document(j) => j.confidence,
        }
    }

    pub fn found_name(&self) -> &str {
        match self {
            Judgment::Website(j) => &j.found_name,
            Judgment::Document(j) => &j.found_name,
        }
    }

    pub fn explanation(&self) -> &str {
        match self {
            Judgment::Website(j) => &j.explanation,
            Judgment::Document(j) => &j.explanation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_website_judgment_deserialization() {
        let json = r#"{
            "found": true,
            "confidence": "high",
            "explanation": "Listed on the staff page",
            "sources": ["https://hospital1.ru/staff"],
            "found_name": "Ivanov Ivan Ivanovich"
        }"#;
        let judgment: WebsiteJudgment = serde_json::from_str(json).unwrap();
        assert!(judgment.found);
        assert_eq!(judgment.confidence, Confidence::High);
        assert_eq!(judgment.sources.len(), 1);
    }

    #[test]
    fn test_document_judgment_defaults() {
        let json = r#"{"found": false, "confidence": "low"}"#;
        let judgment: DocumentJudgment = serde_json::from_str(json).unwrap();
        assert!(!judgment.found);
        assert!(!judgment.is_medical_document);
        assert!(judgment.medical_indicators.is_empty());
    }

    #[test]
    fn test_confidence_rejects_unknown_values() {
        assert!(serde_json::from_str::<Confidence>("\"certain\"").is_err());
    }
}
