//! Parameter extraction.
//!
//! Combines the completion service's best-effort extraction with the
//! deterministic marker parser, then validates the result against the
//! tool's schema.

pub mod markers;
pub mod schema;

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::completion::CompletionService;
use crate::error::{CompletionError, ExtractionError};
use crate::types::{Arguments, ToolDeclaration};

pub use markers::{Ambiguity, MarkerParse};
pub use schema::Validated;

/// Turns free text into validated arguments for one tool.
pub struct ParameterExtractor {
    oracle: Arc<dyn CompletionService>,
}

impl ParameterExtractor {
    pub fn new(oracle: Arc<dyn CompletionService>) -> Self {
        Self { oracle }
    }

    /// Extract arguments for `decl` from `text`.
    ///
    /// `known` holds values collected on an earlier turn; they are kept
    /// and only the remaining parameters are extracted.
    pub async fn extract(
        &self,
        text: &str,
        decl: &ToolDeclaration,
        known: &Arguments,
    ) -> Result<Arguments, ExtractionError> {
        let remaining = decl.without(known);
        let parsed = markers::parse(text, &remaining);

        let oracle_values = match self.oracle.extract(text, &remaining).await {
            Ok(values) => values,
            Err(CompletionError::Malformed(reason)) => {
                warn!(tool = %decl.kind, reason = %reason, "Malformed extraction output, using marker parser");
                Map::new()
            }
            Err(e) => return Err(ExtractionError::Oracle(e)),
        };

        let merged = merge(parsed.values, oracle_values);
        let validated = schema::validate(&remaining, &merged);

        let mut arguments = known.clone();
        arguments.merge(validated.arguments);

        debug!(
            tool = %decl.kind,
            extracted = arguments.len(),
            missing = validated.missing.len(),
            "Extraction finished"
        );

        if validated.missing.is_empty() {
            return Ok(arguments);
        }

        match parsed.ambiguity {
            Some(ambiguity)
                if ambiguity
                    .params
                    .iter()
                    .any(|p| validated.missing.contains(p)) =>
            {
                Err(ExtractionError::Ambiguous {
                    tool: decl.kind,
                    params: ambiguity.params,
                    span: ambiguity.span,
                    partial: arguments,
                })
            }
            _ => Err(ExtractionError::Incomplete {
                tool: decl.kind,
                missing: validated.missing,
                partial: arguments,
            }),
        }
    }
}

/// Oracle values win; marker values fill the gaps. Nulls and empty
/// strings from the oracle do not count as values.
fn merge(mut parsed: Map<String, Value>, oracle: Map<String, Value>) -> Map<String, Value> {
    for (key, value) in oracle {
        let empty = match &value {
            Value::Null => true,
            Value::String(s) => s.trim().is_empty(),
            _ => false,
        };
        if !empty {
            parsed.insert(key, value);
        }
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{KeywordRouter, Routing, RoutingRequest};
    use crate::registry::ToolRegistry;
    use crate::types::ToolKind;
    use async_trait::async_trait;
    use serde_json::json;

    /// Oracle that returns a fixed extraction result.
    struct FixedOracle(Result<Map<String, Value>, CompletionError>);

    #[async_trait]
    impl CompletionService for FixedOracle {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn select_tool(
            &self,
            _request: &RoutingRequest<'_>,
        ) -> Result<Routing, CompletionError> {
            Ok(Routing::Reply(String::new()))
        }

        async fn extract(
            &self,
            _text: &str,
            _decl: &ToolDeclaration,
        ) -> Result<Map<String, Value>, CompletionError> {
            self.0.clone()
        }
    }

    fn keyword_extractor() -> ParameterExtractor {
        ParameterExtractor::new(Arc::new(KeywordRouter::new()))
    }

    fn fixed(values: Value) -> ParameterExtractor {
        ParameterExtractor::new(Arc::new(FixedOracle(Ok(values
            .as_object()
            .cloned()
            .unwrap()))))
    }

    #[tokio::test]
    async fn test_extract_add_employee_examples() {
        let registry = ToolRegistry::builtin();
        let decl = registry.get_kind(ToolKind::AddEmployee);
        let extractor = keyword_extractor();

        let args = extractor
            .extract(
                "add Rahul Saha (backend developer) with email rahul@gmail.com and phone 8394847563",
                decl,
                &Arguments::new(),
            )
            .await
            .unwrap();
        assert_eq!(args.get_str("name"), Some("Rahul Saha"));
        assert_eq!(args.get_str("role"), Some("backend developer"));
        assert_eq!(args.get_str("email"), Some("rahul@gmail.com"));
        assert_eq!(args.get_str("phone"), Some("8394847563"));

        let args = extractor
            .extract(
                "store name Sayandip Roy as data scientist email sayandip@gmail.com phone 92374626373",
                decl,
                &Arguments::new(),
            )
            .await
            .unwrap();
        assert_eq!(args.get_str("name"), Some("Sayandip Roy"));
        assert_eq!(args.get_str("role"), Some("data scientist"));
        assert_eq!(args.get_str("email"), Some("sayandip@gmail.com"));
        assert_eq!(args.get_str("phone"), Some("92374626373"));
    }

    #[tokio::test]
    async fn test_extract_incomplete_lists_missing() {
        let registry = ToolRegistry::builtin();
        let decl = registry.get_kind(ToolKind::AddEmployee);
        let err = keyword_extractor()
            .extract("add employee John", decl, &Arguments::new())
            .await
            .unwrap_err();
        match err {
            ExtractionError::Incomplete {
                missing, partial, ..
            } => {
                assert_eq!(missing, vec!["role", "email", "phone"]);
                assert_eq!(partial.get_str("name"), Some("John"));
            }
            other => panic!("expected Incomplete, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_extract_ambiguous() {
        let registry = ToolRegistry::builtin();
        let decl = registry.get_kind(ToolKind::AddEmployee);
        let err = keyword_extractor()
            .extract(
                "add Rahul Saha backend developer rahul@gmail.com 8394847563",
                decl,
                &Arguments::new(),
            )
            .await
            .unwrap_err();
        match err {
            ExtractionError::Ambiguous { params, span, partial, .. } => {
                assert_eq!(params, vec!["name", "role"]);
                assert_eq!(span, "Rahul Saha backend developer");
                assert_eq!(partial.get_str("email"), Some("rahul@gmail.com"));
                assert!(!partial.contains("name"));
            }
            other => panic!("expected Ambiguous, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_extract_continues_from_known_values() {
        let registry = ToolRegistry::builtin();
        let decl = registry.get_kind(ToolKind::AddEmployee);
        let mut known = Arguments::new();
        known.insert("name", "John".into());

        let args = keyword_extractor()
            .extract("designer, john@corp.com, 9876543210", decl, &known)
            .await
            .unwrap();
        assert_eq!(args.get_str("name"), Some("John"));
        assert_eq!(args.get_str("role"), Some("designer"));
        assert_eq!(args.get_str("email"), Some("john@corp.com"));
        assert_eq!(args.get_str("phone"), Some("9876543210"));
    }

    #[tokio::test]
    async fn test_extract_is_idempotent_on_canonical_text() {
        let registry = ToolRegistry::builtin();
        let extractor = keyword_extractor();
        let cases = [
            (
                ToolKind::AddEmployee,
                "add Rahul Saha (backend developer) with email rahul@gmail.com and phone 8394847563",
            ),
            (
                ToolKind::SendEmail,
                "email boss@corp.com about Q3 numbers saying Revenue is up, see attached.",
            ),
            (
                ToolKind::EmailEmployees,
                "email all data scientists about standup saying Moved to 10am.",
            ),
            (ToolKind::ListEmployees, "list employees working as designer"),
            (
                ToolKind::CreateDocument,
                "create a pdf titled Q3 Sales Summary with content ## Overview\nSales grew.",
            ),
        ];
        for (kind, text) in cases {
            let decl = registry.get_kind(kind);
            let first = extractor.extract(text, decl, &Arguments::new()).await.unwrap();
            let canonical = first.canonical_text(decl);
            let second = extractor
                .extract(&canonical, decl, &Arguments::new())
                .await
                .unwrap();
            assert_eq!(first, second, "{} via {:?}", kind, canonical);
        }
    }

    #[tokio::test]
    async fn test_canonical_text_keeps_marker_words_in_values() {
        let registry = ToolRegistry::builtin();
        let extractor = keyword_extractor();
        let mut email = Arguments::new();
        email.insert("to", "boss@corp.com".into());
        email.insert("subject", "Content review".into());
        email.insert("body", "See you tomorrow, subject to change.".into());
        let mut broadcast = Arguments::new();
        broadcast.insert("recipients", "all data scientists".into());
        broadcast.insert("subject", "move to Friday saying hi".into());
        broadcast.insert("body", "Standup moved.".into());

        for (kind, args) in [(ToolKind::SendEmail, email), (ToolKind::EmailEmployees, broadcast)] {
            let decl = registry.get_kind(kind);
            let canonical = args.canonical_text(decl);
            let parsed = extractor
                .extract(&canonical, decl, &Arguments::new())
                .await
                .unwrap();
            assert_eq!(parsed, args, "{} via {:?}", kind, canonical);
        }
    }

    #[tokio::test]
    async fn test_extract_subject_containing_marker_word() {
        let registry = ToolRegistry::builtin();
        let args = keyword_extractor()
            .extract(
                "email boss@corp.com about content review saying See you tomorrow.",
                registry.get_kind(ToolKind::SendEmail),
                &Arguments::new(),
            )
            .await
            .unwrap();
        assert_eq!(args.get_str("subject"), Some("content review"));
        assert_eq!(args.get_str("body"), Some("See you tomorrow."));

        let args = keyword_extractor()
            .extract(
                "email all data scientists about move to Friday saying Standup moved.",
                registry.get_kind(ToolKind::EmailEmployees),
                &Arguments::new(),
            )
            .await
            .unwrap();
        assert_eq!(args.get_str("recipients"), Some("all data scientists"));
        assert_eq!(args.get_str("subject"), Some("move to Friday"));
    }

    #[tokio::test]
    async fn test_oracle_values_win_and_parser_fills_gaps() {
        let registry = ToolRegistry::builtin();
        let decl = registry.get_kind(ToolKind::SendEmail);
        let extractor = fixed(json!({
            "to": "boss@corp.com",
            "subject": "Quarterly numbers",
            "body": null,
            "cc": "ignored@corp.com"
        }));
        let args = extractor
            .extract(
                "email x@y.co about Q3 saying Revenue is up.",
                decl,
                &Arguments::new(),
            )
            .await
            .unwrap();
        assert_eq!(args.get_str("to"), Some("boss@corp.com"));
        assert_eq!(args.get_str("subject"), Some("Quarterly numbers"));
        assert_eq!(args.get_str("body"), Some("Revenue is up."));
        assert!(!args.contains("cc"));
    }

    #[tokio::test]
    async fn test_malformed_oracle_falls_back_to_parser() {
        let registry = ToolRegistry::builtin();
        let decl = registry.get_kind(ToolKind::ListEmployees);
        let extractor = ParameterExtractor::new(Arc::new(FixedOracle(Err(
            CompletionError::Malformed("<html>".to_string()),
        ))));
        let args = extractor
            .extract("list all designers", decl, &Arguments::new())
            .await
            .unwrap();
        assert_eq!(args.get_str("role"), Some("designers"));
    }

    #[tokio::test]
    async fn test_oracle_transport_error_propagates() {
        let registry = ToolRegistry::builtin();
        let decl = registry.get_kind(ToolKind::ListEmployees);
        let extractor = ParameterExtractor::new(Arc::new(FixedOracle(Err(
            CompletionError::Unreachable("connection refused".to_string()),
        ))));
        let err = extractor
            .extract("list all designers", decl, &Arguments::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::Oracle(CompletionError::Unreachable(_))
        ));
    }

    #[tokio::test]
    async fn test_create_document_defaults_applied() {
        let registry = ToolRegistry::builtin();
        let decl = registry.get_kind(ToolKind::CreateDocument);
        let args = keyword_extractor()
            .extract("create a document titled Onboarding Guide", decl, &Arguments::new())
            .await
            .unwrap();
        assert_eq!(args.get_str("format"), Some("docx"));
        assert_eq!(args.get_str("title"), Some("Onboarding Guide"));
        assert_eq!(args.get_str("content"), Some(""));
        assert!(!args.contains("filename"));
    }
}
