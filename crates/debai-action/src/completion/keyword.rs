//! Deterministic keyword router.
//!
//! Routes with weighted regex patterns and extracts with the marker
//! parser. Used offline, in tests, and whenever no model is configured.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::completion::{CompletionService, Routing, RoutingRequest, ToolChoice};
use crate::error::CompletionError;
use crate::extract::markers;
use crate::types::{ToolDeclaration, ToolKind};

/// Tool family a pattern votes for. Email patterns resolve to
/// `send_email` or `email_employees` once the whole message is seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Email,
    Tool(ToolKind),
}

struct RoutePattern {
    regex: Regex,
    family: Family,
    weight: f32,
}

/// Extra confidence for every additional pattern of the same family.
const CORROBORATION_BONUS: f32 = 0.05;

static ROUTE_PATTERNS: LazyLock<Vec<RoutePattern>> = LazyLock::new(|| {
    let mk = |pattern: &str, family: Family, weight: f32| RoutePattern {
        regex: Regex::new(pattern).unwrap(),
        family,
        weight,
    };
    vec![
        // Email
        mk(
            r"(?i)\b(send|write|compose|draft|shoot)\b.*\b(e-?mail|mail|message)\b",
            Family::Email,
            0.9,
        ),
        mk(r"(?i)^\s*(please\s+)?e-?mail\b", Family::Email, 0.85),
        mk(r"(?i)\b(e-?mail|mail)\s+(to|all|every|the)\b", Family::Email, 0.8),
        mk(r"(?i)\bsend\b.*\bto\b", Family::Email, 0.6),
        // Add employee
        mk(
            r"(?i)\b(add|store|insert|register|save|onboard|create)\b.*\b(employee|staff|member|record|colleague|hire)\b",
            Family::Tool(ToolKind::AddEmployee),
            0.9,
        ),
        mk(
            r"(?i)^\s*(please\s+)?(add|store|insert|register|save|onboard)\b",
            Family::Tool(ToolKind::AddEmployee),
            0.75,
        ),
        mk(
            r"(?i)\b(phone|mobile|contact)\b",
            Family::Tool(ToolKind::AddEmployee),
            0.5,
        ),
        // Update employee
        mk(
            r"(?i)^\s*(please\s+)?(update|change|modify|edit|set|correct)\b.*\b(e-?mail|phone|mobile|number|contact|role|job|position|designation)\b",
            Family::Tool(ToolKind::UpdateEmployee),
            0.9,
        ),
        mk(
            r"(?i)\b(update|change|modify|edit)\b.*\b(employee|staff|record|details)\b",
            Family::Tool(ToolKind::UpdateEmployee),
            0.7,
        ),
        // Delete employee
        mk(
            r"(?i)\b(delete|remove|erase|offboard)\b.*\b(employee|staff|member|record|from\s+(the\s+)?(database|db|directory))\b",
            Family::Tool(ToolKind::DeleteEmployee),
            0.9,
        ),
        mk(
            r"(?i)^\s*(please\s+)?(delete|remove|erase|offboard)\b",
            Family::Tool(ToolKind::DeleteEmployee),
            0.85,
        ),
        // List employees
        mk(
            r"(?i)\b(list|show|display|get|find|view|fetch)\b.*\b(employees?|staff|team|members|directory|everyone|people|developers?|engineers?|designers?|scientists?|managers?)\b",
            Family::Tool(ToolKind::ListEmployees),
            0.9,
        ),
        mk(
            r"(?i)\bwho\s+(are|is)\b.*\b(employees?|working|team|developers?|engineers?|designers?|scientists?|managers?)\b",
            Family::Tool(ToolKind::ListEmployees),
            0.8,
        ),
        mk(
            r"(?i)\bhow\s+many\s+(employees|people|staff)\b",
            Family::Tool(ToolKind::ListEmployees),
            0.8,
        ),
        // Documents
        mk(
            r"(?i)\b(create|make|generate|write|prepare|draft|build|produce)\b.*\b(document|doc|docx|pdf|report|spreadsheet|excel|xlsx|word\s+file|text\s+file|txt|file)\b",
            Family::Tool(ToolKind::CreateDocument),
            0.9,
        ),
        mk(
            r"(?i)\b(pdf|docx|xlsx|spreadsheet)\b",
            Family::Tool(ToolKind::CreateDocument),
            0.5,
        ),
    ]
});

static ADDRESS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\w.+-]+@[\w.-]+\.\w+").unwrap());

static GREETING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(hi|hello|hey|good\s+(morning|afternoon|evening)|yo|greetings)\b").unwrap()
});

static THANKS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(thanks|thank\s+you|thx|ty|cheers|great|awesome|perfect|ok(ay)?|cool)\b[\s!.]*$")
        .unwrap()
});

static CANCEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(cancel|never\s*mind|nevermind|forget\s+it|stop|abort)\b").unwrap()
});

static HELP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(help|what\s+can\s+you\s+do|capabilities|how\s+do\s+(i|you))\b").unwrap()
});

pub const CAPABILITIES: &str = "I can send an email to an address, email employees by name or role, \
add, update or remove employees in the directory, list employees, and create Word, PDF, Excel or \
text documents.";

/// Kind of conversational message that should never continue a pending
/// tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmallTalk {
    Greeting,
    Thanks,
    Cancel,
    Help,
}

/// Classify purely conversational messages.
pub fn small_talk(message: &str) -> Option<SmallTalk> {
    if CANCEL_RE.is_match(message) {
        Some(SmallTalk::Cancel)
    } else if THANKS_RE.is_match(message) {
        Some(SmallTalk::Thanks)
    } else if HELP_RE.is_match(message) {
        Some(SmallTalk::Help)
    } else if GREETING_RE.is_match(message) && message.split_whitespace().count() <= 4 {
        Some(SmallTalk::Greeting)
    } else {
        None
    }
}

/// Offline completion service.
#[derive(Debug, Default)]
pub struct KeywordRouter;

impl KeywordRouter {
    pub fn new() -> Self {
        Self
    }

    /// Score every tool family against the message. Returns the best
    /// tool and its confidence.
    pub fn score(&self, message: &str) -> Option<(ToolKind, f32)> {
        let mut scores: Vec<(Family, f32, usize)> = Vec::new();
        for pattern in ROUTE_PATTERNS.iter() {
            if !pattern.regex.is_match(message) {
                continue;
            }
            match scores.iter_mut().find(|(f, _, _)| *f == pattern.family) {
                Some((_, best, hits)) => {
                    *best = best.max(pattern.weight);
                    *hits += 1;
                }
                None => scores.push((pattern.family, pattern.weight, 1)),
            }
        }

        let has_address = ADDRESS_RE.is_match(message);
        scores
            .into_iter()
            .map(|(family, best, hits)| {
                let confidence = (best + CORROBORATION_BONUS * (hits - 1) as f32).min(0.99);
                let kind = match family {
                    Family::Email if has_address => ToolKind::SendEmail,
                    Family::Email => ToolKind::EmailEmployees,
                    Family::Tool(kind) => kind,
                };
                (kind, confidence)
            })
            // Earlier-declared tools win ties.
            .fold(None, |best: Option<(ToolKind, f32)>, (kind, confidence)| match best {
                Some((b, c)) if c > confidence || (c == confidence && rank(b) < rank(kind)) => {
                    Some((b, c))
                }
                _ => Some((kind, confidence)),
            })
    }
}

fn rank(kind: ToolKind) -> usize {
    ToolKind::ALL.iter().position(|k| *k == kind).unwrap_or(usize::MAX)
}

fn canned_reply(message: &str) -> String {
    match small_talk(message) {
        Some(SmallTalk::Greeting) => format!("Hello! {}", CAPABILITIES),
        Some(SmallTalk::Thanks) => "You're welcome! Anything else?".to_string(),
        Some(SmallTalk::Cancel) => "Okay, nothing was done.".to_string(),
        Some(SmallTalk::Help) => CAPABILITIES.to_string(),
        None => format!(
            "I'm not sure what you'd like me to do. {} Try something like \
             \"send an email to alex@example.com about lunch saying See you at noon\".",
            CAPABILITIES
        ),
    }
}

#[async_trait]
impl CompletionService for KeywordRouter {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn select_tool(&self, request: &RoutingRequest<'_>) -> Result<Routing, CompletionError> {
        if small_talk(request.message).is_some() {
            return Ok(Routing::Reply(canned_reply(request.message)));
        }
        match self.score(request.message) {
            Some((kind, confidence)) => {
                debug!(tool = %kind, confidence, "Keyword route");
                Ok(Routing::Tool(ToolChoice {
                    name: kind.to_string(),
                    confidence,
                }))
            }
            None => Ok(Routing::Reply(canned_reply(request.message))),
        }
    }

    async fn extract(
        &self,
        text: &str,
        decl: &ToolDeclaration,
    ) -> Result<Map<String, Value>, CompletionError> {
        Ok(markers::parse(text, decl).values)
    }
}
