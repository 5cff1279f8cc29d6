//! Query classification.
//!
//! A pure function from query text (and an optional agent hint) to a
//! [`Route`]. Precedence, highest first:
//!
//! 1. Mode prefix: `EXECUTE:` runs code, `TEXT ONLY:` shows it without
//!    running. Both force the execution agent and are stripped.
//! 2. An explicit agent hint.
//! 3. The keyword table below, first matching row wins.
//! 4. The agent that handled the session's previous turn.
//! 5. Retrieval.
//!
//! Without a prefix, the execution mode is `ShowOnly` when the query asks
//! to see code ("show code", "write code", "example", "how to") and `Run`
//! otherwise.

use docent_core::agent::{AgentKind, ExecutionMode};
use serde::Serialize;

/// The routing decision for one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Route {
    pub kind: AgentKind,
    pub mode: ExecutionMode,
    /// The query to forward, prefix removed
    pub query: String,
}

const EXECUTE_PREFIXES: &[&str] = &["execute:"];
const TEXT_ONLY_PREFIXES: &[&str] = &["text only:", "text-only:", "text_only:"];

const PRIORITY: &[(AgentKind, &[&str])] = &[
    (
        AgentKind::Execution,
        &[
            "code",
            "python",
            "script",
            "calculate",
            "compute",
            "plot",
            "visualize",
            "visualise",
            "chart",
            "run",
            "execute",
            "average",
            "sum",
            "median",
        ],
    ),
    (
        AgentKind::StructuredQuery,
        &[
            "sql",
            "query",
            "database",
            "table",
            "tables",
            "select",
            "join",
            "schema",
            "column",
            "columns",
        ],
    ),
    (
        AgentKind::Retrieval,
        &[
            "search",
            "find",
            "lookup",
            "look up",
            "list",
            "locate",
            "which files",
            "what files",
        ],
    ),
    (
        AgentKind::Insight,
        &[
            "analyze",
            "analyse",
            "analysis",
            "statistics",
            "insight",
            "insights",
            "pattern",
            "patterns",
            "correlation",
            "trend",
            "trends",
            "compare",
        ],
    ),
    (
        AgentKind::Writer,
        &[
            "write",
            "report",
            "summary",
            "summarize",
            "summarise",
            "draft",
            "executive",
        ],
    ),
];

const SHOW_INTENT: &[&str] = &[
    "show code",
    "show me the code",
    "write code",
    "example",
    "how to",
    "how do i",
];

/// Classify a query with no hint.
pub fn classify(query: &str) -> Route {
    classify_with_hint(query, None)
}

/// Classify a query. A hint overrides keywords but never a prefix.
pub fn classify_with_hint(query: &str, hint: Option<AgentKind>) -> Route {
    classify_in_session(query, hint, None)
}

/// Classify a follow-up query. `previous` only replaces the Retrieval
/// default; any keyword match still wins over it.
pub fn classify_in_session(
    query: &str,
    hint: Option<AgentKind>,
    previous: Option<AgentKind>,
) -> Route {
    if let Some(route) = prefixed(query) {
        return route;
    }

    let text = normalize(query);
    let kind = hint
        .or_else(|| keyword_kind(&text))
        .or(previous)
        .unwrap_or(AgentKind::Retrieval);
    let mode = if matches_any(&text, SHOW_INTENT) {
        ExecutionMode::ShowOnly
    } else {
        ExecutionMode::Run
    };
    Route { kind, mode, query: query.trim().to_string() }
}

/// The route forced by a mode prefix, if the query has one.
pub fn prefixed(query: &str) -> Option<Route> {
    let trimmed = query.trim_start();
    let forced = |mode: ExecutionMode, rest: &str| Route {
        kind: AgentKind::Execution,
        mode,
        query: rest.trim().to_string(),
    };

    if let Some(rest) = strip_prefix_ci(trimmed, EXECUTE_PREFIXES) {
        return Some(forced(ExecutionMode::Run, rest));
    }
    if let Some(rest) = strip_prefix_ci(trimmed, TEXT_ONLY_PREFIXES) {
        return Some(forced(ExecutionMode::ShowOnly, rest));
    }
    None
}

fn strip_prefix_ci<'a>(text: &'a str, prefixes: &[&str]) -> Option<&'a str> {
    prefixes.iter().find_map(|prefix| {
        let head = text.get(..prefix.len())?;
        head.eq_ignore_ascii_case(prefix).then(|| &text[prefix.len()..])
    })
}

fn keyword_kind(text: &str) -> Option<AgentKind> {
    PRIORITY
        .iter()
        .find(|(_, keywords)| matches_any(text, keywords))
        .map(|(kind, _)| *kind)
}

/// Lowercase words separated by single spaces, padded with a space on each
/// side so phrases match on word boundaries.
fn normalize(query: &str) -> String {
    let words: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    format!(" {} ", words.join(" "))
}

fn matches_any(normalized: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|p| normalized.contains(&format!(" {p} ")))
}
