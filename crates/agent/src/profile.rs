//! Agent profiles: what each specialist is told, what it may call, and how
//! many steps it gets.

use docent_core::agent::{AgentKind, ExecutionMode};
use docent_tools::{EXECUTE_CODE, LIST_FILES, QUERY_GRAPH, ROUTE_TO_AGENT, SEARCH_FILES};

/// Appended to every specialist prompt.
const DATA_POLICY: &str = "Only use information from the user's uploaded files and the results \
of your tools. If the files do not contain the answer, say so. Never invent file names, numbers \
or quotes.";

const EXECUTION_RUN_PROMPT: &str = "You are a data analyst who answers questions by running code. \
Write Python (pandas) or SQL against the uploaded files and call execute_code to run it. The file \
context passed to the sandbox lists every file with its location. Report the computed result, not \
just the code. If the code fails, read the error, fix the code and try once more.";

const EXECUTION_SHOW_PROMPT: &str = "You are a data analyst who writes code for the user to run \
themselves. Write Python (pandas) or SQL against the uploaded files and return it in a fenced code \
block with a short explanation. Do not run it: you have no way to execute code in this mode.";

const STRUCTURED_QUERY_PROMPT: &str = "You write SQL for the user's tabular files. Inspect the \
files and their schemas with your tools, then return the query in a fenced ```sql block with a \
one-line explanation of each clause. You never execute queries.";

const RETRIEVAL_PROMPT: &str = "You are a research assistant for the user's documents. Find the \
relevant files with search_files or list_files, use query_graph for people, organizations and how \
they relate, and answer with the file names you used.";

const INSIGHT_PROMPT: &str = "You are an analyst looking for patterns, trends and outliers in the \
user's files. Retrieve the relevant content first, then explain what stands out and how confident \
you are.";

const WRITER_PROMPT: &str = "You draft reports and summaries from the user's files. Gather the \
material with your tools, then write a structured document with headings and cite the files you \
drew on.";

#[derive(Debug, Clone, PartialEq)]
pub struct AgentProfile {
    pub kind: Option<AgentKind>,
    pub system_prompt: String,
    /// Tools the agent may call; anything else fails the step
    pub tools: Vec<&'static str>,
    pub max_steps: usize,
    /// A successful call to this tool ends the loop
    pub terminal_tool: Option<&'static str>,
}

impl AgentProfile {
    /// The profile for a specialist agent.
    pub fn lookup(kind: AgentKind, mode: ExecutionMode) -> Self {
        let (prompt, tools, max_steps): (&str, Vec<&'static str>, usize) = match (kind, mode) {
            (AgentKind::Execution, ExecutionMode::Run) => (
                EXECUTION_RUN_PROMPT,
                vec![EXECUTE_CODE, LIST_FILES, SEARCH_FILES],
                8,
            ),
            (AgentKind::Execution, ExecutionMode::ShowOnly) => {
                (EXECUTION_SHOW_PROMPT, vec![LIST_FILES, SEARCH_FILES], 4)
            }
            (AgentKind::StructuredQuery, _) => {
                (STRUCTURED_QUERY_PROMPT, vec![LIST_FILES, SEARCH_FILES], 4)
            }
            (AgentKind::Retrieval, _) => (
                RETRIEVAL_PROMPT,
                vec![SEARCH_FILES, LIST_FILES, QUERY_GRAPH],
                6,
            ),
            (AgentKind::Insight, _) => (
                INSIGHT_PROMPT,
                vec![SEARCH_FILES, LIST_FILES, QUERY_GRAPH],
                6,
            ),
            (AgentKind::Writer, _) => (WRITER_PROMPT, vec![SEARCH_FILES, LIST_FILES], 6),
        };

        Self {
            kind: Some(kind),
            system_prompt: format!("{prompt}\n\n{DATA_POLICY}"),
            tools,
            max_steps,
            terminal_tool: None,
        }
    }

    /// The orchestrator's routing loop: one tool, ends as soon as it routes.
    pub fn router() -> Self {
        let agents = AgentKind::ALL.map(|k| k.as_str()).join(", ");
        Self {
            kind: None,
            system_prompt: format!(
                "You route user requests about their uploaded documents to a specialist agent. \
                 Call route_to_agent exactly once with one of: {agents}. Choose execution when the \
                 answer needs code to run on the data, structured_query for SQL, retrieval to find \
                 or list documents, insight for analysis and trends, writer for reports and \
                 summaries. Set query to the request to forward; prefix it with EXECUTE: when the \
                 code should run, or TEXT ONLY: when the user only wants to see it."
            ),
            tools: vec![ROUTE_TO_AGENT],
            max_steps: 2,
            terminal_tool: Some(ROUTE_TO_AGENT),
        }
    }

    /// Cap the step budget.
    pub fn with_step_ceiling(mut self, ceiling: usize) -> Self {
        self.max_steps = self.max_steps.min(ceiling.max(1));
        self
    }

    pub fn declares(&self, tool: &str) -> bool {
        self.tools.contains(&tool)
    }
}
