//! `docent ask` - Upload local files and ask one question.

use docent_agent::{StreamEvent, TurnHandle};
use docent_config::AppConfig;
use docent_core::agent::AgentKind;
use docent_core::message::SessionId;
use docent_gateway::AppState;
use std::path::PathBuf;
use std::sync::Arc;

pub async fn run(
    message: String,
    files: Vec<PathBuf>,
    agent: Option<String>,
    trace: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if !config.has_api_key() && !is_local_provider(&config.default_provider) {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set DOCENT_API_KEY or OPENAI_API_KEY, or add api_key to:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let hint = match agent.as_deref() {
        Some(name) => {
            Some(AgentKind::parse(name).ok_or_else(|| format!("Unknown agent '{name}'"))?)
        }
        None => None,
    };

    let router = docent_providers::build_from_config(&config);
    let provider = router.default().ok_or("No default provider configured")?;
    let sandbox = docent_providers::build_sandbox(&config);
    let state = Arc::new(AppState::build(config, provider, sandbox));

    for path in &files {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| format!("Cannot read {}: {e}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let record = state.pipeline.upload(&name, bytes).await?;
        eprintln!("  Indexed {} ({} chunks)", record.name, record.chunks_indexed.unwrap_or(0));
    }

    let handle = state.engine.execute_turn(SessionId::new(), message, hint);
    drive(handle, trace).await
}

/// Print a turn as it runs. Ctrl+C cancels it.
async fn drive(mut handle: TurnHandle, trace: bool) -> Result<(), Box<dyn std::error::Error>> {
    let canceller = handle.canceller();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            canceller.cancel(docent_agent::CancelReason::Cancelled);
        }
    });

    let mut result = Ok(());
    while let Some(event) = handle.next_event().await {
        match &event.event {
            StreamEvent::FinalAnswer { content, degraded } => {
                println!("{content}");
                if *degraded {
                    eprintln!("  (answer is incomplete)");
                }
            }
            StreamEvent::Failure { reason, message } => {
                result = Err(format!("{}: {message}", reason.as_str()).into());
            }
            other if trace => {
                if let Some(line) = render_event(other) {
                    eprintln!("{line}");
                }
            }
            _ => {}
        }
    }

    ctrl_c.abort();
    result
}

/// One trace line for a non-terminal event.
fn render_event(event: &StreamEvent) -> Option<String> {
    match event {
        StreamEvent::Status { message, .. } => Some(format!("  [status] {message}")),
        StreamEvent::Reasoning { content } => Some(format!("  [thinking] {content}")),
        StreamEvent::ToolInvocation {
            tool, arguments, ..
        } => Some(format!("  [tool] {tool} {arguments}")),
        StreamEvent::Observation {
            tool,
            success: true,
            ..
        } => Some(format!("  [result] {tool} ok")),
        StreamEvent::Observation { tool, output, .. } => {
            Some(format!("  [result] {tool} failed: {output}"))
        }
        StreamEvent::FinalAnswer { .. } | StreamEvent::Failure { .. } => None,
    }
}

fn is_local_provider(name: &str) -> bool {
    matches!(name, "ollama" | "vllm")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_trace_lines() {
        let line = render_event(&StreamEvent::ToolInvocation {
            call_id: "c1".into(),
            tool: "execute_code".into(),
            arguments: serde_json::json!({"code": "1+1"}),
        })
        .unwrap();
        assert!(line.starts_with("  [tool] execute_code"));

        let line = render_event(&StreamEvent::Observation {
            call_id: "c1".into(),
            tool: "search_files".into(),
            success: false,
            output: "Error".into(),
            error_kind: None,
        })
        .unwrap();
        assert!(line.contains("failed"));

        let answer = StreamEvent::FinalAnswer {
            content: "x".into(),
            degraded: false,
        };
        assert!(render_event(&answer).is_none());
    }

    #[test]
    fn local_providers_need_no_key() {
        assert!(is_local_provider("ollama"));
        assert!(!is_local_provider("openai"));
    }
}
