//! Pathwise 演示入口
//!
//! `pathwise <topic>`：在 stdin 上进行一次诊断面试（脚本化 Agent），
//! 完成后等待规划 Job 并打印学习路径 JSON。输入 `skip` 可跳过面试。

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use pathwise::agent::{AgentVariant, ScriptedAgent};
use pathwise::jobs::JobStatus;
use pathwise::session::{ChatOutcome, DiagnosticRequest};
use pathwise::{load_config, observability, AppConfig, Orchestrator};

const JOB_WAIT: Duration = Duration::from_secs(300);

fn scripted_agent(topic: &str) -> ScriptedAgent {
    let journey = serde_json::json!({
        "topic": topic,
        "nodes": [
            { "id": "n1", "title": format!("{} fundamentals", topic), "depends_on": [] },
            { "id": "n2", "title": format!("Applied {}", topic), "depends_on": ["n1"] },
            { "id": "n3", "title": format!("Advanced {}", topic), "depends_on": ["n2"] }
        ]
    });

    let agent = ScriptedAgent::new().with_fallback(AgentVariant::JourneyPlanner, journey.to_string());
    agent
        .push_text(
            AgentVariant::Diagnostic,
            format!("Let's see where you are with {}. What have you built with it so far?", topic),
        )
        .push_text(AgentVariant::Diagnostic, "How would you explain its core concepts to a colleague?")
        .push_text(AgentVariant::Diagnostic, "Which parts do you still find confusing?")
        .push_text(
            AgentVariant::Diagnostic,
            "Thanks, that's enough to go on. submit_diagnostic(mastery_level=\"Intermediate\")",
        );
    agent
}

fn main() -> anyhow::Result<()> {
    observability::init();

    let topic = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if topic.trim().is_empty() {
        bail!("usage: pathwise <topic>");
    }

    let cfg = load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });
    let orch = Orchestrator::new(&cfg, Arc::new(scripted_agent(&topic)))
        .context("Failed to start orchestrator")?;

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut request = DiagnosticRequest::start(topic.clone());

    let job_id = loop {
        match orch.diagnostic_chat(request)? {
            ChatOutcome::Chatting { session_id, message } => {
                print!("{}\n> ", message);
                io::stdout().flush()?;
                let Some(line) = lines.next() else {
                    bail!("stdin closed before the diagnostic finished");
                };
                let line = line?;
                request = if line.trim().eq_ignore_ascii_case("skip") {
                    DiagnosticRequest::skip(Some(session_id), topic.clone())
                } else {
                    DiagnosticRequest::answer(session_id, line)
                };
            }
            ChatOutcome::Processing { job_id, message, .. } => {
                println!("{}", message);
                break job_id;
            }
            ChatOutcome::Expired { message } => bail!(message),
        }
    };

    let view = orch.wait_for_job(&job_id, JOB_WAIT)?;
    match view.status {
        JobStatus::Completed => {
            let journey = view.result.unwrap_or_default();
            println!("{}", serde_json::to_string_pretty(&journey)?);
        }
        JobStatus::Failed => bail!(
            "Journey generation failed: {}",
            view.error.unwrap_or_default()
        ),
        JobStatus::Pending => bail!("Journey generation still running after {:?}", JOB_WAIT),
    }

    orch.shutdown();
    Ok(())
}
