use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use tokio::runtime::Builder;
use tracing::{debug, info};
use viewsync_core::{
    logging, Bridge, BridgeConfig, BridgeError, Call, Dispatcher, HandlerSet, LogBuffer, Reply, StubViews,
};

pub struct ReplayOptions {
    pub script: PathBuf,
    pub config: Option<PathBuf>,
    pub log_level: Option<String>,
    pub show_calls: bool,
}

#[derive(Debug, Default)]
pub struct ReplaySummary {
    pub replayed: usize,
    pub failed: usize,
}

pub fn run_replay(options: ReplayOptions) -> Result<ReplaySummary> {
    let mut config = match &options.config {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            BridgeConfig::from_json(&raw)
                .with_context(|| format!("Invalid config: {}", path.display()))?
        }
        None => BridgeConfig::default(),
    };
    if let Some(level) = options.log_level {
        config.log_level = level;
        config.validate().context("Invalid --log-level")?;
    }
    logging::init(&config.log_level);

    let raw = fs::read_to_string(&options.script)
        .with_context(|| format!("Failed to read script: {}", options.script.display()))?;
    let calls = parse_script(&raw)
        .with_context(|| format!("Invalid script: {}", options.script.display()))?;

    let calls_log = LogBuffer::default();
    let handlers = HandlerSet::new(StubViews::with_buffer(calls_log.clone()))
        .with_defaults(config.default_font_size);
    let bridge = Bridge::new(config, handlers);

    let runtime = Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("viewsync-replay")
        .enable_all()
        .build()
        .context("Failed to start runtime")?;

    let replies = runtime.block_on(async move {
        let dispatcher = Dispatcher::spawn(bridge);
        let mut replies = Vec::with_capacity(calls.len());
        for (line, call) in calls.into_iter().enumerate() {
            let reply = match serde_json::from_value::<Call>(call) {
                Ok(call) => dispatcher.dispatch(call).await,
                Err(err) => Reply::from_error(&BridgeError::from(err)),
            };
            debug!(line, status = reply.status, "replayed call");
            replies.push(reply);
        }
        replies
    });

    let mut stdout = io::stdout().lock();
    let mut summary = ReplaySummary::default();
    for reply in &replies {
        summary.replayed += 1;
        if !reply.is_success() {
            summary.failed += 1;
        }
        writeln!(stdout, "{}", serde_json::to_string(reply)?)?;
    }

    if options.show_calls {
        let mut stderr = io::stderr().lock();
        for call in calls_log.lock().iter() {
            writeln!(stderr, "{call}")?;
        }
    }

    info!(
        replayed = summary.replayed,
        failed = summary.failed,
        "replay finished"
    );
    Ok(summary)
}

/// A JSON array of calls, or one JSON call per non-blank line.
fn parse_script(raw: &str) -> Result<Vec<Value>> {
    if raw.trim_start().starts_with('[') {
        return Ok(serde_json::from_str(raw)?);
    }
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line).with_context(|| format!("line {}", n + 1))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_accepts_array_or_lines() {
        let array = parse_script(r#"[{"method":"initialize"},{"method":"getScreenDimensions"}]"#)
            .unwrap();
        assert_eq!(array.len(), 2);

        let lines = parse_script("{\"method\":\"initialize\"}\n\n{\"method\":\"deleteView\",\"id\":\"a\"}\n")
            .unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["id"], "a");
    }

    #[test]
    fn test_bad_line_is_reported_by_number() {
        let err = parse_script("{\"method\":\"initialize\"}\n{oops").unwrap_err();
        assert_eq!(err.to_string(), "line 2");
    }
}
