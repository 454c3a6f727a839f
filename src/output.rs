use std::io::Write;

use chrono_humanize::{Accuracy, HumanTime, Tense};
use serde::Serialize;
use serde_json::json;

use crate::cli::OutputFormat;
use crate::cloud::{ConnectionInfo, JobId, JobInfo, JobOutput, JobStatus};
use crate::error::Result;

pub fn print_json<W: Write, T: Serialize + ?Sized>(out: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

pub fn print_jids<W: Write>(out: &mut W, jids: &[JobId], format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(out, jids);
    }
    for jid in jids {
        writeln!(out, "{}", jid)?;
    }
    Ok(())
}

pub fn print_status<W: Write>(
    out: &mut W,
    jids: &[JobId],
    statuses: &[JobStatus],
    format: OutputFormat,
) -> Result<()> {
    if format == OutputFormat::Json {
        let map: serde_json::Map<String, serde_json::Value> = jids.iter()
            .zip(statuses)
            .map(|(jid, status)| (jid.to_string(), json!(status)))
            .collect();
        return print_json(out, &map);
    }

    if format == OutputFormat::Table {
        writeln!(out, "{:<10} {:<12}", "JID", "STATUS")?;
    }
    for (jid, status) in jids.iter().zip(statuses) {
        writeln!(out, "{:<10} {:<12}", jid, status)?;
    }
    Ok(())
}

pub fn print_results<W: Write>(out: &mut W, results: &[JobOutput], format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(out, results);
    }

    let with_header = format == OutputFormat::Table && results.len() > 1;
    for result in results {
        print_result(out, result, with_header)?;
    }
    Ok(())
}

/// Prints one job's stdout, optionally under a `==> job N <==` line.
pub fn print_result<W: Write>(out: &mut W, result: &JobOutput, with_header: bool) -> Result<()> {
    if with_header {
        writeln!(out, "==> job {} <==", result.jid)?;
    }
    write!(out, "{}", result.stdout)?;
    if !result.stdout.is_empty() && !result.stdout.ends_with('\n') {
        writeln!(out)?;
    }
    Ok(())
}

pub fn print_info<W: Write>(out: &mut W, infos: &[JobInfo], format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(out, infos);
    }

    if format == OutputFormat::Table {
        writeln!(out, "{:<10} {:<12} {:<20} {:<10} {}", "JID", "STATUS", "CREATED", "RUNTIME", "COMMAND")?;
    }
    for info in infos {
        let runtime = info.runtime_secs
            .map(|secs| format!("{:.2}s", secs))
            .unwrap_or_else(|| "-".to_string());
        writeln!(
            out,
            "{:<10} {:<12} {:<20} {:<10} {}",
            info.jid,
            info.status,
            format_age(info.created),
            runtime,
            truncate(&info.command, 40),
        )?;
    }
    Ok(())
}

pub fn print_connection_info<W: Write>(out: &mut W, info: &ConnectionInfo, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(out, info);
    }

    writeln!(out, "{:<12} {}", "type", info.kind)?;
    writeln!(out, "{:<12} {}", "open", info.open)?;
    if let Some(ref url) = info.server_url {
        writeln!(out, "{:<12} {}", "server_url", url)?;
    }
    if let Some(ref key) = info.api_key {
        writeln!(out, "{:<12} {}", "api_key", key)?;
    }
    if let Some(workers) = info.workers {
        writeln!(out, "{:<12} {}", "workers", workers)?;
    }
    Ok(())
}

fn format_age(time: chrono::DateTime<chrono::Utc>) -> String {
    HumanTime::from(chrono::Utc::now() - time)
        .to_text_en(Accuracy::Rough, Tense::Past)
}

pub fn truncate(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        let kept: String = text.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        text.to_string()
    }
}
