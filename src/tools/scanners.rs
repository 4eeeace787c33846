//! Command lines and result summaries for the scanning utilities run in the
//! tool container.

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::errors::FlaghuntError;

pub const DEFAULT_SQLMAP_OPTIONS: &str = "--batch --level=1 --risk=1";
const FFUF_SUMMARY_LINES: usize = 20;

static COOKIE_FLAGS: LazyLock<HashMap<&str, &str>> = LazyLock::new(|| {
    HashMap::from([
        ("ffuf", "-b "),
        ("sqlmap", "--cookie="),
    ])
});

/// Single-quote a value for `bash -c`.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

fn cookie_flag(tool: &str, cookies: Option<&str>) -> Option<String> {
    let cookies = cookies.filter(|c| !c.trim().is_empty())?;
    COOKIE_FLAGS
        .get(tool)
        .map(|prefix| format!("{}{}", prefix, shell_quote(cookies)))
}

fn join(parts: Vec<Option<String>>) -> String {
    parts
        .into_iter()
        .flatten()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn ffuf_command(url: &str, wordlist: &str, cookies: Option<&str>, options: &str) -> String {
    join(vec![
        Some("ffuf".into()),
        Some(format!("-w {}", shell_quote(wordlist))),
        Some(format!("-u {}", shell_quote(url))),
        cookie_flag("ffuf", cookies),
        Some(options.trim().to_string()),
        Some("-ac".into()),
    ])
}

pub fn sqlmap_command(url: &str, cookies: Option<&str>, options: &str) -> String {
    let options = if options.trim().is_empty() { DEFAULT_SQLMAP_OPTIONS } else { options.trim() };
    join(vec![
        Some("sqlmap".into()),
        Some(format!("-u {}", shell_quote(url))),
        cookie_flag("sqlmap", cookies),
        Some(options.to_string()),
    ])
}

pub fn summarize_ffuf(output: &str, wordlist: &str) -> String {
    if output.contains("Wordlist file not found") {
        return format!("Error: Wordlist file not found at path: {}. Please provide a valid path.", wordlist);
    }
    if output.trim().is_empty() {
        return "ffuf completed with no output. This may mean nothing was found or an error occurred.".into();
    }
    let summary = output.trim().lines().take(FFUF_SUMMARY_LINES).collect::<Vec<_>>().join("\n");
    format!("ffuf scan completed. Output summary:\n{}", summary)
}

pub fn summarize_sqlmap(output: &str, url: &str) -> String {
    if output.contains("is vulnerable") {
        format!("sqlmap found a potential vulnerability at {}. Key findings:\n{}", url, output)
    } else {
        format!(
            "sqlmap scan completed. No obvious vulnerabilities found with the given options. Output:{}",
            output
        )
    }
}

pub fn missing_binary(tool: &str, output: &str) -> Option<String> {
    let marker = format!("{}: command not found", tool);
    output.contains(&marker).then(|| {
        format!(
            "Error: `{}` command not found. Please ensure it is installed in the tool container.",
            tool
        )
    })
}

fn describe_duration(secs: u64) -> String {
    match secs {
        60 => "1 minute".into(),
        s if s % 60 == 0 => format!("{} minutes", s / 60),
        s => format!("{} seconds", s),
    }
}

/// Tool-result text for a failed scanner invocation.
pub fn scanner_error(tool: &str, error: &FlaghuntError, timeout_secs: u64) -> String {
    match error {
        FlaghuntError::Timeout(_) => {
            format!("Error: {} scan timed out after {}.", tool, describe_duration(timeout_secs))
        }
        other => format!("An unexpected error occurred: {}", other),
    }
}
