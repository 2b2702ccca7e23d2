//! Interactive terminal prompts.

use std::io::{self, BufRead, Write};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use letssmime_issuance::{CollectionPasswordSource, IssuanceError, IssuanceResult, RunId};

/// Ask for a line on stdin and return it trimmed.
pub fn prompt(label: &str) -> Result<String> {
    let mut stdout = io::stdout().lock();
    write!(stdout, "{label}: ").and_then(|()| stdout.flush())?;

    let mut line = String::new();
    let read = io::stdin()
        .lock()
        .read_line(&mut line)
        .with_context(|| format!("failed to read {label}"))?;
    if read == 0 {
        bail!("stdin closed while waiting for {label}");
    }

    Ok(line.trim().to_string())
}

/// Use `value` if given, otherwise prompt until something non-empty arrives.
pub fn value_or_prompt(value: Option<String>, label: &str) -> Result<String> {
    if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
        return Ok(value.trim().to_string());
    }

    loop {
        let answer = prompt(label)?;
        if !answer.is_empty() {
            return Ok(answer);
        }
    }
}

/// Asks the operator for the collection password once it has been mailed.
#[derive(Debug, Default)]
pub struct PromptCollectionPassword;

#[async_trait]
impl CollectionPasswordSource for PromptCollectionPassword {
    async fn collection_password(&self, run: &RunId) -> IssuanceResult<String> {
        println!(
            "An email has been sent to {run} containing a \"collection password\"."
        );

        tokio::task::spawn_blocking(|| prompt("Collection password"))
            .await
            .map_err(|e| IssuanceError::CollectionPassword(e.to_string()))?
            .map_err(|e| IssuanceError::CollectionPassword(format!("{e:#}")))
    }
}
