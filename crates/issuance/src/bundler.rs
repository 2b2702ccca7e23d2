//! PKCS#12 bundling through an external tool.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{IssuanceError, IssuanceResult};

/// Combines the private key and certificate chain into one archive.
#[async_trait]
pub trait Bundler: Send + Sync {
    /// Bundle the PEM files at the given paths. The output carries no
    /// protecting passphrase.
    async fn bundle(&self, private_key: &Path, certificate_chain: &Path) -> IssuanceResult<Vec<u8>>;
}

/// Runs `openssl pkcs12 -export` and captures the archive from stdout.
#[derive(Debug, Clone)]
pub struct OpensslBundler {
    program: PathBuf,
}

impl OpensslBundler {
    /// Use the given `openssl` executable.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Default for OpensslBundler {
    fn default() -> Self {
        Self::new("openssl")
    }
}

#[async_trait]
impl Bundler for OpensslBundler {
    async fn bundle(&self, private_key: &Path, certificate_chain: &Path) -> IssuanceResult<Vec<u8>> {
        debug!(
            program = %self.program.display(),
            key = %private_key.display(),
            chain = %certificate_chain.display(),
            "Running PKCS#12 export"
        );

        let output = Command::new(&self.program)
            .arg("pkcs12")
            .arg("-export")
            .args(["-out", "-"])
            .arg("-inkey")
            .arg(private_key)
            .arg("-in")
            .arg(certificate_chain)
            .args(["-passout", "pass:"])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                IssuanceError::ExternalTool(format!(
                    "failed to run {}: {e}",
                    self.program.display()
                ))
            })?;

        if !output.status.success() {
            return Err(IssuanceError::ExternalTool(format!(
                "{} pkcs12 exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        info!(bytes = output.stdout.len(), "Created PKCS#12 bundle");
        Ok(output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_program_is_external_tool_error() {
        let bundler = OpensslBundler::new("/nonexistent/letssmime-openssl");

        let err = bundler
            .bundle(Path::new("key.pem"), Path::new("chain.pem"))
            .await
            .unwrap_err();

        assert!(matches!(err, IssuanceError::ExternalTool(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_program_reports_exit_status() {
        let bundler = OpensslBundler::new("false");

        let err = bundler
            .bundle(Path::new("key.pem"), Path::new("chain.pem"))
            .await
            .unwrap_err();

        match err {
            IssuanceError::ExternalTool(message) => assert!(message.contains("exited")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
