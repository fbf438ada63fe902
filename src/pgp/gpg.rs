//! `gpg`-backed [`OpenPgp`] implementation.
//!
//! Key ids are derived natively. Encryption shells out to `gpg` with a
//! throwaway home directory so the server never touches a real keyring.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::task::JoinHandle;

use super::{packet, OpenPgp, PgpError};
use crate::store::KeyId;

#[derive(Debug, Clone)]
pub struct GpgConfig {
    /// Program to run, looked up on `PATH` when relative.
    pub binary: PathBuf,
    /// Bound on each encryption, imports included.
    pub timeout: Duration,
}

impl Default for GpgConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("gpg"),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GpgCli {
    config: GpgConfig,
}

impl GpgCli {
    pub fn new(config: GpgConfig) -> Self {
        Self { config }
    }

    async fn run(&self, home: &Path, args: &[&str], input: &[u8]) -> Result<Vec<u8>, PgpError> {
        let mut cmd = Command::new(&self.config.binary);
        cmd.arg("--homedir")
            .arg(home)
            .args(["--batch", "--quiet", "--no-tty"])
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| PgpError::Spawn {
            program: self.config.binary.display().to_string(),
            source,
        })?;

        // Feed stdin concurrently so a full stdout pipe cannot stall gpg.
        let writer = child.stdin.take().map(|mut stdin| {
            let input = input.to_vec();
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(&input).await {
                    tracing::warn!("Failed to write to gpg stdin: {}", e);
                }
            })
        });

        let output = child.wait_with_output().await?;
        if let Some(writer) = writer {
            join_stdin_writer(writer).await;
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(PgpError::Gpg(stderr));
        }
        Ok(output.stdout)
    }
}

/// Returns false if the writer task panicked or was cancelled.
async fn join_stdin_writer(writer: JoinHandle<()>) -> bool {
    match writer.await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("gpg stdin writer task failed: {}", e);
            false
        }
    }
}

#[async_trait]
impl OpenPgp for GpgCli {
    fn primary_key_id(&self, armored_key: &str) -> Result<KeyId, PgpError> {
        packet::primary_key_id(armored_key)
    }

    async fn encrypt(&self, data: &[u8], armored_keys: &[String]) -> Result<String, PgpError> {
        if armored_keys.is_empty() {
            return Err(PgpError::NoRecipients);
        }
        let recipients = armored_keys
            .iter()
            .map(|key| packet::primary_key_id(key).map(|id| id.to_string()))
            .collect::<Result<Vec<_>, _>>()?;

        let home = tempfile::Builder::new().prefix("passgate-gpg-").tempdir()?;

        let encrypt = async {
            for key in armored_keys {
                self.run(home.path(), &["--import"], key.as_bytes()).await?;
            }

            let mut args = vec!["--trust-model", "always", "--armor", "--encrypt"];
            for recipient in &recipients {
                args.push("--recipient");
                args.push(recipient);
            }
            let armored = self.run(home.path(), &args, data).await?;
            String::from_utf8(armored)
                .map_err(|_| PgpError::Gpg("armored output is not UTF-8".to_string()))
        };

        tokio::time::timeout(self.config.timeout, encrypt)
            .await
            .map_err(|_| PgpError::Timeout(self.config.timeout))?
    }
}
