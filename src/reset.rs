//! Container reset: run the init script, then the container's probe if it has one.
//!
//! The init script is awaited to completion; the HTTP request stays open the
//! whole time. Its stdout and stderr are forwarded line by line into the
//! server log, tagged with the container name.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::Instrument;

use crate::config::{ResetConfig, OUTPUT_DRAIN_TIMEOUT};
use crate::container::ContainerName;
use crate::probe::{ProbeError, TcpProbe};

#[derive(Debug, thiserror::Error)]
pub enum ResetError {
    #[error("failed to run {script}: {source}")]
    Spawn {
        script: String,
        #[source]
        source: io::Error,
    },

    #[error("{script} {arg} exited with {status}")]
    ScriptFailed {
        script: String,
        arg: String,
        status: ExitStatus,
    },

    #[error("probe for '{container}' failed: {source}")]
    Probe {
        container: String,
        #[source]
        source: ProbeError,
    },
}

impl ResetError {
    /// Exit code of a failed init script, if it exited normally.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ResetError::ScriptFailed { status, .. } => status.code(),
            _ => None,
        }
    }
}

/// Runs the init script and post-reset probes.
#[derive(Debug, Clone)]
pub struct Resetter {
    init_script: PathBuf,
    data_root: PathBuf,
    probes: HashMap<String, TcpProbe>,
}

impl Resetter {
    pub fn new(config: &ResetConfig) -> Self {
        let probes = config
            .probes
            .iter()
            .map(|p| (p.container.clone(), TcpProbe::from(p)))
            .collect();

        Self {
            init_script: config.init_script.clone(),
            data_root: config.data_root.clone(),
            probes,
        }
    }

    /// The probe run after resetting `container`, if any.
    pub fn probe_for(&self, container: &ContainerName) -> Option<&TcpProbe> {
        self.probes.get(container.as_str())
    }

    pub fn probes(&self) -> impl Iterator<Item = (&str, &TcpProbe)> {
        self.probes.iter().map(|(name, probe)| (name.as_str(), probe))
    }

    /// Reset a container. Succeeds only if the init script exits with status 0
    /// and the container's probe (if configured) reaches its port.
    pub async fn reset(&self, container: &ContainerName) -> Result<(), ResetError> {
        self.run_init_script(container).await?;

        if let Some(probe) = self.probe_for(container) {
            tracing::info!(%container, addr = %probe.addr(), "Waiting for dependent service");
            probe.wait().await.map_err(|source| ResetError::Probe {
                container: container.to_string(),
                source,
            })?;
        }

        tracing::info!(%container, "Container reset");
        Ok(())
    }

    async fn run_init_script(&self, container: &ContainerName) -> Result<(), ResetError> {
        let script = self.init_script.display().to_string();
        let data_dir = container.data_dir(&self.data_root);

        tracing::info!(%container, %script, arg = %data_dir.display(), "Running init script");

        let mut child = Command::new(&self.init_script)
            .arg(&data_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ResetError::Spawn {
                script: script.clone(),
                source,
            })?;

        let stdout = child.stdout.take().map(|out| {
            tokio::spawn(
                forward_lines(out, container.clone(), OutputStream::Stdout).in_current_span(),
            )
        });
        let stderr = child.stderr.take().map(|err| {
            tokio::spawn(
                forward_lines(err, container.clone(), OutputStream::Stderr).in_current_span(),
            )
        });

        let status = child.wait().await.map_err(|source| ResetError::Spawn {
            script: script.clone(),
            source,
        })?;

        // Background processes left by the script may hold the pipes open;
        // give the forwarders a short window to flush, then stop them.
        for mut task in [stdout, stderr].into_iter().flatten() {
            match tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::debug!(%container, error = %e, "Output forwarder failed");
                }
                Err(_) => {
                    task.abort();
                    tracing::debug!(
                        %container,
                        "Init script output still open after exit, detaching"
                    );
                }
            }
        }

        if !status.success() {
            return Err(ResetError::ScriptFailed {
                script,
                arg: data_dir.display().to_string(),
                status,
            });
        }

        tracing::debug!(%container, "Init script finished");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum OutputStream {
    Stdout,
    Stderr,
}

async fn forward_lines<R>(reader: R, container: ContainerName, stream: OutputStream)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match stream {
                OutputStream::Stdout => tracing::info!(%container, "{}", line),
                OutputStream::Stderr => tracing::warn!(%container, "{}", line),
            },
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(%container, error = %e, "Stopped reading init script output");
                break;
            }
        }
    }
}
