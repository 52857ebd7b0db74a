//! One node process.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use owo_colors::{AnsiColors, OwoColorize};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::domain::NodeConfig;
use crate::error::{Error, Result};
use crate::port::outbound::launcher::NodeHandle;

/// File name of the config written into each node's data directory.
pub const CONFIG_FILE: &str = "config.json";

const PREFIX_COLORS: [AnsiColors; 5] = [
    AnsiColors::Green,
    AnsiColors::Yellow,
    AnsiColors::Blue,
    AnsiColors::Magenta,
    AnsiColors::Cyan,
];

/// A spawned node process.
pub struct ProcessNode {
    name: String,
    uri: String,
    id: parking_lot::Mutex<String>,
    child: tokio::sync::Mutex<Option<Child>>,
}

impl ProcessNode {
    /// Write the node's config file and spawn its process.
    ///
    /// `color` picks the output prefix colour; `echo` mirrors the node's
    /// stdout and stderr onto ours.
    pub fn spawn(config: &NodeConfig, host: &str, color: usize, echo: bool) -> Result<Self> {
        let launch_err = |what: &str, err: std::io::Error| {
            Error::Launch(format!("{what} for {}: {err}", config.name))
        };

        std::fs::create_dir_all(&config.log_dir)
            .map_err(|e| launch_err("creating log dir", e))?;
        std::fs::create_dir_all(&config.db_dir).map_err(|e| launch_err("creating db dir", e))?;
        let config_path: PathBuf = config.db_dir.join(CONFIG_FILE);
        std::fs::write(&config_path, &config.payload)
            .map_err(|e| launch_err("writing config file", e))?;

        let mut child = Command::new(&config.exec_path)
            .arg(format!("--config-file={}", config_path.display()))
            .stdin(Stdio::null())
            .stdout(output(echo))
            .stderr(output(echo))
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| launch_err(&format!("spawning {}", config.exec_path.display()), e))?;

        if echo {
            let prefix = format!("[{}]", config.name)
                .color(PREFIX_COLORS[color % PREFIX_COLORS.len()])
                .to_string();
            if let Some(stdout) = child.stdout.take() {
                tokio::spawn(echo_lines(stdout, prefix.clone()));
            }
            if let Some(stderr) = child.stderr.take() {
                tokio::spawn(echo_lines(stderr, prefix));
            }
        }

        debug!(node = %config.name, pid = ?child.id(), "Spawned node process");
        Ok(Self {
            name: config.name.clone(),
            uri: format!("http://{host}:{}", config.http_port),
            id: parking_lot::Mutex::new(String::new()),
            child: tokio::sync::Mutex::new(Some(child)),
        })
    }

    pub(super) fn set_id(&self, id: String) {
        *self.id.lock() = id;
    }

    /// Fail if the process has already exited.
    pub(super) async fn ensure_running(&self) -> Result<()> {
        let mut child = self.child.lock().await;
        let Some(process) = child.as_mut() else {
            return Err(Error::Launch(format!("node {} was stopped", self.name)));
        };
        match process.try_wait()? {
            Some(status) => Err(Error::Launch(format!("node {} exited: {status}", self.name))),
            None => Ok(()),
        }
    }

    /// Ask the process to exit, then kill it after `grace`.
    pub async fn terminate(&self, grace: Duration) -> Result<()> {
        let Some(mut child) = self.child.lock().await.take() else {
            return Ok(());
        };
        if child.try_wait()?.is_some() {
            return Ok(());
        }

        send_sigterm(&child);
        match tokio::time::timeout(grace, child.wait()).await {
            Ok(status) => {
                let status = status?;
                debug!(node = %self.name, %status, "Node exited");
            }
            Err(_) => {
                warn!(node = %self.name, ?grace, "Node ignored SIGTERM; killing");
                child.kill().await?;
            }
        }
        Ok(())
    }
}

impl NodeHandle for ProcessNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn uri(&self) -> String {
        self.uri.clone()
    }

    fn id(&self) -> String {
        self.id.lock().clone()
    }
}

fn output(echo: bool) -> Stdio {
    if echo {
        Stdio::piped()
    } else {
        Stdio::null()
    }
}

fn send_sigterm(child: &Child) {
    let Some(pid) = child.id() else {
        return;
    };
    #[cfg(unix)]
    {
        if let Ok(pid) = i32::try_from(pid) {
            // SAFETY: signalling a child we spawned and have not reaped.
            unsafe {
                libc::kill(pid, libc::SIGTERM);
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
    }
}

async fn echo_lines<R>(reader: R, prefix: String)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        println!("{prefix} {line}");
    }
}
