// ABOUTME: Container runtime driver built on the lxc-* command line tools.
// ABOUTME: Each primitive is one tool invocation against a shared LXC path.

use async_trait::async_trait;
use snafu::ResultExt;
use std::path::PathBuf;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

use super::error::SpawnSnafu;
use super::{ContainerRuntime, NetworkAddress, RuntimeError, RuntimeState};
use crate::types::ContainerName;

#[derive(Debug, Clone)]
pub struct LxcRuntime {
    lxc_path: PathBuf,
}

impl LxcRuntime {
    pub fn new(lxc_path: PathBuf) -> Self {
        Self { lxc_path }
    }

    fn command(&self, tool: &str, name: &ContainerName) -> Command {
        let mut cmd = Command::new(tool);
        cmd.arg("-n")
            .arg(name.as_str())
            .arg("-P")
            .arg(&self.lxc_path)
            .kill_on_drop(true);
        cmd
    }

    async fn run(&self, mut cmd: Command, name: &ContainerName) -> Result<Output, RuntimeError> {
        let command = format!("{:?}", cmd.as_std());
        tracing::debug!(%command, "running");

        let output = cmd.output().await.context(SpawnSnafu {
            command: command.clone(),
        })?;
        if output.status.success() {
            return Ok(output);
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stderr.contains("doesn't exist") || stderr.contains("does not exist") {
            return Err(RuntimeError::NotFound {
                name: name.to_string(),
            });
        }
        Err(RuntimeError::CommandFailed {
            command,
            code: output.status.code().unwrap_or(-1),
            stderr,
        })
    }

    async fn tool(&self, tool: &str, name: &ContainerName, args: &[&str]) -> Result<String, RuntimeError> {
        let mut cmd = self.command(tool, name);
        cmd.args(args);
        let output = self.run(cmd, name).await?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Host side veth of the first interface, as printed by `lxc-info`.
    async fn host_veth(&self, name: &ContainerName) -> Result<Option<String>, RuntimeError> {
        let info = self.tool("lxc-info", name, &[]).await?;
        Ok(info.lines().find_map(|line| {
            line.strip_prefix("Link:")
                .map(|link| link.trim().to_string())
                .filter(|link| !link.is_empty())
        }))
    }
}

fn parse_state(name: &ContainerName, raw: &str) -> Result<RuntimeState, RuntimeError> {
    match raw.trim() {
        "STOPPED" | "ABORTING" => Ok(RuntimeState::Stopped),
        "RUNNING" | "STARTING" | "STOPPING" | "THAWED" | "FREEZING" => Ok(RuntimeState::Running),
        "FROZEN" => Ok(RuntimeState::Frozen),
        "ERROR" => Ok(RuntimeState::Error),
        other => Err(RuntimeError::UnknownState {
            name: name.to_string(),
            state: other.to_string(),
        }),
    }
}

/// Parse `ip -o addr show` output.
///
/// ```text
/// 2: eth0    inet 10.0.3.15/24 brd 10.0.3.255 scope global eth0\       valid_lft forever
/// ```
fn parse_addresses(output: &str) -> Vec<NetworkAddress> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace().skip(1);
            let interface = fields.next()?.trim_end_matches(':').to_string();
            let protocol = match fields.next()? {
                "inet" => "IPV4",
                "inet6" => "IPV6",
                _ => return None,
            };
            let address = fields.next()?.split('/').next()?.to_string();
            Some(NetworkAddress {
                interface,
                protocol: protocol.to_string(),
                address,
                host_veth: None,
            })
        })
        .collect()
}

#[async_trait]
impl ContainerRuntime for LxcRuntime {
    async fn start(&self, name: &ContainerName) -> Result<(), RuntimeError> {
        self.tool("lxc-start", name, &["-d"]).await.map(|_| ())
    }

    async fn kill(&self, name: &ContainerName) -> Result<(), RuntimeError> {
        self.tool("lxc-stop", name, &["-k"]).await.map(|_| ())
    }

    async fn shutdown(&self, name: &ContainerName) -> Result<(), RuntimeError> {
        self.tool("lxc-stop", name, &["--nowait"]).await.map(|_| ())
    }

    async fn wait_stopped(
        &self,
        name: &ContainerName,
        timeout: Option<Duration>,
    ) -> Result<bool, RuntimeError> {
        let wait = self.tool("lxc-wait", name, &["-s", "STOPPED"]);
        match timeout {
            None => wait.await.map(|_| true),
            Some(limit) => match tokio::time::timeout(limit, wait).await {
                Ok(result) => result.map(|_| true),
                Err(_) => Ok(false),
            },
        }
    }

    async fn freeze(&self, name: &ContainerName) -> Result<(), RuntimeError> {
        self.tool("lxc-freeze", name, &[]).await.map(|_| ())
    }

    async fn unfreeze(&self, name: &ContainerName) -> Result<(), RuntimeError> {
        self.tool("lxc-unfreeze", name, &[]).await.map(|_| ())
    }

    async fn state(&self, name: &ContainerName) -> Result<RuntimeState, RuntimeError> {
        let raw = self.tool("lxc-info", name, &["-s", "-H"]).await?;
        parse_state(name, &raw)
    }

    async fn init_pid(&self, name: &ContainerName) -> Result<Option<u32>, RuntimeError> {
        let raw = self.tool("lxc-info", name, &["-p", "-H"]).await?;
        Ok(raw.trim().parse().ok())
    }

    async fn interfaces(&self, name: &ContainerName) -> Result<Vec<NetworkAddress>, RuntimeError> {
        let raw = self
            .tool("lxc-attach", name, &["--", "ip", "-o", "addr", "show"])
            .await?;
        let mut addresses = parse_addresses(&raw);

        if let Some(veth) = self.host_veth(name).await? {
            for address in addresses.iter_mut().filter(|a| a.interface == "eth0") {
                address.host_veth = Some(veth.clone());
            }
        }
        Ok(addresses)
    }
}
