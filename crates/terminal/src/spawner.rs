//! Backend factory for local shells and ssh connections.

use anyhow::{anyhow, Context, Result};
use portable_pty::CommandBuilder;
use std::path::PathBuf;
use std::thread;

use crate::backend::{BackendEvent, BackendEvents, Connection, SpawnRequest, Spawner};
use crate::pty_handler::PtyHandler;
use crate::types::{ScreenKind, ShellVariant, SshParams};

/// Spawns every screen kind on a pseudo-terminal.
///
/// Local shells are ready immediately. Ssh screens run the system `ssh`
/// client and are started on a worker thread that reports `Ready` or
/// `Failed` on the event channel.
pub struct PtySpawner {
    events: BackendEvents,
}

impl PtySpawner {
    pub fn new(events: BackendEvents) -> Self {
        Self { events }
    }

    fn spawn_shell(&self, request: &SpawnRequest, variant: &ShellVariant) -> Result<Connection> {
        let program = variant.program();
        let path = resolve_program(&program)
            .ok_or_else(|| anyhow!("shell '{}' is not installed", program))?;

        let mut cmd = CommandBuilder::new(path);
        if let Some(dir) = request.working_dir.as_ref().filter(|dir| dir.is_dir()) {
            cmd.cwd(dir);
        }

        let handler = PtyHandler::spawn(request.screen, cmd, request.size, self.events.clone())
            .with_context(|| format!("Failed to start {}", program))?;
        tracing::info!("Screen {} running {}", request.screen, program);
        Ok(Connection::Ready(Box::new(handler)))
    }

    fn spawn_ssh(&self, request: &SpawnRequest, params: &SshParams) -> Result<Connection> {
        let ssh = resolve_program("ssh").ok_or_else(|| anyhow!("ssh client is not installed"))?;

        let screen = request.screen;
        let size = request.size;
        let events = self.events.clone();
        let params = params.clone();

        thread::Builder::new()
            .name(format!("talkterm-ssh-{}", screen))
            .spawn(move || {
                let mut cmd = CommandBuilder::new(ssh);
                cmd.args(params.ssh_args());

                let event = match PtyHandler::spawn(screen, cmd, size, events.clone()) {
                    Ok(handler) => {
                        tracing::info!("Screen {} connecting to {}", screen, params.host);
                        BackendEvent::Ready {
                            screen,
                            backend: Box::new(handler),
                        }
                    }
                    Err(e) => BackendEvent::Failed {
                        screen,
                        error: format!("{:#}", e),
                    },
                };
                let _ = events.send(event);
            })
            .context("Failed to start ssh worker")?;

        Ok(Connection::Pending)
    }
}

impl Spawner for PtySpawner {
    fn spawn(&mut self, request: SpawnRequest) -> Result<Connection> {
        match &request.kind {
            ScreenKind::Shell(variant) => self.spawn_shell(&request, variant),
            ScreenKind::Ssh(params) => self.spawn_ssh(&request, params),
        }
    }
}

/// Look a program up on `PATH`, accepting absolute paths as-is.
fn resolve_program(program: &str) -> Option<PathBuf> {
    match which::which(program) {
        Ok(path) => Some(path),
        Err(e) => {
            tracing::debug!("Could not resolve {}: {}", program, e);
            None
        }
    }
}
