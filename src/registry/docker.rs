//! `docker login` and `docker pull` against a registry
//!
//! The password is written to the login process's stdin and never appears in
//! its argument list.

use crate::error::{AcrError, Result};
use crate::logging::Logger;
use crate::registry::credentials::LoginCredentials;
use std::process::{ExitStatus, Stdio};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// `{loginServer}/{repository}:{tag}`
pub fn image_reference(login_server: &str, repository: &str, tag: &str) -> String {
    format!("{}/{}:{}", login_server, repository, tag)
}

pub fn login_args(login_server: &str, username: &str) -> Vec<String> {
    vec![
        "login".to_string(),
        login_server.to_string(),
        "--username".to_string(),
        username.to_string(),
        "--password-stdin".to_string(),
    ]
}

pub fn pull_args(reference: &str) -> Vec<String> {
    vec!["pull".to_string(), reference.to_string()]
}

/// Runs the docker CLI
pub struct DockerCli {
    program: String,
    output: Logger,
}

impl DockerCli {
    pub fn new(output: Logger) -> Self {
        Self {
            program: "docker".to_string(),
            output,
        }
    }

    /// Use another docker-compatible executable
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn stdout(&self) -> Stdio {
        if self.output.quiet {
            Stdio::null()
        } else {
            Stdio::inherit()
        }
    }

    pub async fn login(&self, login_server: &str, credentials: &LoginCredentials) -> Result<()> {
        let args = login_args(login_server, &credentials.username);
        self.output.step(&format!(
            "Executing: {} {}",
            self.program,
            args.join(" ")
        ));

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(self.stdout())
            .spawn()
            .map_err(|e| self.spawn_error("login", e))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(credentials.password.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let status = child.wait().await?;
        Self::check("login", status)
    }

    pub async fn pull(&self, reference: &str) -> Result<()> {
        let args = pull_args(reference);
        self.output
            .step(&format!("Executing: {} {}", self.program, args.join(" ")));

        let status = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(self.stdout())
            .status()
            .await
            .map_err(|e| self.spawn_error("pull", e))?;
        Self::check("pull", status)
    }

    /// Log in, then pull `reference`
    pub async fn login_and_pull(
        &self,
        login_server: &str,
        credentials: &LoginCredentials,
        reference: &str,
    ) -> Result<()> {
        self.login(login_server, credentials).await?;
        self.pull(reference).await?;
        self.output.success(&format!("Pulled {}", reference));
        Ok(())
    }

    fn spawn_error(&self, command: &str, e: std::io::Error) -> AcrError {
        AcrError::Docker {
            command: command.to_string(),
            message: format!("could not start {}: {}", self.program, e),
        }
    }

    fn check(command: &str, status: ExitStatus) -> Result<()> {
        if status.success() {
            Ok(())
        } else {
            Err(AcrError::Docker {
                command: command.to_string(),
                message: format!("exited with {}", status),
            })
        }
    }
}
