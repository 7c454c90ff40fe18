#![cfg(unix)]

use acr_toolkit::registry::credentials::LoginCredentials;
use acr_toolkit::registry::docker::{DockerCli, image_reference};
use acr_toolkit::{AcrError, Logger};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Shell script standing in for docker: records argv and stdin, exits with `code`
fn fake_docker(dir: &Path, code: i32) -> (PathBuf, PathBuf) {
    let record = dir.join("calls.log");
    let script = dir.join("docker");
    fs::write(
        &script,
        format!(
            "#!/bin/sh\necho \"args: $*\" >> '{log}'\nif [ \"$1\" = login ]; then echo \"stdin: $(cat)\" >> '{log}'; fi\nexit {code}\n",
            log = record.display(),
            code = code
        ),
    )
    .unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
    (script, record)
}

#[tokio::test]
async fn test_login_then_pull_feeds_password_on_stdin() {
    let dir = tempfile::tempdir().unwrap();
    let (script, record) = fake_docker(dir.path(), 0);
    let docker = DockerCli::new(Logger::new_quiet()).with_program(script.to_string_lossy());

    let reference = image_reference("myreg.azurecr.io", "app", "v1");
    let credentials = LoginCredentials::new("admin", "s3cret");
    docker
        .login_and_pull("myreg.azurecr.io", &credentials, &reference)
        .await
        .unwrap();

    let calls = fs::read_to_string(record).unwrap();
    let lines: Vec<&str> = calls.lines().collect();
    assert_eq!(
        lines,
        vec![
            "args: login myreg.azurecr.io --username admin --password-stdin",
            "stdin: s3cret",
            "args: pull myreg.azurecr.io/app:v1",
        ]
    );
}

#[tokio::test]
async fn test_failed_login_skips_pull() {
    let dir = tempfile::tempdir().unwrap();
    let (script, record) = fake_docker(dir.path(), 1);
    let docker = DockerCli::new(Logger::new_quiet()).with_program(script.to_string_lossy());

    let err = docker
        .login_and_pull(
            "myreg.azurecr.io",
            &LoginCredentials::new("admin", "s3cret"),
            "myreg.azurecr.io/app:v1",
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AcrError::Docker { ref command, .. } if command == "login"));
    let calls = fs::read_to_string(record).unwrap();
    assert!(!calls.contains("args: pull"));
}
