//! Exit codes of the sget binary for paths that need no network.

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn sget(args: &[&str], cwd: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sget"))
        .args(args)
        .current_dir(cwd)
        .env_remove("SGET_IDENTITY_TOKEN")
        .env_remove("GITHUB_TOKEN")
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run sget")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    let output = sget(&["--help"], dir.path());
    assert!(output.status.success());
    let help = String::from_utf8_lossy(&output.stdout);
    for command in ["sign", "verify", "install"] {
        assert!(help.contains(command), "missing {} in help", command);
    }
}

#[test]
fn test_usage_errors_are_not_rejections() {
    let dir = TempDir::new().unwrap();
    let output = sget(&["verify", "--no-such-flag"], dir.path());
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("--no-such-flag"));

    let output = sget(&["sign"], dir.path());
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_version_exits_zero() {
    let dir = TempDir::new().unwrap();
    let output = sget(&["--version"], dir.path());
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("sget "));
}

#[test]
fn test_sign_rejects_binary_before_login() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("tool"), [0x7f, b'E', b'L', b'F', 0x00, 0x00]).unwrap();

    let output = sget(&["sign", "tool"], dir.path());
    assert_eq!(output.status.code(), Some(1));
    let message = stderr(&output);
    assert!(message.contains("ValidateContentType"), "{}", message);
    assert!(message.contains("[artifact]"), "{}", message);
    assert!(!dir.path().join(".sigstore").exists());
}

#[test]
fn test_sign_missing_artifact_fails() {
    let dir = TempDir::new().unwrap();
    let output = sget(&["sign", "absent.sh"], dir.path());
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("ReadArtifact"));
}

#[test]
fn test_verify_rejects_malformed_certificate() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("install.sh"), "echo hello\n").unwrap();
    std::fs::write(dir.path().join("cert.pem"), "not a certificate").unwrap();
    std::fs::write(dir.path().join("sig.bin"), "").unwrap();

    let output = sget(
        &[
            "verify",
            "--script",
            "install.sh",
            "--certificate",
            "cert.pem",
            "--signature",
            "sig.bin",
        ],
        dir.path(),
    );
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("malformed certificate"));
}

#[test]
fn test_install_requires_release_coordinates() {
    let dir = TempDir::new().unwrap();
    let output = sget(&["install", "--tag", "v1.0.0"], dir.path());
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("--owner and --repo"));
}
