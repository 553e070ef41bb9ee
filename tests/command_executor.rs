#![cfg(unix)]

use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

use rundag::exec::{CommandExecutor, MemoryWriter, SharedWriter, UnitExecutor};
use rundag::stack::UnitOptions;

fn options(program: &str, cli_args: &[&str], working_dir: PathBuf) -> (UnitOptions, MemoryWriter) {
    let buffer = MemoryWriter::new();
    let opts = UnitOptions {
        working_dir,
        program: program.to_string(),
        command: cli_args.first().copied().unwrap_or_default().to_string(),
        cli_args: cli_args.iter().map(|s| s.to_string()).collect(),
        forward_stdout: true,
        writer: SharedWriter::new(buffer.clone()),
    };
    (opts, buffer)
}

#[tokio::test]
async fn captures_stdout_through_the_writer() {
    let dir = tempfile::tempdir().unwrap();
    let (opts, buffer) = options("echo", &["hello", "world"], dir.path().to_path_buf());

    let token = CancellationToken::new();
    CommandExecutor.run_unit(&token, &opts, None).await.unwrap();

    assert_eq!(buffer.contents_string(), "hello world\n");
}

#[tokio::test]
async fn nonzero_exit_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let (opts, _buffer) = options("false", &[], dir.path().to_path_buf());

    let token = CancellationToken::new();
    let err = CommandExecutor
        .run_unit(&token, &opts, None)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("exited with"));
}

#[tokio::test]
async fn missing_program_is_a_spawn_error() {
    let dir = tempfile::tempdir().unwrap();
    let (opts, _buffer) = options(
        "rundag-test-no-such-program",
        &[],
        dir.path().to_path_buf(),
    );

    let token = CancellationToken::new();
    let err = CommandExecutor
        .run_unit(&token, &opts, None)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("spawning"));
}
