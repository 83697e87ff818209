use std::process::Stdio;
use std::time::Instant;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::Command;

use crate::command::{ExternalCommand, OutputMode};
use crate::types::{CommandResult, CommandStatus};

#[derive(Debug, Clone, Copy)]
enum Echo {
    None,
    Stdout,
    Stderr,
}

/// Run a single command to completion.
///
/// Never returns an error: spawn and wait failures are folded into a
/// `Failed` result so a batch can keep going with independent work.
pub(crate) async fn execute(cmd: &ExternalCommand) -> CommandResult {
    let start = Instant::now();
    let rendered = cmd.to_string();
    let mode = cmd.output_mode();

    let mut command = Command::new(cmd.program());
    command.args(cmd.raw_args());
    for (k, v) in cmd.env_overrides() {
        command.env(k, v);
    }
    command.stdin(if cmd.stdin_input().is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });
    match mode {
        OutputMode::Inherit => {
            command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }
        OutputMode::Tee | OutputMode::Capture => {
            command.stdout(Stdio::piped()).stderr(Stdio::piped());
        }
    }

    let failed = |error: String, start: Instant| CommandResult {
        name: cmd.name(),
        command: rendered.clone(),
        exit_code: None,
        status: CommandStatus::Failed,
        best_effort: cmd.is_best_effort(),
        stdout: String::new(),
        stderr: String::new(),
        duration_ms: elapsed_ms(start),
        error: Some(error),
    };

    let mut child = match command.spawn() {
        Ok(c) => c,
        Err(e) => return failed(format!("failed to spawn '{}': {e}", cmd.program()), start),
    };

    // Readers start before stdin is fed so a chatty child cannot block on a
    // full pipe while we are still writing.
    let (out_echo, err_echo) = match mode {
        OutputMode::Tee => (Echo::Stdout, Echo::Stderr),
        _ => (Echo::None, Echo::None),
    };
    let stdout_task = child
        .stdout
        .take()
        .map(|s| tokio::spawn(pump(s, out_echo)));
    let stderr_task = child
        .stderr
        .take()
        .map(|s| tokio::spawn(pump(s, err_echo)));

    if let Some(input) = cmd.stdin_input() {
        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(input.as_bytes()).await {
                tracing::warn!("failed to write stdin of '{rendered}': {e}");
            }
            // Dropping closes the pipe so the child sees EOF.
            drop(stdin);
        }
    }

    let stdout = join_output(stdout_task).await;
    let stderr = join_output(stderr_task).await;

    let status = match child.wait().await {
        Ok(s) => s,
        Err(e) => return failed(format!("wait failed: {e}"), start),
    };

    CommandResult {
        name: cmd.name(),
        command: rendered,
        exit_code: status.code(),
        status: if status.success() {
            CommandStatus::Succeeded
        } else {
            CommandStatus::Failed
        },
        best_effort: cmd.is_best_effort(),
        stdout,
        stderr,
        duration_ms: elapsed_ms(start),
        error: None,
    }
}

/// Drain `reader` to EOF. Invalid UTF-8 is replaced rather than ending the
/// read, so the child never sees its pipe closed early.
async fn pump<R>(reader: R, echo: Echo) -> String
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut raw = Vec::new();
    let mut buf = String::new();
    loop {
        raw.clear();
        match reader.read_until(b'\n', &mut raw).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::debug!("output read error: {e}");
                break;
            }
        }
        let line = String::from_utf8_lossy(&raw);
        match echo {
            Echo::None => {}
            Echo::Stdout => forward(&mut tokio::io::stdout(), &raw).await,
            Echo::Stderr => forward(&mut tokio::io::stderr(), &raw).await,
        }
        buf.push_str(&line);
        if !line.ends_with('\n') {
            buf.push('\n');
        }
    }
    buf
}

async fn forward<W>(out: &mut W, raw: &[u8])
where
    W: AsyncWrite + Unpin,
{
    let _ = out.write_all(raw).await;
    if !raw.ends_with(b"\n") {
        let _ = out.write_all(b"\n").await;
    }
    let _ = out.flush().await;
}

async fn join_output(task: Option<tokio::task::JoinHandle<String>>) -> String {
    match task {
        Some(handle) => handle.await.unwrap_or_default(),
        None => String::new(),
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> ExternalCommand {
        ExternalCommand::new("sh").args(["-c", script])
    }

    #[tokio::test]
    async fn capture_collects_stdout_and_stderr() {
        let cmd = sh("echo out; echo err >&2").output(OutputMode::Capture);
        let result = execute(&cmd).await;
        assert!(result.succeeded());
        assert_eq!(result.exit_code, Some(0));
        assert_eq!(result.stdout, "out\n");
        assert_eq!(result.stderr, "err\n");
    }

    #[tokio::test]
    async fn non_zero_exit_is_failed() {
        let result = execute(&sh("exit 3")).await;
        assert_eq!(result.status, CommandStatus::Failed);
        assert_eq!(result.exit_code, Some(3));
    }

    #[tokio::test]
    async fn stdin_is_fed_and_closed() {
        let cmd = ExternalCommand::new("cat")
            .stdin("{\"kind\":\"Secret\"}")
            .output(OutputMode::Capture);
        let result = execute(&cmd).await;
        assert!(result.succeeded());
        assert_eq!(result.stdout.trim(), "{\"kind\":\"Secret\"}");
    }

    #[tokio::test]
    async fn env_overrides_reach_the_child() {
        let cmd = sh("printf '%s' \"$STACK_ENV\"")
            .env("STACK_ENV", "stg")
            .output(OutputMode::Capture);
        let result = execute(&cmd).await;
        assert_eq!(result.stdout.trim(), "stg");
    }

    #[tokio::test]
    async fn invalid_utf8_does_not_cut_output_short() {
        let script = "printf 'ok\\n\\377\\n'; \
            i=0; while [ $i -lt 5000 ]; do echo \"line $i of filler output\"; i=$((i+1)); done; \
            echo done";
        let result = execute(&sh(script).output(OutputMode::Capture)).await;
        assert_eq!(result.status, CommandStatus::Succeeded);
        assert_eq!(result.exit_code, Some(0));
        assert!(result.stdout.len() > 64 * 1024);
        assert!(result.stdout.starts_with("ok\n\u{FFFD}\n"));
        assert!(result.stdout.ends_with("done\n"));
    }

    #[tokio::test]
    async fn tee_captures_while_forwarding() {
        let cmd = sh("echo visible; echo also >&2").output(OutputMode::Tee);
        let result = execute(&cmd).await;
        assert!(result.succeeded());
        assert_eq!(result.stdout, "visible\n");
        assert_eq!(result.stderr, "also\n");
    }

    #[tokio::test]
    async fn missing_binary_is_a_failed_result() {
        let cmd = ExternalCommand::new("/definitely/not/a/binary");
        let result = execute(&cmd).await;
        assert_eq!(result.status, CommandStatus::Failed);
        assert!(result.exit_code.is_none());
        assert!(result.error.unwrap().contains("failed to spawn"));
    }
}
