// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Running external tools under a deadline.

use std::io::{self, Read};
use std::process::{Command, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use openeft_core::error::{EftError, Result};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Run `command` to completion, killing it if it outlives `deadline`.
///
/// Both output pipes are drained while the tool runs, so a chatty tool never
/// stalls on a full pipe. A tool that cannot be started is a `Codec` error;
/// one that is killed is a `CodecTimeout`. Exit status is left to the caller.
pub fn run_with_deadline(command: &mut Command, tool: &str, deadline: Duration) -> Result<Output> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| EftError::Codec(format!("cannot start {tool}: {err}")))?;
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            let output = Output {
                status,
                stdout: collect(stdout, tool)?,
                stderr: collect(stderr, tool)?,
            };
            debug!(tool, elapsed = ?started.elapsed(), %status, "tool finished");
            return Ok(output);
        }
        if started.elapsed() >= deadline {
            warn!(tool, ?deadline, "tool exceeded deadline, killing");
            let _ = child.kill();
            let _ = child.wait();
            return Err(EftError::CodecTimeout {
                codec: tool.to_owned(),
                deadline,
            });
        }
        thread::sleep(POLL_INTERVAL);
    }
}

type Reader = Option<JoinHandle<io::Result<Vec<u8>>>>;

fn drain(pipe: Option<impl Read + Send + 'static>) -> Reader {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            pipe.read_to_end(&mut buf)?;
            Ok(buf)
        })
    })
}

fn collect(reader: Reader, tool: &str) -> Result<Vec<u8>> {
    match reader {
        None => Ok(Vec::new()),
        Some(handle) => handle
            .join()
            .map_err(|_| EftError::Codec(format!("output reader for {tool} panicked")))?
            .map_err(EftError::from),
    }
}

/// Stderr of a failed tool, trimmed for an error message.
pub(crate) fn failure_detail(tool: &str, output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{tool} exited with {}: {}", output.status, stderr.trim())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn captures_output() {
        let output = run_with_deadline(
            Command::new("sh").args(["-c", "echo 3"]),
            "sh",
            Duration::from_secs(5),
        )
        .expect("run");
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "3");
    }

    #[test]
    fn chatty_tool_is_not_mistaken_for_a_stall() {
        let output = run_with_deadline(
            Command::new("sh").args(["-c", "head -c 200000 /dev/zero; head -c 100000 /dev/zero >&2"]),
            "sh",
            Duration::from_secs(5),
        )
        .expect("run");
        assert!(output.status.success());
        assert_eq!(output.stdout.len(), 200_000);
        assert_eq!(output.stderr.len(), 100_000);
    }

    #[test]
    fn slow_tool_is_killed() {
        let started = Instant::now();
        let err = run_with_deadline(
            Command::new("sleep").arg("5"),
            "sleep",
            Duration::from_millis(100),
        )
        .unwrap_err();
        assert!(matches!(err, EftError::CodecTimeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn missing_tool_is_codec_error() {
        let err = run_with_deadline(
            &mut Command::new("openeft-no-such-tool"),
            "openeft-no-such-tool",
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, EftError::Codec(_)));
    }
}
