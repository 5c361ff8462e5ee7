use std::io::BufRead;
use std::process::{Command, Stdio};
use std::sync::mpsc;

/// Streamed output from a running docker invocation.
#[derive(Debug)]
pub enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Outcome of a streamed docker invocation.
#[derive(Debug)]
pub struct StreamResult {
    pub success: bool,
    pub log: String,
}

/// Run `docker <args>` and hand every output line to `on_line` as it arrives.
///
/// Lines from stdout and stderr are interleaved in arrival order. The full
/// output is also accumulated into [`StreamResult::log`].
pub fn stream(
    args: &[String],
    envs: &[(&str, &str)],
    on_line: &mut dyn FnMut(&OutputLine),
) -> std::io::Result<StreamResult> {
    tracing::debug!(?args, "streaming docker output");

    let mut child = Command::new("docker")
        .args(args)
        .envs(envs.iter().copied())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| std::io::Error::other("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| std::io::Error::other("stderr was not piped"))?;

    let (tx, rx) = mpsc::channel();

    // --- reader threads ---------------------------------------------------
    let tx_out = tx.clone();
    let stdout_handle = std::thread::spawn(move || {
        let reader = std::io::BufReader::new(stdout);
        for line in reader.lines() {
            match line {
                // Receiver may be dropped; ignore send errors.
                Ok(l) => {
                    let _ = tx_out.send(OutputLine::Stdout(l));
                }
                Err(_) => break,
            }
        }
    });

    let stderr_handle = std::thread::spawn(move || {
        let reader = std::io::BufReader::new(stderr);
        for line in reader.lines() {
            match line {
                Ok(l) => {
                    let _ = tx.send(OutputLine::Stderr(l));
                }
                Err(_) => break,
            }
        }
    });

    // --- drain -------------------------------------------------------------
    // Both senders live in the reader threads, so this ends once both pipes close.
    let mut log = String::new();
    for line in rx {
        match &line {
            OutputLine::Stdout(l) | OutputLine::Stderr(l) => {
                log.push_str(l);
                log.push('\n');
            }
        }
        on_line(&line);
    }

    let _ = stdout_handle.join();
    let _ = stderr_handle.join();

    let status = child.wait()?;
    if !status.success() {
        tracing::warn!(%status, "docker exited unsuccessfully");
    }

    Ok(StreamResult {
        success: status.success(),
        log,
    })
}
