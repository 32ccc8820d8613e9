use std::ffi::OsStr;
use std::path::Path;
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::debug;

/// External command failures
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Failed to launch '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("'{command}' exited with {code}: {stderr}")]
    Failed {
        command: String,
        code: String,
        stderr: String,
    },
}

/// Run an external command, print its stdout, and fail on non-zero exit.
///
/// This is the uniform failure policy for every build and runtime command:
/// the returned error carries the rendered command line and captured stderr,
/// and the top-level handler turns it into a non-zero process exit.
pub fn run<S: AsRef<OsStr>>(program: &str, args: &[S]) -> Result<String, ProcessError> {
    run_from(program, args, None)
}

/// Same as [`run`], but with an explicit working directory.
pub fn run_in<S: AsRef<OsStr>>(
    program: &str,
    args: &[S],
    dir: &Path,
) -> Result<String, ProcessError> {
    run_from(program, args, Some(dir))
}

fn run_from<S: AsRef<OsStr>>(
    program: &str,
    args: &[S],
    dir: Option<&Path>,
) -> Result<String, ProcessError> {
    let rendered = render(program, args);
    debug!(command = %rendered, "running external command");

    let mut command = Command::new(program);
    command.args(args);
    if let Some(dir) = dir {
        command.current_dir(dir);
    }

    let output = command.output().map_err(|source| ProcessError::Spawn {
        command: rendered.clone(),
        source,
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if !stdout.is_empty() {
        println!("{}", stdout);
    }

    if !output.status.success() {
        return Err(ProcessError::Failed {
            command: rendered,
            code: exit_code(&output.status),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(stdout)
}

/// Spawn a shell command without waiting for it (log streaming).
pub fn run_detached(shell_command: &str) -> Result<(), ProcessError> {
    debug!(command = %shell_command, "spawning detached shell command");

    Command::new("sh")
        .arg("-c")
        .arg(shell_command)
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|source| ProcessError::Spawn {
            command: shell_command.to_string(),
            source,
        })?;
    Ok(())
}

pub(crate) fn exit_code(status: &std::process::ExitStatus) -> String {
    status
        .code()
        .map_or_else(|| "signal".to_string(), |code| code.to_string())
}

fn render<S: AsRef<OsStr>>(program: &str, args: &[S]) -> String {
    let mut rendered = program.to_string();
    for arg in args {
        rendered.push(' ');
        rendered.push_str(&arg.as_ref().to_string_lossy());
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_captures_stdout() {
        let stdout = run("echo", &["hello", "world"]).unwrap();
        assert_eq!(stdout, "hello world");
    }

    #[test]
    fn test_non_zero_exit_is_an_error() {
        match run::<&str>("false", &[]) {
            Err(ProcessError::Failed { command, code, .. }) => {
                assert_eq!(command, "false");
                assert_eq!(code, "1");
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_program_is_a_spawn_error() {
        let result = run("definitely-not-a-real-binary", &["--version"]);
        assert!(matches!(result, Err(ProcessError::Spawn { .. })));
    }

    #[test]
    fn test_run_in_uses_working_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let stdout = run_in::<&str>("pwd", &[], dir.path()).unwrap();
        assert!(stdout.ends_with(
            dir.path()
                .file_name()
                .unwrap()
                .to_string_lossy()
                .as_ref()
        ));
    }

    #[test]
    fn test_render_joins_program_and_args() {
        assert_eq!(
            render("docker", &["pull", "registry:2"]),
            "docker pull registry:2"
        );
    }
}
