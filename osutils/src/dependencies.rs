use std::{
    borrow::Cow,
    ffi::{OsStr, OsString},
    io::{self, Read},
    os::unix::process::{CommandExt, ExitStatusExt},
    path::{Path, PathBuf},
    process::{Child, Command as StdCommand, Output, Stdio},
    sync::mpsc,
    thread,
    time::{Duration, Instant},
};

use log::trace;
use nix::{
    sys::signal::{killpg, Signal},
    unistd::Pid,
};
use strum_macros::IntoStaticStr;

use kdump_api::error::{KdumpError, KdumpResultExt, ReportError};

use crate::path::join_relative;

/// Directories searched for a dependency inside an alternate root.
const ROOT_SEARCH_DIRECTORIES: &[&str] = &["usr/sbin", "usr/bin", "sbin", "bin"];

/// Interval between two checks on a child process running under a timeout.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, thiserror::Error)]
pub enum DependencyError {
    #[error("Failed to find dependency '{dependency}': {source}")]
    NotFound {
        dependency: Dependency,
        #[source]
        source: which::Error,
    },

    #[error("Failed to execute dependency '{dependency}': {inner}")]
    CouldNotExecute {
        dependency: Dependency,
        #[source]
        inner: io::Error,
    },

    #[error("Dependency '{dependency}' did not finish within {timeout:?}\nCmdline: {rendered_command}")]
    TimedOut {
        dependency: Dependency,
        rendered_command: String,
        timeout: Duration,
    },

    #[error("Dependency '{dependency}' finished unsuccessfully: {explanation}\nCmdline: {rendered_command}\n{output}")]
    ExecutionFailed {
        dependency: Dependency,
        rendered_command: String,
        code: Option<i32>,
        signal: Option<i32>,
        stdout: String,
        stderr: String,
        explanation: String,
        output: String,
    },
}

impl DependencyError {
    /// Whether the dependency binary could not be found at all, as opposed to
    /// being found and failing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DependencyError::NotFound { .. })
    }
}

pub trait DependencyResultExt<T> {
    /// Convert into a structured error of the given kind, with a context
    /// message attached.
    fn structured_message<K>(
        self,
        kind: K,
        context: impl Into<Cow<'static, str>>,
    ) -> Result<T, KdumpError>
    where
        K: Into<kdump_api::error::ErrorKind>;
}

impl<T> DependencyResultExt<T> for Result<T, Box<DependencyError>> {
    #[track_caller]
    fn structured_message<K>(
        self,
        kind: K,
        context: impl Into<Cow<'static, str>>,
    ) -> Result<T, KdumpError>
    where
        K: Into<kdump_api::error::ErrorKind>,
    {
        self.map_err(|e| anyhow::Error::from(*e))
            .structured(kind)
            .message(context)
    }
}

/// Enum of runtime and test dependencies used in the code base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Dependency {
    Chroot,
    Kdumpctl,
    Systemctl,
    Uname,
    // Test dependencies
    #[cfg(test)]
    DoesNotExist,
    #[cfg(test)]
    Echo,
    #[cfg(test)]
    False,
    #[cfg(test)]
    Sh,
    #[cfg(test)]
    Sleep,
}

impl std::fmt::Display for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.into())
    }
}

impl Dependency {
    /// Gets the name of the dependency
    ///
    /// For example, Dependency::Kdumpctl => "kdumpctl"
    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// Gets the path of the dependency
    pub fn path(&self) -> Result<PathBuf, Box<DependencyError>> {
        which::which(self.name()).map_err(|source| {
            Box::new(DependencyError::NotFound {
                dependency: *self,
                source,
            })
        })
    }

    /// Gets the path of the dependency inside an alternate root, as seen from
    /// outside of it.
    pub fn path_in(&self, root: impl AsRef<Path>) -> Result<PathBuf, Box<DependencyError>> {
        let search_path = std::env::join_paths(
            ROOT_SEARCH_DIRECTORIES
                .iter()
                .map(|dir| join_relative(root.as_ref(), dir)),
        )
        .map_err(|_| {
            Box::new(DependencyError::NotFound {
                dependency: *self,
                source: which::Error::CannotFindBinaryPath,
            })
        })?;

        which::which_in(self.name(), Some(search_path), root.as_ref()).map_err(|source| {
            Box::new(DependencyError::NotFound {
                dependency: *self,
                source,
            })
        })
    }

    /// Converts the dependency to a new Command instance
    /// (Note this does not create a std::process::Command instance)
    pub fn cmd(&self) -> Command {
        Command {
            dependency: *self,
            args: vec![],
            root: None,
            timeout: None,
        }
    }
}

pub struct Command {
    dependency: Dependency,
    args: Vec<OsString>,
    root: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl Command {
    pub fn arg<S: AsRef<OsStr>>(&mut self, arg: S) -> &mut Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn with_arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.arg(arg);
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self.arg(arg.as_ref());
        }
        self
    }

    /// Run the dependency chrooted into `root`. The binary must exist inside
    /// the root. A root of `/` is the same as no root at all.
    pub fn root(&mut self, root: impl AsRef<Path>) -> &mut Command {
        self.root = match root.as_ref() {
            r if r == Path::new("/") => None,
            r => Some(r.to_owned()),
        };
        self
    }

    /// Kill the process and fail if it runs for longer than `timeout`.
    pub fn timeout(&mut self, timeout: Duration) -> &mut Command {
        self.timeout = Some(timeout);
        self
    }

    pub fn run_and_check(&self) -> Result<(), Box<DependencyError>> {
        self.output()?.check()
    }

    pub fn output_and_check(&self) -> Result<String, Box<DependencyError>> {
        self.output()?.check_output()
    }

    pub fn render_command(&self) -> String {
        let mut rendered = match &self.root {
            Some(root) => format!("{} {} {}", Dependency::Chroot, root.display(), self.dependency),
            None => self.dependency.to_string(),
        };

        for arg in self.args.iter().map(|arg| arg.to_string_lossy()) {
            rendered.push(' ');
            if arg.contains(' ') {
                rendered += &format!("'{arg}'");
            } else {
                rendered += &arg;
            }
        }

        rendered
    }

    fn build(&self) -> Result<StdCommand, Box<DependencyError>> {
        let mut cmd = match &self.root {
            Some(root) => {
                // Only look for the binary to report a missing dependency
                // early, chroot resolves it again from inside the root.
                self.dependency.path_in(root)?;
                let mut cmd = StdCommand::new(Dependency::Chroot.path()?);
                cmd.arg(root).arg(self.dependency.name());
                cmd
            }
            None => StdCommand::new(self.dependency.path()?),
        };
        cmd.args(&self.args);
        Ok(cmd)
    }

    pub fn output(&self) -> Result<CommandOutput, Box<DependencyError>> {
        let mut cmd = self.build()?;
        let rendered_command = self.render_command();
        trace!("Executing '{rendered_command}'");

        let output = match self.timeout {
            Some(timeout) => output_with_timeout(&mut cmd, timeout),
            None => cmd.output().map(Some),
        }
        .map_err(|inner| DependencyError::CouldNotExecute {
            dependency: self.dependency,
            inner,
        })?
        .ok_or_else(|| DependencyError::TimedOut {
            dependency: self.dependency,
            rendered_command: rendered_command.clone(),
            timeout: self.timeout.unwrap_or_default(),
        })?;

        let output = CommandOutput {
            rendered_command: rendered_command.clone(),
            dependency: self.dependency,
            inner: output,
        };
        trace!(
            "Executed '{rendered_command}': {}. Report:\n{}",
            output.explain_exit(),
            output.output_report(),
        );
        Ok(output)
    }
}

/// Which pipe a drained buffer came from.
enum Pipe {
    Stdout,
    Stderr,
}

/// Runs the command to completion, or kills it once `timeout` has elapsed.
/// Returns `None` when the process had to be killed.
///
/// The child leads its own process group. On timeout the whole group is
/// killed, so grandchildren holding the pipes open cannot extend the wait.
fn output_with_timeout(cmd: &mut StdCommand, timeout: Duration) -> io::Result<Option<Output>> {
    let deadline = Instant::now() + timeout;
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0)
        .spawn()?;

    // Drain both pipes on the side so a chatty child cannot block on a full
    // pipe while we wait for it.
    let (sender, receiver) = mpsc::channel();
    let drain = |pipe: Option<Box<dyn Read + Send>>, kind: Pipe| {
        let sender = sender.clone();
        thread::spawn(move || {
            let mut buffer = Vec::new();
            if let Some(mut pipe) = pipe {
                let _ = pipe.read_to_end(&mut buffer);
            }
            let _ = sender.send((kind, buffer));
        });
    };
    drain(
        child.stdout.take().map(|p| Box::new(p) as Box<dyn Read + Send>),
        Pipe::Stdout,
    );
    drain(
        child.stderr.take().map(|p| Box::new(p) as Box<dyn Read + Send>),
        Pipe::Stderr,
    );

    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }

        if Instant::now() >= deadline {
            kill_process_group(&child);
            child.wait()?;
            return Ok(None);
        }

        thread::sleep(POLL_INTERVAL);
    };

    // Processes left behind in the group may still hold the pipes open.
    let (mut stdout, mut stderr) = (None, None);
    while stdout.is_none() || stderr.is_none() {
        match receiver.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
            Ok((Pipe::Stdout, buffer)) => stdout = Some(buffer),
            Ok((Pipe::Stderr, buffer)) => stderr = Some(buffer),
            Err(_) => {
                kill_process_group(&child);
                return Ok(None);
            }
        }
    }

    Ok(Some(Output {
        status,
        stdout: stdout.unwrap_or_default(),
        stderr: stderr.unwrap_or_default(),
    }))
}

fn kill_process_group(child: &Child) {
    let Ok(pid) = i32::try_from(child.id()) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        trace!("Failed to kill process group {pid}: {e}");
    }
}

#[derive(Debug)]
pub struct CommandOutput {
    rendered_command: String,
    dependency: Dependency,
    inner: Output,
}

impl CommandOutput {
    /// Checks if the process exited successfully
    pub fn success(&self) -> bool {
        self.inner.status.success()
    }

    /// Gets the exit code of the process, if it exited normally
    pub fn code(&self) -> Option<i32> {
        self.inner.status.code()
    }

    /// Gets the signal that terminated the process, if it was terminated by a signal
    fn signal(&self) -> Option<i32> {
        self.inner.status.signal()
    }

    /// Gets stderr
    pub fn error_output(&self) -> String {
        String::from_utf8_lossy(&self.inner.stderr).into()
    }

    /// Gets stdout
    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.inner.stdout).into()
    }

    /// Gets all available output, useful for reporting or debugging
    pub fn output_report(&self) -> String {
        let stdout = self.output();
        let stderr = self.error_output();

        let mut res = String::with_capacity(stdout.len() + stderr.len() + 20);

        if !stdout.is_empty() {
            res += &format!("stdout:\n{stdout}\n");
        }

        if !stderr.is_empty() {
            if !res.is_empty() {
                res += "\n";
            }
            res += &format!("stderr:\n{stderr}\n");
        }

        res
    }

    /// Checks if the process exited successfully, otherwise produces an error
    pub fn check(&self) -> Result<(), Box<DependencyError>> {
        if self.success() {
            return Ok(());
        }

        Err(Box::new(DependencyError::ExecutionFailed {
            dependency: self.dependency,
            rendered_command: self.rendered_command.clone(),
            code: self.code(),
            signal: self.signal(),
            stdout: self.output(),
            stderr: self.error_output(),
            explanation: self.explain_exit(),
            output: match self.output_report() {
                s if !s.is_empty() => s,
                _ => "(no output collected)".into(),
            },
        }))
    }

    /// Checks if the process exited successfully and returns the output,
    /// otherwise produces an error with the output
    pub fn check_output(&self) -> Result<String, Box<DependencyError>> {
        self.check()?;
        Ok(self.output())
    }

    /// Produces a string explaining the exit status of the process
    fn explain_exit(&self) -> String {
        if let Some(code) = self.code() {
            format!("exited with status: {code}")
        } else if let Some(signal) = self.signal() {
            format!("terminated by signal: {signal}")
        } else {
            "exited with unknown status".into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::{fs, os::unix::fs::PermissionsExt};

    use kdump_api::error::{ErrorKind, InternalError};

    #[test]
    fn test_command() {
        let run_and_check_res = Dependency::Echo.cmd().with_arg("Hello, world").run_and_check();
        run_and_check_res.unwrap();
        let output_and_check_res = Dependency::Echo
            .cmd()
            .with_arg("Hello, world")
            .output_and_check();
        assert_eq!(output_and_check_res.unwrap(), "Hello, world\n");

        let render_command_res = Dependency::Echo.cmd().with_arg("Hello, world").render_command();
        assert_eq!(render_command_res, "echo 'Hello, world'");

        let output_res = Dependency::Echo.cmd().with_arg("Hello, world").output();
        assert_eq!(output_res.unwrap().output(), "Hello, world\n");
    }

    #[test]
    fn test_arg_and_args() {
        let mut args = Dependency::Echo.cmd();
        args.args(["Hello,", "world"]);
        let arg_output = Dependency::Echo
            .cmd()
            .with_arg("Hello, world")
            .output()
            .unwrap()
            .output();
        let args_output = args.output().unwrap().output();
        assert_eq!(arg_output, args_output);
        assert_eq!(arg_output, "Hello, world\n");
    }

    #[test]
    fn test_render_command_with_root() {
        let mut cmd = Dependency::Kdumpctl.cmd();
        cmd.args(["get-default-crashkernel", "kdump"])
            .root("/mnt/sysimage");
        assert_eq!(
            cmd.render_command(),
            "chroot /mnt/sysimage kdumpctl get-default-crashkernel kdump"
        );

        // The host root is not a chroot
        let mut cmd = Dependency::Kdumpctl.cmd();
        cmd.arg("status").root("/");
        assert_eq!(cmd.render_command(), "kdumpctl status");
    }

    #[test]
    fn test_nonexistent_dep() {
        let output = Dependency::DoesNotExist.cmd().output().unwrap_err();
        assert!(output.is_not_found());
        assert_eq!(
            output.to_string(),
            "Failed to find dependency 'doesnotexist': cannot find binary path"
        );
    }

    #[test]
    fn test_path_in_root() {
        let root = tempfile::tempdir().unwrap();
        let bin = root.path().join("usr/bin");
        fs::create_dir_all(&bin).unwrap();
        fs::write(bin.join("echo"), "#!/bin/sh\n").unwrap();
        fs::set_permissions(bin.join("echo"), fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(
            Dependency::Echo.path_in(root.path()).unwrap(),
            bin.join("echo")
        );
        assert!(Dependency::False
            .path_in(root.path())
            .unwrap_err()
            .is_not_found());

        // Missing inside the root is reported before anything is executed
        let mut cmd = Dependency::False.cmd();
        cmd.root(root.path());
        assert!(cmd.output().unwrap_err().is_not_found());
    }

    #[test]
    fn test_timeout() {
        let mut cmd = Dependency::Sleep.cmd();
        cmd.arg("5").timeout(Duration::from_millis(100));
        let started = Instant::now();
        let error = cmd.output().unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(matches!(*error, DependencyError::TimedOut { .. }));
        assert!(!error.is_not_found());

        // Quick processes finish normally under a timeout
        let mut cmd = Dependency::Echo.cmd();
        cmd.arg("done").timeout(Duration::from_secs(10));
        assert_eq!(cmd.output_and_check().unwrap(), "done\n");
    }

    #[test]
    fn test_timeout_kills_grandchildren() {
        // The shell forks sleep, which keeps the output pipes open.
        let mut cmd = Dependency::Sh.cmd();
        cmd.args(["-c", "sleep 5; echo done"])
            .timeout(Duration::from_millis(200));
        let started = Instant::now();
        let error = cmd.output().unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(matches!(*error, DependencyError::TimedOut { .. }));

        // A background child outliving the shell is bounded as well.
        let mut cmd = Dependency::Sh.cmd();
        cmd.args(["-c", "sleep 5 & echo started"])
            .timeout(Duration::from_millis(300));
        let started = Instant::now();
        let error = cmd.output().unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(matches!(*error, DependencyError::TimedOut { .. }));
    }

    #[test]
    fn test_commandoutput() {
        // This command should succeed
        let output = Dependency::Echo
            .cmd()
            .with_arg("Hello, world")
            .output()
            .unwrap();
        assert!(output.success());
        assert_eq!(output.code(), Some(0));
        assert_eq!(output.signal(), None);
        assert_eq!(output.error_output(), "");
        assert_eq!(output.output(), "Hello, world\n");
        assert_eq!(output.output_report(), "stdout:\nHello, world\n\n");
        assert!(matches!(output.check(), Ok(())));
        assert!(matches!(output.check_output(), Ok(s) if s == "Hello, world\n"));
        assert_eq!(output.explain_exit(), "exited with status: 0");

        // This command should fail
        let output = Dependency::False.cmd().output().unwrap();
        assert!(!output.success());
        assert_eq!(output.code(), Some(1));
        assert_eq!(output.signal(), None);
        assert_eq!(output.output_report(), "");
        assert!(matches!(
            *output.check().unwrap_err(),
            DependencyError::ExecutionFailed { .. }
        ));
        assert!(matches!(
            *output.check_output().unwrap_err(),
            DependencyError::ExecutionFailed { .. }
        ));
        assert_eq!(output.explain_exit(), "exited with status: 1");
    }

    #[test]
    fn test_structured_message() {
        let error = Dependency::False
            .cmd()
            .run_and_check()
            .structured_message(InternalError::Internal("false"), "Expected failure")
            .unwrap_err();
        assert_eq!(
            error.kind(),
            &ErrorKind::Internal(InternalError::Internal("false"))
        );
        assert!(format!("{error:?}").contains("Expected failure"));
    }
}
