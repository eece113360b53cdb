use std::ffi::OsString;
use std::fmt;
use std::io;
use std::path::Path;
use std::process::Command;

use crate::config::Settings;

// ---------------------------------------------------------------------------
// CommandOutcome
// ---------------------------------------------------------------------------

/// Exit status of an external command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandOutcome {
    pub success: bool,
    pub code: Option<i32>,
}

#[cfg(test)]
impl CommandOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            code: Some(0),
        }
    }

    pub fn failed(code: i32) -> Self {
        Self {
            success: false,
            code: Some(code),
        }
    }
}

impl From<std::process::ExitStatus> for CommandOutcome {
    fn from(status: std::process::ExitStatus) -> Self {
        Self {
            success: status.success(),
            code: status.code(),
        }
    }
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit {}", code),
            None => write!(f, "terminated by signal"),
        }
    }
}

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

/// The operating-system side effects an inversion needs. Each call blocks
/// until the command exits.
pub trait Host {
    /// Negate the colors of `image` in place.
    fn negate(&mut self, image: &Path) -> io::Result<CommandOutcome>;
    /// Exchange two files.
    fn swap(&mut self, a: &Path, b: &Path) -> io::Result<CommandOutcome>;
    /// Terminate every process called `process`.
    fn kill(&mut self, process: &str) -> io::Result<CommandOutcome>;
    /// Launch an application bundle, executable or application name.
    fn open(&mut self, target: &Path) -> io::Result<CommandOutcome>;
}

// ---------------------------------------------------------------------------
// MacHost
// ---------------------------------------------------------------------------

/// Runs the real tools: the configured negate tool (ImageMagick `convert` by
/// default), `mv`, `killall` and `open`.
#[derive(Debug, Clone)]
pub struct MacHost {
    negate_tool: String,
    negate_args: Vec<String>,
    elevate: bool,
}

impl MacHost {
    pub fn new(settings: &Settings) -> Self {
        Self {
            negate_tool: settings.negate_tool.clone(),
            negate_args: settings.negate_args.clone(),
            elevate: settings.elevate,
        }
    }

    /// `[sudo] <tool> <args..> <image> <image>`
    pub fn negate_command(&self, image: &Path) -> Command {
        let mut cmd = self.privileged(&self.negate_tool);
        cmd.args(&self.negate_args).arg(image).arg(image);
        cmd
    }

    /// Three `mv`s through `<a>.tmp`, joined so a failure stops the rest.
    pub fn swap_command(&self, a: &Path, b: &Path) -> Command {
        let mut tmp = OsString::from(a.as_os_str());
        tmp.push(".tmp");
        let sudo = if self.elevate { "sudo " } else { "" };
        let script = format!(
            "{sudo}mv \"$1\" \"$3\" && {sudo}mv \"$2\" \"$1\" && {sudo}mv \"$3\" \"$2\"",
            sudo = sudo
        );
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(script)
            .arg("swap")
            .arg(a)
            .arg(b)
            .arg(tmp);
        cmd
    }

    pub fn kill_command(&self, process: &str) -> Command {
        let mut cmd = Command::new("killall");
        cmd.arg(process);
        cmd
    }

    /// Absolute paths are opened directly; bare names go through `open -a`.
    pub fn open_command(&self, target: &Path) -> Command {
        let mut cmd = Command::new("open");
        if !target.is_absolute() {
            cmd.arg("-a");
        }
        cmd.arg(target);
        cmd
    }

    fn privileged(&self, program: &str) -> Command {
        if self.elevate {
            let mut cmd = Command::new("sudo");
            cmd.arg(program);
            cmd
        } else {
            Command::new(program)
        }
    }
}

fn run(mut cmd: Command) -> io::Result<CommandOutcome> {
    log::debug!("running {:?}", cmd);
    cmd.status().map(CommandOutcome::from).map_err(|e| {
        let program = cmd.get_program().to_string_lossy();
        io::Error::new(e.kind(), format!("{}: {}", program, e))
    })
}

impl Host for MacHost {
    fn negate(&mut self, image: &Path) -> io::Result<CommandOutcome> {
        run(self.negate_command(image))
    }

    fn swap(&mut self, a: &Path, b: &Path) -> io::Result<CommandOutcome> {
        run(self.swap_command(a, b))
    }

    fn kill(&mut self, process: &str) -> io::Result<CommandOutcome> {
        run(self.kill_command(process))
    }

    fn open(&mut self, target: &Path) -> io::Result<CommandOutcome> {
        run(self.open_command(target))
    }
}
