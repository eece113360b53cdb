use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use crate::host::{CommandOutcome, Host};
use crate::target::Target;

const NEGATE_HINT: &str = "try: brew install imagemagick --with-libtiff";
const SWAP_HINT: &str = "try: check that both icon files exist and that sudo is allowed";

// ---------------------------------------------------------------------------
// InvertError
// ---------------------------------------------------------------------------

/// Failures that abort the whole run. An icon set left half-modified must not
/// be relaunched, so none of these are retried or skipped.
#[derive(Debug)]
pub enum InvertError {
    /// The negate tool exited non-zero.
    NegateFailed { image: PathBuf, outcome: CommandOutcome },
    /// The negate tool could not be started.
    NegateSpawn { source: io::Error },
    /// Exchanging two icons failed part way.
    SwapFailed {
        from: PathBuf,
        to: PathBuf,
        outcome: CommandOutcome,
    },
    /// The swap shell could not be started.
    SwapSpawn { source: io::Error },
}

impl InvertError {
    /// Remediation printed alongside the error.
    pub fn hint(&self) -> &'static str {
        match self {
            InvertError::NegateFailed { .. } | InvertError::NegateSpawn { .. } => NEGATE_HINT,
            InvertError::SwapFailed { .. } | InvertError::SwapSpawn { .. } => SWAP_HINT,
        }
    }
}

impl fmt::Display for InvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvertError::NegateFailed { image, outcome } => {
                write!(f, "failed to invert {} ({})", image.display(), outcome)
            }
            InvertError::NegateSpawn { source } => {
                write!(f, "failed to spawn negate tool: {}", source)
            }
            InvertError::SwapFailed { from, to, outcome } => write!(
                f,
                "failed to swap {} and {} ({})",
                from.display(),
                to.display(),
                outcome
            ),
            InvertError::SwapSpawn { source } => write!(f, "failed to spawn sh: {}", source),
        }
    }
}

impl std::error::Error for InvertError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InvertError::NegateSpawn { source } | InvertError::SwapSpawn { source } => {
                Some(source)
            }
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome / RunReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Icons were changed and the application restarted.
    Inverted { images: usize },
    /// Not installed, or its icon directory is missing.
    Skipped,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub inverted: Vec<String>,
    pub skipped: Vec<String>,
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Process targets one after another. The first fatal error stops the run;
/// later targets are left untouched.
pub fn run<'a, I>(targets: I, host: &mut dyn Host) -> Result<RunReport, InvertError>
where
    I: IntoIterator<Item = &'a Target>,
{
    let mut report = RunReport::default();
    for target in targets {
        match invert_target(target, host)? {
            Outcome::Inverted { images } => {
                log::debug!("{}: {} icons inverted", target.name, images);
                report.inverted.push(target.name.clone());
            }
            Outcome::Skipped => report.skipped.push(target.name.clone()),
        }
    }
    log::debug!(
        "run finished: {} inverted, {} skipped",
        report.inverted.len(),
        report.skipped.len()
    );
    Ok(report)
}

/// Invert one target's icons, then restart it. Swap and negate always happen
/// before the kill, and the kill before the launch.
pub fn invert_target(target: &Target, host: &mut dyn Host) -> Result<Outcome, InvertError> {
    if !target.is_present() {
        log::warn!("{}: not found, skipping", target.name);
        return Ok(Outcome::Skipped);
    }

    let Some(plan) = IconPlan::for_target(target) else {
        log::warn!("{}: icon directory not found, skipping", target.name);
        return Ok(Outcome::Skipped);
    };

    log::info!("{}: found, inverting", target.name);

    if let Some((a, b)) = &plan.swap {
        swap_icons(host, a, b)?;
    }
    let images = invert_images(host, &plan.images)?;
    kill_and_relaunch(target, host, None);

    Ok(Outcome::Inverted { images })
}

/// Every path a target's icon work touches, resolved before anything changes.
/// Each file appears once: negating it twice would restore the original.
#[derive(Debug)]
struct IconPlan {
    images: Vec<PathBuf>,
    swap: Option<(PathBuf, PathBuf)>,
}

impl IconPlan {
    fn for_target(target: &Target) -> Option<Self> {
        let mut images: Vec<PathBuf> = Vec::new();
        for image in target.effective_images() {
            let full = target.full_path(&image)?;
            if !images.contains(&full) {
                images.push(full);
            }
        }
        let swap = match &target.swap {
            Some((a, b)) => Some((target.full_path(a)?, target.full_path(b)?)),
            None => None,
        };
        Some(Self { images, swap })
    }
}

/// Negate each image in place, stopping at the first failure.
pub fn invert_images(host: &mut dyn Host, images: &[PathBuf]) -> Result<usize, InvertError> {
    for image in images {
        log::debug!("inverting {}", image.display());
        let outcome = host
            .negate(image)
            .map_err(|source| InvertError::NegateSpawn { source })?;
        if !outcome.success {
            return Err(InvertError::NegateFailed {
                image: image.clone(),
                outcome,
            });
        }
    }
    Ok(images.len())
}

pub fn swap_icons(host: &mut dyn Host, a: &Path, b: &Path) -> Result<(), InvertError> {
    log::debug!("swapping {} and {}", a.display(), b.display());
    let outcome = host
        .swap(a, b)
        .map_err(|source| InvertError::SwapSpawn { source })?;
    if !outcome.success {
        return Err(InvertError::SwapFailed {
            from: a.to_path_buf(),
            to: b.to_path_buf(),
            outcome,
        });
    }
    Ok(())
}

/// Kill the running instance, then launch it again. The launch is not held
/// back until the kill completes.
pub fn kill_and_relaunch(target: &Target, host: &mut dyn Host, process: Option<&str>) {
    kill(target, host, process);
    open(target, host);
}

/// Terminate `process`, or the target's kill process name. Failure is only
/// logged: the process may simply not be running.
pub fn kill(target: &Target, host: &mut dyn Host, process: Option<&str>) {
    let process = process.unwrap_or_else(|| target.kill_process());
    match host.kill(process) {
        Ok(outcome) if !outcome.success => {
            log::warn!("{}: killall {} failed ({})", target.name, process, outcome)
        }
        Ok(_) => {}
        Err(e) => log::warn!("{}: failed to spawn killall: {}", target.name, e),
    }
}

/// Launch the target's launch target. Failure is only logged.
pub fn open(target: &Target, host: &mut dyn Host) {
    let Some(launch) = target.launch_target() else {
        log::warn!("{}: nothing to relaunch", target.name);
        return;
    };
    match host.open(&launch) {
        Ok(outcome) if !outcome.success => log::warn!(
            "{}: open {} failed ({}), relaunch it by hand",
            target.name,
            launch.display(),
            outcome
        ),
        Ok(_) => {}
        Err(e) => log::warn!("{}: failed to spawn open: {}", target.name, e),
    }
}
