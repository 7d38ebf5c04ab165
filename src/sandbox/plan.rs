//! Mount planning for the foreign-binary sandbox.
//!
//! The planner is pure: it looks only at the target path, the caller's home
//! directory and the configuration, and returns the ordered list of steps the
//! builder must apply before `chroot`. It never touches the filesystem, so the
//! same inputs always give the same plan.
//!
//! # Step order
//!
//! 1. Unshare the mount namespace
//! 2. Make `/` recursively private
//! 3. Create `/dev`, `/dev/pts`, `/dev/shm` under the root (fatal)
//! 4. Bind `/proc`, `/sys`, `/dev`
//! 5. Fresh `tmpfs` on `/dev/shm` and `devpts` on `/dev/pts`, layered on the `/dev` bind
//! 6. `/etc/resolv.conf` for package managers only
//! 7. Bind `/tmp`, `/run/user`, the home directory, then `.Xauthority` if present
//!
//! Every target is written as the absolute path the sandboxed process will
//! see; the builder maps it under the sandbox root.

use std::fmt;
use std::path::{Path, PathBuf};

use nix::mount::MsFlags;
use tracing::debug;

use crate::config::LauncherConfig;
use crate::error::PlanError;

/// Options for the private `/dev/shm`.
pub const SHM_OPTIONS: &str = "mode=1777";

/// Options for the private devpts instance on `/dev/pts`.
pub const DEVPTS_OPTIONS: &str = "newinstance,ptmxmode=0666,mode=620";

/// Host resolver configuration, bound for package managers.
pub const RESOLV_CONF: &str = "/etc/resolv.conf";

/// X11 cookie file name inside the home directory.
pub const XAUTHORITY: &str = ".Xauthority";

/// Kind of filesystem operation performed by a [`MountStep`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountKind {
    /// Single bind mount.
    Bind,
    /// Bind mount including submounts.
    BindRecursive,
    /// Fresh tmpfs.
    Tmpfs,
    /// Fresh devpts instance.
    Devpts,
    /// Fresh procfs.
    Proc,
}

impl MountKind {
    /// Filesystem type passed to `mount(2)`, `None` for binds.
    #[must_use]
    pub fn fstype(self) -> Option<&'static str> {
        match self {
            Self::Bind | Self::BindRecursive => None,
            Self::Tmpfs => Some("tmpfs"),
            Self::Devpts => Some("devpts"),
            Self::Proc => Some("proc"),
        }
    }

    /// Flags implied by the kind.
    #[must_use]
    pub fn default_flags(self) -> MsFlags {
        match self {
            Self::Bind => MsFlags::MS_BIND,
            Self::BindRecursive => MsFlags::MS_BIND | MsFlags::MS_REC,
            Self::Tmpfs => MsFlags::MS_NOSUID | MsFlags::MS_NODEV,
            Self::Devpts => MsFlags::empty(),
            Self::Proc => MsFlags::MS_NOSUID | MsFlags::MS_NODEV | MsFlags::MS_NOEXEC,
        }
    }
}

/// What happens when a step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criticality {
    /// Abort the launch.
    Fatal,
    /// Log a warning and continue with a degraded sandbox.
    BestEffort,
}

/// Predicate evaluated by the builder right before the step runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// Always run.
    Always,
    /// Run only if the host source path exists.
    SourceExists,
}

/// One mount in the plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountStep {
    /// Host source path (or pseudo source such as `tmpfs`).
    pub source: PathBuf,
    /// Absolute path inside the sandbox root.
    pub target: PathBuf,
    pub kind: MountKind,
    pub flags: MsFlags,
    /// Filesystem-specific data passed to `mount(2)`.
    pub options: Option<String>,
    pub condition: Condition,
    pub criticality: Criticality,
    /// Target is a regular file rather than a directory.
    pub file: bool,
}

impl MountStep {
    fn new(source: impl Into<PathBuf>, target: impl Into<PathBuf>, kind: MountKind) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
            flags: kind.default_flags(),
            options: None,
            condition: Condition::Always,
            criticality: Criticality::BestEffort,
            file: false,
        }
    }

    /// Recursive bind of a host directory onto the same path inside the root.
    #[must_use]
    pub fn bind_recursive(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self::new(path.clone(), path, MountKind::BindRecursive)
    }

    /// Bind of a single host file onto the same path inside the root.
    #[must_use]
    pub fn bind_file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut step = Self::new(path.clone(), path, MountKind::Bind);
        step.file = true;
        step
    }

    #[must_use]
    pub fn tmpfs(target: impl Into<PathBuf>, options: &str) -> Self {
        Self::new("tmpfs", target, MountKind::Tmpfs).with_options(options)
    }

    #[must_use]
    pub fn devpts(target: impl Into<PathBuf>, options: &str) -> Self {
        Self::new("devpts", target, MountKind::Devpts).with_options(options)
    }

    /// Fresh procfs instance mounted at `target`.
    #[must_use]
    pub fn proc(target: impl Into<PathBuf>) -> Self {
        Self::new("proc", target, MountKind::Proc)
    }

    #[must_use]
    pub fn with_options(mut self, options: &str) -> Self {
        self.options = Some(options.to_string());
        self
    }

    /// Skips the step when the host source is missing.
    #[must_use]
    pub fn when_source_exists(mut self) -> Self {
        self.condition = Condition::SourceExists;
        self
    }

    #[must_use]
    pub fn fatal(mut self) -> Self {
        self.criticality = Criticality::Fatal;
        self
    }
}

/// One step of a mount plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanStep {
    /// Move the calling process into a new mount namespace.
    UnshareMountNamespace,
    /// Stop mount events propagating back to the host.
    MakeRootPrivate,
    /// Create a directory under the root if it does not exist yet.
    CreateDir {
        target: PathBuf,
        mode: u32,
        criticality: Criticality,
    },
    Mount(MountStep),
}

impl PlanStep {
    #[must_use]
    pub fn criticality(&self) -> Criticality {
        match self {
            Self::UnshareMountNamespace | Self::MakeRootPrivate => Criticality::Fatal,
            Self::CreateDir { criticality, .. } => *criticality,
            Self::Mount(step) => step.criticality,
        }
    }

    fn create_dir(target: impl Into<PathBuf>, mode: u32, criticality: Criticality) -> Self {
        Self::CreateDir {
            target: target.into(),
            mode,
            criticality,
        }
    }
}

impl fmt::Display for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnshareMountNamespace => write!(f, "unshare mount namespace"),
            Self::MakeRootPrivate => write!(f, "make / private"),
            Self::CreateDir { target, .. } => write!(f, "mkdir {}", target.display()),
            Self::Mount(step) => write!(
                f,
                "mount {:?} {} -> {}",
                step.kind,
                step.source.display(),
                step.target.display()
            ),
        }
    }
}

/// Ordered list of steps applied before `chroot`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountPlan {
    steps: Vec<PlanStep>,
}

impl MountPlan {
    /// Wraps an explicit step list. Use [`MountPlan::validate`] before applying it.
    #[must_use]
    pub fn from_steps(steps: Vec<PlanStep>) -> Self {
        Self { steps }
    }

    #[must_use]
    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    /// Mount steps in plan order.
    pub fn mounts(&self) -> impl Iterator<Item = &MountStep> {
        self.steps.iter().filter_map(|step| match step {
            PlanStep::Mount(mount) => Some(mount),
            _ => None,
        })
    }

    /// Directory creation steps in plan order.
    pub fn scaffold(&self) -> impl Iterator<Item = &PlanStep> {
        self.steps
            .iter()
            .filter(|step| matches!(step, PlanStep::CreateDir { .. }))
    }

    /// Returns true if some mount targets `target`.
    #[must_use]
    pub fn mounts_target(&self, target: &Path) -> bool {
        self.mounts().any(|m| m.target == target)
    }

    fn position_of_mount(&self, target: &Path) -> Option<usize> {
        self.steps
            .iter()
            .position(|s| matches!(s, PlanStep::Mount(m) if m.target == target))
    }

    /// Checks the ordering contract of the plan.
    ///
    /// # Errors
    ///
    /// - `PlanError::UnshareNotFirst` if the namespace is not unshared first
    /// - `PlanError::PrivateNotSecond` if `/` is not made private right after
    /// - `PlanError::LayerBeforeParent` if a mount is applied before a mount of
    ///   one of its ancestors (for example `/dev/shm` before `/dev`)
    /// - `PlanError::MissingDirectory` if a directory mount has no earlier
    ///   creation step for its target
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.steps.first() != Some(&PlanStep::UnshareMountNamespace) {
            return Err(PlanError::UnshareNotFirst);
        }
        if self.steps.get(1) != Some(&PlanStep::MakeRootPrivate) {
            return Err(PlanError::PrivateNotSecond);
        }

        for (index, step) in self.steps.iter().enumerate() {
            let PlanStep::Mount(mount) = step else {
                continue;
            };

            for ancestor in mount.target.ancestors().skip(1) {
                if let Some(parent_index) = self.position_of_mount(ancestor)
                    && parent_index > index
                {
                    return Err(PlanError::LayerBeforeParent {
                        layer: mount.target.clone(),
                        parent: ancestor.to_path_buf(),
                    });
                }
            }

            if !mount.file {
                let created = self.steps[..index].iter().any(
                    |s| matches!(s, PlanStep::CreateDir { target, .. } if *target == mount.target),
                );
                if !created {
                    return Err(PlanError::MissingDirectory {
                        target: mount.target.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Returns the file name of `target` if it is a known package manager.
fn is_package_manager(config: &LauncherConfig, target: &Path) -> bool {
    target
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| config.is_package_manager(name))
}

/// Builds the mount plan for launching `target` inside the sandbox root.
///
/// # Arguments
///
/// * `config` - Launcher configuration (package-manager names)
/// * `target` - Resolved path of the foreign binary, as seen inside the root
/// * `home` - Caller's home directory; `None` or a relative path skips the
///   home and `.Xauthority` binds
#[must_use]
pub fn plan_mounts(config: &LauncherConfig, target: &Path, home: Option<&Path>) -> MountPlan {
    use Criticality::{BestEffort, Fatal};

    let mut steps = vec![
        PlanStep::UnshareMountNamespace,
        PlanStep::MakeRootPrivate,
        PlanStep::create_dir("/dev", 0o755, Fatal),
        PlanStep::create_dir("/dev/pts", 0o755, Fatal),
        PlanStep::create_dir("/dev/shm", 0o777, Fatal),
    ];

    for dir in ["/proc", "/sys"] {
        steps.push(PlanStep::create_dir(dir, 0o755, BestEffort));
        steps.push(PlanStep::Mount(MountStep::bind_recursive(dir)));
    }

    steps.push(PlanStep::Mount(MountStep::bind_recursive("/dev")));
    steps.push(PlanStep::Mount(MountStep::tmpfs("/dev/shm", SHM_OPTIONS)));
    steps.push(PlanStep::Mount(MountStep::devpts("/dev/pts", DEVPTS_OPTIONS)));

    if is_package_manager(config, target) {
        debug!(target = %target.display(), "Package manager detected, passing resolver through");
        steps.push(PlanStep::Mount(MountStep::bind_file(RESOLV_CONF)));
    }

    for dir in ["/tmp", "/run/user"] {
        steps.push(PlanStep::create_dir(dir, 0o755, BestEffort));
        steps.push(PlanStep::Mount(MountStep::bind_recursive(dir)));
    }

    match home {
        Some(home) if home.is_absolute() && home != Path::new("/") => {
            steps.push(PlanStep::create_dir(home, 0o755, BestEffort));
            steps.push(PlanStep::Mount(MountStep::bind_recursive(home)));
            steps.push(PlanStep::Mount(
                MountStep::bind_file(home.join(XAUTHORITY)).when_source_exists(),
            ));
        }
        Some(home) => {
            debug!(home = %home.display(), "Home directory not usable, skipping home binds");
        }
        None => debug!("No home directory, skipping home binds"),
    }

    MountPlan { steps }
}
