use std::cell::OnceCell;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Locations
// ---------------------------------------------------------------------------

/// Directories every resolver searches from. Computed once at startup and
/// handed to each target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locations {
    pub home: PathBuf,
    pub system_applications: PathBuf,
}

impl Locations {
    pub fn new(home: PathBuf, system_applications: PathBuf) -> Self {
        Self {
            home,
            system_applications,
        }
    }

    pub fn preference_panes(&self) -> PathBuf {
        self.home.join("Library").join("PreferencePanes")
    }

    pub fn user_applications(&self) -> PathBuf {
        self.home.join("Applications")
    }
}

// ---------------------------------------------------------------------------
// Variant / PathPrefix
// ---------------------------------------------------------------------------

/// How a target finds its install directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Variant {
    /// `~/Library/PreferencePanes/<name>.prefPane`
    #[serde(rename = "pane")]
    PreferencePane,
    /// `/Applications/<name>.app` or `~/Applications/<name>.app`
    #[serde(rename = "app")]
    Application,
    /// No resolver; only present through an explicit path override.
    #[serde(rename = "custom")]
    Custom,
}

impl Variant {
    pub fn label(self) -> &'static str {
        match self {
            Variant::PreferencePane => "pane",
            Variant::Application => "app",
            Variant::Custom => "custom",
        }
    }
}

/// Directory relative icon references are joined under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathPrefix {
    /// `<path>/Contents/Resources[/<location>]`
    Resources,
    /// `<path>/Contents/Library[/<location>]`
    Library,
    /// `<path>/<last child directory by name>[/<location>]`, for versioned
    /// install folders such as browser extensions.
    LatestSubdir,
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Outcome of locating a target on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(PathBuf),
    NotFound,
    /// The target's own description is malformed. Treated like `NotFound`.
    Invalid(String),
}

impl Resolution {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Resolution::Found(path) => Some(path),
            _ => None,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Found(path) => write!(f, "{}", path.display()),
            Resolution::NotFound => write!(f, "not found"),
            Resolution::Invalid(reason) => write!(f, "invalid: {}", reason),
        }
    }
}

// ---------------------------------------------------------------------------
// Target
// ---------------------------------------------------------------------------

/// One menu-bar application whose status icons get inverted.
#[derive(Debug, Clone)]
pub struct Target {
    pub name: String,
    pub variant: Variant,
    /// Single icon reference, relative or absolute.
    pub image: Option<PathBuf>,
    pub images: Vec<PathBuf>,
    /// Glob patterns whose matches join the image set.
    pub image_globs: Vec<String>,
    pub prefix: Option<PathPrefix>,
    /// Subpath under the install directory holding the icons.
    pub location: Option<PathBuf>,
    pub kill_process: Option<String>,
    pub launch: Option<PathBuf>,
    /// Install directory that bypasses the variant resolver.
    pub path_override: Option<PathBuf>,
    /// Pair of icons exchanged with each other instead of negated.
    pub swap: Option<(PathBuf, PathBuf)>,
    locations: Locations,
    resolution: OnceCell<Resolution>,
}

impl Target {
    pub fn new(name: impl Into<String>, variant: Variant, locations: Locations) -> Self {
        Self {
            name: name.into(),
            variant,
            image: None,
            images: Vec::new(),
            image_globs: Vec::new(),
            prefix: None,
            location: None,
            kill_process: None,
            launch: None,
            path_override: None,
            swap: None,
            locations,
            resolution: OnceCell::new(),
        }
    }

    /// Locate the install directory. Runs the resolver on the first call only;
    /// later calls return the cached result.
    pub fn resolve(&self) -> &Resolution {
        self.resolution.get_or_init(|| {
            let resolution = self.run_resolver();
            if let Resolution::Invalid(reason) = &resolution {
                log::warn!("{}: cannot resolve path: {}", self.name, reason);
            }
            resolution
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.resolve().path()
    }

    pub fn is_present(&self) -> bool {
        self.path().is_some()
    }

    fn run_resolver(&self) -> Resolution {
        if let Some(path) = &self.path_override {
            if !path.is_absolute() {
                return Resolution::Invalid(format!(
                    "path override {} is not absolute",
                    path.display()
                ));
            }
            return existing_dir(path.clone());
        }

        if let Err(reason) = validate_name(&self.name) {
            return Resolution::Invalid(reason);
        }

        match self.variant {
            Variant::PreferencePane => existing_dir(
                self.locations
                    .preference_panes()
                    .join(format!("{}.prefPane", self.name)),
            ),
            Variant::Application => self.resolve_application(),
            Variant::Custom => Resolution::Invalid("custom target has no path".to_string()),
        }
    }

    /// Both the system and the per-user Applications folder are candidates.
    /// When both hold a copy the per-user one wins.
    fn resolve_application(&self) -> Resolution {
        let bundle = format!("{}.app", self.name);
        let system = self.locations.system_applications.join(&bundle);
        let user = self.locations.user_applications().join(&bundle);

        match (user.is_dir(), system.is_dir()) {
            (true, true) => {
                log::debug!(
                    "{}: found in both {} and {}, using the former",
                    self.name,
                    user.display(),
                    system.display()
                );
                Resolution::Found(user)
            }
            (true, false) => Resolution::Found(user),
            (false, true) => Resolution::Found(system),
            (false, false) => Resolution::NotFound,
        }
    }

    // -----------------------------------------------------------------------
    // Icon paths
    // -----------------------------------------------------------------------

    pub fn resources_dir(&self) -> Option<PathBuf> {
        self.path()
            .map(|path| self.with_location(path.join("Contents").join("Resources")))
    }

    pub fn library_dir(&self) -> Option<PathBuf> {
        self.path()
            .map(|path| self.with_location(path.join("Contents").join("Library")))
    }

    /// Last child directory of the install path, ordered by name.
    pub fn latest_subdir(&self) -> Option<PathBuf> {
        let path = self.path()?;
        let mut dirs: Vec<PathBuf> = fs::read_dir(path)
            .ok()?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();
        dirs.pop().map(|latest| self.with_location(latest))
    }

    pub fn prefix_dir(&self, prefix: PathPrefix) -> Option<PathBuf> {
        match prefix {
            PathPrefix::Resources => self.resources_dir(),
            PathPrefix::Library => self.library_dir(),
            PathPrefix::LatestSubdir => self.latest_subdir(),
        }
    }

    fn with_location(&self, dir: PathBuf) -> PathBuf {
        match &self.location {
            Some(location) => dir.join(location),
            None => dir,
        }
    }

    /// Where an icon reference lives on disk.
    ///
    /// A prefix wins over a location; with neither the reference is returned
    /// unchanged. `None` when the prefix or location needs an install path the
    /// target does not have.
    pub fn full_path(&self, file: &Path) -> Option<PathBuf> {
        if let Some(prefix) = self.prefix {
            self.prefix_dir(prefix).map(|dir| dir.join(file))
        } else if let Some(location) = &self.location {
            self.path().map(|path| path.join(location).join(file))
        } else {
            Some(file.to_path_buf())
        }
    }

    /// Every icon reference subject to inversion: `images`, glob matches, then
    /// `image`, with duplicates dropped.
    pub fn effective_images(&self) -> Vec<PathBuf> {
        let globbed = self.glob_images();
        let mut out: Vec<PathBuf> = Vec::new();
        for image in self
            .images
            .iter()
            .cloned()
            .chain(globbed)
            .chain(self.image.clone())
        {
            if !out.contains(&image) {
                out.push(image);
            }
        }
        out
    }

    fn glob_images(&self) -> Vec<PathBuf> {
        let mut matches = Vec::new();
        for pattern in &self.image_globs {
            let Some(full) = self.glob_pattern(pattern) else {
                continue;
            };
            match glob::glob(&full) {
                Ok(paths) => {
                    let mut found: Vec<PathBuf> = paths.filter_map(Result::ok).collect();
                    found.sort();
                    if found.is_empty() {
                        log::debug!("{}: no icons match {}", self.name, full);
                    }
                    matches.extend(found);
                }
                Err(e) => log::warn!("{}: bad image pattern {}: {}", self.name, full, e),
            }
        }
        matches
    }

    /// `pattern` placed under the icon directory. Only `pattern` keeps its
    /// wildcards; the directory part is escaped.
    fn glob_pattern(&self, pattern: &str) -> Option<String> {
        if Path::new(pattern).is_absolute() {
            return Some(pattern.to_string());
        }
        let dir = if let Some(prefix) = self.prefix {
            self.prefix_dir(prefix)?
        } else if let Some(location) = &self.location {
            self.path()?.join(location)
        } else {
            return Some(pattern.to_string());
        };
        let escaped = glob::Pattern::escape(&dir.to_string_lossy());
        Some(format!("{}{}{}", escaped, std::path::MAIN_SEPARATOR, pattern))
    }

    // -----------------------------------------------------------------------
    // Process names
    // -----------------------------------------------------------------------

    pub fn kill_process(&self) -> &str {
        self.kill_process.as_deref().unwrap_or(&self.name)
    }

    pub fn launch_target(&self) -> Option<PathBuf> {
        self.launch
            .clone()
            .or_else(|| self.path().map(Path::to_path_buf))
    }
}

fn existing_dir(path: PathBuf) -> Resolution {
    if path.is_dir() {
        Resolution::Found(path)
    } else {
        Resolution::NotFound
    }
}

/// Names double as path components below a fixed directory, so they may
/// descend into a bundle but never climb out of it.
fn validate_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("empty name".to_string());
    }
    let path = Path::new(name);
    if path.is_absolute() {
        return Err(format!("name '{}' is an absolute path", name));
    }
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(format!("name '{}' escapes its directory", name));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Locations) {
        let root = TempDir::new().unwrap();
        let home = root.path().join("home");
        let system = root.path().join("Applications");
        fs::create_dir_all(&home).unwrap();
        fs::create_dir_all(&system).unwrap();
        (root, Locations::new(home, system))
    }

    #[test]
    fn application_found_in_system_dir() {
        let (_root, loc) = setup();
        let bundle = loc.system_applications.join("Caffeine.app");
        fs::create_dir_all(&bundle).unwrap();

        let target = Target::new("Caffeine", Variant::Application, loc);
        assert!(target.is_present());
        assert_eq!(target.path(), Some(bundle.as_path()));
    }

    #[test]
    fn application_prefers_user_copy_when_both_exist() {
        let (_root, loc) = setup();
        fs::create_dir_all(loc.system_applications.join("Radium.app")).unwrap();
        let user = loc.user_applications().join("Radium.app");
        fs::create_dir_all(&user).unwrap();

        let target = Target::new("Radium", Variant::Application, loc);
        assert_eq!(target.resolve(), &Resolution::Found(user));
    }

    #[test]
    fn missing_application_is_not_present() {
        let (_root, loc) = setup();
        let target = Target::new("Ghost", Variant::Application, loc);
        assert_eq!(target.resolve(), &Resolution::NotFound);
        assert!(!target.is_present());
        assert_eq!(target.resources_dir(), None);
    }

    #[test]
    fn preference_pane_resolves_under_home() {
        let (_root, loc) = setup();
        let pane = loc.preference_panes().join("Hazel.prefPane");
        fs::create_dir_all(&pane).unwrap();

        let target = Target::new("Hazel", Variant::PreferencePane, loc);
        assert_eq!(target.path(), Some(pane.as_path()));
    }

    #[test]
    fn preference_pane_file_is_not_a_directory() {
        let (_root, loc) = setup();
        fs::create_dir_all(loc.preference_panes()).unwrap();
        fs::write(loc.preference_panes().join("Fake.prefPane"), b"x").unwrap();

        let target = Target::new("Fake", Variant::PreferencePane, loc);
        assert!(!target.is_present());
    }

    #[test]
    fn malformed_names_resolve_invalid_not_panic() {
        let (_root, loc) = setup();
        for name in ["", "  ", "/etc", "../escape"] {
            let target = Target::new(name, Variant::Application, loc.clone());
            assert!(matches!(target.resolve(), Resolution::Invalid(_)), "{name:?}");
            assert!(!target.is_present());
        }
    }

    #[test]
    fn custom_without_override_is_invalid() {
        let (_root, loc) = setup();
        let target = Target::new("Hangouts", Variant::Custom, loc);
        assert!(matches!(target.resolve(), Resolution::Invalid(_)));
    }

    #[test]
    fn override_bypasses_variant_resolver() {
        let (root, loc) = setup();
        let helper = root.path().join("elsewhere/HazelHelper.app");
        fs::create_dir_all(&helper).unwrap();

        let mut target = Target::new("HazelHelper", Variant::PreferencePane, loc);
        target.path_override = Some(helper.clone());
        assert_eq!(target.path(), Some(helper.as_path()));
    }

    #[test]
    fn relative_override_is_invalid() {
        let (_root, loc) = setup();
        let mut target = Target::new("X", Variant::Custom, loc);
        target.path_override = Some(PathBuf::from("relative/X.app"));
        assert!(matches!(target.resolve(), Resolution::Invalid(_)));
    }

    #[test]
    fn resolution_is_memoized() {
        let (_root, loc) = setup();
        let bundle = loc.system_applications.join("GrabBox.app");
        fs::create_dir_all(&bundle).unwrap();

        let target = Target::new("GrabBox", Variant::Application, loc);
        assert!(target.is_present());
        fs::remove_dir_all(&bundle).unwrap();
        assert!(target.is_present());
    }

    #[test]
    fn full_path_uses_prefix_over_location() {
        let (_root, loc) = setup();
        let bundle = loc.system_applications.join("1Password.app");
        fs::create_dir_all(&bundle).unwrap();

        let mut target = Target::new("1Password", Variant::Application, loc);
        target.prefix = Some(PathPrefix::Resources);
        target.location = Some(PathBuf::from("LoginItems/helper.app/Contents/Resources"));

        let expected = bundle
            .join("Contents/Resources")
            .join("LoginItems/helper.app/Contents/Resources")
            .join("menubar-icon.tiff");
        assert_eq!(
            target.full_path(Path::new("menubar-icon.tiff")),
            Some(expected)
        );
    }

    #[test]
    fn full_path_with_resources_prefix() {
        let (_root, loc) = setup();
        fs::create_dir_all(loc.system_applications.join("Tomighty.app")).unwrap();

        let mut target = Target::new("Tomighty", Variant::Application, loc);
        target.prefix = Some(PathPrefix::Resources);
        let resources = target.resources_dir().unwrap();
        assert_eq!(
            target.full_path(Path::new("icon.tiff")),
            Some(resources.join("icon.tiff"))
        );
    }

    #[test]
    fn full_path_with_library_prefix() {
        let (_root, loc) = setup();
        let bundle = loc.system_applications.join("Lib.app");
        fs::create_dir_all(&bundle).unwrap();

        let mut target = Target::new("Lib", Variant::Application, loc);
        target.prefix = Some(PathPrefix::Library);
        assert_eq!(
            target.full_path(Path::new("a.png")),
            Some(bundle.join("Contents/Library/a.png"))
        );
    }

    #[test]
    fn full_path_with_location_only() {
        let (_root, loc) = setup();
        let bundle = loc.system_applications.join("Loc.app");
        fs::create_dir_all(&bundle).unwrap();

        let mut target = Target::new("Loc", Variant::Application, loc);
        target.location = Some(PathBuf::from("Helpers"));
        assert_eq!(
            target.full_path(Path::new("a.png")),
            Some(bundle.join("Helpers/a.png"))
        );
    }

    #[test]
    fn full_path_without_prefix_or_location_is_unchanged() {
        let (_root, loc) = setup();
        let target = Target::new("Plain", Variant::Application, loc);
        assert_eq!(
            target.full_path(Path::new("/abs/icon.png")),
            Some(PathBuf::from("/abs/icon.png"))
        );
    }

    #[test]
    fn latest_subdir_picks_last_version() {
        let (root, loc) = setup();
        let ext = root.path().join("ext");
        for version in ["1.0.1_0", "1.2.0_0", "1.10.0_0"] {
            fs::create_dir_all(ext.join(version)).unwrap();
        }

        let mut target = Target::new("Hangouts", Variant::Custom, loc);
        target.path_override = Some(ext.clone());
        target.prefix = Some(PathPrefix::LatestSubdir);
        target.location = Some(PathBuf::from("images_4/presence"));
        assert_eq!(
            target.full_path(Path::new("mac_online.png")),
            Some(ext.join("1.2.0_0/images_4/presence/mac_online.png"))
        );
    }

    #[test]
    fn effective_images_is_deduplicated_union() {
        let (_root, loc) = setup();
        let mut target = Target::new("Radium", Variant::Application, loc);
        target.images = vec![PathBuf::from("a.png"), PathBuf::from("b.png")];
        target.image = Some(PathBuf::from("a.png"));
        assert_eq!(
            target.effective_images(),
            vec![PathBuf::from("a.png"), PathBuf::from("b.png")]
        );

        target.image = Some(PathBuf::from("c.png"));
        assert_eq!(target.effective_images().len(), 3);

        target.images.clear();
        target.image = None;
        assert!(target.effective_images().is_empty());
    }

    #[test]
    fn glob_matches_join_the_image_set() {
        let (_root, loc) = setup();
        let resources = loc
            .system_applications
            .join("Google Drive.app/Contents/Resources");
        fs::create_dir_all(&resources).unwrap();
        for file in ["mac-b.png", "mac-a.png", "other.png"] {
            fs::write(resources.join(file), b"").unwrap();
        }

        let mut target = Target::new("Google Drive", Variant::Application, loc);
        target.prefix = Some(PathPrefix::Resources);
        target.image_globs = vec!["mac-*.png".to_string()];
        assert_eq!(
            target.effective_images(),
            vec![resources.join("mac-a.png"), resources.join("mac-b.png")]
        );
    }

    #[test]
    fn glob_directory_with_wildcard_characters_is_literal() {
        let root = TempDir::new().unwrap();
        let home = root.path().join("home[1]");
        let system = root.path().join("Applications");
        fs::create_dir_all(&system).unwrap();
        let loc = Locations::new(home, system);
        let resources = loc.user_applications().join("Drive.app/Contents/Resources");
        fs::create_dir_all(&resources).unwrap();
        fs::write(resources.join("mac-a.png"), b"").unwrap();

        let mut target = Target::new("Drive", Variant::Application, loc);
        target.prefix = Some(PathPrefix::Resources);
        target.image_globs = vec!["mac-*.png".to_string()];
        assert_eq!(target.effective_images(), vec![resources.join("mac-a.png")]);
    }

    #[test]
    fn process_names_default_to_name_and_path() {
        let (_root, loc) = setup();
        let bundle = loc.system_applications.join("TestFlight.app");
        fs::create_dir_all(&bundle).unwrap();

        let mut target = Target::new("TestFlight", Variant::Application, loc);
        assert_eq!(target.kill_process(), "TestFlight");
        assert_eq!(target.launch_target(), Some(bundle));

        target.kill_process = Some("TestFlightHelper".to_string());
        target.launch = Some(PathBuf::from("Google Chrome"));
        assert_eq!(target.kill_process(), "TestFlightHelper");
        assert_eq!(target.launch_target(), Some(PathBuf::from("Google Chrome")));
    }
}
