//! Scanning of every untrusted assembly of an extracted game build.
//!
//! The managed directory of a build is located first (`*_Data/Managed`, or the macOS bundle
//! layout). Every `*.dll` in it that is not a trusted "good file" is then scanned with a single
//! shared [`AssemblyResolver`]. The file stems of all scanned assemblies form the bundled
//! assembly list, so the assemblies of one build may reference each other freely. Scanning stops
//! at the first rejected assembly.
//!
//! # Examples
//!
//! ```rust,no_run
//! use dotsandbox::sandbox::{scan_installation, InstallationScanOptions, SandboxPolicy, ScanLog};
//! use std::path::Path;
//!
//! let policy = SandboxPolicy::from_file(Path::new("CodeScanList.json"))?;
//! let options = InstallationScanOptions::new()
//!     .with_good_files(["UnityEngine.dll", "Mirror.dll"]);
//!
//! let report = scan_installation(Path::new("builds/1234"), &policy, &options, &mut |_: ScanLog| {})?;
//! println!("passed: {}", report.passed);
//! # Ok::<(), dotsandbox::Error>(())
//! ```

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use tracing::{debug, error, info, warn};

use crate::{
    sandbox::{
        checker::{AssemblyChecker, ScanOptions, ScanReport},
        policy::SandboxPolicy,
        resolver::AssemblyResolver,
        scanlog::ScanLogSink,
    },
    Error, Result,
};

/// Options of an installation scan
#[derive(Clone, Default)]
pub struct InstallationScanOptions {
    /// Lowercased file names that are trusted and not scanned
    good_files: HashSet<String>,
    scan: ScanOptions,
    cancel: Option<Arc<AtomicBool>>,
}

impl InstallationScanOptions {
    /// Options that scan every assembly with default [`ScanOptions`]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Trust the given file names, compared ignoring ASCII case
    #[must_use]
    pub fn with_good_files<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.good_files
            .extend(names.into_iter().map(|name| name.as_ref().to_ascii_lowercase()));
        self
    }

    /// Options used for every assembly
    #[must_use]
    pub fn with_scan_options(mut self, scan: ScanOptions) -> Self {
        self.scan = scan;
        self
    }

    /// Stop with [`Error::Cancelled`] once `flag` is set, checked before each assembly
    #[must_use]
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Returns true if `file_name` is a trusted file
    #[must_use]
    pub fn is_good_file(&self, file_name: &str) -> bool {
        self.good_files.contains(&file_name.to_ascii_lowercase())
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

/// Outcome of an installation scan
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstallationReport {
    /// The managed directory, `None` if the build has none
    pub managed_dir: Option<PathBuf>,
    /// Reports of the scanned assemblies, in scan order
    pub scanned: Vec<ScanReport>,
    /// Number of trusted files that were not scanned
    pub skipped: usize,
    /// True if no scanned assembly was rejected
    pub passed: bool,
}

/// Locate the managed assemblies directory of an extracted build
///
/// # Errors
/// Returns [`Error::ManagedDirNotFound`] if neither layout is present, or [`Error::FileError`]
/// if `install_path` cannot be read.
pub fn find_managed_dir(install_path: &Path) -> Result<PathBuf> {
    if !install_path.is_dir() {
        return Err(Error::ManagedDirNotFound(install_path.to_path_buf()));
    }

    let mut dirs = fs::read_dir(install_path)?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    dirs.sort();

    for dir in dirs {
        let is_data_dir = dir
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with("_Data"));
        let managed = dir.join("Managed");
        if is_data_dir && managed.is_dir() {
            return Ok(managed);
        }
    }

    let mac = install_path
        .join("Unitystation.app")
        .join("Contents")
        .join("Resources")
        .join("Data")
        .join("Managed");
    if mac.is_dir() {
        return Ok(mac);
    }

    Err(Error::ManagedDirNotFound(install_path.to_path_buf()))
}

/// File names of the assemblies of a trusted reference build
///
/// # Errors
/// See [`find_managed_dir`].
pub fn good_file_names(reference_install: &Path) -> Result<HashSet<String>> {
    let managed_dir = find_managed_dir(reference_install)?;
    Ok(dll_files(&managed_dir)?
        .iter()
        .filter_map(|path| path.file_name().and_then(|name| name.to_str()))
        .map(str::to_string)
        .collect())
}

/// Scan every untrusted assembly of an extracted build
///
/// A build without a managed directory has no managed code and passes.
///
/// # Errors
/// Returns [`Error::Cancelled`] if the cancellation flag was set before all assemblies were
/// scanned, or the error of a scan that could not be performed.
pub fn scan_installation(
    install_path: &Path,
    policy: &SandboxPolicy,
    options: &InstallationScanOptions,
    sink: &mut dyn ScanLogSink,
) -> Result<InstallationReport> {
    let managed_dir = match find_managed_dir(install_path) {
        Ok(dir) => dir,
        Err(Error::ManagedDirNotFound(path)) => {
            warn!(
                "No managed directory found in {}, skipping code scan",
                path.display()
            );
            return Ok(InstallationReport {
                managed_dir: None,
                scanned: Vec::new(),
                skipped: 0,
                passed: true,
            });
        }
        Err(other) => return Err(other),
    };

    let all = dll_files(&managed_dir)?;
    let to_scan = all
        .iter()
        .filter(|path| {
            !path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| options.is_good_file(name))
        })
        .collect::<Vec<_>>();
    let skipped = all.len() - to_scan.len();

    info!(
        "Scanning {} of {} DLLs (skipping {} trusted good files)",
        to_scan.len(),
        all.len(),
        skipped
    );

    let other_assemblies = to_scan
        .iter()
        .filter_map(|path| path.file_stem().and_then(|stem| stem.to_str()))
        .map(str::to_string)
        .collect::<Vec<_>>();

    let resolver = AssemblyResolver::new(&managed_dir);
    let checker = AssemblyChecker::new(policy).with_options(options.scan.clone());

    let mut scanned = Vec::with_capacity(to_scan.len());
    let mut passed = true;
    for path in to_scan {
        if options.is_cancelled() {
            return Err(Error::Cancelled);
        }

        debug!("Scanning {}", path.display());
        let report = checker.check_file(path, &resolver, &other_assemblies, sink)?;
        let rejected = !report.passed;
        scanned.push(report);

        if rejected {
            error!("Assembly failed code scan: {}", path.display());
            passed = false;
            break;
        }
    }

    resolver.clear();

    Ok(InstallationReport {
        managed_dir: Some(managed_dir),
        scanned,
        skipped,
        passed,
    })
}

/// All `*.dll` files of `dir`, sorted by path
fn dll_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = fs::read_dir(dir)?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<std::io::Result<Vec<_>>>()?
        .into_iter()
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("dll"))
        })
        .collect::<Vec<_>>();
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        sandbox::{checker::ScanStage, scanlog::ScanLog},
        test::{sig, type_flags, AssemblyBuilder, MemberParent, TypeHandle},
    };

    const POLICY: &str = r#"{
        "System": {
            "Object": { "all": true, "inherit": "Allow" },
            "Console": { "methods": ["void WriteLine(string)"] }
        }
    }"#;

    fn client() -> Vec<u8> {
        let mut builder = AssemblyBuilder::new("Content.Client");
        let runtime = builder.assembly_ref("System.Runtime");
        let shared = builder.assembly_ref("Content.Shared");
        let object = builder.type_ref_in_assembly(runtime, "System", "Object");
        let console = builder.type_ref_in_assembly(runtime, "System", "Console");
        let helper = builder.type_ref_in_assembly(shared, "Shared.Stuff", "Helper");
        builder.type_def("Content.Client", "Entry", type_flags::PUBLIC_CLASS, TypeHandle::Ref(object));
        builder.member_ref(
            MemberParent::Ref(console),
            "WriteLine",
            &sig::static_method(sig::void(), &[sig::string()]),
        );
        builder.member_ref(
            MemberParent::Ref(helper),
            "Run",
            &sig::static_method(sig::void(), &[]),
        );
        builder.build()
    }

    fn shared() -> Vec<u8> {
        let mut builder = AssemblyBuilder::new("Content.Shared");
        let runtime = builder.assembly_ref("System.Runtime");
        let object = builder.type_ref_in_assembly(runtime, "System", "Object");
        builder.type_def("Shared.Stuff", "Helper", type_flags::PUBLIC_CLASS, TypeHandle::Ref(object));
        builder.build()
    }

    fn native(name: &str) -> Vec<u8> {
        AssemblyBuilder::new(name).with_native_code().build()
    }

    fn install(files: &[(&str, Vec<u8>)]) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let managed = dir.path().join("Game_Data").join("Managed");
        fs::create_dir_all(&managed).unwrap();
        for (name, data) in files {
            fs::write(managed.join(name), data).unwrap();
        }
        fs::write(managed.join("readme.txt"), b"not an assembly").unwrap();
        (dir, managed)
    }

    fn run(dir: &Path, options: &InstallationScanOptions) -> Result<InstallationReport> {
        let policy = SandboxPolicy::from_json(POLICY).unwrap();
        scan_installation(dir, &policy, options, &mut |_: ScanLog| {})
    }

    #[test]
    fn managed_dir_layouts() {
        let (dir, managed) = install(&[]);
        assert_eq!(find_managed_dir(dir.path()).unwrap(), managed);

        let mac = tempfile::tempdir().unwrap();
        let bundle = mac
            .path()
            .join("Unitystation.app/Contents/Resources/Data/Managed");
        fs::create_dir_all(&bundle).unwrap();
        assert_eq!(find_managed_dir(mac.path()).unwrap(), bundle);

        let empty = tempfile::tempdir().unwrap();
        assert!(matches!(
            find_managed_dir(empty.path()),
            Err(Error::ManagedDirNotFound(_))
        ));
    }

    #[test]
    fn bundled_assemblies_and_good_files() {
        let (dir, _) = install(&[
            ("Content.Client.dll", client()),
            ("Content.Shared.dll", shared()),
            ("Trusted.dll", native("Trusted")),
        ]);
        let options = InstallationScanOptions::new().with_good_files(["trusted.DLL"]);

        let report = run(dir.path(), &options).unwrap();

        assert!(report.passed);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.scanned.len(), 2);
        assert!(report.scanned.iter().all(|scan| scan.passed));
    }

    #[test]
    fn bundled_assembly_must_be_scanned_too() {
        let (dir, _) = install(&[
            ("Content.Client.dll", client()),
            ("Content.Shared.dll", shared()),
        ]);
        let options = InstallationScanOptions::new().with_good_files(["Content.Shared.dll"]);

        let report = run(dir.path(), &options).unwrap();

        assert!(!report.passed);
        assert_eq!(report.scanned.len(), 1);
        assert_eq!(
            report.scanned[0].rejected_at,
            Some(ScanStage::PolicyEvaluation)
        );
    }

    #[test]
    fn stops_at_first_rejection() {
        let (dir, _) = install(&[
            ("Aaa.Native.dll", native("Aaa.Native")),
            ("Content.Client.dll", client()),
            ("Content.Shared.dll", shared()),
        ]);

        let report = run(dir.path(), &InstallationScanOptions::new()).unwrap();

        assert!(!report.passed);
        assert_eq!(report.scanned.len(), 1);
        assert_eq!(report.scanned[0].assembly, "Aaa.Native");
        assert_eq!(
            report.scanned[0].rejected_at,
            Some(ScanStage::NativeCodeCheck)
        );
    }

    #[test]
    fn cancellation() {
        let (dir, _) = install(&[("Content.Shared.dll", shared())]);
        let flag = Arc::new(AtomicBool::new(true));
        let options = InstallationScanOptions::new().with_cancellation(flag);

        assert!(matches!(run(dir.path(), &options), Err(Error::Cancelled)));
    }

    #[test]
    fn no_managed_code() {
        let dir = tempfile::tempdir().unwrap();

        let report = run(dir.path(), &InstallationScanOptions::new()).unwrap();

        assert!(report.passed);
        assert!(report.managed_dir.is_none());
    }

    #[test]
    fn reference_build_good_files() {
        let (dir, _) = install(&[("UnityEngine.dll", native("UnityEngine"))]);

        let names = good_file_names(dir.path()).unwrap();

        assert_eq!(names.len(), 1);
        assert!(names.contains("UnityEngine.dll"));
    }
}
