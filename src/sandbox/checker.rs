//! The per-assembly scan pipeline.
//!
//! A scan moves through fixed stages:
//!
//! 1. **Native code check** - images with precompiled native code are rejected immediately.
//! 2. **IL verification** - the configured [`IlVerifier`] runs; any finding whose code is not
//!    allowed by the policy rejects the image immediately.
//! 3. **Fact extraction** - referenced types, member references and inheritance edges are
//!    collected. Unsupported metadata becomes violations, extraction never stops early.
//! 4. **Policy evaluation** - all evaluators run in a fixed order and every violation is kept.
//! 5. **Decision** - violations are sorted by message, the image passes iff there are none.
//!
//! Progress, timings and every violation are reported to a [`ScanLogSink`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use dotsandbox::sandbox::{AssemblyChecker, AssemblyResolver, SandboxPolicy, ScanLog};
//! use std::path::Path;
//!
//! let policy = SandboxPolicy::from_file(Path::new("whitelist.json"))?;
//! let resolver = AssemblyResolver::new("Game_Data/Managed");
//! let checker = AssemblyChecker::new(&policy);
//!
//! let report = checker.check_file(
//!     Path::new("Game_Data/Managed/Content.Client.dll"),
//!     &resolver,
//!     &["Content.Shared".to_string()],
//!     &mut |entry: ScanLog| println!("{entry}"),
//! )?;
//! println!("passed: {}", report.passed);
//! # Ok::<(), dotsandbox::Error>(())
//! ```

use std::{path::Path, sync::Arc, time::Instant};

use strum::Display;

use crate::{
    metadata::image::BinaryImage,
    sandbox::{
        decoder::MetadataDecoder,
        evaluate::{
            check_inheritance, check_member_references, check_type_abuse, check_type_access,
            check_unmanaged_methods, PolicyScope,
        },
        extract::{extract_facts, Facts},
        model::Violation,
        policy::SandboxPolicy,
        resolver::AssemblyResolver,
        scanlog::{emit, ScanLog, ScanLogSink},
        verify::{IlVerifier, NoIlVerification},
    },
    Result,
};

/// Stage of the scan pipeline that rejected an assembly
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum ScanStage {
    /// The image contains precompiled native code
    NativeCodeCheck,
    /// The IL verifier reported findings that are not allowed
    IlVerification,
    /// Extraction or evaluation produced violations
    PolicyEvaluation,
}

/// Outcome of scanning one assembly
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanReport {
    /// Simple name of the scanned assembly
    pub assembly: String,
    /// True if the assembly may be loaded
    pub passed: bool,
    /// All violations, sorted by message
    pub violations: Vec<Violation>,
    /// The stage that rejected the assembly, `None` if it passed
    pub rejected_at: Option<ScanStage>,
}

impl ScanReport {
    fn rejected(assembly: &str, stage: ScanStage) -> Self {
        ScanReport {
            assembly: assembly.to_string(),
            passed: false,
            violations: Vec::new(),
            rejected_at: Some(stage),
        }
    }
}

/// Options of a scan
#[derive(Clone)]
pub struct ScanOptions {
    verifier: Arc<dyn IlVerifier>,
}

impl ScanOptions {
    /// Options using [`NoIlVerification`]
    #[must_use]
    pub fn new() -> Self {
        ScanOptions {
            verifier: Arc::new(NoIlVerification),
        }
    }

    /// Use `verifier` for the IL verification stage
    #[must_use]
    pub fn with_verifier(mut self, verifier: Arc<dyn IlVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// The configured IL verifier
    #[must_use]
    pub fn verifier(&self) -> &dyn IlVerifier {
        self.verifier.as_ref()
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Checks assemblies against a policy
pub struct AssemblyChecker<'p> {
    policy: &'p SandboxPolicy,
    options: ScanOptions,
}

impl<'p> AssemblyChecker<'p> {
    /// Create a checker with default options
    #[must_use]
    pub fn new(policy: &'p SandboxPolicy) -> Self {
        AssemblyChecker {
            policy,
            options: ScanOptions::new(),
        }
    }

    /// Replace the scan options
    #[must_use]
    pub fn with_options(mut self, options: ScanOptions) -> Self {
        self.options = options;
        self
    }

    /// The policy checked against
    #[must_use]
    pub fn policy(&self) -> &'p SandboxPolicy {
        self.policy
    }

    /// Load the assembly at `path` and scan it
    ///
    /// # Errors
    /// See [`AssemblyChecker::check_image`]; additionally returns the load error if `path` is
    /// not a readable managed image.
    pub fn check_file(
        &self,
        path: &Path,
        resolver: &AssemblyResolver,
        other_assemblies: &[String],
        sink: &mut dyn ScanLogSink,
    ) -> Result<ScanReport> {
        let image = BinaryImage::from_file(path)?;
        self.check_image(&image, resolver, other_assemblies, sink)
    }

    /// Scan a loaded assembly
    ///
    /// ## Arguments
    /// * 'image'            - The assembly to scan
    /// * 'resolver'         - Resolver over the installation's managed directory
    /// * 'other_assemblies' - Names of the assemblies bundled with this one
    /// * 'sink'             - Receiver of progress entries
    ///
    /// # Errors
    /// Returns an error if the verifier fails or the metadata is malformed. Callers must treat an
    /// error like a rejection.
    pub fn check_image(
        &self,
        image: &BinaryImage,
        resolver: &AssemblyResolver,
        other_assemblies: &[String],
        sink: &mut dyn ScanLogSink,
    ) -> Result<ScanReport> {
        let start = Instant::now();
        let name = image.name();

        if image.has_native_code() {
            emit(
                sink,
                ScanLog::error(format!("Assembly {name} contains native code.")),
            );
            return Ok(ScanReport::rejected(name, ScanStage::NativeCodeCheck));
        }

        if !self.verify_il(image, resolver, sink)? {
            emit(
                sink,
                ScanLog::error(format!("Assembly {name} Has invalid IL code")),
            );
            return Ok(ScanReport::rejected(name, ScanStage::IlVerification));
        }

        let decoder = MetadataDecoder::new(image)?;
        let Facts {
            types,
            members,
            inheritance,
            mut violations,
        } = extract_facts(&decoder, self.policy.system_assembly_name())?;
        progress(sink, &violations, "References loaded", start);

        let scope = PolicyScope::new(self.policy, other_assemblies);

        violations.extend(check_type_access(&scope, &types, name));
        progress(sink, &violations, "Types", start);

        violations.extend(check_inheritance(&scope, &inheritance));
        progress(sink, &violations, "Inheritance", start);

        violations.extend(check_unmanaged_methods(&decoder)?);
        progress(sink, &violations, "Unmanaged methods", start);

        violations.extend(check_type_abuse(&decoder)?);
        progress(sink, &violations, "Type abuse", start);

        violations.extend(check_member_references(&scope, &members));
        progress(sink, &violations, "Member References", start);

        violations.sort();
        for violation in &violations {
            emit(sink, ScanLog::error(format!("Sandbox violation: {violation}")));
        }

        emit(sink, ScanLog::info(totals(&violations)));
        emit(
            sink,
            ScanLog::info(format!(
                "Checked assembly in {}ms",
                start.elapsed().as_millis()
            )),
        );

        let passed = violations.is_empty();
        Ok(ScanReport {
            assembly: name.to_string(),
            passed,
            violations,
            rejected_at: (!passed).then_some(ScanStage::PolicyEvaluation),
        })
    }

    fn verify_il(
        &self,
        image: &BinaryImage,
        resolver: &AssemblyResolver,
        sink: &mut dyn ScanLogSink,
    ) -> Result<bool> {
        let name = image.name();
        emit(sink, ScanLog::info(format!("{name}: Verifying IL...")));
        let start = Instant::now();

        let allowed = self.policy.allowed_verifier_errors();
        let mut valid = true;
        for issue in self.options.verifier().verify(image, resolver)? {
            if allowed.contains(&issue.code) {
                continue;
            }

            emit(sink, ScanLog::error(format!("{name}: {issue}")));
            valid = false;
        }

        emit(
            sink,
            ScanLog::info(format!(
                "{name}: Verified IL in {}ms",
                start.elapsed().as_secs_f64() * 1000.0
            )),
        );

        Ok(valid)
    }
}

/// Load the assembly at `path`, scan it with default options and return whether it passed
///
/// Uses a resolver over `managed_dir` that lives only for this scan.
///
/// # Errors
/// See [`AssemblyChecker::check_file`].
pub fn check_assembly_types(
    path: &Path,
    managed_dir: &Path,
    policy: &SandboxPolicy,
    other_assemblies: &[String],
    sink: &mut dyn ScanLogSink,
) -> Result<bool> {
    let resolver = AssemblyResolver::new(managed_dir);
    let report = AssemblyChecker::new(policy).check_file(path, &resolver, other_assemblies, sink)?;
    Ok(report.passed)
}

fn totals(violations: &[Violation]) -> String {
    if violations.is_empty() {
        "No sandbox violations.".to_string()
    } else {
        format!("Total violations: {}", violations.len())
    }
}

fn progress(sink: &mut dyn ScanLogSink, violations: &[Violation], phase: &str, start: Instant) {
    emit(sink, ScanLog::info(totals(violations)));
    emit(
        sink,
        ScanLog::info(format!("{phase}... {}ms", start.elapsed().as_millis())),
    );
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::{
        sandbox::{
            scanlog::ScanLogKind,
            verify::VerificationIssue,
        },
        test::{sig, type_flags, AssemblyBuilder, MemberParent, TypeHandle},
    };

    const POLICY: &str = r#"{
        "allowedVerifierErrors": ["StackUnexpected"],
        "types": {
            "System": {
                "Object": { "all": true, "inherit": "Allow" },
                "ValueType": {},
                "Console": { "methods": ["void WriteLine(string)"] },
                "Counter": { "fields": ["int Value"] }
            },
            "Robust.Shared.GameObjects": {
                "Component": { "methods": ["void Dirty()"] }
            }
        }
    }"#;

    struct Scan {
        report: ScanReport,
        entries: Vec<ScanLog>,
    }

    fn scan_with(builder: &AssemblyBuilder, options: ScanOptions) -> Scan {
        let policy = SandboxPolicy::from_json(POLICY).unwrap();
        let image = BinaryImage::from_mem(builder.build()).unwrap();
        let resolver = AssemblyResolver::new("unused");

        let mut entries = Vec::new();
        let report = AssemblyChecker::new(&policy)
            .with_options(options)
            .check_image(&image, &resolver, &[], &mut |entry: ScanLog| entries.push(entry))
            .unwrap();

        Scan { report, entries }
    }

    fn scan(builder: &AssemblyBuilder) -> Scan {
        scan_with(builder, ScanOptions::new())
    }

    fn messages(report: &ScanReport) -> Vec<&str> {
        report.violations.iter().map(|v| v.message.as_str()).collect()
    }

    fn client() -> (AssemblyBuilder, u32) {
        let mut builder = AssemblyBuilder::new("Content.Client");
        let runtime = builder.assembly_ref("System.Runtime");
        let object = builder.type_ref_in_assembly(runtime, "System", "Object");
        let console = builder.type_ref_in_assembly(runtime, "System", "Console");
        builder.type_def("Content.Client", "Entry", type_flags::PUBLIC_CLASS, TypeHandle::Ref(object));
        builder.method_def("Main", 0, 0x0096, &sig::static_method(sig::void(), &[]));
        builder.member_ref(
            MemberParent::Ref(console),
            "WriteLine",
            &sig::static_method(sig::void(), &[sig::string()]),
        );
        (builder, runtime)
    }

    #[test]
    fn clean_assembly() {
        let (builder, _) = client();
        let scan = scan(&builder);

        assert!(scan.report.passed);
        assert!(scan.report.violations.is_empty());
        assert_eq!(scan.report.rejected_at, None);
        assert_eq!(scan.report.assembly, "Content.Client");

        assert!(scan.entries.iter().all(|entry| entry.kind == ScanLogKind::Info));
        let phases = scan
            .entries
            .iter()
            .filter(|entry| entry.message.contains("... "))
            .map(|entry| entry.message.split("... ").next().unwrap_or_default())
            .collect::<Vec<_>>();
        assert_eq!(
            phases,
            vec![
                "References loaded",
                "Types",
                "Inheritance",
                "Unmanaged methods",
                "Type abuse",
                "Member References",
            ]
        );
        assert_eq!(scan.entries[0].message, "Content.Client: Verifying IL...");
        assert!(scan.entries[1].message.starts_with("Content.Client: Verified IL in "));
        assert_eq!(scan.entries[2].message, "No sandbox violations.");
        assert!(scan.entries.last().unwrap().message.starts_with("Checked assembly in "));
    }

    #[test]
    fn native_code() {
        let (builder, _) = client();
        let scan = scan(&builder.with_native_code());

        assert!(!scan.report.passed);
        assert_eq!(scan.report.rejected_at, Some(ScanStage::NativeCodeCheck));
        assert_eq!(
            scan.entries,
            vec![ScanLog::error("Assembly Content.Client contains native code.")]
        );
    }

    #[test]
    fn member_on_unlisted_type() {
        let (mut builder, runtime) = client();
        let file = builder.type_ref_in_assembly(runtime, "System.IO", "File");
        builder.member_ref(
            MemberParent::Ref(file),
            "Delete",
            &sig::static_method(sig::void(), &[sig::string()]),
        );

        let scan = scan(&builder);

        assert!(!scan.report.passed);
        assert_eq!(scan.report.rejected_at, Some(ScanStage::PolicyEvaluation));
        assert_eq!(
            messages(&scan.report),
            vec![
                "Access to type not allowed: [System.Runtime]System.IO.File",
                "Access to type not allowed: [System.Runtime]System.IO.File asmName Content.Client",
            ]
        );

        let errors = scan
            .entries
            .iter()
            .filter(|entry| entry.kind == ScanLogKind::Error)
            .map(|entry| entry.message.as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            errors,
            vec![
                "Sandbox violation: Access to type not allowed: [System.Runtime]System.IO.File",
                "Sandbox violation: Access to type not allowed: [System.Runtime]System.IO.File asmName Content.Client",
            ]
        );
        assert!(scan
            .entries
            .iter()
            .any(|entry| entry.message == "Total violations: 2"));
    }

    #[test]
    fn inheritance_alone_rejects() {
        let (mut builder, _) = client();
        let robust = builder.assembly_ref("Robust.Shared");
        let component = builder.type_ref_in_assembly(robust, "Robust.Shared.GameObjects", "Component");
        builder.type_def("Content.Client", "Health", type_flags::PUBLIC_CLASS, TypeHandle::Ref(component));

        let scan = scan(&builder);

        assert!(!scan.report.passed);
        assert_eq!(
            messages(&scan.report),
            vec!["Inheriting of type not allowed: [Robust.Shared]Robust.Shared.GameObjects.Component"]
        );
    }

    #[test]
    fn fields_without_methods() {
        let (mut builder, runtime) = client();
        let counter = builder.type_ref_in_assembly(runtime, "System", "Counter");
        builder.member_ref(MemberParent::Ref(counter), "Value", &sig::field(sig::i4()));
        builder.member_ref(
            MemberParent::Ref(counter),
            "Value",
            &sig::instance_method(sig::i4(), &[]),
        );

        let scan = scan(&builder);

        assert_eq!(
            messages(&scan.report),
            vec!["Access to method not allowed: [System.Runtime]System.Counter.Value() Returns Int32"]
        );
    }

    #[test]
    fn repeated_scans_agree() {
        let (mut builder, runtime) = client();
        let file = builder.type_ref_in_assembly(runtime, "System.IO", "File");
        let value_type = builder.type_ref_in_assembly(runtime, "System", "ValueType");
        builder.member_ref(MemberParent::Ref(file), "Exists", &sig::static_method(sig::boolean(), &[sig::string()]));
        builder.type_def("Content.Client", "Union", type_flags::EXPLICIT_STRUCT, TypeHandle::Ref(value_type));
        builder.field("a", 0x0006, &sig::field(sig::object()));
        builder.method_def("Native", 0x0001, 0x0096, &sig::static_method(sig::void(), &[]));

        let first = scan(&builder);
        let second = scan(&builder);

        assert_eq!(first.report, second.report);

        let found = messages(&first.report);
        assert_eq!(found.len(), 4);
        assert_eq!(
            found[..3],
            [
                "Access to type not allowed: [System.Runtime]System.IO.File",
                "Access to type not allowed: [System.Runtime]System.IO.File asmName Content.Client",
                "Explicit layout type Content.Client.Union may not have fields.",
            ]
        );
        assert!(found[3].starts_with("Method has illegal MethodImplAttributes: "));
        assert!(first
            .report
            .violations
            .windows(2)
            .all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn vararg_arguments_are_checked() {
        let (mut builder, runtime) = client();
        let console = builder.type_ref_in_assembly(runtime, "System", "Console");
        builder.member_ref(
            MemberParent::Ref(console),
            "WriteLine",
            &sig::vararg_call(
                sig::void(),
                &[sig::string()],
                &[sig::pointer(sig::native_int())],
            ),
        );

        let scan = scan(&builder);

        assert!(!scan.report.passed);
        assert_eq!(
            messages(&scan.report),
            vec!["Access to method not allowed: [System.Runtime]System.Console.WriteLine(String, IntPtr*) Returns Void"]
        );
    }

    struct FixedVerifier(Vec<VerificationIssue>);

    impl IlVerifier for FixedVerifier {
        fn verify(
            &self,
            _image: &BinaryImage,
            _resolver: &AssemblyResolver,
        ) -> Result<Vec<VerificationIssue>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn verifier_findings() {
        let (builder, _) = client();

        let tolerated = ScanOptions::new().with_verifier(Arc::new(FixedVerifier(vec![
            VerificationIssue::new("StackUnexpected", "Content.Client.Entry::Main"),
        ])));
        assert!(scan_with(&builder, tolerated).report.passed);

        let invalid = ScanOptions::new().with_verifier(Arc::new(FixedVerifier(vec![
            VerificationIssue::new("StackUnexpected", "Content.Client.Entry::Main"),
            VerificationIssue::new("UnmanagedPointer", "Content.Client.Entry::Main"),
        ])));
        let scan = scan_with(&builder, invalid);

        assert!(!scan.report.passed);
        assert_eq!(scan.report.rejected_at, Some(ScanStage::IlVerification));
        let errors = scan
            .entries
            .iter()
            .filter(|entry| entry.kind == ScanLogKind::Error)
            .map(|entry| entry.message.as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            errors,
            vec![
                "Content.Client: ILVerify: UnmanagedPointer: Content.Client.Entry::Main",
                "Assembly Content.Client Has invalid IL code",
            ]
        );
    }

    #[test]
    fn scan_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Content.Client.dll");
        let (builder, _) = client();
        fs::write(&path, builder.build()).unwrap();

        let policy = SandboxPolicy::from_json(POLICY).unwrap();
        let mut entries = Vec::new();
        let passed = check_assembly_types(
            &path,
            dir.path(),
            &policy,
            &[],
            &mut |entry: ScanLog| entries.push(entry),
        )
        .unwrap();

        assert!(passed);
        assert!(!entries.is_empty());
    }
}
