//! Orchestration: per-package loops, the fixed utils package, the main
//! entry point, and the module manifest.
//!
//! Emitted source layout (parsed by downstream scripts, so it is part of
//! the contract):
//!
//! ```text
//! {out_dir}/{tag}Caller{k}/{tag}Caller{k}.go
//! {out_dir}/{tag}Checker{k}/{tag}Checker{k}.go
//! {out_dir}/{tag}Utils/{tag}Utils.go
//! {out_dir}/{tag}Main.go
//! {out_dir}/go.mod
//! ```

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::fs;
use std::io::Write as _;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info};

use crate::error::GenerateError;
use crate::fivemat::{Fivemat, INDENT};
use crate::generator::GenState;
use crate::tunables::Tunables;

#[derive(Debug, Clone)]
pub struct Config {
    /// Prefix for generated package names.
    pub tag: String,
    pub out_dir: Utf8PathBuf,
    /// Import prefix for the emitted module.
    pub pkg_path: String,
    /// Test functions per test package.
    pub num_functions: usize,
    pub num_packages: usize,
    pub seed: u64,
    /// Optional directive emitted as `//go:{pragma}` ahead of each test
    /// function; empty disables.
    pub pragma: String,
    /// Allowlists of function/package indices to emit; empty means all.
    /// Suppressed pairs are still generated (to keep the seed sequence
    /// deterministic) but their text and helpers are discarded.
    pub fcn_mask: BTreeSet<usize>,
    pub pkg_mask: BTreeSet<usize>,
    /// Runtime failure count at which the generated program gives up.
    pub max_fail: usize,
    /// Emit a runtime hook that forces a stack move before each direct and
    /// recursive call.
    pub force_stack_growth: bool,
    /// Record per-draw labels in the random streams for divergence triage.
    pub rand_debug: bool,
    pub tunables: Tunables,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            tag: "gen".to_string(),
            out_dir: ".".into(),
            pkg_path: "gen".to_string(),
            num_functions: 10,
            num_packages: 1,
            seed: 10101,
            pragma: String::new(),
            fcn_mask: BTreeSet::new(),
            pkg_mask: BTreeSet::new(),
            max_fail: 10,
            force_stack_growth: false,
            rand_debug: false,
            tunables: Tunables::default(),
        }
    }
}

impl Config {
    fn ipref(&self) -> String {
        if self.pkg_path.is_empty() {
            String::new()
        } else {
            format!("{}/", self.pkg_path)
        }
    }
}

fn mask_allows(mask: &BTreeSet<usize>, idx: usize) -> bool {
    mask.is_empty() || mask.contains(&idx)
}

/// File preamble: package clause, imports, and (when stack forcing is on
/// and unsafe is among the imports) the runtime stack-move hook.
fn file_header(pk: &str, imports: &[&str], ipref: &str, sforce: bool) -> String {
    let mut h = format!("package {pk}\n\n");
    let mut haveunsafe = false;
    for &imp in imports {
        match imp {
            "reflect" | "fmt" | "os" => {
                let _ = writeln!(h, "import \"{imp}\"");
            }
            "unsafe" => {
                let _ = writeln!(h, "import _ \"unsafe\"");
                haveunsafe = true;
            }
            _ => {
                let _ = writeln!(h, "import \"{ipref}{imp}\"");
            }
        }
    }
    h.push('\n');
    if sforce && haveunsafe {
        h.push_str("// Hack: reach into runtime to grab this testing hook.\n");
        h.push_str("//go:linkname hackStack runtime.gcTestMoveStackOnNextCall\n");
        h.push_str("func hackStack()\n\n");
    }
    h
}

/// The fixed utils package: failure counters, structured failure reports,
/// and the early-exit threshold. `UtilsType` survives minimization as a
/// dummy reference target.
fn emit_utils(max_fail: usize) -> String {
    let mut b = String::new();
    b.push_str("import \"fmt\"\nimport \"os\"\n\n");
    b.push_str("var ParamFailCount int\n\n");
    b.push_str("var ReturnFailCount int\n\n");
    b.push_str("var FailCount int\n\n");
    b.push_str("var Mode string\n\n");
    b.push_str("type UtilsType int\n\n");

    let countfail = "  if isret {\n    if ParamFailCount != 0 {\n      return\n    }\n    ReturnFailCount++\n  } else {\n    ParamFailCount++\n  }\n";
    let earlyexit = format!(
        "  if ParamFailCount+FailCount+ReturnFailCount > {max_fail} {{\n    os.Exit(1)\n  }}\n"
    );

    b.push_str("//go:noinline\n");
    b.push_str("func NoteFailure(cm int, pidx int, fidx int, pkg string, pref string, parmNo int, isret bool, _ uint64) {\n");
    b.push_str(countfail);
    b.push_str("  fmt.Fprintf(os.Stderr, \"Error: fail %s |%d|%d|%d| =%s.Test%d= %s %d\\n\", Mode, cm, pidx, fidx, pkg, fidx, pref, parmNo)\n");
    b.push_str(&earlyexit);
    b.push_str("}\n\n");

    b.push_str("//go:noinline\n");
    b.push_str("func NoteFailureElem(cm int, pidx int, fidx int, pkg string, pref string, parmNo int, elem int, isret bool, _ uint64) {\n");
    b.push_str(countfail);
    b.push_str("  fmt.Fprintf(os.Stderr, \"Error: fail %s |%d|%d|%d| =%s.Test%d= %s %d elem %d\\n\", Mode, cm, pidx, fidx, pkg, fidx, pref, parmNo, elem)\n");
    b.push_str(&earlyexit);
    b.push_str("}\n\n");

    b.push_str("func BeginFcn() {\n  ParamFailCount = 0\n  ReturnFailCount = 0\n}\n\n");
    b.push_str("func EndFcn() {\n  FailCount += ParamFailCount\n  FailCount += ReturnFailCount\n}\n");
    b
}

fn emit_main(cfg: &Config, s: &GenState) -> Result<String, GenerateError> {
    let mut fm = Fivemat::new(INDENT);
    let up = s.utils_pkg();
    writeln!(fm, "func main() {{")?;
    fm.indent();
    writeln!(fm, "fmt.Fprintf(os.Stderr, \"starting main\\n\")")?;
    for k in 0..cfg.num_packages {
        if !mask_allows(&cfg.pkg_mask, k) {
            continue;
        }
        let cp = s.caller_pkg(k);
        for i in 0..cfg.num_functions {
            if !mask_allows(&cfg.fcn_mask, i) {
                continue;
            }
            writeln!(fm, "{cp}.Caller{i}(\"normal\")")?;
            if cfg.tunables.do_reflect_call {
                writeln!(fm, "{cp}.Caller{i}(\"reflect\")")?;
            }
        }
    }
    writeln!(fm, "if {up}.FailCount != 0 {{")?;
    fm.indent();
    writeln!(fm, "fmt.Fprintf(os.Stderr, \"FAILURES: %d\\n\", {up}.FailCount)")?;
    writeln!(fm, "os.Exit(2)")?;
    fm.dedent();
    writeln!(fm, "}}")?;
    writeln!(
        fm,
        "fmt.Fprintf(os.Stderr, \"finished {} tests\\n\")",
        cfg.num_functions * cfg.num_packages
    )?;
    fm.dedent();
    writeln!(fm, "}}")?;
    Ok(fm.finish())
}

fn create_file(path: &Utf8Path, header: &str) -> Result<fs::File, GenerateError> {
    debug!("opening {path}");
    let mut file = fs::File::create(path)?;
    file.write_all(header.as_bytes())?;
    Ok(file)
}

/// Generate the whole self-checking program. Returns the count of
/// generator-internal errors (value-counter drift, type-name collisions);
/// filesystem problems are fatal.
pub fn generate(cfg: &Config) -> Result<usize, GenerateError> {
    cfg.tunables.check()?;
    let mut s = GenState::new(cfg);
    let ipref = cfg.ipref();

    info!(
        "generating {} packages x {} functions into {}",
        cfg.num_packages, cfg.num_functions, cfg.out_dir
    );
    fs::create_dir_all(&cfg.out_dir)?;

    // utils package
    let up = s.utils_pkg();
    let utils_dir = cfg.out_dir.join(&up);
    fs::create_dir_all(&utils_dir)?;
    {
        let mut f = create_file(
            &utils_dir.join(format!("{up}.go")),
            &file_header(&up, &[], &ipref, false),
        )?;
        f.write_all(emit_utils(cfg.max_fail).as_bytes())?;
    }

    // test packages
    let mut seed = cfg.seed;
    for k in 0..cfg.num_packages {
        let pkg_ok = mask_allows(&cfg.pkg_mask, k);
        s.pkidx = k;
        s.reset_helpers();

        let mut files = if pkg_ok {
            let cp = s.caller_pkg(k);
            let kp = s.checker_pkg(k);
            let caller_dir = cfg.out_dir.join(&cp);
            let checker_dir = cfg.out_dir.join(&kp);
            fs::create_dir_all(&caller_dir)?;
            fs::create_dir_all(&checker_dir)?;

            let mut caller_imports: Vec<&str> = vec![kp.as_str(), up.as_str()];
            if cfg.tunables.do_reflect_call {
                caller_imports.push("reflect");
            }
            let mut checker_imports: Vec<&str> = vec![up.as_str()];
            if cfg.force_stack_growth {
                caller_imports.push("unsafe");
                checker_imports.push("unsafe");
            }
            let caller_file = create_file(
                &caller_dir.join(format!("{cp}.go")),
                &file_header(&cp, &caller_imports, &ipref, cfg.force_stack_growth),
            )?;
            let checker_file = create_file(
                &checker_dir.join(format!("{kp}.go")),
                &file_header(&kp, &checker_imports, &ipref, cfg.force_stack_growth),
            )?;
            Some((caller_file, checker_file))
        } else {
            None
        };

        for i in 0..cfg.num_functions {
            let doemit = pkg_ok && mask_allows(&cfg.fcn_mask, i);
            let (next_seed, caller_text, checker_text) = s.gen_pair(i, k, seed, doemit)?;
            seed = next_seed;
            if doemit {
                let (caller_file, checker_file) =
                    files.as_mut().expect("emitting into a masked package");
                caller_file.write_all(caller_text.as_bytes())?;
                checker_file.write_all(checker_text.as_bytes())?;
            }
        }

        // Minimization can strip every test function from a package; a
        // dummy reference keeps the utils import alive.
        if let Some((caller_file, checker_file)) = &mut files {
            let dummy = format!("\n// dummy\nvar Dummy {up}.UtilsType\n");
            caller_file.write_all(dummy.as_bytes())?;
            checker_file.write_all(dummy.as_bytes())?;
        }
    }

    // main package
    {
        let mut main_imports: Vec<String> = vec!["fmt".to_string(), "os".to_string()];
        let mut caller_pkgs = Vec::new();
        for k in 0..cfg.num_packages {
            if mask_allows(&cfg.pkg_mask, k) {
                caller_pkgs.push(s.caller_pkg(k));
            }
        }
        main_imports.extend(caller_pkgs);
        main_imports.push(up.clone());
        let import_refs: Vec<&str> = main_imports.iter().map(|s| s.as_str()).collect();
        let mut f = create_file(
            &cfg.out_dir.join(format!("{}Main.go", cfg.tag)),
            &file_header("main", &import_refs, &ipref, false),
        )?;
        f.write_all(emit_main(cfg, &s)?.as_bytes())?;
    }

    // module manifest
    {
        let mut f = fs::File::create(cfg.out_dir.join("go.mod"))?;
        writeln!(f, "module {}\n\ngo 1.17", cfg.pkg_path)?;
    }

    info!("generation complete, {} errors", s.errs);
    Ok(s.errs)
}
