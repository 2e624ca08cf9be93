//! End-to-end tests of the driver: emitted layout, determinism, masking,
//! and (when a Go toolchain is installed) building and running the
//! generated program.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::process::Command;

use abi_fuzzgen::{generate, Config, Tunables};

fn go_toolchain_available() -> bool {
    Command::new("go")
        .arg("version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Build and run the generated program with `go run .`; the harness prints
/// its verdict to stderr.
fn run_generated(dir: &Path) -> String {
    let out = Command::new("go")
        .arg("run")
        .arg(".")
        .current_dir(dir)
        .output()
        .expect("failed to spawn go");
    let stderr = String::from_utf8_lossy(&out.stderr).into_owned();
    assert!(
        out.status.success(),
        "generated program failed in {}:\n{stderr}",
        dir.display()
    );
    stderr
}

fn read_tree(dir: &Path) -> Vec<(String, Vec<u8>)> {
    let mut files = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(d) = stack.pop() {
        for entry in fs::read_dir(&d).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                let rel = path.strip_prefix(dir).unwrap().to_string_lossy().into_owned();
                files.push((rel, fs::read(&path).unwrap()));
            }
        }
    }
    files.sort();
    files
}

#[test]
fn output_is_deterministic() {
    let td1 = tempfile::tempdir().unwrap();
    let td2 = tempfile::tempdir().unwrap();
    for td in [&td1, &td2] {
        let cfg = Config {
            out_dir: td.path().to_str().unwrap().into(),
            pkg_path: "determinism".to_string(),
            num_functions: 20,
            num_packages: 2,
            seed: 12345,
            ..Config::default()
        };
        assert_eq!(generate(&cfg).unwrap(), 0);
    }
    let t1 = read_tree(td1.path());
    let t2 = read_tree(td2.path());
    assert_eq!(t1.len(), t2.len());
    for ((n1, b1), (n2, b2)) in t1.iter().zip(t2.iter()) {
        assert_eq!(n1, n2);
        assert_eq!(b1, b2, "{n1} differs between identical runs");
    }
}

#[test]
fn emitted_layout_contract() {
    let td = tempfile::tempdir().unwrap();
    let cfg = Config {
        out_dir: td.path().to_str().unwrap().into(),
        pkg_path: "layout".to_string(),
        num_functions: 10,
        num_packages: 10,
        seed: 0,
        ..Config::default()
    };
    assert_eq!(generate(&cfg).unwrap(), 0);

    for k in 0..10 {
        assert!(td.path().join(format!("genCaller{k}/genCaller{k}.go")).is_file());
        assert!(td.path().join(format!("genChecker{k}/genChecker{k}.go")).is_file());
    }
    assert!(td.path().join("genUtils/genUtils.go").is_file());
    assert!(td.path().join("genMain.go").is_file());

    let gomod = fs::read_to_string(td.path().join("go.mod")).unwrap();
    assert!(gomod.starts_with("module layout\n"));

    // the failure-report line format is consumed by the minimization
    // scripts, so it is part of the contract
    let utils = fs::read_to_string(td.path().join("genUtils/genUtils.go")).unwrap();
    assert!(utils.contains("\"Error: fail %s |%d|%d|%d| =%s.Test%d= %s %d\\n\""));
    assert!(utils.contains("\"Error: fail %s |%d|%d|%d| =%s.Test%d= %s %d elem %d\\n\""));
    assert!(utils.contains("type UtilsType int"));

    // main drives all 100 callers, each in both modes
    let main_text = fs::read_to_string(td.path().join("genMain.go")).unwrap();
    assert_eq!(main_text.matches("(\"normal\")").count(), 100);
    assert_eq!(main_text.matches("(\"reflect\")").count(), 100);
    assert!(main_text.contains("genCaller9.Caller9(\"normal\")"));
    assert!(main_text.contains("finished 100 tests"));

    let caller0 = fs::read_to_string(td.path().join("genCaller0/genCaller0.go")).unwrap();
    assert!(caller0.starts_with("package genCaller0\n"));
    assert!(caller0.contains("import \"layout/genChecker0\""));
    assert!(caller0.contains("import \"layout/genUtils\""));
}

#[test]
fn disabling_reflection_strips_the_reflect_path() {
    let td = tempfile::tempdir().unwrap();
    let mut tunables = Tunables::default();
    tunables.disable_reflect_call();
    let cfg = Config {
        out_dir: td.path().to_str().unwrap().into(),
        pkg_path: "noreflect".to_string(),
        num_functions: 20,
        num_packages: 1,
        seed: 12345,
        tunables,
        ..Config::default()
    };
    assert_eq!(generate(&cfg).unwrap(), 0);
    let caller = fs::read_to_string(td.path().join("genCaller0/genCaller0.go")).unwrap();
    assert!(!caller.contains("reflect"));
    let main_text = fs::read_to_string(td.path().join("genMain.go")).unwrap();
    assert!(!main_text.contains("(\"reflect\")"));
}

/// Split a caller/checker file into per-function chunks keyed by the
/// function index.
fn function_chunks<'a>(text: &'a str, opener: &str) -> Vec<(usize, &'a str)> {
    let mut starts: Vec<(usize, usize)> = Vec::new();
    for (pos, _) in text.match_indices(opener) {
        let rest = &text[pos + opener.len()..];
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        if let Ok(idx) = digits.parse() {
            starts.push((pos, idx));
        }
    }
    let mut chunks = Vec::new();
    for (i, &(pos, idx)) in starts.iter().enumerate() {
        let end = starts.get(i + 1).map(|&(p, _)| p).unwrap_or(text.len());
        chunks.push((idx, &text[pos..end]));
    }
    chunks
}

/// Every helper name mentioned in the text must also be defined in it.
fn assert_no_dangling_helpers(text: &str) {
    for prefix in ["deref_", "retassign_", "New_", "gvar_", "genval_"] {
        let mut names = BTreeSet::new();
        for (pos, _) in text.match_indices(prefix) {
            let rest = &text[pos + prefix.len()..];
            let digits: String = rest.chars().take_while(|c| c.is_ascii_hexdigit()).collect();
            if !digits.is_empty() {
                names.insert(format!("{prefix}{digits}"));
            }
        }
        for name in names {
            let defined = text.contains(&format!("func {name}("))
                || text.contains(&format!(") {name}("))
                || text.contains(&format!("var {name} "));
            assert!(defined, "{name} is referenced but never defined");
        }
    }
}

#[test]
fn masking_excludes_functions_without_dangling_helpers() {
    let full_dir = tempfile::tempdir().unwrap();
    let masked_dir = tempfile::tempdir().unwrap();

    let base = Config {
        pkg_path: "masked".to_string(),
        num_functions: 50,
        num_packages: 1,
        seed: 12345,
        ..Config::default()
    };

    let full_cfg = Config {
        out_dir: full_dir.path().to_str().unwrap().into(),
        ..base.clone()
    };
    assert_eq!(generate(&full_cfg).unwrap(), 0);

    // allowlist of everything except Test3 and Test7
    let fcn_mask: BTreeSet<usize> = (0..50).filter(|i| *i != 3 && *i != 7).collect();
    let masked_cfg = Config {
        out_dir: masked_dir.path().to_str().unwrap().into(),
        fcn_mask,
        ..base
    };
    assert_eq!(generate(&masked_cfg).unwrap(), 0);

    let full_caller =
        fs::read_to_string(full_dir.path().join("genCaller0/genCaller0.go")).unwrap();
    let masked_caller =
        fs::read_to_string(masked_dir.path().join("genCaller0/genCaller0.go")).unwrap();
    let masked_checker =
        fs::read_to_string(masked_dir.path().join("genChecker0/genChecker0.go")).unwrap();

    assert!(!masked_caller.contains("func Caller3("));
    assert!(!masked_caller.contains("func Caller7("));
    assert!(!masked_checker.contains("func Test3("));
    assert!(!masked_checker.contains(" Test3("));
    assert!(!masked_checker.contains("func Test7("));

    // every surviving caller is byte-identical with the unmasked run
    let full_chunks: std::collections::BTreeMap<usize, &str> =
        function_chunks(&full_caller, "func Caller").into_iter().collect();
    let masked_chunks = function_chunks(&masked_caller, "func Caller");
    assert_eq!(masked_chunks.len(), 48);
    for (idx, chunk) in masked_chunks {
        assert_eq!(
            full_chunks[&idx], chunk,
            "caller text for Test{idx} drifted under masking"
        );
    }

    // suppressed helpers were rolled back, surviving refs all resolve
    assert_no_dangling_helpers(&masked_checker);

    let masked_main = fs::read_to_string(masked_dir.path().join("genMain.go")).unwrap();
    assert!(!masked_main.contains("Caller3("));
    assert!(!masked_main.contains("Caller7("));
}

#[test]
fn generated_program_builds_and_passes() {
    let td = tempfile::tempdir().unwrap();
    let cfg = Config {
        out_dir: td.path().to_str().unwrap().into(),
        pkg_path: "fuzzrun".to_string(),
        num_functions: 50,
        num_packages: 1,
        seed: 12345,
        ..Config::default()
    };
    assert_eq!(generate(&cfg).unwrap(), 0);

    if !go_toolchain_available() {
        eprintln!("skipping build+run: no go toolchain on PATH");
        return;
    }
    let stderr = run_generated(td.path());
    assert!(
        stderr.contains("finished 50 tests"),
        "unexpected harness output:\n{stderr}"
    );
}

#[test]
fn exhaustive_tunables_survey() {
    // Stages mirror the feature rollout: each adjusts the previous stage's
    // record, and every stage must yield a generatable (and, with a
    // toolchain, runnable) program.
    let stages: Vec<(&str, Box<dyn Fn(&mut Tunables)>)> = vec![
        (
            "minimal",
            Box::new(|t: &mut Tunables| {
                t.n_parm_range = 3;
                t.n_return_range = 3;
                t.struct_depth = 1;
                t.recur_perc = 0;
                t.method_perc = 0;
                t.do_reflect_call = false;
                t.do_defer = false;
                t.take_address = false;
            }),
        ),
        (
            "moreparms",
            Box::new(|t: &mut Tunables| {
                t.n_parm_range = 15;
                t.n_return_range = 7;
                t.struct_depth = 3;
            }),
        ),
        ("addrecur", Box::new(|t: &mut Tunables| t.recur_perc = 20)),
        (
            "addmethod",
            Box::new(|t: &mut Tunables| {
                t.method_perc = 25;
                t.pointer_method_perc = 30;
            }),
        ),
        (
            "addtakeaddr",
            Box::new(|t: &mut Tunables| {
                t.take_address = true;
                t.taken_fraction = 20;
            }),
        ),
        (
            "addreflect",
            Box::new(|t: &mut Tunables| t.do_reflect_call = true),
        ),
        (
            "adddefer",
            Box::new(|t: &mut Tunables| {
                t.do_defer = true;
                t.defer_fraction = 30;
            }),
        ),
    ];

    let have_go = go_toolchain_available();
    if !have_go {
        eprintln!("running survey without build+run: no go toolchain on PATH");
    }

    let mut tunables = Tunables::default();
    for (i, (name, adjust)) in stages.iter().enumerate() {
        adjust(&mut tunables);
        tunables.check().unwrap_or_else(|e| panic!("stage {name}: {e}"));
        let td = tempfile::tempdir().unwrap();
        let cfg = Config {
            out_dir: td.path().to_str().unwrap().into(),
            pkg_path: "survey".to_string(),
            num_functions: 10,
            num_packages: 10,
            seed: 9 + i as u64,
            tunables: tunables.clone(),
            ..Config::default()
        };
        let errs = generate(&cfg).unwrap_or_else(|e| panic!("stage {name}: {e}"));
        assert_eq!(errs, 0, "{errs} errors during stage {name}");
        if have_go {
            let stderr = run_generated(td.path());
            assert!(
                stderr.contains("finished 100 tests"),
                "stage {name} run failed:\n{stderr}"
            );
        }
    }
}

#[test]
fn forced_stack_growth_emits_the_runtime_hook() {
    let td = tempfile::tempdir().unwrap();
    let cfg = Config {
        out_dir: td.path().to_str().unwrap().into(),
        pkg_path: "sforce".to_string(),
        num_functions: 10,
        num_packages: 1,
        seed: 7,
        force_stack_growth: true,
        ..Config::default()
    };
    assert_eq!(generate(&cfg).unwrap(), 0);
    for file in ["genCaller0/genCaller0.go", "genChecker0/genChecker0.go"] {
        let text = fs::read_to_string(td.path().join(file)).unwrap();
        assert!(text.contains("import _ \"unsafe\""));
        assert!(text.contains("//go:linkname hackStack runtime.gcTestMoveStackOnNextCall"));
    }
    let caller = fs::read_to_string(td.path().join("genCaller0/genCaller0.go")).unwrap();
    assert!(caller.contains("hackStack() // force stack growth on next call"));
}
