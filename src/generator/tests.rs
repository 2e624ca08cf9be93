use super::*;
use crate::parm::NumTag;

fn state_with(tunables: Tunables) -> GenState {
    let cfg = Config {
        tunables,
        ..Config::default()
    };
    GenState::new(&cfg)
}

/// Like gen_pair, but hands the descriptor back for inspection.
fn emit_pair(s: &mut GenState, fidx: usize, pidx: usize, seed: u64) -> (FuncDef, String, String) {
    s.tunables = s.base_tunables.clone();
    s.tstack.clear();
    s.pkidx = pidx;
    s.wr = WrapRand::new(seed, false);
    let mut fd = s.gen_func(fidx, pidx);
    s.wr = WrapRand::new(seed, false);
    let caller = s.emit_caller(&mut fd, pidx).unwrap();
    let wr_caller = std::mem::replace(&mut s.wr, WrapRand::new(seed, false));
    let checker = s.emit_checker(&fd, pidx, true).unwrap();
    s.wr.check(&wr_caller);
    (fd, caller, checker)
}

fn walk_parm(p: &Parm, visit: &mut dyn FnMut(&Parm)) {
    visit(p);
    match &p.kind {
        ParmKind::Num(_) | ParmKind::Str => {}
        ParmKind::Pointer(to) => walk_parm(to, visit),
        ParmKind::Array(ap) => walk_parm(&ap.eltype, visit),
        ParmKind::Struct(sp) => {
            for f in &sp.fields {
                walk_parm(f, visit);
            }
        }
        ParmKind::Map(mp) => {
            walk_parm(&mp.keytype, visit);
            walk_parm(&mp.valtype, visit);
        }
        ParmKind::Typedef(tp) => walk_parm(&tp.target, visit),
    }
}

fn contains_pointer(p: &Parm) -> bool {
    let mut found = false;
    walk_parm(p, &mut |q| {
        if matches!(q.kind, ParmKind::Pointer(_)) {
            found = true;
        }
    });
    found
}

#[test]
fn stream_and_value_agreement_basic() {
    let mut s = state_with(Tunables::default());
    for i in 0..300 {
        // emit_pair panics if the two streams disagree on draw counts
        emit_pair(&mut s, i, i, i as u64);
    }
    assert_eq!(s.errs, 0, "{} errors during generation", s.errs);
}

#[test]
fn stream_agreement_map_heavy_mix() {
    let mut t = Tunables::default();
    t.type_fractions = [10, 10, 30, 10, 15, 10, 5, 0, 10];
    t.check().unwrap();
    let mut s = state_with(t);
    for i in 0..300 {
        emit_pair(&mut s, i, i, 1000 + i as u64);
    }
    assert_eq!(s.errs, 0);
}

#[test]
fn stream_agreement_pointer_heavy_mix() {
    let mut t = Tunables::default();
    t.type_fractions = [10, 10, 0, 40, 15, 10, 5, 0, 10];
    t.taken_fraction = 60;
    t.func_call_val_fraction = 30;
    t.check().unwrap();
    let mut s = state_with(t);
    for i in 0..300 {
        emit_pair(&mut s, i, i, 2000 + i as u64);
    }
    assert_eq!(s.errs, 0);
}

#[test]
fn control_semantics() {
    let mut t = Tunables::default();
    t.recur_perc = 100;
    let mut s = state_with(t);
    let mut saw_recur = false;
    for i in 0..200 {
        let (fd, caller, checker) = emit_pair(&mut s, i, 0, 3000 + i as u64);
        let nctl = fd.params.iter().filter(|p| p.is_control()).count();
        assert!(nctl <= 1, "more than one control parameter in Test{i}");
        if !fd.recur {
            continue;
        }
        saw_recur = true;
        assert_eq!(nctl, 1, "recursive Test{i} lacks a control parameter");
        let ci = fd.params.iter().position(|p| p.is_control()).unwrap();
        let ctl = &fd.params[ci];
        assert!(!ctl.blank);
        assert!(matches!(
            &ctl.kind,
            ParmKind::Num(np) if np.tag == NumTag::Int || np.tag == NumTag::Uint
        ));
        // caller seeds the counter with 10
        assert!(
            caller.contains(&format!("var p{ci} {} = 10", ctl.type_name())),
            "caller for Test{i} does not seed the control parameter"
        );
        // checker guards on zero and recurs with the counter decremented
        assert!(checker.contains("== 0 {"));
        assert!(checker.contains("// recursive call"));
        assert!(checker.contains("-1"));
    }
    assert!(saw_recur, "no recursive function in 200 tries");
    assert_eq!(s.errs, 0);
}

#[test]
fn map_keys_stay_comparable() {
    let mut t = Tunables::default();
    t.type_fractions = [10, 10, 30, 10, 15, 10, 5, 0, 10];
    t.check().unwrap();
    let mut s = state_with(t);
    let mut saw_map = false;
    for i in 0..200 {
        let (fd, _, _) = emit_pair(&mut s, i, 0, 4000 + i as u64);
        for def in &fd.mapdefs {
            let ParmKind::Map(mp) = &def.kind else {
                unreachable!("mapdefs holds maps")
            };
            saw_map = true;
            walk_parm(&mp.keytype, &mut |q| match &q.kind {
                ParmKind::Map(_) => panic!("map key contains a map in Test{i}"),
                ParmKind::Pointer(_) => panic!("map key contains a pointer in Test{i}"),
                ParmKind::Array(ap) if ap.slice => {
                    panic!("map key contains a slice in Test{i}")
                }
                _ => {}
            });
        }
    }
    assert!(saw_map, "no map generated in 200 tries");
    assert_eq!(s.errs, 0);
}

#[test]
fn receivers_never_contain_pointers() {
    let mut t = Tunables::default();
    t.method_perc = 100;
    let mut s = state_with(t);
    let mut saw_method = false;
    for i in 0..200 {
        let (fd, _, _) = emit_pair(&mut s, i, 0, 5000 + i as u64);
        if let Some(rcvr) = &fd.receiver {
            saw_method = true;
            assert!(
                !contains_pointer(rcvr),
                "receiver of Test{i} contains a pointer"
            );
        }
    }
    assert!(saw_method);
    assert_eq!(s.errs, 0);
}

#[test]
fn pointer_method_receivers() {
    let mut t = Tunables::default();
    t.method_perc = 100;
    t.pointer_method_perc = 100;
    let mut s = state_with(t);
    let mut checked = false;
    for i in 0..100 {
        let (fd, caller, checker) = emit_pair(&mut s, i, 0, 6000 + i as u64);
        let rcvr = fd.receiver.as_ref().expect("method_perc=100 yields methods");
        assert!(fd.pointer_method);
        if rcvr.blank {
            assert!(checker.contains(&format!("func (_ *{})", rcvr.type_name())));
            continue;
        }
        checked = true;
        assert!(
            checker.contains(&format!("func (rcvr *{})", rcvr.type_name())),
            "checker for Test{i} lacks the pointer receiver"
        );
        assert!(
            caller.contains("reflect.ValueOf(&rcvr)"),
            "reflect path for Test{i} must see the pointer method set"
        );
    }
    assert!(checked);
    assert_eq!(s.errs, 0);
}

#[test]
fn blank_parameters_consume_but_never_compare() {
    let mut t = Tunables::default();
    t.blank_perc = 60;
    t.recur_perc = 0;
    let mut s = state_with(t);
    let mut saw_blank = false;
    for i in 0..100 {
        let (fd, caller, checker) = emit_pair(&mut s, i, 0, 7000 + i as u64);
        for (pi, p) in fd.params.iter().enumerate() {
            if !p.blank {
                continue;
            }
            saw_blank = true;
            // the caller still constructs and passes the value
            assert!(caller.contains(&format!("p{pi} := ")));
            // the checker declares the slot blank and emits no per-leaf
            // expected-value locals for it
            assert!(checker.contains(&format!("_ {}", p.type_name())));
            assert!(!checker.contains(&format!("p{pi}f0c := ")));
        }
    }
    assert!(saw_blank, "no blank parameter in 100 tries");
    // value counters still advanced identically on both sides
    assert_eq!(s.errs, 0);
}

#[test]
fn defer_checks_cover_params() {
    let mut t = Tunables::default();
    t.defer_fraction = 100;
    let mut s = state_with(t);
    let mut saw_defer = false;
    for i in 0..50 {
        let (fd, _, checker) = emit_pair(&mut s, i, 0, 8000 + i as u64);
        if fd.params.is_empty() {
            continue;
        }
        saw_defer = true;
        assert!(
            checker.contains("defer func("),
            "Test{i} has params but no defer check"
        );
    }
    assert!(saw_defer);
    assert_eq!(s.errs, 0);
}

#[test]
fn genval_helpers_stay_on_the_checker_side() {
    let mut t = Tunables::default();
    t.func_call_val_fraction = 100;
    let mut s = state_with(t);
    let mut saw_genval = false;
    for i in 0..50 {
        let (_, caller, checker) = emit_pair(&mut s, i, 0, 9000 + i as u64);
        assert!(
            !caller.contains("genval_"),
            "caller text references an unexported checker helper"
        );
        if checker.contains("genval_") {
            saw_genval = true;
        }
    }
    assert!(saw_genval);
    assert_eq!(s.errs, 0);
}

#[test]
fn heap_escapes_reach_a_global() {
    let mut t = Tunables::default();
    t.taken_fraction = 100;
    t.addr_fractions = [0, 0, 0, 100];
    t.blank_perc = 0;
    let mut s = state_with(t);
    let mut saw_escape = false;
    for i in 0..50 {
        let (fd, _, checker) = emit_pair(&mut s, i, 0, 10000 + i as u64);
        if !fd.params.is_empty() {
            saw_escape = true;
            assert!(checker.contains("ap0 := &p0"));
            assert!(
                checker.contains("gvar_"),
                "heap-escaped params of Test{i} never reach a global"
            );
        }
    }
    assert!(saw_escape);
    assert_eq!(s.errs, 0);
}

#[test]
fn masked_functions_roll_back_their_helpers() {
    // Emitting the same sequence with function 3 suppressed must leave
    // every other function's text untouched; leaked helper names would
    // shift the numbering of later helpers.
    let mut t = Tunables::default();
    t.type_fractions = [10, 10, 10, 30, 15, 10, 5, 0, 10];
    t.taken_fraction = 80;
    t.func_call_val_fraction = 40;
    t.check().unwrap();

    // Helper definitions may migrate to a later function's flush when the
    // masked function introduced them first, so checker texts are compared
    // only up to the flush marker.
    fn body_of(checker: &str) -> &str {
        checker
            .split("// begin addr taken helpers")
            .next()
            .unwrap_or(checker)
    }

    let mut full = state_with(t.clone());
    let mut masked = state_with(t);
    let mut seed_a = 42;
    let mut seed_b = 42;
    for i in 0..10 {
        let (na, caller_a, checker_a) = full.gen_pair(i, 0, seed_a, true).unwrap();
        let (nb, caller_b, checker_b) = masked.gen_pair(i, 0, seed_b, i != 3).unwrap();
        seed_a = na;
        seed_b = nb;
        if i == 3 {
            continue;
        }
        assert_eq!(caller_a, caller_b, "caller text for Test{i} drifted");
        assert_eq!(
            body_of(&checker_a),
            body_of(&checker_b),
            "checker body for Test{i} drifted"
        );
    }
    assert_eq!(full.errs, 0);
    assert_eq!(masked.errs, 0);
}

#[test]
fn bucket_indices_cover_all_kinds() {
    // A descriptor built with complex/byte-only fractions stays inside the
    // numeric family, confirming the bucket order.
    let mut t = Tunables::default();
    t.type_fractions = [0, 0, 0, 0, 0, 0, 50, 50, 0];
    t.check().unwrap();
    let mut s = state_with(t);
    for i in 0..20 {
        let (fd, _, _) = emit_pair(&mut s, i, 0, 11000 + i as u64);
        for p in fd.params.iter().chain(&fd.returns) {
            match &p.kind {
                ParmKind::Num(np) => {
                    assert!(matches!(np.tag, NumTag::Complex | NumTag::Byte));
                }
                other => panic!("unexpected kind {other:?} from complex/byte fractions"),
            }
        }
    }
}
