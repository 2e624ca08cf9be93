//! The checker-side emitter.
//!
//! `Test{N}` lives in the checker package. It grows the stack, checks every
//! parameter leaf against the expected literal, optionally re-checks them
//! in a deferred closure, and constructs the return values (directly or
//! through a recursive tail call when a control parameter is present).

use std::fmt::Write;

use tracing::error;

use super::{FuncDef, GenState};
use crate::error::GenerateError;
use crate::fivemat::{Fivemat, INDENT};
use crate::parm::{deref_chain, AddrTaken, Parm, ParmKind};

impl GenState {
    pub fn emit_checker(
        &mut self,
        f: &FuncDef,
        pidx: usize,
        emit: bool,
    ) -> Result<String, GenerateError> {
        let mut fm = Fivemat::new(INDENT);
        let up = self.utils_pkg();

        self.emit_struct_and_array_defs(f, &mut fm)?;

        writeln!(fm, "// {} returns {} params", f.returns.len(), f.params.len())?;
        if !self.pragma.is_empty() {
            writeln!(fm, "//go:{}", self.pragma)?;
        }
        writeln!(fm, "//go:noinline")?;

        let mut sig = String::from("func");
        if f.method {
            let rcvr = f.receiver.as_ref().expect("method function has a receiver");
            let n = if rcvr.blank { "_" } else { "rcvr" };
            let star = if f.pointer_method { "*" } else { "" };
            write!(sig, " ({n} {star}{})", rcvr.type_name())?;
        }
        write!(sig, " Test{}(", f.idx)?;
        for (pi, p) in f.params.iter().enumerate() {
            if pi != 0 {
                sig.push_str(", ");
            }
            let n = if p.blank {
                "_".to_string()
            } else {
                format!("p{pi}")
            };
            write!(sig, "{}", p.declare(&n, "", false))?;
        }
        sig.push(')');
        if !f.returns.is_empty() {
            sig.push_str(" (");
            for (ri, r) in f.returns.iter().enumerate() {
                if ri != 0 {
                    sig.push_str(", ");
                }
                write!(sig, "{}", r.declare(&format!("r{ri}"), "", false))?;
            }
            sig.push(')');
        }
        writeln!(fm, "{sig} {{")?;
        fm.indent();

        // consume some stack space, so as to trigger morestack
        writeln!(fm, "var pad [{}]uint64", f.rstack)?;
        writeln!(fm, "pad[{up}.FailCount&0x1]++")?;

        let mut value: usize = 1;

        self.wr.checkpoint("before map key temps");
        value = self.emit_map_key_tmps(f, &mut fm, pidx, value, false)?;

        // return constants
        self.wr.checkpoint("before return constants");
        for (ri, r) in f.returns.iter().enumerate() {
            value = self.emit_var_assign(f, &mut fm, r, &format!("rc{ri}"), value, false)?;
        }

        // Bind addresses of address-taken params/returns once at entry;
        // heap-escaped ones also leak into a package global.
        let mut acounts = [0usize; 2];
        let lists: [(&[Parm], &str); 2] = [(f.params.as_slice(), "p"), (f.returns.as_slice(), "r")];
        for (li, &(list, n)) in lists.iter().enumerate() {
            for (i, p) in list.iter().enumerate() {
                if p.addr_taken == AddrTaken::Not {
                    continue;
                }
                acounts[li] += 1;
                writeln!(fm, "a{n}{i} := &{n}{i}")?;
                if p.addr_taken == AddrTaken::Heap {
                    let gv = self.gen_glob_var(p);
                    writeln!(fm, "{gv} = a{n}{i}")?;
                }
            }
        }

        self.wr.checkpoint("before param checks");
        let (_value, have_control) = self.emit_param_checks(f, &mut fm, pidx, value)?;

        if self.tunables.do_defer && f.dodefc < self.tunables.defer_fraction {
            self.wr.checkpoint("before defer checks");
            self.emit_defer_checks(f, &mut fm)?;
        }

        self.emit_return(f, &mut fm, have_control)?;

        writeln!(
            fm,
            "// {} addr-taken params, {} addr-taken returns",
            acounts[0], acounts[1]
        )?;
        fm.dedent();
        writeln!(fm, "}}")?;
        writeln!(fm)?;

        // helpers demanded by this function
        self.flush_helpers(f, &mut fm, emit)?;
        Ok(fm.finish())
    }

    /// Declarations for every named type this function introduced, plus an
    /// Equal function for each one that can't be compared with `==`, plus
    /// the map key holder struct.
    fn emit_struct_and_array_defs(
        &mut self,
        f: &FuncDef,
        fm: &mut Fivemat,
    ) -> Result<(), GenerateError> {
        for def in &f.structdefs {
            if let ParmKind::Struct(sp) = &def.kind {
                writeln!(fm, "type {} struct {{", sp.sname)?;
                fm.indent();
                for (fi, field) in sp.fields.iter().enumerate() {
                    writeln!(fm, "{}", field.declare(&sp.field_name(fi), "", false))?;
                }
                fm.dedent();
                writeln!(fm, "}}")?;
                writeln!(fm)?;
                self.emit_compare_func(f, fm, def)?;
            }
        }
        for def in &f.arraydefs {
            if let ParmKind::Array(ap) = &def.kind {
                writeln!(
                    fm,
                    "type {} [{}]{}",
                    ap.aname,
                    ap.len_spec(),
                    ap.eltype.type_name()
                )?;
                writeln!(fm)?;
                self.emit_compare_func(f, fm, def)?;
            }
        }
        for def in &f.mapdefs {
            if let ParmKind::Map(mp) = &def.kind {
                writeln!(
                    fm,
                    "type {} map[{}]{}",
                    mp.aname,
                    mp.keytype.type_name(),
                    mp.valtype.type_name()
                )?;
                writeln!(fm)?;
                self.emit_compare_func(f, fm, def)?;
            }
        }
        for def in &f.typedefs {
            if let ParmKind::Typedef(tp) = &def.kind {
                writeln!(fm, "type {} {}", tp.aname, tp.target.type_name())?;
                writeln!(fm)?;
                self.emit_compare_func(f, fm, def)?;
            }
        }
        if !f.mapkeyts.is_empty() {
            writeln!(fm, "type {} struct {{", f.mapkeyts)?;
            fm.indent();
            for (i, kt) in f.mapkeytypes.iter().enumerate() {
                writeln!(fm, "{}", kt.declare(&f.mapkeytmps[i], "", false))?;
            }
            fm.dedent();
            writeln!(fm, "}}")?;
            writeln!(fm)?;
        }
        Ok(())
    }

    /// Leaf-wise equality function for a type that transitively contains a
    /// pointer. Becomes a method on the map key holder when one exists, so
    /// map leaves can reach their key temporaries.
    fn emit_compare_func(
        &mut self,
        f: &FuncDef,
        fm: &mut Fivemat,
        p: &Parm,
    ) -> Result<(), GenerateError> {
        if !p.has_pointer() {
            return Ok(());
        }
        let tn = p.type_name();
        writeln!(fm, "// equal func for {tn}")?;
        writeln!(fm, "//go:noinline")?;
        let rcvr = if f.mapkeyts.is_empty() {
            String::new()
        } else {
            format!("(mkt *{}) ", f.mapkeyts)
        };
        writeln!(fm, "func {rcvr}Equal{tn}(left {tn}, right {tn}) bool {{")?;
        fm.indent();
        let mut expr = String::from("return ");
        let numel = p.num_elements();
        let mut ncmp = 0;
        for i in 0..numel {
            let (lelref, lelparm) = p.gen_elem_ref(i, "left");
            let (relref, _) = p.gen_elem_ref(i, "right");
            if lelref.is_empty() || lelref == "_" {
                continue;
            }
            let (basep, star) = deref_chain(lelparm);
            if basep.num_elements() == 0 {
                continue;
            }
            if ncmp != 0 {
                expr.push_str(" && ");
            }
            ncmp += 1;
            if basep.has_pointer() {
                let efn = self.eq_func_ref(f, basep, false);
                write!(expr, "{efn}({star}{lelref}, {star}{relref})")?;
            } else {
                write!(expr, "{star}{lelref} == {star}{relref}")?;
            }
        }
        if ncmp == 0 {
            expr.push_str("true");
        }
        writeln!(fm, "{expr}")?;
        fm.dedent();
        writeln!(fm, "}}")?;
        writeln!(fm)?;
        Ok(())
    }

    /// The parameter-checking pass: walk every non-blank, non-control
    /// parameter leaf by leaf, comparing against freshly generated expected
    /// literals. After each parameter the running value counter must match
    /// the checkpoint the caller emitter recorded.
    fn emit_param_checks(
        &mut self,
        f: &FuncDef,
        fm: &mut Fivemat,
        pidx: usize,
        mut value: usize,
    ) -> Result<(usize, bool), GenerateError> {
        let mut have_control = false;
        let mut dangling = Vec::new();
        let cm = f.complexity_measure();
        for (pi, p) in f.params.iter().enumerate() {
            // matching draw for the caller's per-parameter coin
            self.wr.intn(100);
            if p.is_control() {
                writeln!(fm, "if {} == 0 {{", self.gen_param_ref(p, pi))?;
                fm.indent();
                self.emit_return(f, fm, false)?;
                fm.dedent();
                writeln!(fm, "}}")?;
                have_control = true;
            } else if p.blank {
                // value consumed but never compared
                let (valstr, next) = self.gen_value(f, p, value, false);
                value = next;
                if f.recur {
                    writeln!(fm, "brc{pi} := {valstr}")?;
                } else {
                    writeln!(fm, "_ = {valstr}")?;
                }
            } else {
                let numel = p.num_elements();
                let cel = p.checkable_elements();
                for i in 0..numel {
                    let baseref = self.gen_param_ref(p, pi);
                    let (elref, elparm) = p.gen_elem_ref(i, &baseref);
                    let (valstr, next) = self.gen_value(f, elparm, value, false);
                    value = next;
                    if elref.is_empty() || elref == "_" || cel == 0 {
                        writeln!(fm, "// skip: {valstr}")?;
                        continue;
                    }
                    let (basep, _) = deref_chain(elparm);
                    if basep.num_elements() == 0 {
                        continue;
                    }
                    let cvar = format!("p{pi}f{i}c");
                    writeln!(fm, "{cvar} := {valstr}")?;
                    self.emit_param_elem_check(f, fm, elparm, &elref, &cvar, pi as isize, i, cm)?;
                }
                if p.addr_taken != AddrTaken::Not {
                    dangling.push(pi);
                }
            }
            if f.values.get(pi) != Some(&value) {
                error!(
                    "internal error: checker/caller value mismatch after param {pi} \
                     func Test{} pkg {}: caller {:?} checker {value}",
                    f.idx,
                    self.checker_pkg(pidx),
                    f.values.get(pi)
                );
                self.errs += 1;
            }
        }
        for pi in dangling {
            writeln!(fm, "_ = ap{pi} // ref")?;
        }

        // receiver value check
        if f.method {
            let rcvr = f.receiver.as_ref().expect("method function has a receiver");
            let base = if f.pointer_method { "(*rcvr)" } else { "rcvr" };
            let numel = rcvr.num_elements();
            for i in 0..numel {
                let (elref, elparm) = rcvr.gen_elem_ref(i, base);
                let (valstr, next) = self.gen_value(f, elparm, value, false);
                value = next;
                if elref.is_empty() || elref.starts_with('_') || rcvr.blank {
                    continue;
                }
                let (basep, _) = deref_chain(elparm);
                if basep.num_elements() == 0 {
                    continue;
                }
                let cvar = format!("rcvrf{i}c");
                writeln!(fm, "{cvar} := {valstr}")?;
                self.emit_param_elem_check(f, fm, elparm, &elref, &cvar, -1, i, cm)?;
            }
        }

        Ok((value, have_control))
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_param_elem_check(
        &mut self,
        f: &FuncDef,
        fm: &mut Fivemat,
        p: &Parm,
        pvar: &str,
        cvar: &str,
        paramidx: isize,
        elemidx: usize,
        cm: usize,
    ) -> Result<(), GenerateError> {
        let (basep, star) = deref_chain(p);
        if basep.num_elements() == 0 {
            return Ok(());
        }
        if basep.has_pointer() {
            let efn = self.eq_func_ref(f, basep, false);
            writeln!(fm, "if !{efn}({star}{pvar}, {star}{cvar}) {{")?;
        } else {
            writeln!(fm, "if {star}{pvar} != {star}{cvar} {{")?;
        }
        fm.indent();
        writeln!(
            fm,
            "{}.NoteFailureElem({cm}, {}, {}, \"{}\", \"parm\", {paramidx}, {elemidx}, false, pad[0])",
            self.utils_pkg(),
            self.pkidx,
            f.idx,
            self.checker_pkg(self.pkidx)
        )?;
        writeln!(fm, "return")?;
        fm.dedent();
        writeln!(fm, "}}")?;
        Ok(())
    }

    /// Deferred re-check of the parameters: each one is either passed into
    /// the function literal or captured by the closure (per the coins drawn
    /// at descriptor time), and the closure re-runs the same leaf checks
    /// against the expected-value locals bound by the main pass.
    fn emit_defer_checks(&mut self, f: &FuncDef, fm: &mut Fivemat) -> Result<(), GenerateError> {
        if f.params.is_empty() {
            return Ok(());
        }
        let passed: Vec<bool> = f.dodefp.iter().map(|&coin| coin < 50).collect();
        let cm = f.complexity_measure();

        let mut hdr = String::from("defer func(");
        let mut pc = 0;
        for (pi, p) in f.params.iter().enumerate() {
            if p.is_control() || p.blank {
                continue;
            }
            if passed[pi] {
                if pc != 0 {
                    hdr.push_str(", ");
                }
                write!(hdr, "{}", p.declare(&format!("p{pi}"), "", false))?;
                pc += 1;
            }
        }
        writeln!(fm, "{hdr}) {{")?;
        fm.indent();

        for (pi, p) in f.params.iter().enumerate() {
            if p.is_control() || p.blank {
                continue;
            }
            let which = if passed[pi] { "passed" } else { "captured" };
            writeln!(fm, "// check parm {which}")?;
            let numel = p.num_elements();
            let cel = p.checkable_elements();
            for i in 0..numel {
                let baseref = self.gen_param_ref(p, pi);
                let (elref, elparm) = p.gen_elem_ref(i, &baseref);
                if elref.is_empty() || elref == "_" || cel == 0 {
                    continue;
                }
                let (basep, _) = deref_chain(elparm);
                if basep.num_elements() == 0 {
                    continue;
                }
                let cvar = format!("p{pi}f{i}c");
                self.emit_param_elem_check(f, fm, elparm, &elref, &cvar, pi as isize, i, cm)?;
            }
        }
        fm.dedent();

        let mut tail = String::from("}(");
        let mut pc = 0;
        for (pi, p) in f.params.iter().enumerate() {
            if p.is_control() || p.blank {
                continue;
            }
            if passed[pi] {
                if pc != 0 {
                    tail.push_str(", ");
                }
                write!(tail, "p{pi}")?;
                pc += 1;
            }
        }
        writeln!(fm, "{tail})")?;
        writeln!(fm)?;
        Ok(())
    }
}
