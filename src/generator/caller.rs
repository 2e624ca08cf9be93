//! The caller-side emitter.
//!
//! `Caller{N}` constructs the expected return constants and the parameter
//! values, invokes `Test{N}` (directly, and optionally through reflection),
//! and checks the returned values against the constants.

use std::fmt::Write;

use super::{FuncDef, GenState};
use crate::error::GenerateError;
use crate::fivemat::{Fivemat, INDENT};
use crate::parm::{deref_chain, Parm};

impl GenState {
    pub fn emit_caller(&mut self, f: &mut FuncDef, pidx: usize) -> Result<String, GenerateError> {
        let mut fm = Fivemat::new(INDENT);
        let up = self.utils_pkg();

        writeln!(fm, "func Caller{}(mode string) {{", f.idx)?;
        fm.indent();
        writeln!(fm, "{up}.BeginFcn()")?;

        let mut value: usize = 1;
        let mut values: Vec<usize> = Vec::new();

        self.wr.checkpoint("before mapkeytmps");
        value = self.emit_map_key_tmps(f, &mut fm, pidx, value, true)?;

        // expected return constants
        self.wr.checkpoint("before return constants");
        for ri in 0..f.returns.len() {
            let r = f.returns[ri].clone();
            value = self.emit_var_assign(f, &mut fm, &r, &format!("c{ri}"), value, true)?;
        }

        // parameter values
        self.wr.checkpoint("before param constants");
        for pi in 0..f.params.len() {
            let p = f.params[pi].clone();
            if p.is_control() {
                // matching draw for the checker's per-parameter coin
                self.wr.intn(100);
                writeln!(fm, "{}", p.declare(&format!("var p{pi}"), " = 10", true))?;
            } else {
                value = self.emit_var_assign(f, &mut fm, &p, &format!("p{pi}"), value, true)?;
            }
            values.push(value);
        }

        // receiver value
        if f.method {
            self.wr.checkpoint("before receiver constant");
            let rcvr = f.receiver.clone().expect("method function has a receiver");
            writeln!(fm, "{}", rcvr.declare("var rcvr", "", true))?;
            let (valstr, next) = self.gen_value(f, &rcvr, value, true);
            value = next;
            writeln!(fm, "rcvr = {valstr}")?;
            values.push(value);
        }
        f.values = values;

        let f: &FuncDef = f;
        writeln!(fm, "{up}.Mode = \"\"")?;
        writeln!(fm, "// {} returns {} params", f.returns.len(), f.params.len())?;
        if self.sforce {
            writeln!(fm, "hackStack() // force stack growth on next call")?;
        }

        writeln!(fm, "if mode == \"normal\" {{")?;
        fm.indent();
        let mut call = String::new();
        for ri in 0..f.returns.len() {
            if ri != 0 {
                call.push_str(", ");
            }
            write!(call, "r{ri}")?;
        }
        if !f.returns.is_empty() {
            call.push_str(" := ");
        }
        let pref = if f.method {
            "rcvr".to_string()
        } else {
            self.checker_pkg(pidx)
        };
        write!(call, "{pref}.Test{}(", f.idx)?;
        for pi in 0..f.params.len() {
            if pi != 0 {
                call.push_str(", ");
            }
            write!(call, "p{pi}")?;
        }
        writeln!(fm, "{call})")?;

        let cm = f.complexity_measure();
        for (ri, r) in f.returns.iter().enumerate() {
            self.emit_return_check(f, &mut fm, r, ri, cm, pidx, &format!("r{ri}"), "return")?;
        }
        fm.dedent();

        if self.tunables.do_reflect_call {
            writeln!(fm, "}} else {{")?;
            fm.indent();
            writeln!(fm, "// same call via reflection")?;
            writeln!(fm, "{up}.Mode = \"reflect\"")?;
            if f.method {
                if f.pointer_method {
                    writeln!(fm, "rcv := reflect.ValueOf(&rcvr)")?;
                } else {
                    writeln!(fm, "rcv := reflect.ValueOf(rcvr)")?;
                }
                writeln!(fm, "rc := rcv.MethodByName(\"Test{}\")", f.idx)?;
            } else {
                writeln!(
                    fm,
                    "rc := reflect.ValueOf({}.Test{})",
                    self.checker_pkg(pidx),
                    f.idx
                )?;
            }
            let mut rcall = String::new();
            if !f.returns.is_empty() {
                rcall.push_str("rvslice := ");
            }
            write!(rcall, "rc.Call([]reflect.Value{{")?;
            for pi in 0..f.params.len() {
                if pi != 0 {
                    rcall.push_str(", ");
                }
                write!(rcall, "reflect.ValueOf(p{pi})")?;
            }
            writeln!(fm, "{rcall}}})")?;

            for (ri, r) in f.returns.iter().enumerate() {
                writeln!(fm, "rr{ri}i := rvslice[{ri}].Interface()")?;
                writeln!(fm, "rr{ri}v := rr{ri}i.({})", r.qual_name())?;
                self.emit_return_check(
                    f,
                    &mut fm,
                    r,
                    ri,
                    cm,
                    pidx,
                    &format!("rr{ri}v"),
                    "reflect return",
                )?;
            }
            fm.dedent();
        }
        writeln!(fm, "}}")?;
        writeln!(fm)?;
        writeln!(fm, "{up}.EndFcn()")?;
        fm.dedent();
        writeln!(fm, "}}")?;
        writeln!(fm)?;
        Ok(fm.finish())
    }

    /// Compare one returned value against its expected constant. Pointer
    /// returns deref through to the base value, and their checks are
    /// suppressed once a parameter mismatch has been reported so a corrupt
    /// argument doesn't cascade into a misleading return report.
    #[allow(clippy::too_many_arguments)]
    fn emit_return_check(
        &mut self,
        f: &FuncDef,
        fm: &mut Fivemat,
        r: &Parm,
        ri: usize,
        cm: usize,
        pidx: usize,
        rvar: &str,
        what: &str,
    ) -> Result<(), GenerateError> {
        let up = self.utils_pkg();
        let (curp, star) = deref_chain(r);
        if curp.num_elements() == 0 {
            writeln!(fm, "_, _ = {rvar}, c{ri} // zero size")?;
            return Ok(());
        }
        let pfc = if star.is_empty() {
            String::new()
        } else {
            format!("{up}.ParamFailCount == 0 && ")
        };
        if curp.has_pointer() {
            let efn = self.eq_func_ref(f, curp, true);
            writeln!(fm, "if {pfc}!{efn}({star}{rvar}, {star}c{ri}) {{")?;
        } else {
            writeln!(fm, "if {pfc}{star}{rvar} != {star}c{ri} {{")?;
        }
        fm.indent();
        writeln!(
            fm,
            "{up}.NoteFailure({cm}, {pidx}, {}, \"{}\", \"{what}\", {ri}, true, uint64(0))",
            f.idx,
            self.checker_pkg(pidx)
        )?;
        fm.dedent();
        writeln!(fm, "}}")?;
        Ok(())
    }
}
