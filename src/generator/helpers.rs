//! The per-package helper registry.
//!
//! Emitters demand helpers by type (pointer deref wrappers, store-through
//! wrappers, allocators, escape globals, value-producing functions); the
//! registry dedups them by a textual signature key and flushes newly
//! registered entries into the checker text after each function. When a
//! function's emission is suppressed by a mask, its new helpers are rolled
//! back so later functions cannot reference undefined names.

use std::collections::HashMap;
use std::fmt::Write;

use super::{FuncDef, GenState};
use crate::error::GenerateError;
use crate::fivemat::Fivemat;
use crate::parm::{Parm, ParmKind};

#[derive(Default)]
pub(crate) struct HelperSet {
    /// signature key -> emitted name, for everything ever registered in
    /// this package (minus rollbacks)
    names: HashMap<String, String>,
    /// registered since the last flush
    pending: Vec<HelperDesc>,
}

/// One auto-generated helper function or global: `p` is the subject type T,
/// `pp` the pointer type *T where the family needs one, `payload` the
/// returned literal for value-producing helpers.
pub(crate) struct HelperDesc {
    p: Parm,
    pp: Option<Parm>,
    name: String,
    tag: String,
    payload: String,
}

/// Stable disambiguator derived from the signature key (FNV-1a). Masking
/// rolls helpers back and later functions re-register them; a content
/// hash keeps the surviving text byte-identical where a running counter
/// would renumber.
fn stable_suffix(tag: &str) -> String {
    let mut h: u64 = 0xcbf29ce484222325;
    for b in tag.as_bytes() {
        h ^= *b as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    format!("{:012x}", h & 0xffff_ffff_ffff)
}

impl HelperSet {
    fn intern(&mut self, prefix: &str, tag: String, p: &Parm, pp: Option<Parm>, payload: String) -> String {
        if let Some(name) = self.names.get(&tag) {
            return name.clone();
        }
        let name = format!("{prefix}{}", stable_suffix(&tag));
        self.pending.push(HelperDesc {
            p: p.clone(),
            pp,
            name: name.clone(),
            tag: tag.clone(),
            payload,
        });
        self.names.insert(tag, name.clone());
        name
    }

    pub(crate) fn reset(&mut self) {
        self.names.clear();
        self.pending.clear();
    }

    /// Take the pending entries for emission, or roll them back out of the
    /// name table when the function's text is being suppressed.
    fn drain(&mut self, emit: bool) -> Vec<HelperDesc> {
        let pending = std::mem::take(&mut self.pending);
        if emit {
            return pending;
        }
        for d in &pending {
            self.names.remove(&d.tag);
        }
        Vec::new()
    }
}

fn mk_pointer(p: &Parm) -> Parm {
    Parm::new(ParmKind::Pointer(Box::new(p.clone())))
}

impl GenState {
    /// Global variable `gvar_k *T`, assigned in the checker when a param or
    /// return is heap-escaped.
    pub(crate) fn gen_glob_var(&mut self, p: &Parm) -> String {
        let pp = mk_pointer(p);
        let tag = pp.declare("gv", "", false);
        self.glob_vars.intern("gvar_", tag, p, Some(pp), String::new())
    }

    /// `deref_k(x *T) T`.
    pub(crate) fn gen_param_deref_func(&mut self, p: &Parm) -> String {
        let pp = mk_pointer(p);
        let tag = pp.declare("x", "", false);
        self.deref_funcs.intern("deref_", tag, p, Some(pp), String::new())
    }

    /// `retassign_k(x *T, v T)`.
    pub(crate) fn gen_assign_func(&mut self, p: &Parm) -> String {
        let pp = mk_pointer(p);
        let tag = pp.declare("x", "", false);
        self.assign_funcs
            .intern("retassign_", tag, p, Some(pp), String::new())
    }

    /// `New_k(i T) *T`. Exported so the caller package can box pointer
    /// literals too.
    pub(crate) fn gen_alloc_func(&mut self, p: &Parm) -> String {
        let pp = mk_pointer(p);
        let tag = pp.declare("x", "", false);
        self.alloc_funcs.intern("New_", tag, p, Some(pp), String::new())
    }

    /// Produce the literal for `p`, optionally (checker side only)
    /// rerouted through a `genval_k` helper that returns the same literal.
    /// The helpers are unexported members of the checker package, so the
    /// caller always gets the inline literal.
    pub fn gen_value(
        &mut self,
        f: &FuncDef,
        p: &Parm,
        value: usize,
        caller: bool,
    ) -> (String, usize) {
        let (valstr, value) = p.gen_value(self, f, value, caller);
        if !self.tunables.do_func_call_values || !p.genval || caller {
            return (valstr, value);
        }

        let mk_invoc = |fname: &str| {
            if f.mapkeyts.is_empty() {
                format!("{fname}()")
            } else {
                format!("mkt.{fname}()")
            }
        };

        let decl = p.declare("x", "", false);
        let tag = format!("{decl}|{}|{valstr}", f.mapkeyts);
        let fname = self.genval_funcs.intern("genval_", tag, p, None, valstr);
        (mk_invoc(&fname), value)
    }

    /// Flush everything registered while emitting the current function
    /// into the checker text (or roll it back under masking).
    pub(crate) fn flush_helpers(
        &mut self,
        f: &FuncDef,
        fm: &mut Fivemat,
        emit: bool,
    ) -> Result<(), GenerateError> {
        let derefs = self.deref_funcs.drain(emit);
        let assigns = self.assign_funcs.drain(emit);
        let allocs = self.alloc_funcs.drain(emit);
        let gvars = self.glob_vars.drain(emit);
        let genvals = self.genval_funcs.drain(emit);
        if derefs.is_empty()
            && assigns.is_empty()
            && allocs.is_empty()
            && gvars.is_empty()
            && genvals.is_empty()
        {
            return Ok(());
        }

        writeln!(fm, "// begin addr taken helpers")?;
        if !derefs.is_empty() {
            writeln!(fm, "// dereference helpers")?;
            for fd in &derefs {
                let ptn = fd.pp.as_ref().expect("deref helper has a pointer type");
                writeln!(fm, "//go:noinline")?;
                writeln!(
                    fm,
                    "func {}(x {}) {} {{",
                    fd.name,
                    ptn.type_name(),
                    fd.p.type_name()
                )?;
                fm.indent();
                writeln!(fm, "return *x")?;
                fm.dedent();
                writeln!(fm, "}}")?;
                writeln!(fm)?;
            }
        }
        if !assigns.is_empty() {
            writeln!(fm, "// assign helpers")?;
            for fd in &assigns {
                let ptn = fd.pp.as_ref().expect("assign helper has a pointer type");
                writeln!(fm, "//go:noinline")?;
                writeln!(
                    fm,
                    "func {}(x {}, v {}) {{",
                    fd.name,
                    ptn.type_name(),
                    fd.p.type_name()
                )?;
                fm.indent();
                writeln!(fm, "*x = v")?;
                fm.dedent();
                writeln!(fm, "}}")?;
                writeln!(fm)?;
            }
        }
        if !allocs.is_empty() {
            writeln!(fm, "// 'new' funcs")?;
            for fd in &allocs {
                let ptn = fd.pp.as_ref().expect("alloc helper has a pointer type");
                writeln!(fm, "//go:noinline")?;
                writeln!(
                    fm,
                    "func {}(i {}) {} {{",
                    fd.name,
                    fd.p.type_name(),
                    ptn.type_name()
                )?;
                fm.indent();
                writeln!(fm, "x := new({})", fd.p.type_name())?;
                writeln!(fm, "*x = i")?;
                writeln!(fm, "return x")?;
                fm.dedent();
                writeln!(fm, "}}")?;
                writeln!(fm)?;
            }
        }
        if !gvars.is_empty() {
            writeln!(fm, "// global vars")?;
            for fd in &gvars {
                let ptn = fd.pp.as_ref().expect("global var has a pointer type");
                writeln!(fm, "var {} {}", fd.name, ptn.type_name())?;
            }
            writeln!(fm)?;
        }
        if !genvals.is_empty() {
            writeln!(fm, "// genval helpers")?;
            for fd in &genvals {
                let rcvr = if f.mapkeyts.is_empty() {
                    String::new()
                } else {
                    format!("(mkt *{}) ", f.mapkeyts)
                };
                writeln!(fm, "//go:noinline")?;
                writeln!(fm, "func {rcvr}{}() {} {{", fd.name, fd.p.type_name())?;
                fm.indent();
                writeln!(fm, "return {}", fd.payload)?;
                fm.dedent();
                writeln!(fm, "}}")?;
                writeln!(fm)?;
            }
        }
        writeln!(fm, "// end addr taken helpers")?;
        writeln!(fm)?;
        Ok(())
    }
}
