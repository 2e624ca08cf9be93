//! Function descriptors and the twin caller/checker emitters.
//!
//! One [`FuncDef`] is built per test function, then emitted twice: once as
//! the caller (constructs inputs, checks outputs) and once as the checker
//! (checks inputs, constructs outputs). The two emissions walk the
//! descriptor with independently reseeded random streams, so every branch
//! that consumes randomness has to consume the same draws on both sides;
//! [`GenState::gen_pair`] verifies the per-primitive call counts afterwards.

mod builder;
mod caller;
mod checker;
mod helpers;
#[cfg(test)]
mod tests;

use std::fmt::Write;

use tracing::debug;

use crate::driver::Config;
use crate::error::GenerateError;
use crate::fivemat::Fivemat;
use crate::parm::{AddrTaken, Parm, ParmKind};
use crate::rng::WrapRand;
use crate::tunables::Tunables;

use helpers::HelperSet;

/// Everything there is to know about one generated test function.
/// Owned by the function: emitted twice, then dropped.
pub struct FuncDef {
    pub idx: usize,
    /// Named composite types minted while building this function's
    /// signature, in creation order. Each entry's kind matches its list.
    pub structdefs: Vec<Parm>,
    pub arraydefs: Vec<Parm>,
    pub typedefs: Vec<Parm>,
    pub mapdefs: Vec<Parm>,
    pub mapkeytypes: Vec<Parm>,
    pub mapkeytmps: Vec<String>,
    /// Name of the per-function map key holder struct, empty when the
    /// function's types contain no maps.
    pub mapkeyts: String,
    pub receiver: Option<Parm>,
    pub params: Vec<Parm>,
    pub returns: Vec<Parm>,
    /// Value-counter checkpoints recorded by the caller emitter after each
    /// parameter (and the receiver); re-validated by the checker emitter.
    pub values: Vec<usize>,
    /// Pre-drawn coins so both emitters branch identically without
    /// touching their emission streams.
    pub dodefc: u8,
    pub dodefp: Vec<u8>,
    /// Stack pad size for the checker, a power of two between 4 and 1024.
    pub rstack: usize,
    pub recur: bool,
    pub method: bool,
    pub pointer_method: bool,
}

impl FuncDef {
    fn new(idx: usize) -> FuncDef {
        FuncDef {
            idx,
            structdefs: Vec::new(),
            arraydefs: Vec::new(),
            typedefs: Vec::new(),
            mapdefs: Vec::new(),
            mapkeytypes: Vec::new(),
            mapkeytmps: Vec::new(),
            mapkeyts: String::new(),
            receiver: None,
            params: Vec::new(),
            returns: Vec::new(),
            values: Vec::new(),
            dodefc: 0,
            dodefp: Vec::new(),
            rstack: 0,
            recur: false,
            method: false,
            pointer_method: false,
        }
    }

    /// Crude complexity score: total primitive-leaf count of the receiver,
    /// params, and returns. Reported in failure lines so the minimizer can
    /// pick the simplest failing function.
    pub fn complexity_measure(&self) -> usize {
        let mut v = 0;
        if let Some(rcvr) = &self.receiver {
            v += rcvr.num_elements();
        }
        v += self.params.iter().map(|p| p.num_elements()).sum::<usize>();
        v += self.returns.iter().map(|r| r.num_elements()).sum::<usize>();
        v
    }
}

pub struct GenState {
    pub tag: String,
    pub pkidx: usize,
    pub errs: usize,
    pub pragma: String,
    pub sforce: bool,
    pub rand_debug: bool,
    base_tunables: Tunables,
    pub tunables: Tunables,
    tstack: Vec<Tunables>,
    pub wr: WrapRand,
    deref_funcs: HelperSet,
    assign_funcs: HelperSet,
    alloc_funcs: HelperSet,
    genval_funcs: HelperSet,
    glob_vars: HelperSet,
}

impl GenState {
    pub fn new(cfg: &Config) -> GenState {
        GenState {
            tag: cfg.tag.clone(),
            pkidx: 0,
            errs: 0,
            pragma: cfg.pragma.clone(),
            sforce: cfg.force_stack_growth,
            rand_debug: cfg.rand_debug,
            base_tunables: cfg.tunables.clone(),
            tunables: cfg.tunables.clone(),
            tstack: Vec::new(),
            wr: WrapRand::new(cfg.seed, cfg.rand_debug),
            deref_funcs: HelperSet::default(),
            assign_funcs: HelperSet::default(),
            alloc_funcs: HelperSet::default(),
            genval_funcs: HelperSet::default(),
            glob_vars: HelperSet::default(),
        }
    }

    pub fn caller_pkg(&self, which: usize) -> String {
        format!("{}Caller{which}", self.tag)
    }

    pub fn checker_pkg(&self, which: usize) -> String {
        format!("{}Checker{which}", self.tag)
    }

    pub fn utils_pkg(&self) -> String {
        format!("{}Utils", self.tag)
    }

    /// Reference to the Equal function for `t`, spelled for whichever
    /// package the text is being emitted into. When a map key holder
    /// exists the Equal functions are methods on it.
    fn eq_func_ref(&self, f: &FuncDef, t: &Parm, caller: bool) -> String {
        let cp = if !f.mapkeyts.is_empty() {
            "mkt.".to_string()
        } else if caller {
            format!("{}.", self.checker_pkg(self.pkidx))
        } else {
            String::new()
        };
        format!("{cp}Equal{}", t.type_name())
    }

    /// How the checker body spells a reference to parameter `idx`:
    /// directly, through the bound address, or through a deref helper.
    fn gen_param_ref(&mut self, p: &Parm, idx: usize) -> String {
        match p.addr_taken {
            AddrTaken::Not => format!("p{idx}"),
            AddrTaken::Simple | AddrTaken::Heap => format!("(*ap{idx})"),
            AddrTaken::Passed => {
                let fname = self.gen_param_deref_func(p);
                format!("{fname}(ap{idx})")
            }
        }
    }

    /// Route a return value either into the named return, through the
    /// bound address, or through an assign helper.
    fn gen_return_assign(
        &mut self,
        fm: &mut Fivemat,
        r: &Parm,
        idx: usize,
        val: &str,
    ) -> Result<(), GenerateError> {
        match r.addr_taken {
            AddrTaken::Not => writeln!(fm, "r{idx} = {val}")?,
            AddrTaken::Simple | AddrTaken::Heap => writeln!(fm, "(*ar{idx}) = {val}")?,
            AddrTaken::Passed => {
                let fname = self.gen_assign_func(r);
                writeln!(fm, "{fname}(ar{idx}, {val})")?;
            }
        }
        Ok(())
    }

    /// Emit `name := <literal>`. Maps flip a coin between the literal form
    /// and `make` + keyed assignment; the coin is drawn for every type so
    /// the two emitters stay in step.
    fn emit_var_assign(
        &mut self,
        f: &FuncDef,
        fm: &mut Fivemat,
        r: &Parm,
        rname: &str,
        value: usize,
        caller: bool,
    ) -> Result<usize, GenerateError> {
        let isassign = self.wr.intn(100) < 50;
        if let ParmKind::Map(mp) = &r.kind {
            if isassign {
                writeln!(fm, "{rname} := make({})", r.name(caller))?;
                let (valstr, value) = self.gen_value(f, &mp.valtype, value, caller);
                writeln!(fm, "{rname}[mkt.{}] = {valstr}", mp.keytmp)?;
                return Ok(value);
            }
        }
        let (valstr, value) = self.gen_value(f, r, value, caller);
        writeln!(fm, "{rname} := {valstr}")?;
        Ok(value)
    }

    /// Populate the per-function map key holder. Both sides run this first
    /// so every map key is pinned down before any other value generation.
    fn emit_map_key_tmps(
        &mut self,
        f: &FuncDef,
        fm: &mut Fivemat,
        pidx: usize,
        mut value: usize,
        caller: bool,
    ) -> Result<usize, GenerateError> {
        if f.mapkeyts.is_empty() {
            return Ok(value);
        }
        let cp = if caller {
            format!("{}.", self.checker_pkg(pidx))
        } else {
            String::new()
        };
        writeln!(fm, "var mkt {cp}{}", f.mapkeyts)?;
        for (i, t) in f.mapkeytypes.iter().enumerate() {
            let (keystr, next) = self.gen_value(f, t, value, caller);
            value = next;
            let tname = &f.mapkeytmps[i];
            writeln!(fm, "{tname} := {keystr}")?;
            writeln!(fm, "mkt.{tname} = {tname}")?;
        }
        Ok(value)
    }

    /// The recursive tail call, passing every parameter through with the
    /// control decremented and blank parameters replaced by their saved
    /// expected values.
    fn emit_recursive_call(&mut self, f: &FuncDef) -> String {
        let rcvr = if f.method { "rcvr." } else { "" };
        let mut b = format!("{rcvr}Test{}(", f.idx);
        for (pi, p) in f.params.iter().enumerate() {
            if pi != 0 {
                b.push_str(", ");
            }
            if p.is_control() {
                let _ = write!(b, "{}-1", self.gen_param_ref(p, pi));
            } else if !p.blank {
                let _ = write!(b, "{}", self.gen_param_ref(p, pi));
            } else {
                let _ = write!(b, "brc{pi}");
            }
        }
        b.push(')');
        b
    }

    /// Emit a return sequence. If any return value is address-taken the
    /// returns are routed through their bound addresses followed by a bare
    /// `return`; otherwise a direct `return rc0, rc1, ...`.
    fn emit_return(
        &mut self,
        f: &FuncDef,
        fm: &mut Fivemat,
        do_recursive_call: bool,
    ) -> Result<(), GenerateError> {
        let indirect_return = f.returns.iter().any(|r| r.addr_taken != AddrTaken::Not);
        let t = if do_recursive_call { "t" } else { "" };
        let retvals: Vec<String> = (0..f.returns.len())
            .map(|ri| format!("rc{t}{ri}"))
            .collect();

        if do_recursive_call {
            writeln!(fm, "// recursive call")?;
            if self.sforce {
                writeln!(fm, "hackStack() // force stack growth on next call")?;
            }
            let rcall = self.emit_recursive_call(f);
            if indirect_return {
                writeln!(fm, "{} := {rcall}", retvals.join(", "))?;
            } else if f.returns.is_empty() {
                writeln!(fm, "{rcall}")?;
                writeln!(fm, "return")?;
                return Ok(());
            } else {
                writeln!(fm, "return {rcall}")?;
                return Ok(());
            }
        }

        if indirect_return {
            for (ri, r) in f.returns.iter().enumerate() {
                self.gen_return_assign(fm, r, ri, &retvals[ri])?;
            }
            writeln!(fm, "return")?;
        } else if f.returns.is_empty() {
            writeln!(fm, "return")?;
        } else {
            writeln!(fm, "return {}", retvals.join(", "))?;
        }
        Ok(())
    }

    pub fn reset_helpers(&mut self) {
        self.deref_funcs.reset();
        self.assign_funcs.reset();
        self.alloc_funcs.reset();
        self.genval_funcs.reset();
        self.glob_vars.reset();
    }

    /// Generate one (caller, checker) pair. The descriptor and both
    /// emissions each run on a fresh stream built from `seed`; afterwards
    /// the two emission streams must agree on their per-primitive call
    /// counts. Returns the seed for the next pair plus both texts (built
    /// even when `emit` is false, to keep the seed sequence deterministic
    /// under masking).
    pub fn gen_pair(
        &mut self,
        fidx: usize,
        pidx: usize,
        seed: u64,
        emit: bool,
    ) -> Result<(u64, String, String), GenerateError> {
        debug!("gen fidx {fidx} pidx {pidx} seed {seed}");

        self.tunables = self.base_tunables.clone();
        self.tstack.clear();
        self.pkidx = pidx;

        self.wr = WrapRand::new(seed, self.rand_debug);
        self.wr.tag = "genfunc";
        let mut fd = self.gen_func(fidx, pidx);

        self.wr = WrapRand::new(seed, self.rand_debug);
        self.wr.tag = "caller";
        let caller_text = self.emit_caller(&mut fd, pidx)?;
        let wr_caller = std::mem::replace(&mut self.wr, WrapRand::new(seed, self.rand_debug));
        self.wr.tag = "checker";
        let checker_text = self.emit_checker(&fd, pidx, emit)?;
        self.wr.check(&wr_caller);

        Ok((seed + 1, caller_text, checker_text))
    }
}
