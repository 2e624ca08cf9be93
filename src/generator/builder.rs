//! Random construction of type trees and function descriptors.

use std::collections::HashSet;

use tracing::error;

use super::{FuncDef, GenState};
use crate::parm::{AddrTaken, ArrayParm, MapParm, NumParm, NumTag, Parm, ParmKind};
use crate::parm::{StructParm, TypedefParm};
use crate::tunables::{
    TF_ARRAY, TF_BYTE, TF_COMPLEX, TF_FLOAT, TF_MAP, TF_NUMERIC, TF_POINTER, TF_STRING, TF_STRUCT,
};

impl GenState {
    fn int_flavor(&mut self) -> NumTag {
        let which = self.wr.intn(100);
        if which < self.tunables.unsigned_ranges[0] as u64 {
            NumTag::Uint
        } else {
            NumTag::Int
        }
    }

    fn int_bits(&mut self) -> u32 {
        let which = self.wr.intn(100);
        let mut t = 0u64;
        let mut bits = 8;
        for &v in &self.tunables.int_bit_ranges {
            t += v as u64;
            if which < t {
                return bits;
            }
            bits *= 2;
        }
        64
    }

    fn float_bits(&mut self) -> u32 {
        let which = self.wr.intn(100);
        if which < self.tunables.float_bit_ranges[0] as u64 {
            32
        } else {
            64
        }
    }

    fn gen_addr_taken(&mut self) -> AddrTaken {
        const ORDER: [AddrTaken; 4] = [
            AddrTaken::Not,
            AddrTaken::Simple,
            AddrTaken::Passed,
            AddrTaken::Heap,
        ];
        let which = self.wr.intn(100);
        let mut t = 0u64;
        for (i, &v) in self.tunables.addr_fractions.iter().enumerate() {
            t += v as u64;
            if which < t {
                return ORDER[i];
            }
        }
        AddrTaken::Not
    }

    pub(crate) fn push_tunables(&mut self) {
        self.tstack.push(self.tunables.clone());
    }

    pub(crate) fn pop_tunables(&mut self) {
        self.tunables = self
            .tstack
            .pop()
            .expect("internal error: tunables stack underflow");
    }

    /// Map keys must stay comparable: no maps, no pointers, and no slices
    /// anywhere in the key's subtree.
    fn gen_map_key_type(&mut self, f: &mut FuncDef, depth: usize, pidx: usize) -> Parm {
        self.push_tunables();
        self.tunables.slice_fraction = 0;
        self.tunables.preclude_types(&[TF_MAP, TF_POINTER]);
        let p = self.gen_parm(f, depth + 1, false, pidx);
        self.pop_tunables();
        p
    }

    /// Generate a single random type tree for a parameter or return slot.
    /// `mkctl` asks for the recursion-control integer; the request is
    /// satisfied only if the numeric bucket comes up.
    pub fn gen_parm(&mut self, f: &mut FuncDef, depth: usize, mkctl: bool, pidx: usize) -> Parm {
        // Container nesting stops at the configured depth.
        let toodeep = depth >= self.tunables.struct_depth as usize;
        if toodeep {
            self.push_tunables();
            self.tunables
                .preclude_types(&[TF_STRUCT, TF_ARRAY, TF_MAP, TF_POINTER]);
        }

        // Convert the fractions into a cumulative sum.
        let mut tf = self.tunables.type_fractions;
        let mut sum = 0u8;
        for v in tf.iter_mut() {
            sum += *v;
            *v = sum;
        }

        let isblank = self.wr.intn(100) < self.tunables.blank_perc as u64;
        let mut addr_taken = AddrTaken::Not;
        if depth == 0 && self.tunables.take_address && !isblank {
            addr_taken = self.gen_addr_taken();
        }
        let is_genval = self.tunables.do_func_call_values
            && self.wr.intn(100) < self.tunables.func_call_val_fraction as u64;

        let which = self.wr.intn(100) as u8;
        let mut retval = if which < tf[TF_STRUCT] {
            assert!(!toodeep, "internal error: struct bucket at depth cap");
            let ns = f.structdefs.len();
            let sname = format!("StructF{}S{ns}", f.idx);
            let qname = format!("{}.{sname}", self.checker_pkg(pidx));
            // Reserve this slot now; field generation below may mint more
            // named types.
            f.structdefs.push(Parm::new(ParmKind::Struct(StructParm {
                sname: sname.clone(),
                qname: qname.clone(),
                fields: Vec::new(),
            })));
            let tnf = (self.tunables.n_struct_fields as usize / (depth + 1)).max(1);
            let nf = self.wr.intn(tnf as u64);
            let mut fields = Vec::new();
            for _ in 0..nf {
                fields.push(self.gen_parm(f, depth + 1, false, pidx));
            }
            let sp = StructParm {
                sname,
                qname,
                fields,
            };
            f.structdefs[ns] = Parm::new(ParmKind::Struct(sp.clone()));
            Parm::new(ParmKind::Struct(sp))
        } else if which < tf[TF_ARRAY] {
            assert!(!toodeep, "internal error: array bucket at depth cap");
            let ns = f.arraydefs.len();
            let nel = self.wr.intn(self.tunables.n_array_elements as u64) as u8;
            let issl = self.wr.intn(100) < self.tunables.slice_fraction as u64;
            let aname = format!("ArrayF{}S{ns}E{nel}", f.idx);
            let qname = format!("{}.{aname}", self.checker_pkg(pidx));
            f.arraydefs.push(Parm::new(ParmKind::Array(ArrayParm {
                aname: aname.clone(),
                qname: qname.clone(),
                nelements: nel,
                slice: issl,
                eltype: Box::new(placeholder()),
            })));
            let mut eltype = self.gen_parm(f, depth + 1, false, pidx);
            eltype.blank = false;
            let ap = ArrayParm {
                aname,
                qname,
                nelements: nel,
                slice: issl,
                eltype: Box::new(eltype),
            };
            f.arraydefs[ns] = Parm::new(ParmKind::Array(ap.clone()));
            Parm::new(ParmKind::Array(ap))
        } else if which < tf[TF_MAP] {
            assert!(!toodeep, "internal error: map bucket at depth cap");
            let ns = f.mapdefs.len();
            let aname = format!("MapF{}M{ns}", f.idx);
            let qname = format!("{}.{aname}", self.checker_pkg(pidx));
            if f.mapkeyts.is_empty() {
                f.mapkeyts = format!("MapKeysF{}", f.idx);
            }
            let keytmp = format!("Mk{}t{ns}", f.idx);
            // Reserve all three slots before recursing; the value subtree
            // may register further maps.
            f.mapdefs.push(Parm::new(ParmKind::Map(MapParm {
                aname: aname.clone(),
                qname: qname.clone(),
                keytmp: keytmp.clone(),
                keytype: Box::new(placeholder()),
                valtype: Box::new(placeholder()),
            })));
            f.mapkeytmps.push(String::new());
            f.mapkeytypes.push(placeholder());
            let mut keytype = self.gen_map_key_type(f, depth + 1, pidx);
            keytype.blank = false;
            let mut valtype = self.gen_parm(f, depth + 1, false, pidx);
            valtype.blank = false;
            let mp = MapParm {
                aname,
                qname,
                keytmp: keytmp.clone(),
                keytype: Box::new(keytype.clone()),
                valtype: Box::new(valtype),
            };
            f.mapdefs[ns] = Parm::new(ParmKind::Map(mp.clone()));
            f.mapkeytypes[ns] = keytype;
            f.mapkeytmps[ns] = keytmp;
            Parm::new(ParmKind::Map(mp))
        } else if which < tf[TF_POINTER] {
            assert!(!toodeep, "internal error: pointer bucket at depth cap");
            let to = self.gen_parm(f, depth + 1, false, pidx);
            Parm::new(ParmKind::Pointer(Box::new(to)))
        } else if which < tf[TF_NUMERIC] {
            let tag = self.int_flavor();
            let width = self.int_bits();
            Parm::new(ParmKind::Num(NumParm {
                tag,
                width,
                ctl: mkctl,
            }))
        } else if which < tf[TF_FLOAT] {
            let width = self.float_bits();
            Parm::new(ParmKind::Num(NumParm {
                tag: NumTag::Float,
                width,
                ctl: false,
            }))
        } else if which < tf[TF_COMPLEX] {
            let width = self.float_bits() * 2;
            Parm::new(ParmKind::Num(NumParm {
                tag: NumTag::Complex,
                width,
                ctl: false,
            }))
        } else if which < tf[TF_BYTE] {
            Parm::new(ParmKind::Num(NumParm {
                tag: NumTag::Byte,
                width: 8,
                ctl: false,
            }))
        } else if which < tf[TF_STRING] {
            Parm::new(ParmKind::Str)
        } else {
            // fallback
            Parm::new(ParmKind::Num(NumParm {
                tag: NumTag::Uint,
                width: 8,
                ctl: false,
            }))
        };

        if !mkctl {
            retval.blank = isblank;
        }
        retval.addr_taken = addr_taken;
        retval.genval = is_genval;
        if toodeep {
            self.pop_tunables();
        }
        retval
    }

    fn make_typedef_parm(&mut self, f: &mut FuncDef, target: Parm, pidx: usize) -> Parm {
        let ns = f.typedefs.len();
        let aname = format!("MyTypeF{}S{ns}", f.idx);
        let qname = format!("{}.{aname}", self.checker_pkg(pidx));
        let tp = TypedefParm {
            aname,
            qname,
            target: Box::new(target),
        };
        f.typedefs.push(Parm::new(ParmKind::Typedef(tp.clone())));
        let mut p = Parm::new(ParmKind::Typedef(tp));
        p.blank = self.wr.intn(100) < self.tunables.blank_perc as u64;
        p
    }

    /// Compose one random function descriptor.
    pub fn gen_func(&mut self, fidx: usize, pidx: usize) -> FuncDef {
        let mut f = FuncDef::new(fidx);
        let num_params = self.wr.intn(1 + self.tunables.n_parm_range as u64) as usize;
        let num_returns = self.wr.intn(1 + self.tunables.n_return_range as u64) as usize;
        f.recur = self.wr.intn(100) < self.tunables.recur_perc as u64;
        f.method = self.wr.intn(100) < self.tunables.method_perc as u64;
        if f.method {
            // Receiver types never contain pointers.
            self.push_tunables();
            self.tunables.preclude_types(&[TF_POINTER]);
            let mut target = self.gen_parm(&mut f, 0, false, pidx);
            target.blank = false;
            self.pop_tunables();
            let rcvr = self.make_typedef_parm(&mut f, target, pidx);
            f.pointer_method = self.wr.intn(100) < self.tunables.pointer_method_perc as u64;
            if rcvr.blank {
                f.recur = false;
            }
            f.receiver = Some(rcvr);
        }

        let mut need_control = f.recur;
        f.dodefc = self.wr.intn(100) as u8;
        // One coin per side decides whether this function's params/returns
        // are address-taken at all, keeping the frequency of address-taken
        // functions at taken_fraction.
        let p_taken = self.wr.intn(100) < self.tunables.taken_fraction as u64;
        for _ in 0..num_params {
            let mut newparm = self.gen_parm(&mut f, 0, need_control, pidx);
            if !p_taken {
                newparm.addr_taken = AddrTaken::Not;
            }
            if newparm.is_control() {
                need_control = false;
            }
            f.params.push(newparm);
            let coin = self.wr.intn(100) as u8;
            f.dodefp.push(coin);
        }
        // No integer parameter turned up, so there is nothing to count the
        // recursion down with.
        if f.recur && need_control {
            f.recur = false;
        }

        let r_taken = self.wr.intn(100) < self.tunables.taken_fraction as u64;
        for _ in 0..num_returns {
            let mut r = self.gen_parm(&mut f, 0, false, pidx);
            if !r_taken {
                r.addr_taken = AddrTaken::Not;
            }
            f.returns.push(r);
        }

        let spw = self.wr.intn(11);
        f.rstack = std::cmp::max(1usize << spw, 4);

        self.check_unique_type_names(&f);
        f
    }

    /// Type names minted for one function must be unique within it, or the
    /// emitted declarations would collide. A collision is a generator bug:
    /// report it and count an error instead of emitting ill-typed source.
    fn check_unique_type_names(&mut self, f: &FuncDef) {
        let mut seen = HashSet::new();
        let defs = f
            .structdefs
            .iter()
            .chain(&f.arraydefs)
            .chain(&f.mapdefs)
            .chain(&f.typedefs);
        for def in defs {
            let name = def.type_name();
            if !seen.insert(name.clone()) {
                error!("internal error: duplicate type name {name} in Test{}", f.idx);
                self.errs += 1;
            }
        }
        if !f.mapkeyts.is_empty() && !seen.insert(f.mapkeyts.clone()) {
            error!(
                "internal error: map key holder {} collides in Test{}",
                f.mapkeyts, f.idx
            );
            self.errs += 1;
        }
    }
}

/// Slot-reserving stand-in, overwritten before anything reads it.
fn placeholder() -> Parm {
    Parm::new(ParmKind::Num(NumParm {
        tag: NumTag::Uint,
        width: 8,
        ctl: false,
    }))
}
