//! Map parameter types.
//!
//! Caller and checker must agree on map keys even though keys are produced
//! by the random stream, so every map's key is hoisted into a per-function
//! holder struct (`MapKeysF{idx}`) and referenced as `mkt.{keytmp}` by both
//! sides.

use crate::generator::{FuncDef, GenState};
use crate::parm::Parm;

#[derive(Debug, Clone)]
pub struct MapParm {
    pub aname: String,
    pub qname: String,
    /// Name of this map's key slot in the holder struct, e.g. `Mk3t0`.
    pub keytmp: String,
    pub keytype: Box<Parm>,
    pub valtype: Box<Parm>,
}

impl MapParm {
    /// Single-entry map literal `T{mkt.k: v}`.
    pub fn gen_value(
        &self,
        s: &mut GenState,
        f: &FuncDef,
        value: usize,
        caller: bool,
    ) -> (String, usize) {
        let n = if caller { &self.qname } else { &self.aname };
        let (valstr, value) = s.gen_value(f, &self.valtype, value, caller);
        (format!("{n}{{mkt.{}: {valstr}}}", self.keytmp), value)
    }
}
