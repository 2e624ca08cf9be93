//! Typedef (named alias) parameter types. Only method receivers are
//! spelled through typedefs, but the variant composes like any other.

use crate::generator::{FuncDef, GenState};
use crate::parm::Parm;

#[derive(Debug, Clone)]
pub struct TypedefParm {
    pub aname: String,
    pub qname: String,
    pub target: Box<Parm>,
}

impl TypedefParm {
    /// `Alias(v)` where `v` is the target type's literal.
    pub fn gen_value(
        &self,
        s: &mut GenState,
        f: &FuncDef,
        value: usize,
        caller: bool,
    ) -> (String, usize) {
        let n = if caller { &self.qname } else { &self.aname };
        let (valstr, value) = s.gen_value(f, &self.target, value, caller);
        (format!("{n}({valstr})"), value)
    }
}
