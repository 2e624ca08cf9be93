//! Array and slice parameter types.
//!
//! A slice differs from a fixed array only in the declared type (no length
//! between the brackets); literals always populate exactly `nelements`
//! slots so the two declaration forms share everything else.

use std::fmt::Write;

use crate::generator::{FuncDef, GenState};
use crate::parm::Parm;

#[derive(Debug, Clone)]
pub struct ArrayParm {
    pub aname: String,
    pub qname: String,
    pub nelements: u8,
    pub slice: bool,
    pub eltype: Box<Parm>,
}

impl ArrayParm {
    /// The bracketed element count in the declared type, empty for slices.
    pub fn len_spec(&self) -> String {
        if self.slice {
            String::new()
        } else {
            format!("{}", self.nelements)
        }
    }

    pub fn gen_value(
        &self,
        s: &mut GenState,
        f: &FuncDef,
        mut value: usize,
        caller: bool,
    ) -> (String, usize) {
        let n = if caller { &self.qname } else { &self.aname };
        let mut buf = format!("{n}{{");
        for i in 0..self.nelements {
            let (valstr, next) = s.gen_value(f, &self.eltype, value, caller);
            value = next;
            if i != 0 {
                buf.push_str(", ");
            }
            let _ = write!(buf, "{valstr}");
        }
        buf.push('}');
        (buf, value)
    }
}
