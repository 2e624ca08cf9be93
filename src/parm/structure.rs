//! Struct parameter types.

use std::fmt::Write;

use crate::generator::{FuncDef, GenState};
use crate::parm::Parm;

#[derive(Debug, Clone)]
pub struct StructParm {
    pub sname: String,
    pub qname: String,
    pub fields: Vec<Parm>,
}

impl StructParm {
    /// Declared field name: `F{i}`, or `_` for blank fields.
    pub fn field_name(&self, fi: usize) -> String {
        if self.fields[fi].blank {
            "_".to_string()
        } else {
            format!("F{fi}")
        }
    }

    /// Struct literal `T{F0: v0, ...}`. Blank fields are dropped from the
    /// text but their values are still consumed from the stream, keeping
    /// the two emitters in step.
    pub fn gen_value(
        &self,
        s: &mut GenState,
        f: &FuncDef,
        mut value: usize,
        caller: bool,
    ) -> (String, usize) {
        let n = if caller { &self.qname } else { &self.sname };
        let mut buf = format!("{n}{{");
        let mut emitted = 0;
        for (fi, field) in self.fields.iter().enumerate() {
            let (valstr, next) = s.gen_value(f, field, value, caller);
            value = next;
            if field.blank {
                continue;
            }
            if emitted != 0 {
                buf.push_str(", ");
            }
            let _ = write!(buf, "F{fi}: {valstr}");
            emitted += 1;
        }
        buf.push('}');
        (buf, value)
    }
}
