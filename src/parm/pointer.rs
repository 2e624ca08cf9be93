//! Pointer parameter types.
//!
//! A pointer literal is spelled as a call to a boxing helper `New_k(v)`
//! registered with the helper table; the helper lives in the checker
//! package and is exported so the caller side can reach it.

use crate::generator::{FuncDef, GenState};
use crate::parm::Parm;

pub fn gen_value(
    s: &mut GenState,
    f: &FuncDef,
    to: &Parm,
    value: usize,
    caller: bool,
) -> (String, usize) {
    let pref = if caller {
        format!("{}.", s.checker_pkg(s.pkidx))
    } else {
        String::new()
    };
    let (valstr, value) = s.gen_value(f, to, value, caller);
    let fname = s.gen_alloc_func(to);
    (format!("{pref}{fname}({valstr})"), value)
}
