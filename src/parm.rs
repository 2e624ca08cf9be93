//! The type model.
//!
//! Every randomly generatable parameter or return type is a [`Parm`]: a
//! tagged variant plus the flags that control how the emitters treat it
//! (blank, address-taken, value-via-helper). Containers own their component
//! types, so a `Parm` is a whole type tree.
//!
//! The capability set every variant supplies:
//!
//! * `declare`: the textual declaration form `"name T"`, in either the
//!   checker's unqualified or the caller's package-qualified spelling;
//! * `gen_elem_ref`: the textual access path naming the i'th primitive
//!   leaf under a given base path, plus that leaf's type;
//! * `gen_value`: a deterministic literal for the type, advancing the
//!   value counter once per primitive leaf;
//! * `num_elements`: the recursive primitive-leaf count.

pub mod array;
pub mod map;
pub mod num;
pub mod pointer;
pub mod string;
pub mod structure;
pub mod typedef;

pub use array::ArrayParm;
pub use map::MapParm;
pub use num::{NumParm, NumTag};
pub use structure::StructParm;
pub use typedef::TypedefParm;

use crate::generator::{FuncDef, GenState};

/// How an address-taken parameter or return is used in the checker body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrTaken {
    /// Address not taken.
    Not,
    /// Address is taken and used for simple reads/writes.
    Simple,
    /// Address is taken and passed to a well-behaved function.
    Passed,
    /// Address is taken and stored to a global var.
    Heap,
}

#[derive(Debug, Clone)]
pub struct Parm {
    pub kind: ParmKind,
    pub blank: bool,
    pub addr_taken: AddrTaken,
    pub genval: bool,
}

#[derive(Debug, Clone)]
pub enum ParmKind {
    Num(NumParm),
    Str,
    Pointer(Box<Parm>),
    Array(ArrayParm),
    Struct(StructParm),
    Map(MapParm),
    Typedef(TypedefParm),
}

impl Parm {
    pub fn new(kind: ParmKind) -> Parm {
        Parm {
            kind,
            blank: false,
            addr_taken: AddrTaken::Not,
            genval: false,
        }
    }

    /// Unqualified name, as visible inside the checker package.
    pub fn type_name(&self) -> String {
        match &self.kind {
            ParmKind::Num(np) => np.type_name(),
            ParmKind::Str => "string".to_string(),
            ParmKind::Pointer(to) => format!("*{}", to.type_name()),
            ParmKind::Array(ap) => ap.aname.clone(),
            ParmKind::Struct(sp) => sp.sname.clone(),
            ParmKind::Map(mp) => mp.aname.clone(),
            ParmKind::Typedef(tp) => tp.aname.clone(),
        }
    }

    /// Name as visible from the caller package (may carry a package prefix).
    pub fn qual_name(&self) -> String {
        match &self.kind {
            ParmKind::Num(np) => np.type_name(),
            ParmKind::Str => "string".to_string(),
            ParmKind::Pointer(to) => format!("*{}", to.qual_name()),
            ParmKind::Array(ap) => ap.qname.clone(),
            ParmKind::Struct(sp) => sp.qname.clone(),
            ParmKind::Map(mp) => mp.qname.clone(),
            ParmKind::Typedef(tp) => tp.qname.clone(),
        }
    }

    pub fn name(&self, caller: bool) -> String {
        if caller {
            self.qual_name()
        } else {
            self.type_name()
        }
    }

    /// The declaration form "prefix T suffix".
    pub fn declare(&self, prefix: &str, suffix: &str, caller: bool) -> String {
        format!("{prefix} {}{suffix}", self.name(caller))
    }

    pub fn is_control(&self) -> bool {
        matches!(&self.kind, ParmKind::Num(np) if np.ctl)
    }

    /// Recursive count of primitive leaves.
    pub fn num_elements(&self) -> usize {
        match &self.kind {
            ParmKind::Num(_) | ParmKind::Str | ParmKind::Pointer(_) => 1,
            ParmKind::Array(ap) => ap.nelements as usize * ap.eltype.num_elements(),
            ParmKind::Struct(sp) => sp.fields.iter().map(|f| f.num_elements()).sum(),
            ParmKind::Map(mp) => mp.valtype.num_elements(),
            ParmKind::Typedef(tp) => tp.target.num_elements(),
        }
    }

    /// Count of leaves that will actually be compared: blank subtrees and
    /// empty containers contribute nothing.
    pub fn checkable_elements(&self) -> usize {
        if self.blank {
            return 0;
        }
        match &self.kind {
            ParmKind::Struct(sp) => sp.fields.iter().map(|f| f.checkable_elements()).sum(),
            ParmKind::Array(ap) => {
                if ap.nelements == 0 {
                    0
                } else {
                    ap.nelements as usize * ap.eltype.checkable_elements()
                }
            }
            _ => 1,
        }
    }

    /// Whether the type transitively contains a pointer, a slice, or a map,
    /// i.e. whether runtime comparison must go through a generated Equal
    /// function rather than `==`.
    pub fn has_pointer(&self) -> bool {
        match &self.kind {
            ParmKind::Num(_) | ParmKind::Str => false,
            ParmKind::Pointer(_) | ParmKind::Map(_) => true,
            ParmKind::Array(ap) => ap.slice || ap.eltype.has_pointer(),
            ParmKind::Struct(sp) => sp.fields.iter().any(|f| f.has_pointer()),
            ParmKind::Typedef(tp) => tp.target.has_pointer(),
        }
    }

    /// Returns the textual expression naming the `elidx`th primitive leaf
    /// beneath `path`, plus the leaf's type. The path is `""` for zero-size
    /// leaves and `"_"` when any enclosing component is blank.
    pub fn gen_elem_ref<'a>(&'a self, elidx: usize, path: &str) -> (String, &'a Parm) {
        match &self.kind {
            ParmKind::Num(_) | ParmKind::Str | ParmKind::Pointer(_) => (path.to_string(), self),
            ParmKind::Array(ap) => {
                let ene = ap.eltype.num_elements();
                if ene == 0 {
                    return (String::new(), self);
                }
                // Find the slot holding the element of interest.
                let slot = elidx / ene;
                let mut ppath = format!("{path}[{slot}]");
                if path == "_" || self.blank {
                    ppath = "_".to_string();
                }
                ap.eltype.gen_elem_ref(elidx - slot * ene, &ppath)
            }
            ParmKind::Struct(sp) => {
                let mut csum = 0;
                for (fi, field) in sp.fields.iter().enumerate() {
                    let fne = field.num_elements();
                    if elidx < csum + fne {
                        let mut ppath = format!("{path}.F{fi}");
                        if path == "_" || field.blank {
                            ppath = "_".to_string();
                        }
                        return field.gen_elem_ref(elidx - csum, &ppath);
                    }
                    csum += fne;
                }
                (String::new(), self)
            }
            ParmKind::Map(mp) => {
                if mp.valtype.num_elements() == 0 {
                    return (String::new(), self);
                }
                let mut ppath = format!("{path}[mkt.{}]", mp.keytmp);
                if path == "_" || self.blank {
                    ppath = "_".to_string();
                }
                mp.valtype.gen_elem_ref(elidx, &ppath)
            }
            ParmKind::Typedef(tp) => {
                let (ppath, pp) = tp.target.gen_elem_ref(elidx, path);
                // For scalar-ish targets the alias itself is the leaf type,
                // so literals spell the alias name.
                match &tp.target.kind {
                    ParmKind::Array(_) | ParmKind::Struct(_) | ParmKind::Map(_) => (ppath, pp),
                    _ => (ppath, self),
                }
            }
        }
    }

    /// Deterministically produce a literal of this type, advancing the value
    /// counter. Composite forms recurse through [`GenState::gen_value`] so
    /// leaves may be diverted through genval helpers on the checker side.
    pub fn gen_value(
        &self,
        s: &mut GenState,
        f: &FuncDef,
        value: usize,
        caller: bool,
    ) -> (String, usize) {
        match &self.kind {
            ParmKind::Num(np) => np.gen_value(s, value),
            ParmKind::Str => string::gen_value(s, value),
            ParmKind::Pointer(to) => pointer::gen_value(s, f, to, value, caller),
            ParmKind::Array(ap) => ap.gen_value(s, f, value, caller),
            ParmKind::Struct(sp) => sp.gen_value(s, f, value, caller),
            ParmKind::Map(mp) => mp.gen_value(s, f, value, caller),
            ParmKind::Typedef(tp) => tp.gen_value(s, f, value, caller),
        }
    }
}

/// Strip any pointer wrappers, returning the base type and the matching
/// dereference stars.
pub fn deref_chain(p: &Parm) -> (&Parm, String) {
    let mut cur = p;
    let mut star = String::new();
    while let ParmKind::Pointer(to) = &cur.kind {
        star.push('*');
        cur = to;
    }
    (cur, star)
}

impl std::fmt::Display for Parm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ParmKind::Num(np) => {
                let ctl = if np.ctl { " [ctl=yes]" } else { "" };
                write!(f, "{}{ctl}", np.type_name())
            }
            ParmKind::Str => write!(f, "string"),
            ParmKind::Pointer(to) => write!(f, "*{to}"),
            ParmKind::Array(ap) => write!(
                f,
                "{} {}-element array of {}",
                ap.aname, ap.nelements, ap.eltype
            ),
            ParmKind::Struct(sp) => write!(f, "{} struct with {} fields", sp.sname, sp.fields.len()),
            ParmKind::Map(mp) => write!(f, "{} map of {} to {}", mp.aname, mp.keytype, mp.valtype),
            ParmKind::Typedef(tp) => write!(f, "{} typedef of {}", tp.aname, tp.target),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn num(tag: NumTag, width: u32) -> Parm {
        Parm::new(ParmKind::Num(NumParm {
            tag,
            width,
            ctl: false,
        }))
    }

    fn test_struct(fields: Vec<Parm>) -> Parm {
        Parm::new(ParmKind::Struct(StructParm {
            sname: "StructF0S0".to_string(),
            qname: "genChecker0.StructF0S0".to_string(),
            fields,
        }))
    }

    #[test]
    fn leaf_counts() {
        let s = test_struct(vec![
            num(NumTag::Int, 32),
            num(NumTag::Float, 64),
            Parm::new(ParmKind::Str),
        ]);
        assert_eq!(s.num_elements(), 3);

        let arr = Parm::new(ParmKind::Array(ArrayParm {
            aname: "ArrayF0S0E2".to_string(),
            qname: "genChecker0.ArrayF0S0E2".to_string(),
            nelements: 2,
            slice: false,
            eltype: Box::new(s),
        }));
        assert_eq!(arr.num_elements(), 6);
    }

    #[test]
    fn elem_ref_paths() {
        let s = test_struct(vec![num(NumTag::Int, 32), num(NumTag::Uint, 8)]);
        let (p0, l0) = s.gen_elem_ref(0, "p0");
        assert_eq!(p0, "p0.F0");
        assert_eq!(l0.type_name(), "int32");
        let (p1, l1) = s.gen_elem_ref(1, "p0");
        assert_eq!(p1, "p0.F1");
        assert_eq!(l1.type_name(), "uint8");
    }

    #[test]
    fn blank_field_path_is_underscore() {
        let mut blank_field = num(NumTag::Int, 16);
        blank_field.blank = true;
        let s = test_struct(vec![blank_field, num(NumTag::Int, 64)]);
        let (p0, _) = s.gen_elem_ref(0, "p0");
        assert_eq!(p0, "_");
        let (p1, _) = s.gen_elem_ref(1, "p0");
        assert_eq!(p1, "p0.F1");
        // the blank field still counts as a leaf, just not a checkable one
        assert_eq!(s.num_elements(), 2);
        assert_eq!(s.checkable_elements(), 1);
    }

    #[test]
    fn array_elem_ref_drills_into_slots() {
        let inner = test_struct(vec![num(NumTag::Int, 8), num(NumTag::Int, 8)]);
        let arr = Parm::new(ParmKind::Array(ArrayParm {
            aname: "ArrayF0S0E3".to_string(),
            qname: "genChecker0.ArrayF0S0E3".to_string(),
            nelements: 3,
            slice: false,
            eltype: Box::new(inner),
        }));
        let (path, leaf) = arr.gen_elem_ref(3, "p2");
        assert_eq!(path, "p2[1].F1");
        assert_eq!(leaf.type_name(), "int8");
    }

    #[test]
    fn zero_size_ref_is_empty() {
        let empty = test_struct(vec![]);
        assert_eq!(empty.num_elements(), 0);
        let (path, _) = empty.gen_elem_ref(0, "p0");
        assert_eq!(path, "");
    }

    #[test]
    fn pointer_detection() {
        assert!(!num(NumTag::Int, 32).has_pointer());
        assert!(!Parm::new(ParmKind::Str).has_pointer());
        let ptr = Parm::new(ParmKind::Pointer(Box::new(num(NumTag::Int, 32))));
        assert!(ptr.has_pointer());
        let s = test_struct(vec![num(NumTag::Int, 32), ptr]);
        assert!(s.has_pointer());
        let slice = Parm::new(ParmKind::Array(ArrayParm {
            aname: "ArrayF0S1E2".to_string(),
            qname: "genChecker0.ArrayF0S1E2".to_string(),
            nelements: 2,
            slice: true,
            eltype: Box::new(num(NumTag::Byte, 8)),
        }));
        assert!(slice.has_pointer());
    }

    #[test]
    fn deref_chain_unwraps() {
        let base = num(NumTag::Float, 32);
        let pp = Parm::new(ParmKind::Pointer(Box::new(Parm::new(ParmKind::Pointer(
            Box::new(base),
        )))));
        let (b, star) = deref_chain(&pp);
        assert_eq!(star, "**");
        assert_eq!(b.type_name(), "float32");
        assert_eq!(pp.type_name(), "**float32");
    }
}
