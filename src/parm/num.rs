//! Numeric parameter types: signed/unsigned ints, bytes, floats, complex.

use crate::generator::GenState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumTag {
    Int,
    Uint,
    Float,
    Complex,
    Byte,
}

impl NumTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            NumTag::Int => "int",
            NumTag::Uint => "uint",
            NumTag::Float => "float",
            NumTag::Complex => "complex",
            NumTag::Byte => "byte",
        }
    }
}

#[derive(Debug, Clone)]
pub struct NumParm {
    pub tag: NumTag,
    /// 8/16/32/64 for ints, 32/64 for floats, 64/128 for complex.
    /// Complex carries twice the width of its float components.
    pub width: u32,
    /// Whether this is the recursion-control parameter.
    pub ctl: bool,
}

impl NumParm {
    pub fn type_name(&self) -> String {
        if self.tag == NumTag::Byte {
            return "byte".to_string();
        }
        format!("{}{}", self.tag.as_str(), self.width)
    }

    /// The numeric literal contract. Signed ints occasionally pin to the
    /// extremes; magnitudes otherwise stay within `1 << (width-2)` with the
    /// sign alternating by value-counter parity. float32 draws uniformly
    /// from the low quarter of its range, float64 from a normal
    /// distribution, and complex pairs two fresh component draws.
    pub fn gen_value(&self, s: &mut GenState, value: usize) -> (String, usize) {
        match self.tag {
            NumTag::Int => {
                let which = s.wr.intn(100);
                let w = self.width;
                let v: i128 = if which < 3 {
                    (1i128 << (w - 1)) - 1
                } else if which < 5 {
                    -1i128 << (w - 1)
                } else {
                    let m = s.wr.intn(1u64 << (w - 2)) as i128;
                    if value % 2 != 0 {
                        -m
                    } else {
                        m
                    }
                };
                (format!("int{w}({v})"), value + 1)
            }
            NumTag::Uint | NumTag::Byte => {
                let nrange = 1u64 << (self.width - 2);
                let v = s.wr.intn(nrange);
                if self.tag == NumTag::Byte {
                    (format!("byte({v})"), value + 1)
                } else {
                    (format!("uint{}({v})", self.width), value + 1)
                }
            }
            NumTag::Float => match self.width {
                32 => {
                    let mut rf = s.wr.float32() * (f32::MAX / 4.0);
                    if value % 2 != 0 {
                        rf = -rf;
                    }
                    (format!("float32({rf})"), value + 1)
                }
                64 => (format!("float64({})", s.wr.norm_float64()), value + 1),
                _ => panic!("unknown float width {}", self.width),
            },
            NumTag::Complex => {
                let comp = NumParm {
                    tag: NumTag::Float,
                    width: match self.width {
                        64 => 32,
                        128 => 64,
                        _ => panic!("unknown complex width {}", self.width),
                    },
                    ctl: false,
                };
                let (f1, v2) = comp.gen_value(s, value);
                let (f2, v3) = comp.gen_value(s, v2);
                (format!("complex({f1},{f2})"), v3)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn type_names() {
        let np = |tag, width| NumParm {
            tag,
            width,
            ctl: false,
        };
        assert_eq!(np(NumTag::Int, 32).type_name(), "int32");
        assert_eq!(np(NumTag::Uint, 8).type_name(), "uint8");
        assert_eq!(np(NumTag::Float, 64).type_name(), "float64");
        assert_eq!(np(NumTag::Complex, 128).type_name(), "complex128");
        assert_eq!(np(NumTag::Byte, 8).type_name(), "byte");
    }
}
