//! Probability weights, size caps, and feature toggles for generation.

use crate::error::GenerateError;

/// Indices into [`Tunables::type_fractions`].
pub const TF_STRUCT: usize = 0;
pub const TF_ARRAY: usize = 1;
pub const TF_MAP: usize = 2;
pub const TF_POINTER: usize = 3;
pub const TF_NUMERIC: usize = 4;
pub const TF_FLOAT: usize = 5;
pub const TF_COMPLEX: usize = 6;
pub const TF_BYTE: usize = 7;
pub const TF_STRING: usize = 8;

#[derive(Debug, Clone)]
pub struct Tunables {
    /// between 0 and N params
    pub n_parm_range: u8,

    /// between 0 and N returns
    pub n_return_range: u8,

    /// structs have between 0 and N members
    pub n_struct_fields: u8,

    /// arrays/slices have between 0 and N elements
    pub n_array_elements: u8,

    /// fraction of slices vs arrays
    pub slice_fraction: u8,

    /// How often ints wind up as 8/16/32/64 bit. Must sum to 100.
    pub int_bit_ranges: [u8; 4],

    /// Same, for 32/64 bit floats.
    pub float_bit_ranges: [u8; 2],

    /// Same, for unsigned vs signed ints.
    pub unsigned_ranges: [u8; 2],

    /// Percentage of params and struct fields that are blank ("_").
    pub blank_perc: u8,

    /// How deeply container types may nest.
    pub struct_depth: u8,

    /// Fraction of types assigned to struct/array/map/pointer/numeric/
    /// float/complex/byte/string. Must sum to 100. When nesting depth
    /// precludes containers, their weight is redistributed over the rest.
    pub type_fractions: [u8; 9],

    /// Percentage of test functions that call themselves recursively.
    pub recur_perc: u8,

    /// Percentage of test functions that become methods, and for methods,
    /// percentage declared on a pointer receiver.
    pub method_perc: u8,
    pub pointer_method_perc: u8,

    /// If true, each caller also exercises the reflect.Call path.
    pub do_reflect_call: bool,

    /// If true, randomly take addresses of params/returns.
    pub take_address: bool,

    /// Fraction of functions whose params/returns are address-taken at all.
    pub taken_fraction: u8,

    /// For an address-taken param or return, how the indirection is used:
    /// not at all, a simple read/write, passed to a well-behaved function,
    /// or stored to a global. Must sum to 100.
    pub addr_fractions: [u8; 4],

    /// If true, emit defer-based re-checks of parameters.
    pub do_defer: bool,

    /// fraction of test functions for which we emit a defer
    pub defer_fraction: u8,

    /// If true, randomly emit values via a helper function call instead of
    /// inline literals (checker side only).
    pub do_func_call_values: bool,
    pub func_call_val_fraction: u8,
}

impl Default for Tunables {
    fn default() -> Self {
        Tunables {
            n_parm_range: 15,
            n_return_range: 7,
            n_struct_fields: 7,
            n_array_elements: 5,
            slice_fraction: 50,
            int_bit_ranges: [30, 20, 20, 30],
            float_bit_ranges: [50, 50],
            unsigned_ranges: [50, 50],
            blank_perc: 15,
            struct_depth: 3,
            type_fractions: [10, 10, 10, 15, 20, 15, 5, 5, 10],
            recur_perc: 20,
            method_perc: 10,
            pointer_method_perc: 50,
            do_reflect_call: true,
            take_address: true,
            taken_fraction: 20,
            addr_fractions: [50, 25, 15, 10],
            do_defer: true,
            defer_fraction: 30,
            do_func_call_values: true,
            func_call_val_fraction: 5,
        }
    }
}

impl Tunables {
    /// Validate the summation and range invariants. Called once on the
    /// user-supplied record before generation starts, and again (as an
    /// assertion) after every internal rewrite of the weights.
    pub fn check(&self) -> Result<(), GenerateError> {
        fn sums_to_100(name: &str, vals: &[u8]) -> Result<(), GenerateError> {
            let s: u32 = vals.iter().map(|&v| v as u32).sum();
            if s != 100 {
                return Err(GenerateError::Tunables(format!(
                    "{name} does not sum to 100 (got {s})"
                )));
            }
            Ok(())
        }
        fn percentage(name: &str, val: u8) -> Result<(), GenerateError> {
            if val > 100 {
                return Err(GenerateError::Tunables(format!(
                    "{name} not between 0 and 100 (got {val})"
                )));
            }
            Ok(())
        }
        sums_to_100("int_bit_ranges", &self.int_bit_ranges)?;
        sums_to_100("float_bit_ranges", &self.float_bit_ranges)?;
        sums_to_100("unsigned_ranges", &self.unsigned_ranges)?;
        sums_to_100("type_fractions", &self.type_fractions)?;
        sums_to_100("addr_fractions", &self.addr_fractions)?;
        percentage("blank_perc", self.blank_perc)?;
        percentage("recur_perc", self.recur_perc)?;
        percentage("method_perc", self.method_perc)?;
        percentage("pointer_method_perc", self.pointer_method_perc)?;
        percentage("slice_fraction", self.slice_fraction)?;
        percentage("taken_fraction", self.taken_fraction)?;
        percentage("defer_fraction", self.defer_fraction)?;
        percentage("func_call_val_fraction", self.func_call_val_fraction)?;
        Ok(())
    }

    pub fn disable_reflect_call(&mut self) {
        self.do_reflect_call = false;
    }

    pub fn disable_recursive_calls(&mut self) {
        self.recur_perc = 0;
    }

    pub fn disable_method_calls(&mut self) {
        self.method_perc = 0;
    }

    pub fn disable_take_addr(&mut self) {
        self.take_address = false;
    }

    pub fn disable_defer(&mut self) {
        self.do_defer = false;
    }

    pub fn limit_inputs(&mut self, n: u8) -> Result<(), GenerateError> {
        if n > 100 {
            return Err(GenerateError::Tunables(format!(
                "value {n} passed to limit_inputs is too large (max 100)"
            )));
        }
        self.n_parm_range = n;
        Ok(())
    }

    pub fn limit_outputs(&mut self, n: u8) -> Result<(), GenerateError> {
        if n > 100 {
            return Err(GenerateError::Tunables(format!(
                "value {n} passed to limit_outputs is too large (max 100)"
            )));
        }
        self.n_return_range = n;
        Ok(())
    }

    /// Zero out the selected type buckets, spreading their weight over the
    /// remaining buckets so the fractions still sum to 100. Used for scoped
    /// overrides: map keys preclude maps and pointers, receivers preclude
    /// pointers, and depth-capped positions preclude all containers.
    pub fn preclude_types(&mut self, avoid: &[usize]) {
        let mut freed: u32 = 0;
        for &idx in avoid {
            freed += self.type_fractions[idx] as u32;
            self.type_fractions[idx] = 0;
        }
        'spread: loop {
            for idx in 0..self.type_fractions.len() {
                if avoid.contains(&idx) {
                    continue;
                }
                if freed == 0 {
                    break 'spread;
                }
                self.type_fractions[idx] += 1;
                freed -= 1;
            }
        }
        self.check()
            .expect("internal error: type fractions invalid after preclusion");
    }
}
