//! String parameter type.

use crate::generator::GenState;

/// Rune pool for generated string literals. Deliberately mixes scripts and
/// widths so that string contents exercise multi-byte encodings.
const LETTERS: &[char] = &[
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'α', 'β', 'γ', 'δ', 'ε', 'ζ', 'η', 'θ', 'б', 'г', 'д',
    'е', 'ж', 'з', 'и', 'к', '中', '文', '测', '试', '数', '据', '生', '成', '☂', '☕', '☘', '☢',
    '♞', '♫', '⚑', '⚡',
];

pub fn gen_value(s: &mut GenState, value: usize) -> (String, usize) {
    let ns = (LETTERS.len() - 9) as u64;
    let nel = s.wr.intn(8);
    let st = s.wr.intn(ns) as usize;
    let en = usize::min(st + nel as usize, ns as usize);
    let lit: String = LETTERS[st..en].iter().collect();
    (format!("\"{lit}\""), value + 1)
}
