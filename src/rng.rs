//! Counting wrapper around the seeded PRNG.
//!
//! The caller emitter and the checker emitter each walk the same function
//! descriptor with their own stream, reseeded from the per-pair seed. Every
//! draw is counted per primitive, and the two streams are compared after a
//! pair has been emitted: a count mismatch means the emitters took different
//! random paths and the generated halves can no longer agree on values.

use rand::Rng;
use rand_core::SeedableRng;
use rand_distr::StandardNormal;

type RngImpl = rand_pcg::Pcg64;

pub struct WrapRand {
    rng: RngImpl,
    seed: u64,
    pub tag: &'static str,
    intn_calls: usize,
    f32_calls: usize,
    f64_calls: usize,
    checkpoint: &'static str,
    trace: Option<Vec<String>>,
}

impl WrapRand {
    pub fn new(seed: u64, debug: bool) -> Self {
        WrapRand {
            rng: RngImpl::seed_from_u64(seed),
            seed,
            tag: "",
            intn_calls: 0,
            f32_calls: 0,
            f64_calls: 0,
            checkpoint: "",
            trace: debug.then(Vec::new),
        }
    }

    /// Mark a phase boundary; recorded draws are attributed to the most
    /// recent checkpoint so a divergence can be localized.
    pub fn checkpoint(&mut self, label: &'static str) {
        self.checkpoint = label;
        self.note("checkpoint", 0);
    }

    fn note(&mut self, what: &str, arg: u64) {
        if let Some(trace) = &mut self.trace {
            trace.push(format!("{what}({arg}) at '{}'", self.checkpoint));
        }
    }

    pub fn intn(&mut self, n: u64) -> u64 {
        self.note("intn", n);
        self.intn_calls += 1;
        self.rng.gen_range(0..n.max(1))
    }

    pub fn float32(&mut self) -> f32 {
        self.note("float32", 0);
        self.f32_calls += 1;
        self.rng.gen::<f32>()
    }

    pub fn norm_float64(&mut self) -> f64 {
        self.note("norm_float64", 0);
        self.f64_calls += 1;
        self.rng.sample(StandardNormal)
    }

    pub fn counts(&self) -> (usize, usize, usize) {
        (self.intn_calls, self.f32_calls, self.f64_calls)
    }

    pub fn matches(&self, other: &WrapRand) -> bool {
        self.counts() == other.counts()
    }

    /// Panics if the two streams disagree on any per-primitive call count.
    /// Disagreement is a bug in the twin emitters, never a user error.
    pub fn check(&self, other: &WrapRand) {
        if self.matches(other) {
            return;
        }
        let describe = |w: &WrapRand| {
            let tag = if w.tag.is_empty() { "stream" } else { w.tag };
            format!(
                "{tag}: {{i:{} f32:{} f64:{}}} seed {}",
                w.intn_calls, w.f32_calls, w.f64_calls, w.seed
            )
        };
        let mut msg = format!(
            "random stream consistency check failed:\n {}\n {}\n",
            describe(self),
            describe(other)
        );
        if let (Some(t1), Some(t2)) = (&self.trace, &other.trace) {
            for (i, (a, b)) in t1.iter().zip(t2.iter()).enumerate() {
                if a != b {
                    msg.push_str(&format!(" first divergence at call {i}: {a} vs {b}\n"));
                    break;
                }
            }
        }
        panic!("{msg}");
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn same_seed_same_draws() {
        let mut a = WrapRand::new(42, false);
        let mut b = WrapRand::new(42, false);
        for n in 1..200u64 {
            assert_eq!(a.intn(n), b.intn(n));
        }
        assert_eq!(a.float32(), b.float32());
        assert_eq!(a.norm_float64(), b.norm_float64());
        assert!(a.matches(&b));
    }

    #[test]
    fn counts_track_primitives() {
        let mut w = WrapRand::new(1, false);
        w.intn(10);
        w.intn(10);
        w.float32();
        w.norm_float64();
        assert_eq!(w.counts(), (2, 1, 1));
    }

    #[test]
    #[should_panic(expected = "random stream consistency check failed")]
    fn mismatch_is_fatal() {
        let mut a = WrapRand::new(7, false);
        let b = WrapRand::new(7, false);
        a.intn(10);
        a.check(&b);
    }
}
