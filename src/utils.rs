use crate::prelude::*;
use rand::rngs::StdRng;
use rand::{self as rnd, Rng, SeedableRng};

pub async fn clock_cycles(signal: SimObject, n_cycles: u32) -> TbResult {
    for _ in 0..n_cycles {
        signal.rising_edge().await;
    }
    Ok(Val::None)
}

/// Uniform in `0..ceil`. Panics if `ceil` is 0.
#[inline]
pub fn rand_int(ceil: u32) -> u32 {
    rnd::thread_rng().gen_range(0..ceil)
}

/// Reproducible stream for randomized benches; log the seed so a failing run can be replayed.
pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rand_int_stays_below_ceil() {
        for _ in 0..1000 {
            assert!(rand_int(3) < 3);
        }
    }

    #[test]
    fn seeded_rng_repeats() {
        let a: Vec<u8> = seeded_rng(7).sample_iter::<u8, _>(rnd::distributions::Standard).take(8).collect();
        let b: Vec<u8> = seeded_rng(7).sample_iter::<u8, _>(rnd::distributions::Standard).take(8).collect();
        assert_eq!(a, b);
    }
}
