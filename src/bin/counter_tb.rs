use countbench::bench::{
    test_chip_enable_gating, test_project, test_random_stimulus, test_reset_dominance,
    test_wraparound,
};
use countbench::tt_counter::TtCounter;

// Specify tests to be executed
countbench::run_with_native!(
    TtCounter::new();
    test_project,
    test_reset_dominance,
    test_wraparound,
    test_chip_enable_gating,
    test_random_stimulus,
);
