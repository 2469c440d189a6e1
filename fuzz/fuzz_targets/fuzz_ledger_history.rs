//! Fuzz target for ledger-commit and startup checks.
//!
//! Bytes drive a simulated two-tier ledger whose transitions are correct by
//! construction. Built with `cfg(fuzzing)`, any invariant failure aborts, so
//! every crash is a false positive in the checks or a bug in the ledger.

#![no_main]

use libfuzzer_sys::fuzz_target;

use tiermark_invariant::InvariantManager;
use tiermark_test_utils::{SimAction, SimulatedLedger, test_invariant_config};
use tiermark_types::Durability;

fn action(chunk: &[u8]) -> SimAction {
    let seed = chunk[1] % 8;
    let lifetime = u32::from(chunk[2] % 6);
    match chunk[0] % 8 {
        0 | 1 => {
            SimAction::Create { seed, durability: Durability::Persistent, val: chunk[2], lifetime }
        },
        2 => SimAction::Create { seed, durability: Durability::Temporary, val: chunk[2], lifetime },
        3 => SimAction::Update { seed, val: chunk[2] },
        4 | 5 => SimAction::Restore { seed, lifetime },
        _ => SimAction::Close,
    }
}

fuzz_target!(|data: &[u8]| {
    let Some((&control, rest)) = data.split_first() else {
        return;
    };

    let mut manager = InvariantManager::new(&test_invariant_config(&[".*"]));
    if manager.register_builtin().is_err() || manager.enable_from_config().is_err() {
        return;
    }
    let protocol = if control & 1 == 0 { 23 } else { 24 };
    let mut ledger = SimulatedLedger::new(protocol).with_restoration_markers(control & 2 != 0);

    for chunk in rest.chunks_exact(3) {
        let Ok(closed) = ledger.apply(&action(chunk)) else {
            return;
        };
        let Some(closed) = closed else {
            continue;
        };
        let commit = manager.check_on_ledger_commit(
            &closed.previous_live,
            &closed.previous_archive,
            &closed.transitions,
        );
        assert!(commit.is_ok(), "commit check rejected a correct ledger: {commit:?}");
        let start = manager.start(&closed.live, &closed.archive);
        assert!(start.is_ok(), "startup scan rejected a correct ledger: {start:?}");
    }
});
