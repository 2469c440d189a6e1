//! Fuzz target for postcard codec roundtrip.
//!
//! Arbitrary bytes fed to `decode` for ledger types must never panic, and
//! successfully decoded values must roundtrip.

#![no_main]

use libfuzzer_sys::fuzz_target;

use tiermark_types::{
    ArchiveEntry, Entry, EntryKey, LedgerDelta, LedgerHeader, Operation, TierTransitions,
    codec::{decode, encode},
};

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let selector = data[0] % 7;
    let payload = &data[1..];

    match selector {
        0 => try_roundtrip::<EntryKey>(payload),
        1 => try_roundtrip::<Entry>(payload),
        2 => try_roundtrip::<ArchiveEntry>(payload),
        3 => try_roundtrip::<LedgerHeader>(payload),
        4 => try_roundtrip::<Operation>(payload),
        5 => try_roundtrip::<LedgerDelta>(payload),
        _ => try_roundtrip::<TierTransitions>(payload),
    }
});

/// Decodes arbitrary bytes as `T`; on success, re-encodes and checks the
/// roundtrip produces the same value.
fn try_roundtrip<T>(data: &[u8])
where
    T: serde::Serialize + serde::de::DeserializeOwned + PartialEq + std::fmt::Debug,
{
    if let Ok(value) = decode::<T>(data) {
        let re_encoded = encode(&value);
        assert!(re_encoded.is_ok(), "encode failed after successful decode");

        let re_decoded = decode::<T>(&re_encoded.expect("already checked"));
        assert!(re_decoded.is_ok(), "re-decode failed after successful encode");
        assert_eq!(value, re_decoded.expect("already checked"), "roundtrip mismatch");
    }
}
