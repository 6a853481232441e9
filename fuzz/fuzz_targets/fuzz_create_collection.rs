//! Fuzzes collection creation with arbitrary names.
//!
//! Any byte soup must be either accepted (then deletable) or rejected
//! with a validation error. No input may panic or wedge the registry.

#![no_main]

use libfuzzer_sys::fuzz_target;
use relish::{Config, Relish};
use std::sync::OnceLock;
use tempfile::TempDir;

struct Harness {
    db: Relish,
    _dir: TempDir,
}

fn harness() -> &'static Harness {
    static HARNESS: OnceLock<Harness> = OnceLock::new();
    HARNESS.get_or_init(|| {
        let dir = TempDir::new().unwrap();
        let db = Relish::open(dir.path().join("fuzz.db"), Config::default()).unwrap();
        Harness { db, _dir: dir }
    })
}

fuzz_target!(|data: &[u8]| {
    let name = String::from_utf8_lossy(data);
    let db = &harness().db;

    match db.create_collection(&name) {
        Ok(id) => {
            // Accepted names must round-trip through the registry
            let stored = db.get_collection(id).unwrap().unwrap();
            assert_eq!(stored.name, name);
            db.delete_collection(id).unwrap();
        }
        Err(err) => {
            assert!(err.is_validation(), "unexpected error kind: {err:?}");
        }
    }
});
