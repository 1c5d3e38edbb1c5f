mod common;

use catalog_cache::{CacheScope, FormatStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use test_log::test;

#[test]
fn concurrent_searches_during_rebuilds() -> catalog_cache::Result<()> {
    let dir = tempfile::tempdir()?;
    let cache = Arc::new(common::open_cache(dir.path()));

    cache.set_contents(
        CacheScope::System,
        FormatStyle::Collection,
        false,
        &[common::app("app.a", "Edit photos v0")],
        "repo",
        None,
    )?;

    let stop = Arc::new(AtomicBool::new(false));
    let mut readers = Vec::new();

    for _ in 0..4 {
        let cache = cache.clone();
        let stop = stop.clone();

        readers.push(std::thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                let hits = cache.search(&["photo"], true).expect("search should not fail");

                // a rebuild swaps the section wholesale: there is always
                // exactly one matching component, old or new
                assert_eq!(1, hits.len());
                assert_eq!("app.a", hits[0].id);

                let by_id = cache
                    .get_components_by_id("app.a")
                    .expect("query should not fail");
                assert_eq!(1, by_id.len());
            }
        }));
    }

    for round in 1..=20 {
        cache.set_contents(
            CacheScope::System,
            FormatStyle::Collection,
            false,
            &[common::app("app.a", &format!("Edit photos v{round}"))],
            "repo",
            None,
        )?;
    }

    stop.store(true, Ordering::Relaxed);

    for reader in readers {
        reader.join().expect("reader should not panic");
    }

    Ok(())
}
