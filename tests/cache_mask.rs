mod common;

use catalog_cache::{CacheScope, FormatStyle};
use test_log::test;

#[test]
fn mask_by_data_id_hides_component() -> catalog_cache::Result<()> {
    let dir = tempfile::tempdir()?;
    let cache = common::open_cache(dir.path());

    let c1 = common::app("app.a", "Edit photos");

    cache.set_contents(
        CacheScope::System,
        FormatStyle::Collection,
        false,
        &[c1.clone(), common::app("app.b", "Play music")],
        "repo",
        None,
    )?;

    assert_eq!(1, cache.get_components_by_id("app.a")?.len());

    cache.mask_by_data_id(c1.data_id());

    assert!(cache.get_components_by_id("app.a")?.is_empty());
    assert!(cache.search(&["photo"], false)?.is_empty());

    // the other component is untouched
    assert_eq!(1, cache.get_components_by_id("app.b")?.len());

    Ok(())
}

#[test]
fn masking_components_override_the_tombstone() -> catalog_cache::Result<()> {
    let dir = tempfile::tempdir()?;
    let cache = common::open_cache(dir.path());

    let c1 = common::app("app.a", "Edit photos");

    cache.set_contents(
        CacheScope::System,
        FormatStyle::Collection,
        false,
        &[c1.clone()],
        "repo",
        None,
    )?;

    cache.mask_by_data_id(c1.data_id());
    assert!(cache.get_components_by_id("app.a")?.is_empty());

    let override_copy = common::app("app.a", "Curated photo editor");
    cache.add_masking_components(&[override_copy])?;

    let hits = cache.get_components_by_id("app.a")?;

    assert_eq!(1, hits.len());
    assert_eq!(Some("Curated photo editor"), hits[0].summary.as_deref());

    Ok(())
}

#[test]
fn mask_overrides_base_section_copy() -> catalog_cache::Result<()> {
    let dir = tempfile::tempdir()?;
    let cache = common::open_cache(dir.path());

    cache.set_contents(
        CacheScope::System,
        FormatStyle::Collection,
        false,
        &[common::app("app.a", "Edit photos")],
        "repo",
        None,
    )?;

    cache.add_masking_components(&[common::app("app.a", "Replacement")])?;

    // same data ID: the mask is queried last and wins the merge
    let hits = cache.get_components_by_id("app.a")?;

    assert_eq!(1, hits.len());
    assert_eq!(Some("Replacement"), hits[0].summary.as_deref());

    Ok(())
}

#[test]
fn masking_components_carry_over() -> catalog_cache::Result<()> {
    let dir = tempfile::tempdir()?;
    let cache = common::open_cache(dir.path());

    let m1 = common::app("mask.one", "First");
    let m2 = common::app("mask.two", "Second");

    cache.add_masking_components(&[m1.clone()])?;
    cache.add_masking_components(&[m2.clone()])?;

    let all = cache.get_components_all()?;
    assert_eq!(vec!["mask.one", "mask.two"], common::ids(&all));

    // only one mask section exists, rebuilt in place
    assert_eq!(1, cache.section_count());

    // a tombstone set after the fact drops the component from carry-over
    cache.mask_by_data_id(m1.data_id());
    cache.add_masking_components(&[common::app("mask.three", "Third")])?;

    let all = cache.get_components_all()?;
    assert_eq!(vec!["mask.three", "mask.two"], common::ids(&all));

    Ok(())
}

#[test]
fn search_finds_masking_components() -> catalog_cache::Result<()> {
    let dir = tempfile::tempdir()?;
    let cache = common::open_cache(dir.path());

    cache.add_masking_components(&[common::app("mask.app", "Curated photo tool")])?;

    let hits = cache.search(&["photo"], false)?;

    assert_eq!(1, hits.len());
    assert_eq!("mask.app", hits[0].id);

    Ok(())
}
