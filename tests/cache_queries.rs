mod common;

use catalog_cache::{
    CacheScope, ComponentKind, FormatStyle, Launchable, LaunchableKind, Provided, ProvidedKind,
};
use test_log::test;

#[test]
fn query_by_categories_is_an_and() -> catalog_cache::Result<()> {
    let dir = tempfile::tempdir()?;
    let cache = common::open_cache(dir.path());

    let mut c1 = common::app("app.a", "Edit photos");
    c1.categories = vec!["Graphics".into(), "Photography".into()];

    let mut c3 = common::app("app.c", "Draw vectors");
    c3.categories = vec!["Graphics".into()];

    cache.set_contents(
        CacheScope::System,
        FormatStyle::Collection,
        false,
        &[c1, common::app("app.b", "Play music"), c3],
        "repo",
        None,
    )?;

    let hits = cache.get_components_by_categories(&["Graphics", "Photography"])?;
    assert_eq!(vec!["app.a"], common::ids(&hits));

    let hits = cache.get_components_by_categories(&["Graphics"])?;
    assert_eq!(vec!["app.a", "app.c"], common::ids(&hits));

    assert!(cache.get_components_by_categories(&[])?.is_empty());
    assert!(cache.get_components_by_categories(&["Office"])?.is_empty());

    Ok(())
}

#[test]
fn query_by_provided_dbus_service() -> catalog_cache::Result<()> {
    let dir = tempfile::tempdir()?;
    let cache = common::open_cache(dir.path());

    let mut c = common::app("app.a", "Background sync");
    c.provides = vec![Provided {
        kind: ProvidedKind::DbusSystem,
        items: vec!["org.example.X".into()],
    }];

    cache.set_contents(
        CacheScope::System,
        FormatStyle::Collection,
        false,
        &[c, common::app("app.b", "Play music")],
        "repo",
        None,
    )?;

    let hits = cache.get_components_by_provided_item(ProvidedKind::DbusSystem, "org.example.X")?;
    assert_eq!(vec!["app.a"], common::ids(&hits));

    // same name on the wrong bus does not match
    let hits = cache.get_components_by_provided_item(ProvidedKind::DbusUser, "org.example.X")?;
    assert!(hits.is_empty());

    Ok(())
}

#[test]
fn query_by_provided_mediatype() -> catalog_cache::Result<()> {
    let dir = tempfile::tempdir()?;
    let cache = common::open_cache(dir.path());

    let mut c = common::app("app.a", "Edit photos");
    c.provides = vec![Provided {
        kind: ProvidedKind::Mediatype,
        items: vec!["image/x-canon-cr2".into()],
    }];

    cache.set_contents(
        CacheScope::System,
        FormatStyle::Collection,
        false,
        &[c],
        "repo",
        None,
    )?;

    let hits =
        cache.get_components_by_provided_item(ProvidedKind::Mediatype, "image/x-canon-cr2")?;
    assert_eq!(1, hits.len());

    assert!(cache
        .get_components_by_provided_item(ProvidedKind::Mediatype, "image/png")?
        .is_empty());

    Ok(())
}

#[test]
fn query_by_launchable() -> catalog_cache::Result<()> {
    let dir = tempfile::tempdir()?;
    let cache = common::open_cache(dir.path());

    let mut c = common::app("app.a", "Edit photos");
    c.launchables = vec![Launchable {
        kind: LaunchableKind::DesktopId,
        entries: vec!["app.a.desktop".into()],
    }];

    cache.set_contents(
        CacheScope::System,
        FormatStyle::Collection,
        false,
        &[c],
        "repo",
        None,
    )?;

    let hits = cache.get_components_by_launchable(LaunchableKind::DesktopId, "app.a.desktop")?;
    assert_eq!(1, hits.len());

    assert!(cache
        .get_components_by_launchable(LaunchableKind::Service, "app.a.desktop")?
        .is_empty());

    Ok(())
}

#[test]
fn query_by_kind() -> catalog_cache::Result<()> {
    let dir = tempfile::tempdir()?;
    let cache = common::open_cache(dir.path());

    let mut font = catalog_cache::Component::new(ComponentKind::Font, "font.a");
    font.origin = Some("test-origin".into());

    cache.set_contents(
        CacheScope::System,
        FormatStyle::Collection,
        false,
        &[common::app("app.a", "Edit photos"), font],
        "repo",
        None,
    )?;

    let hits = cache.get_components_by_kind(ComponentKind::Font)?;
    assert_eq!(vec!["font.a"], common::ids(&hits));

    let hits = cache.get_components_by_kind(ComponentKind::DesktopApplication)?;
    assert_eq!(vec!["app.a"], common::ids(&hits));

    assert!(cache
        .get_components_by_kind(ComponentKind::Driver)?
        .is_empty());

    Ok(())
}

#[test]
fn query_by_id_is_case_insensitive() -> catalog_cache::Result<()> {
    let dir = tempfile::tempdir()?;
    let cache = common::open_cache(dir.path());

    cache.set_contents(
        CacheScope::System,
        FormatStyle::Collection,
        false,
        &[common::app("org.example.Photos", "Edit photos")],
        "repo",
        None,
    )?;

    assert_eq!(1, cache.get_components_by_id("org.example.Photos")?.len());
    assert_eq!(1, cache.get_components_by_id("ORG.EXAMPLE.PHOTOS")?.len());
    assert!(cache.get_components_by_id("org.example.Music")?.is_empty());

    Ok(())
}

#[test]
fn query_by_id_falls_back_to_provided_ids() -> catalog_cache::Result<()> {
    let dir = tempfile::tempdir()?;
    let cache = common::open_cache(dir.path());

    let mut c = common::app("app.new", "Renamed app");
    c.provides = vec![Provided {
        kind: ProvidedKind::Id,
        items: vec!["app.old".into()],
    }];

    cache.set_contents(
        CacheScope::System,
        FormatStyle::Collection,
        false,
        &[c],
        "repo",
        None,
    )?;

    let hits = cache.get_components_by_id("app.old")?;
    assert_eq!(vec!["app.new"], common::ids(&hits));

    Ok(())
}

#[test]
fn addons_resolve_one_level() -> catalog_cache::Result<()> {
    let dir = tempfile::tempdir()?;
    let cache = common::open_cache(dir.path());

    let mut addon = catalog_cache::Component::new(ComponentKind::Addon, "app.a.extra");
    addon.origin = Some("test-origin".into());
    addon.extends = vec!["app.a".into()];

    cache.set_contents(
        CacheScope::System,
        FormatStyle::Collection,
        false,
        &[common::app("app.a", "Edit photos"), addon],
        "repo",
        None,
    )?;

    let hits = cache.get_components_by_extends("app.a")?;
    assert_eq!(vec!["app.a.extra"], common::ids(&hits));

    let hits = cache.get_components_by_id("app.a")?;
    assert_eq!(1, hits.len());
    assert_eq!(1, hits[0].addons.len());
    assert_eq!("app.a.extra", hits[0].addons[0].id);

    // resolution can be turned off at runtime
    cache.set_auto_resolve_addons(false);

    let hits = cache.get_components_by_id("app.a")?;
    assert!(hits[0].addons.is_empty());

    Ok(())
}
