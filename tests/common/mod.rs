#![allow(dead_code)]

use catalog_cache::{Cache, Component, ComponentKind, Config};
use std::path::Path;

pub fn open_cache(dir: &Path) -> Cache {
    Config::new()
        .locale("en")
        .locations(dir.join("system"), dir.join("user"))
        .open()
}

pub fn app(id: &str, summary: &str) -> Component {
    let mut c = Component::new(ComponentKind::DesktopApplication, id);
    c.origin = Some("test-origin".into());
    c.name = Some(id.rsplit('.').next().unwrap_or(id).into());
    c.summary = Some(summary.into());
    c
}

pub fn ids(components: &[Component]) -> Vec<&str> {
    let mut ids = components.iter().map(|c| c.id.as_str()).collect::<Vec<_>>();
    ids.sort_unstable();
    ids
}
