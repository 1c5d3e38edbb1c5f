// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

mod data_id;

pub use data_id::DataId;

use rustc_hash::FxHashSet;

/// Component type
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ComponentKind {
    /// Unrecognized type string
    Unknown,

    /// Generic software component
    Generic,

    /// Graphical desktop application
    DesktopApplication,

    /// Terminal application
    ConsoleApplication,

    /// Web application
    WebApplication,

    /// Extension of another component
    Addon,

    /// Font collection
    Font,

    /// Multimedia codec
    Codec,

    /// Input method
    InputMethod,

    /// Runtime platform
    Runtime,

    /// Device firmware
    Firmware,

    /// Device driver
    Driver,

    /// Translation pack
    Localization,

    /// System service
    Service,

    /// Operating system
    OperatingSystem,

    /// Metadata or package repository
    Repository,
}

impl ComponentKind {
    /// Canonical type string of this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Generic => "generic",
            Self::DesktopApplication => "desktop-application",
            Self::ConsoleApplication => "console-application",
            Self::WebApplication => "web-application",
            Self::Addon => "addon",
            Self::Font => "font",
            Self::Codec => "codec",
            Self::InputMethod => "inputmethod",
            Self::Runtime => "runtime",
            Self::Firmware => "firmware",
            Self::Driver => "driver",
            Self::Localization => "localization",
            Self::Service => "service",
            Self::OperatingSystem => "operating-system",
            Self::Repository => "repository",
        }
    }

    /// Parses a type string, falling back to `Unknown`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "generic" => Self::Generic,
            "desktop-application" => Self::DesktopApplication,
            "console-application" => Self::ConsoleApplication,
            "web-application" => Self::WebApplication,
            "addon" => Self::Addon,
            "font" => Self::Font,
            "codec" => Self::Codec,
            "inputmethod" => Self::InputMethod,
            "runtime" => Self::Runtime,
            "firmware" => Self::Firmware,
            "driver" => Self::Driver,
            "localization" => Self::Localization,
            "service" => Self::Service,
            "operating-system" => Self::OperatingSystem,
            "repository" => Self::Repository,
            _ => Self::Unknown,
        }
    }
}

/// Scope a component applies to
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ComponentScope {
    /// Applies to all users of the machine
    System,

    /// Applies to one user
    User,
}

impl ComponentScope {
    /// Canonical scope string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
        }
    }

    /// Parses a scope string, falling back to `System`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s == "user" {
            Self::User
        } else {
            Self::System
        }
    }
}

/// How a component is shipped
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum BundleKind {
    /// Native distribution package
    Package,

    /// Flatpak bundle
    Flatpak,

    /// Snap bundle
    Snap,

    /// AppImage bundle
    AppImage,

    /// Plain tarball
    Tarball,
}

impl BundleKind {
    /// Canonical bundle string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Package => "package",
            Self::Flatpak => "flatpak",
            Self::Snap => "snap",
            Self::AppImage => "appimage",
            Self::Tarball => "tarball",
        }
    }

    /// Parses a bundle string, falling back to `Package`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "flatpak" => Self::Flatpak,
            "snap" => Self::Snap,
            "appimage" => Self::AppImage,
            "tarball" => Self::Tarball,
            _ => Self::Package,
        }
    }
}

/// What kind of metadata a component was loaded from
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OriginKind {
    /// Not tagged yet
    Unknown,

    /// Distributor-aggregated catalog data
    Collection,

    /// Upstream per-component metainfo
    Metainfo,
}

/// Kind of a provided item
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ProvidedKind {
    /// Handled media type
    Mediatype,

    /// Shared library
    Library,

    /// Executable in PATH
    Binary,

    /// Font name
    Font,

    /// Kernel modalias
    Modalias,

    /// Python 3 module
    Python3,

    /// D-Bus service on the system bus
    DbusSystem,

    /// D-Bus service on the session bus
    DbusUser,

    /// Component ID provided in place of another
    Id,
}

impl ProvidedKind {
    /// Element name used in the serialized `provides` block.
    #[must_use]
    pub fn element_name(self) -> &'static str {
        match self {
            Self::Mediatype => "mediatype",
            Self::Library => "library",
            Self::Binary => "binary",
            Self::Font => "font",
            Self::Modalias => "modalias",
            Self::Python3 => "python3",
            Self::DbusSystem | Self::DbusUser => "dbus",
            Self::Id => "id",
        }
    }

    /// Disambiguating `type` attribute, for kinds sharing an element name.
    #[must_use]
    pub fn type_attr(self) -> Option<&'static str> {
        match self {
            Self::DbusSystem => Some("system"),
            Self::DbusUser => Some("user"),
            _ => None,
        }
    }

    /// Reverse of [`ProvidedKind::element_name`] + [`ProvidedKind::type_attr`].
    #[must_use]
    pub fn from_element(name: &str, type_attr: Option<&str>) -> Option<Self> {
        match (name, type_attr) {
            ("mediatype", _) => Some(Self::Mediatype),
            ("library", _) => Some(Self::Library),
            ("binary", _) => Some(Self::Binary),
            ("font", _) => Some(Self::Font),
            ("modalias", _) => Some(Self::Modalias),
            ("python3", _) => Some(Self::Python3),
            ("dbus", Some("user")) => Some(Self::DbusUser),
            ("dbus", _) => Some(Self::DbusSystem),
            ("id", _) => Some(Self::Id),
            _ => None,
        }
    }
}

/// How a component can be launched
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum LaunchableKind {
    /// Freedesktop .desktop file ID
    DesktopId,

    /// Systemd/SysV service name
    Service,

    /// Cockpit manifest name
    CockpitManifest,

    /// Launchable website
    Url,
}

impl LaunchableKind {
    /// Serialized `type` attribute value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DesktopId => "desktop-id",
            Self::Service => "service",
            Self::CockpitManifest => "cockpit-manifest",
            Self::Url => "url",
        }
    }

    /// Parses a `type` attribute value.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "desktop-id" => Some(Self::DesktopId),
            "service" => Some(Self::Service),
            "cockpit-manifest" => Some(Self::CockpitManifest),
            "url" => Some(Self::Url),
            _ => None,
        }
    }
}

/// Web URL type
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum UrlKind {
    /// Unrecognized type string
    Unknown,

    /// Project homepage
    Homepage,

    /// Issue tracker
    Bugtracker,

    /// Help or documentation
    Help,

    /// Donation page
    Donation,

    /// Contact page
    Contact,
}

impl UrlKind {
    /// Serialized `type` attribute value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Homepage => "homepage",
            Self::Bugtracker => "bugtracker",
            Self::Help => "help",
            Self::Donation => "donation",
            Self::Contact => "contact",
        }
    }

    /// Parses a `type` attribute value, falling back to `Unknown`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "homepage" => Self::Homepage,
            "bugtracker" => Self::Bugtracker,
            "help" => Self::Help,
            "donation" => Self::Donation,
            "contact" => Self::Contact,
            _ => Self::Unknown,
        }
    }
}

/// Source a full-text match came from
///
/// The discriminants form a bitmask; a component's search score is the
/// bitwise OR over all matched sources, so a name hit always outranks
/// a lone description hit.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u16)]
pub enum TokenMatch {
    /// Handled media type
    Mediatype = 1 << 0,

    /// Package name
    Pkgname = 1 << 1,

    /// One-line summary
    Summary = 1 << 2,

    /// Display name
    Name = 1 << 3,

    /// Long description or keyword
    Description = 1 << 4,

    /// Component ID
    Id = 1 << 5,

    /// Data origin
    Origin = 1 << 6,
}

impl TokenMatch {
    /// Weight bit contributed by this match source.
    #[must_use]
    pub fn bits(self) -> u16 {
        self as u16
    }

    /// All match sources, most significant first.
    #[must_use]
    pub fn all() -> [Self; 7] {
        [
            Self::Origin,
            Self::Id,
            Self::Description,
            Self::Name,
            Self::Summary,
            Self::Pkgname,
            Self::Mediatype,
        ]
    }
}

/// A typed web link
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Url {
    /// What the link points at
    pub kind: UrlKind,
    /// The link itself
    pub url: String,
}

/// A block of provided items of one kind
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Provided {
    /// Kind of every item in this block
    pub kind: ProvidedKind,
    /// The provided items
    pub items: Vec<String>,
}

/// Launch entry points of one kind
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Launchable {
    /// Kind of every entry in this block
    pub kind: LaunchableKind,
    /// The entry points
    pub entries: Vec<String>,
}

/// A parsed software component record
///
/// This is the in-memory form callers hand to the cache and get back from
/// queries. The cache only reads the fields it indexes; everything else
/// round-trips through the silo untouched.
#[derive(Clone, Debug)]
pub struct Component {
    /// Component type
    pub kind: ComponentKind,
    /// Stable symbolic identifier, compared case-insensitively
    pub id: String,
    /// Name of the metadata origin (e.g. a repository name)
    pub origin: Option<String>,
    /// Branch the component is shipped on
    pub branch: Option<String>,
    /// Whether the component applies to all users or one
    pub scope: ComponentScope,
    /// How the component is shipped
    pub bundle_kind: BundleKind,
    /// Names of the packages shipping this component
    pub pkgnames: Vec<String>,
    /// Human-readable name
    pub name: Option<String>,
    /// One-line summary
    pub summary: Option<String>,
    /// Long description
    pub description: Option<String>,
    /// Search keywords
    pub keywords: Vec<String>,
    /// Typed web links
    pub urls: Vec<Url>,
    /// Freedesktop menu categories
    pub categories: Vec<String>,
    /// IDs of components this one extends
    pub extends: Vec<String>,
    /// Public items this component provides
    pub provides: Vec<Provided>,
    /// How the component can be launched
    pub launchables: Vec<Launchable>,

    /// Kind of metadata this copy was loaded from.
    pub origin_kind: OriginKind,

    /// Match score of the last full-text search that returned this component.
    pub sort_score: u16,

    /// Addons extending this component, resolved one level deep.
    pub addons: Vec<Component>,
}

impl Component {
    /// An empty component of the given kind and ID.
    #[must_use]
    pub fn new(kind: ComponentKind, id: &str) -> Self {
        Self {
            kind,
            id: id.into(),
            origin: None,
            branch: None,
            scope: ComponentScope::System,
            bundle_kind: BundleKind::Package,
            pkgnames: Vec::new(),
            name: None,
            summary: None,
            description: None,
            keywords: Vec::new(),
            urls: Vec::new(),
            categories: Vec::new(),
            extends: Vec::new(),
            provides: Vec::new(),
            launchables: Vec::new(),
            origin_kind: OriginKind::Unknown,
            sort_score: 0,
            addons: Vec::new(),
        }
    }

    /// The 5-part identifier of this concrete copy, used for query
    /// deduplication across sections.
    #[must_use]
    pub fn data_id(&self) -> DataId {
        DataId::new(
            self.scope,
            self.bundle_kind,
            self.origin.as_deref(),
            &self.id,
            self.branch.as_deref(),
        )
    }

    /// Whether this component extends another one.
    #[must_use]
    pub fn is_addon(&self) -> bool {
        self.kind == ComponentKind::Addon
    }

    /// Items provided under the given kind.
    #[must_use]
    pub fn provided_items(&self, kind: ProvidedKind) -> &[String] {
        self.provides
            .iter()
            .find(|p| p.kind == kind)
            .map_or(&[], |p| p.items.as_slice())
    }

    /// Ordered search tokens for one match source.
    #[must_use]
    pub fn tokens_for(&self, source: TokenMatch) -> Vec<String> {
        match source {
            TokenMatch::Mediatype => self.provided_items(ProvidedKind::Mediatype).to_vec(),
            TokenMatch::Pkgname => tokenize_all(self.pkgnames.iter().map(String::as_str)),
            TokenMatch::Summary => tokenize(self.summary.as_deref().unwrap_or_default()),
            TokenMatch::Name => tokenize(self.name.as_deref().unwrap_or_default()),
            TokenMatch::Description => {
                let mut toks =
                    tokenize_all(self.keywords.iter().map(String::as_str));
                let mut seen = toks.iter().cloned().collect::<FxHashSet<_>>();

                for tok in tokenize(self.description.as_deref().unwrap_or_default()) {
                    if seen.insert(tok.clone()) {
                        toks.push(tok);
                    }
                }

                toks
            }
            TokenMatch::Id => vec![self.id.to_ascii_lowercase()],
            TokenMatch::Origin => tokenize(self.origin.as_deref().unwrap_or_default()),
        }
    }
}

/// Splits free text into lowercased, plural-folded search tokens,
/// first-seen order.
///
/// Dots, dashes and underscores stay inside tokens, so IDs like
/// `org.example.Photos` and names like `photo-editor` survive as one
/// token; sentence punctuation is trimmed off the ends.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut seen = FxHashSet::default();

    for raw in text.split(|c: char| !(c.is_alphanumeric() || ".-_".contains(c))) {
        let word = raw.trim_matches(|c: char| !c.is_alphanumeric());

        if word.chars().count() < 2 {
            continue;
        }

        let token = stem(&word.to_lowercase());

        if seen.insert(token.clone()) {
            out.push(token);
        }
    }

    out
}

/// Folds trivial English plurals, so "photo" finds "photos".
///
/// Index tokens and query terms go through the same fold, which is all
/// that matters for matching; callers wanting real stemming can pre-stem
/// their input, the fold is idempotent on stemmed terms.
pub(crate) fn stem(token: &str) -> String {
    let stripped = token
        .strip_suffix('s')
        .filter(|rest| {
            rest.len() > 2 && !rest.ends_with('s') && !rest.ends_with('u') && !rest.ends_with('i')
        })
        .unwrap_or(token);

    stripped.into()
}

fn tokenize_all<'a>(texts: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out = Vec::new();
    let mut seen = FxHashSet::default();

    for text in texts {
        for token in tokenize(text) {
            if seen.insert(token.clone()) {
                out.push(token);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn tokenize_basic() {
        assert_eq!(vec!["edit", "your", "photo"], tokenize("Edit your photos!"));
    }

    #[test]
    fn stem_is_conservative() {
        assert_eq!("photo", stem("photos"));
        assert_eq!("process", stem("process"));
        assert_eq!("status", stem("status"));
        assert_eq!("this", stem("this"));
        assert_eq!("as", stem("as"));
    }

    #[test]
    fn tokenize_keeps_ids_and_compounds() {
        assert_eq!(
            vec!["org.example.photo", "photo-editor"],
            tokenize("org.example.Photos (photo-editor) C"),
        );
    }

    #[test]
    fn tokenize_dedups_and_drops_short() {
        assert_eq!(vec!["aa", "bb"], tokenize("aa bb aa b"));
    }

    #[test]
    fn kind_roundtrip() {
        for kind in [
            ComponentKind::Generic,
            ComponentKind::DesktopApplication,
            ComponentKind::Addon,
            ComponentKind::OperatingSystem,
        ] {
            assert_eq!(kind, ComponentKind::parse(kind.as_str()));
        }

        assert_eq!(ComponentKind::Unknown, ComponentKind::parse("whatever"));
    }

    #[test]
    fn token_match_bits_are_disjoint() {
        let mut acc = 0u16;

        for m in TokenMatch::all() {
            assert_eq!(0, acc & m.bits());
            acc |= m.bits();
        }

        assert_eq!(127, acc);
    }

    #[test]
    fn component_token_sources() {
        let mut c = Component::new(ComponentKind::DesktopApplication, "org.example.Photos");
        c.summary = Some("Edit RAW photos".into());
        c.keywords = vec!["graphics".into(), "RAW".into()];
        c.description = Some("A photo editor for raw images.".into());

        assert_eq!(vec!["edit", "raw", "photo"], c.tokens_for(TokenMatch::Summary));
        assert_eq!(vec!["org.example.photos"], c.tokens_for(TokenMatch::Id));

        let desc = c.tokens_for(TokenMatch::Description);
        assert_eq!("graphic", desc.first().map(String::as_str).unwrap_or_default());
        assert!(desc.contains(&"editor".to_string()));

        // keyword "RAW" already claimed the token, description must not re-add it
        assert_eq!(1, desc.iter().filter(|t| *t == "raw").count());
    }
}
