//! Navigable address: the shareable path + query form of a selection
//!
//! Grammar:
//!
//! ```text
//! /                      overview
//! /provider/<entityId>   focused provider
//! /procedure/<code>      focused procedure
//! ```
//!
//! each with an optional `?state=<region>` query parameter. Ids are
//! percent-encoded path segments. Anything else parses to the overview.

use std::fmt;

use indexmap::IndexMap;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::ids::{CategoryId, EntityId, Region};
use crate::selection::{Focus, Selection};

/// Everything except RFC 3986 unreserved characters gets encoded
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

const PROVIDER_SEGMENT: &str = "provider";
const PROCEDURE_SEGMENT: &str = "procedure";
pub const REGION_PARAM: &str = "state";

/// A path plus query parameters.
///
/// `path` is kept in its encoded form; `query` holds decoded values in
/// insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NavigableAddress {
    pub path: String,
    pub query: IndexMap<String, String>,
}

impl NavigableAddress {
    /// The overview address `/`
    pub fn root() -> Self {
        Self {
            path: "/".to_string(),
            query: IndexMap::new(),
        }
    }

    /// Serialize the addressable part of a selection.
    ///
    /// Auxiliary filters are not part of the address.
    pub fn from_selection(selection: &Selection) -> Self {
        let path = match &selection.focus {
            Focus::Entity(id) if !id.as_str().is_empty() => {
                format!("/{PROVIDER_SEGMENT}/{}", encode(id.as_str()))
            }
            Focus::Category(id) if !id.as_str().is_empty() => {
                format!("/{PROCEDURE_SEGMENT}/{}", encode(id.as_str()))
            }
            _ => "/".to_string(),
        };

        let mut query = IndexMap::new();
        if let Some(region) = selection.region.as_ref().filter(|r| !r.as_str().is_empty()) {
            query.insert(REGION_PARAM.to_string(), region.as_str().to_string());
        }

        Self { path, query }
    }

    /// Parse into a selection. Addresses outside the grammar yield the
    /// all-null selection.
    pub fn to_selection(&self) -> Selection {
        self.try_to_selection().unwrap_or_default()
    }

    fn try_to_selection(&self) -> Option<Selection> {
        let focus = parse_path(&self.path)?;
        let region = self
            .query
            .get(REGION_PARAM)
            .filter(|v| !v.is_empty())
            .map(|v| Region::new(v.as_str()));
        Some(Selection::new(region, focus))
    }

    /// Parse an href such as `/provider/123?state=TX`. A fragment is ignored.
    pub fn parse(href: &str) -> Self {
        let href = href.split('#').next().unwrap_or_default();
        let (path, query) = match href.split_once('?') {
            Some((path, query)) => (path, query),
            None => (href, ""),
        };

        let path = if path.is_empty() { "/" } else { path };

        let mut params = IndexMap::new();
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            if let (Some(key), Some(value)) = (decode_query(key), decode_query(value)) {
                params.insert(key, value);
            }
        }

        Self {
            path: path.to_string(),
            query: params,
        }
    }
}

impl fmt::Display for NavigableAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)?;
        for (i, (key, value)) in self.query.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{sep}{}={}", encode(key), encode(value))?;
        }
        Ok(())
    }
}

fn parse_path(path: &str) -> Option<Focus> {
    if path == "/" {
        return Some(Focus::None);
    }

    let rest = path.strip_prefix('/')?;
    let (kind, raw_id) = rest.split_once('/')?;
    if raw_id.is_empty() || raw_id.contains('/') {
        return None;
    }
    let id = percent_decode_str(raw_id).decode_utf8().ok()?;

    match kind {
        PROVIDER_SEGMENT => Some(Focus::Entity(EntityId::new(id))),
        PROCEDURE_SEGMENT => Some(Focus::Category(CategoryId::new(id))),
        _ => None,
    }
}

fn encode(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

fn decode_query(value: &str) -> Option<String> {
    let value = value.replace('+', " ");
    percent_decode_str(&value)
        .decode_utf8()
        .ok()
        .map(|v| v.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::SelectionStore;
    use proptest::prelude::*;

    #[test]
    fn test_provider_address_with_region() {
        let sel = NavigableAddress::parse("/provider/1234567890?state=TX").to_selection();
        assert_eq!(sel.region, Some(Region::from("TX")));
        assert_eq!(sel.focus, Focus::Entity("1234567890".into()));
    }

    #[test]
    fn test_serialize_shapes() {
        let mut sel = Selection::new(Some("TX".into()), Focus::Category("A1234".into()));
        assert_eq!(
            NavigableAddress::from_selection(&sel).to_string(),
            "/procedure/A1234?state=TX"
        );

        sel.region = None;
        sel.focus = Focus::Entity("1234567890".into());
        assert_eq!(
            NavigableAddress::from_selection(&sel).to_string(),
            "/provider/1234567890"
        );

        assert_eq!(NavigableAddress::from_selection(&Selection::default()).to_string(), "/");
    }

    #[test]
    fn test_ids_are_percent_encoded() {
        let sel = Selection::new(None, Focus::Category("J/9 x".into()));
        let addr = NavigableAddress::from_selection(&sel);
        assert_eq!(addr.to_string(), "/procedure/J%2F9%20x");

        let parsed = NavigableAddress::parse(&addr.to_string()).to_selection();
        assert_eq!(parsed.focus, Focus::Category("J/9 x".into()));
    }

    #[test]
    fn test_aux_filters_are_not_addressed() {
        let mut sel = Selection::default();
        sel.aux.show_only_flagged = true;
        assert_eq!(NavigableAddress::from_selection(&sel), NavigableAddress::root());
    }

    #[test]
    fn test_malformed_addresses_fail_open() {
        for href in [
            "/providers/1",
            "/provider/",
            "/provider/1/extra",
            "/procedure",
            "provider/1",
            "/unknown?state=TX",
            "/provider/%FF%FE",
        ] {
            assert_eq!(
                NavigableAddress::parse(href).to_selection(),
                Selection::default(),
                "{href}"
            );
        }
    }

    #[test]
    fn test_unknown_query_params_are_ignored() {
        let sel = NavigableAddress::parse("/?utm=x&state=CA#top").to_selection();
        assert_eq!(sel.region, Some(Region::from("CA")));
        assert_eq!(sel.focus, Focus::None);
    }

    #[test]
    fn test_empty_href_is_root() {
        assert_eq!(NavigableAddress::parse(""), NavigableAddress::root());
    }

    #[derive(Debug, Clone)]
    enum Pick {
        Entity(String),
        Category(String),
    }

    fn pick() -> impl Strategy<Value = Option<Pick>> {
        proptest::option::of(prop_oneof![
            "\\PC{0,12}".prop_map(Pick::Entity),
            "\\PC{0,12}".prop_map(Pick::Category),
        ])
    }

    #[test]
    fn test_empty_ids_set_through_the_store_round_trip() {
        let store = SelectionStore::default();
        store.set_focused_entity(Some("".into()));
        store.set_region(Some("".into()));

        let href = NavigableAddress::from_selection(&store.get()).to_string();
        assert_eq!(href, "/");
        assert_eq!(NavigableAddress::parse(&href).to_selection(), store.get());
    }

    proptest! {
        #[test]
        fn prop_address_round_trip(
            region in proptest::option::of("([A-Z]{2})?"),
            pick in pick(),
        ) {
            let store = SelectionStore::default();
            store.set_region(region.map(Region::new));
            match pick {
                Some(Pick::Entity(id)) => store.set_focused_entity(Some(EntityId::new(id))),
                Some(Pick::Category(id)) => store.set_focused_category(Some(CategoryId::new(id))),
                None => {}
            }

            let sel = store.get();
            let href = NavigableAddress::from_selection(&sel).to_string();
            let parsed = NavigableAddress::parse(&href).to_selection();
            prop_assert_eq!(parsed, sel);
        }
    }
}
