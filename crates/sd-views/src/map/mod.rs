//! Geospatial view
//!
//! Three stacked layers: every geocoded provider in the region (base), the
//! providers billing the focused procedure (overlay), and the focused
//! provider itself (highlight). Picking prefers the topmost layer.

mod camera;

pub use camera::{
    Camera, CameraIntent, LatLng, MapViewState, Transition, FLY_DURATION_MS, FOCUS_ZOOM,
    OVERVIEW_CENTER, OVERVIEW_ZOOM,
};

use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::debug;

use sd_core::format::format_dollars;
use sd_core::{
    CategoryId, EntityId, EventBus, Region, Selection, SelectionChange, SelectionField,
    SelectionStore, SelectionSubscriber,
};
use sd_data::schema::{MapProvider, ProviderDetail};
use sd_data::{CollectionSource, MapQuery};

use crate::loader::SingleLoader;

/// Largest marker radius in pixels
pub const MAX_MARKER_RADIUS: f64 = 20.0;

/// Marker radius for a provider paid `paid`: 2px up to $10K, then 3px per
/// order of magnitude, capped at [`MAX_MARKER_RADIUS`]
pub fn marker_radius(paid: f64) -> f64 {
    let magnitude = paid.max(1.0).log10();
    (2.0 + (magnitude - 4.0).max(0.0) * 3.0).min(MAX_MARKER_RADIUS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LayerKind {
    Base,
    Overlay,
    Highlight,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapPoint {
    pub provider: MapProvider,
    pub radius: f64,
}

/// One layer ready to be drawn, bottom layer first
#[derive(Debug, Clone, PartialEq)]
pub struct RenderLayer {
    pub kind: LayerKind,
    pub points: Vec<MapPoint>,
    pub interactive: bool,
}

/// A point under the cursor, as reported by the renderer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickHit {
    pub layer: LayerKind,
    pub npi: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tooltip {
    pub npi: String,
    pub name: String,
    pub location: String,
    pub paid: String,
}

impl Tooltip {
    fn for_provider(p: &MapProvider) -> Self {
        let location = [p.city.as_deref(), p.state.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            npi: p.npi.clone(),
            name: p.name.clone(),
            location,
            paid: format_dollars(p.total_paid),
        }
    }
}

type OverlayKey = (CategoryId, Option<Region>);

pub struct MapController {
    store: Arc<SelectionStore>,
    camera: Arc<Mutex<Camera>>,
    base: SingleLoader<MapQuery, Vec<MapProvider>>,
    overlay: SingleLoader<OverlayKey, Vec<MapProvider>>,
    highlight: SingleLoader<EntityId, ProviderDetail>,
    base_limit: usize,
}

impl MapController {
    pub fn new(
        store: Arc<SelectionStore>,
        source: Arc<dyn CollectionSource>,
        base_limit: usize,
        overlay_limit: usize,
        events: Arc<EventBus>,
        runtime: Handle,
    ) -> Self {
        let camera = Arc::new(Mutex::new(Camera::default()));

        let base_source = source.clone();
        let base = SingleLoader::new(
            "map base layer",
            Arc::new(move |query: MapQuery| {
                let source = base_source.clone();
                async move { source.map_providers(&query).await }.boxed()
            }),
            runtime.clone(),
        )
        .with_events(events.clone());

        let overlay_source = source.clone();
        let overlay = SingleLoader::new(
            "map procedure overlay",
            Arc::new(move |(code, region): OverlayKey| {
                let source = overlay_source.clone();
                async move {
                    source
                        .procedure_map_providers(&code, region.as_ref(), overlay_limit)
                        .await
                }
                .boxed()
            }),
            runtime.clone(),
        )
        .with_events(events.clone());

        let fly_camera = camera.clone();
        let highlight = SingleLoader::new(
            "map highlight",
            Arc::new(move |id: EntityId| {
                let source = source.clone();
                async move { source.provider_detail(&id).await }.boxed()
            }),
            runtime,
        )
        .with_events(events)
        .on_ready(Arc::new(move |id: &EntityId, detail: &ProviderDetail| {
            match detail.coordinates() {
                Some((lat, lng)) => fly_camera.lock().fly_to(LatLng::new(lat, lng)),
                None => debug!(%id, "focused provider has no coordinates"),
            }
        }));

        Self {
            store,
            camera,
            base,
            overlay,
            highlight,
            base_limit,
        }
    }

    pub fn sync(&self, selection: &Selection) {
        self.base.set_key(Some(MapQuery {
            region: selection.region.clone(),
            limit: Some(self.base_limit),
            ..Default::default()
        }));
        self.overlay.set_key(
            selection
                .focused_category()
                .map(|code| (code.clone(), selection.region.clone())),
        );
        self.highlight.set_key(selection.focused_entity().cloned());
    }

    pub fn camera(&self) -> MapViewState {
        self.camera.lock().state()
    }

    /// The renderer finished animating
    pub fn transition_finished(&self) {
        self.camera.lock().settle();
    }

    /// User pan or zoom
    pub fn set_view(&self, center: LatLng, zoom: f64) {
        self.camera.lock().set_view(center, zoom);
    }

    pub fn is_loading(&self) -> bool {
        self.base.is_loading() || self.overlay.is_loading() || self.highlight.is_loading()
    }

    fn overlay_active(&self) -> bool {
        self.overlay.snapshot().key.is_some()
    }

    /// Layers to draw, bottom first. The base layer stops reacting to the
    /// pointer while a procedure overlay is shown.
    pub fn layers(&self) -> Vec<RenderLayer> {
        let points = |providers: Vec<MapProvider>| {
            providers
                .into_iter()
                .map(|provider| MapPoint {
                    radius: marker_radius(provider.total_paid),
                    provider,
                })
                .collect::<Vec<_>>()
        };

        let overlay_active = self.overlay_active();
        let mut layers = vec![RenderLayer {
            kind: LayerKind::Base,
            points: points(self.base.value().unwrap_or_default()),
            interactive: !overlay_active,
        }];

        if overlay_active {
            layers.push(RenderLayer {
                kind: LayerKind::Overlay,
                points: points(self.overlay.value().unwrap_or_default()),
                interactive: true,
            });
        }

        if let Some(detail) = self.highlight.value().filter(|d| d.coordinates().is_some()) {
            layers.push(RenderLayer {
                kind: LayerKind::Highlight,
                points: points(vec![MapProvider::from(&detail)]),
                interactive: true,
            });
        }

        layers
    }

    /// The provider a pointer event refers to: the hit on the highest
    /// interactive layer wins
    pub fn pick(&self, hits: &[PickHit]) -> Option<MapProvider> {
        let layers = self.layers();
        hits.iter()
            .filter_map(|hit| {
                let layer = layers.iter().find(|l| l.kind == hit.layer && l.interactive)?;
                let point = layer.points.iter().find(|p| p.provider.npi == hit.npi)?;
                Some((layer.kind, point.provider.clone()))
            })
            .max_by_key(|(kind, _)| *kind)
            .map(|(_, provider)| provider)
    }

    pub fn hover(&self, hits: &[PickHit]) -> Option<Tooltip> {
        self.pick(hits).map(|p| Tooltip::for_provider(&p))
    }

    /// Focus the picked provider. Returns its id, if anything was picked.
    pub fn click(&self, hits: &[PickHit]) -> Option<EntityId> {
        let id = EntityId::new(self.pick(hits)?.npi);
        self.store.set_focused_entity(Some(id.clone()));
        Some(id)
    }
}

impl SelectionSubscriber for MapController {
    fn depends_on(&self) -> &[SelectionField] {
        &[SelectionField::Region, SelectionField::Entity, SelectionField::Category]
    }

    fn on_selection_change(&self, change: &SelectionChange) {
        if CameraIntent::for_change(change) == CameraIntent::Reset {
            self.camera.lock().reset();
        }
        self.sync(&change.current);
    }
}
