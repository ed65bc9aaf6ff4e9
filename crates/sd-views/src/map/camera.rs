//! Map camera

use sd_core::SelectionChange;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Animated move in progress, if any
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub duration_ms: u64,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapViewState {
    pub center: LatLng,
    pub zoom: f64,
    pub transition: Transition,
}

/// Continental US
pub const OVERVIEW_CENTER: LatLng = LatLng::new(39.8, -98.5);
pub const OVERVIEW_ZOOM: f64 = 3.8;
/// Street level, used when flying to a provider
pub const FOCUS_ZOOM: f64 = 11.0;
pub const FLY_DURATION_MS: u64 = 1200;
pub const RESET_DURATION_MS: u64 = 800;

impl Default for MapViewState {
    fn default() -> Self {
        Self {
            center: OVERVIEW_CENTER,
            zoom: OVERVIEW_ZOOM,
            transition: Transition {
                duration_ms: 0,
                active: false,
            },
        }
    }
}

/// What a selection change asks of the camera
#[derive(Debug, Clone, PartialEq)]
pub enum CameraIntent {
    /// Fly to the newly focused provider once its coordinates are known
    AwaitEntity,
    /// Provider and region both cleared: back to the overview
    Reset,
    /// Leave the camera where the user put it
    Keep,
}

impl CameraIntent {
    pub fn for_change(change: &SelectionChange) -> Self {
        let current = &change.current;
        let previous = &change.previous;

        if current.focused_entity().is_some() {
            if current.focused_entity() != previous.focused_entity() {
                return CameraIntent::AwaitEntity;
            }
            return CameraIntent::Keep;
        }

        let was_narrowed = previous.focused_entity().is_some() || previous.region.is_some();
        if current.region.is_none() && was_narrowed {
            return CameraIntent::Reset;
        }
        CameraIntent::Keep
    }
}

/// Camera state with the two moves the dashboard makes on its own
#[derive(Debug, Clone, Default)]
pub struct Camera {
    state: MapViewState,
}

impl Camera {
    pub fn state(&self) -> MapViewState {
        self.state
    }

    pub fn fly_to(&mut self, center: LatLng) {
        self.state = MapViewState {
            center,
            zoom: FOCUS_ZOOM,
            transition: Transition {
                duration_ms: FLY_DURATION_MS,
                active: true,
            },
        };
    }

    pub fn reset(&mut self) {
        self.state = MapViewState {
            transition: Transition {
                duration_ms: RESET_DURATION_MS,
                active: true,
            },
            ..MapViewState::default()
        };
    }

    /// User pan or zoom; no animation
    pub fn set_view(&mut self, center: LatLng, zoom: f64) {
        self.state = MapViewState {
            center,
            zoom,
            transition: Transition {
                duration_ms: 0,
                active: false,
            },
        };
    }

    /// The renderer finished the running transition
    pub fn settle(&mut self) {
        self.state.transition.active = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sd_core::{ChangeOrigin, Focus, Region, Selection};

    fn change(previous: Selection, current: Selection) -> SelectionChange {
        let fields = previous.changed_fields(&current);
        SelectionChange {
            previous,
            current,
            origin: ChangeOrigin::User,
            fields,
        }
    }

    #[test]
    fn test_intent() {
        let tx = Some(Region::from("TX"));
        let provider = Focus::Entity("1234567890".into());

        assert_eq!(
            CameraIntent::for_change(&change(Selection::default(), Selection::new(None, provider.clone()))),
            CameraIntent::AwaitEntity
        );
        assert_eq!(
            CameraIntent::for_change(&change(
                Selection::new(tx.clone(), provider.clone()),
                Selection::default()
            )),
            CameraIntent::Reset
        );
        // clearing the provider but keeping the region leaves the camera alone
        assert_eq!(
            CameraIntent::for_change(&change(
                Selection::new(tx.clone(), provider.clone()),
                Selection::new(tx.clone(), Focus::None)
            )),
            CameraIntent::Keep
        );
        // region change while a provider stays focused
        assert_eq!(
            CameraIntent::for_change(&change(
                Selection::new(None, provider.clone()),
                Selection::new(tx, provider)
            )),
            CameraIntent::Keep
        );
    }

    #[test]
    fn test_moves() {
        let mut camera = Camera::default();
        camera.fly_to(LatLng::new(29.76, -95.37));
        assert_eq!(camera.state().zoom, FOCUS_ZOOM);
        assert!(camera.state().transition.active);
        camera.settle();
        assert!(!camera.state().transition.active);

        camera.reset();
        assert_eq!(camera.state().center, OVERVIEW_CENTER);
        assert_eq!(camera.state().zoom, OVERVIEW_ZOOM);
    }
}
