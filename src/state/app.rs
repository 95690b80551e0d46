use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tokio::task;
use tracing::{debug, error, info, warn};

use super::catalog;
use super::data::{BuildingId, CampusBuilding, CrowdStatus, MapStyle, StudySpace};
use super::profile::{ProfileCache, UserProfile};
use super::time::format_relative_time;
use crate::error::StateError;
use crate::store::{Record, RemoteStore, SubscriptionHandle, STUDY_SPACES};

/// The application state.
///
/// Owns the mirror of the remote study-space collection and the building
/// catalog. The UI reads it freely but mutates it only through these
/// methods; the mirror itself changes only in `on_remote_change`.
pub struct CampusState {
    store: Arc<dyn RemoteStore>,
    profiles: ProfileCache,
    /// Mirror of the remote collection, ordered by id
    study_spaces: Vec<StudySpace>,
    buildings: Vec<CampusBuilding>,
    selected_building: Option<BuildingId>,
    selected_space: Option<String>,
    search_text: String,
    map_style: MapStyle,
    connected: bool,
    profile: Option<UserProfile>,
    subscription: Option<SubscriptionHandle>,
}

impl CampusState {
    pub fn new(store: Arc<dyn RemoteStore>, profiles: ProfileCache) -> Self {
        Self {
            store,
            profiles,
            study_spaces: Vec::new(),
            buildings: Vec::new(),
            selected_building: None,
            selected_space: None,
            search_text: String::new(),
            map_style: MapStyle::default(),
            connected: false,
            profile: None,
            subscription: None,
        }
    }

    /// Sign in, load the catalog and cached profile, seed the collection if
    /// it is empty, and open the study-space subscription.
    ///
    /// `on_change` receives every delivery from the subscription, on the
    /// store's thread; the caller routes it back to `on_remote_change`.
    ///
    /// Only a successful call leaves the state initialized, so a failed one
    /// can be retried.
    pub fn initialize(
        &mut self,
        on_change: impl Fn(Vec<StudySpace>) + Send + Sync + 'static,
    ) -> Result<(), StateError> {
        if self.subscription.is_some() {
            return Err(StateError::AlreadyInitialized);
        }

        self.connected = match self.store.sign_in_anonymously() {
            Ok(identity) => {
                info!("🔑 Signed in anonymously as {}", identity.uid);
                true
            }
            Err(e) => {
                error!("❌ Anonymous sign-in failed: {e}");
                false
            }
        };

        self.buildings = catalog::buildings()?;
        info!("🗺️  Loaded {} campus buildings", self.buildings.len());

        self.profile = match self.profiles.load() {
            Ok(profile) => profile,
            Err(e) => {
                warn!("⚠️  Ignoring cached profile at {}: {e}", self.profiles.path().display());
                None
            }
        };

        if self.connected {
            match self.store.ensure_seeded(STUDY_SPACES, &catalog::seed_records()) {
                Ok(0) => debug!("Study spaces already seeded"),
                Ok(count) => info!("🌱 Seeded {count} default study spaces"),
                Err(e) => error!("❌ Failed to seed study spaces: {e}"),
            }
        }

        let subscription = self
            .store
            .subscribe(
                STUDY_SPACES,
                Box::new(move |records| on_change(decode_spaces(records))),
            )
            .map_err(|e| {
                self.connected = false;
                error!("❌ Failed to subscribe to study spaces: {e}");
                StateError::from(e)
            })?;
        self.subscription = Some(subscription);

        Ok(())
    }

    /// Close the subscription. Writes already issued are not cancelled.
    pub fn teardown(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
            info!("👋 Study space subscription closed");
        }
    }

    /// Report a crowd status for a space.
    ///
    /// The write carries every field of the mirrored record so the full
    /// overwrite does not clobber them. The mirror is left alone; it updates
    /// when the subscription echoes the stored value.
    pub fn set_crowd_status(
        &self,
        space_id: &str,
        status: CrowdStatus,
    ) -> impl Future<Output = Result<(), StateError>> + Send + 'static {
        let write = self
            .space(space_id)
            .map(|space| (space.id.clone(), space.fields_with_status(status)))
            .ok_or_else(|| StateError::NotFound(space_id.to_string()));
        let store = Arc::clone(&self.store);

        async move {
            let (id, fields) = match write {
                Ok(write) => write,
                Err(e) => {
                    warn!("⚠️  {e}");
                    return Err(e);
                }
            };

            let outcome = task::spawn_blocking(move || {
                store.write(STUDY_SPACES, &id, fields).map(|()| id)
            })
            .await
            .map_err(|e| StateError::Task(e.to_string()))?;

            match outcome {
                Ok(id) => {
                    info!("✅ Updated {id} status to {status}");
                    Ok(())
                }
                Err(e) => {
                    error!("❌ Failed to update crowd status: {e}");
                    Err(e.into())
                }
            }
        }
    }

    /// Replace the mirror with a subscription delivery.
    ///
    /// Returns `true` when the selected space is no longer in the mirror and
    /// its selection was dropped.
    pub fn on_remote_change(&mut self, mut spaces: Vec<StudySpace>) -> bool {
        spaces.sort_by(|a, b| a.id.cmp(&b.id));
        debug!("🔄 Mirror replaced with {} study spaces", spaces.len());

        self.study_spaces = spaces;
        let stale = self
            .selected_space
            .as_deref()
            .is_some_and(|id| self.space(id).is_none());
        if stale {
            self.selected_space = None;
        }
        stale
    }

    /// Buildings whose name or code contains `search` (case-insensitive),
    /// in catalog order. An empty search matches everything.
    pub fn filter_buildings(&self, search: &str) -> Vec<&CampusBuilding> {
        let needle = search.to_lowercase();
        if needle.is_empty() {
            return self.buildings.iter().collect();
        }

        self.buildings
            .iter()
            .filter(|b| {
                b.name.to_lowercase().contains(&needle) || b.code.to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// Buildings matching the current search text
    pub fn filtered_buildings(&self) -> Vec<&CampusBuilding> {
        self.filter_buildings(&self.search_text)
    }

    pub fn set_search_text(&mut self, text: String) {
        self.search_text = text;
    }

    pub fn search_text(&self) -> &str {
        &self.search_text
    }

    pub fn building(&self, id: &BuildingId) -> Option<&CampusBuilding> {
        self.buildings.iter().find(|b| &b.id == id)
    }

    /// Select a building; unknown ids leave the selection unchanged.
    pub fn select_building(&mut self, id: &BuildingId) -> Option<&CampusBuilding> {
        if self.building(id).is_none() {
            warn!("⚠️  Unknown building: {id}");
            return None;
        }
        self.selected_building = Some(id.clone());
        self.building(id)
    }

    pub fn selected_building(&self) -> Option<&CampusBuilding> {
        self.selected_building.as_ref().and_then(|id| self.building(id))
    }

    pub fn space(&self, id: &str) -> Option<&StudySpace> {
        self.study_spaces.iter().find(|s| s.id == id)
    }

    pub fn select_space(&mut self, id: &str) -> Option<&StudySpace> {
        self.space(id)?;
        self.selected_space = Some(id.to_string());
        self.space(id)
    }

    pub fn clear_space_selection(&mut self) {
        self.selected_space = None;
    }

    /// The selected space as currently mirrored
    pub fn selected_space(&self) -> Option<&StudySpace> {
        self.selected_space.as_deref().and_then(|id| self.space(id))
    }

    pub fn set_map_style(&mut self, style: MapStyle) {
        self.map_style = style;
    }

    pub fn map_style(&self) -> MapStyle {
        self.map_style
    }

    /// Directions are not computed; this is the notice shown instead.
    pub fn directions_to_selected(&self) -> Option<String> {
        self.selected_building()
            .map(|b| format!("Directions to {} would be displayed here.", b.name))
    }

    pub fn last_updated_label(&self, space: &StudySpace) -> String {
        format_relative_time(space.last_updated, Utc::now())
    }

    pub fn study_spaces(&self) -> &[StudySpace] {
        &self.study_spaces
    }

    pub fn buildings(&self) -> &[CampusBuilding] {
        &self.buildings
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    pub fn is_logged_in(&self) -> bool {
        self.profile.is_some()
    }
}

/// Decode store records, dropping any that cannot be read.
fn decode_spaces(records: Vec<Record>) -> Vec<StudySpace> {
    records
        .into_iter()
        .filter_map(|record| match StudySpace::from_record(record) {
            Ok(space) => Some(space),
            Err(e) => {
                warn!("⚠️  Dropping study space: {e}");
                None
            }
        })
        .collect()
}

impl std::fmt::Debug for CampusState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CampusState")
            .field("study_spaces", &self.study_spaces.len())
            .field("buildings", &self.buildings.len())
            .field("connected", &self.connected)
            .field("selected_space", &self.selected_space)
            .finish()
    }
}
