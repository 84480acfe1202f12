// Per-visitor workspaces. A session holds one controller per advisory page and the weather panel.
// Sessions never share state; dropping one while a request is in flight is safe because the
// late response only ever touches the dropped controller.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::advisories::{
    CropAdvisory, DiseaseAdvisory, FertilizerAdvisory, IrrigationAdvisory, RotationAdvisory, YieldAdvisory,
};
use crate::controller::{Advisory, FormController};
use crate::weather::LocationWeather;

#[derive(Default)]
pub struct Workspace {
    pub crop: FormController<CropAdvisory>,
    pub fertilizer: FormController<FertilizerAdvisory>,
    pub harvest: FormController<YieldAdvisory>,
    pub disease: FormController<DiseaseAdvisory>,
    pub rotation: FormController<RotationAdvisory>,
    pub irrigation: FormController<IrrigationAdvisory>,
    pub weather: Mutex<LocationWeather>,
}

/// An advisory that lives in a [`Workspace`].
pub trait SessionFeature: Advisory + Sized {
    fn controller(workspace: &Workspace) -> &FormController<Self>;
}

macro_rules! session_feature {
    ($advisory:ty, $field:ident) => {
        impl SessionFeature for $advisory {
            fn controller(workspace: &Workspace) -> &FormController<Self> {
                &workspace.$field
            }
        }
    };
}

session_feature!(CropAdvisory, crop);
session_feature!(FertilizerAdvisory, fertilizer);
session_feature!(YieldAdvisory, harvest);
session_feature!(DiseaseAdvisory, disease);
session_feature!(RotationAdvisory, rotation);
session_feature!(IrrigationAdvisory, irrigation);

const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(2 * 60 * 60);

struct Entry {
    workspace: Arc<Workspace>,
    last_seen: Instant,
}

/// Live sessions. Any lookup refreshes a session; one left idle past the timeout is dropped.
pub struct Sessions {
    inner: RwLock<HashMap<Uuid, Entry>>,
    idle_timeout: Duration,
}

impl Default for Sessions {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_TIMEOUT)
    }
}

impl Sessions {
    pub fn new(idle_timeout: Duration) -> Self {
        Self { inner: RwLock::new(HashMap::new()), idle_timeout }
    }

    pub async fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        let mut sessions = self.inner.write().await;
        Self::retain_active(&mut sessions, self.idle_timeout);
        sessions.insert(id, Entry { workspace: Arc::new(Workspace::default()), last_seen: Instant::now() });
        tracing::debug!(session = %id, "Session created");
        id
    }

    pub async fn get(&self, id: &Uuid) -> Option<Arc<Workspace>> {
        let mut sessions = self.inner.write().await;
        match sessions.get_mut(id) {
            Some(entry) if entry.last_seen.elapsed() < self.idle_timeout => {
                entry.last_seen = Instant::now();
                Some(entry.workspace.clone())
            }
            Some(_) => {
                sessions.remove(id);
                tracing::debug!(session = %id, "Session expired");
                None
            }
            None => None,
        }
    }

    pub async fn remove(&self, id: &Uuid) -> bool {
        let removed = self.inner.write().await.remove(id).is_some();
        if removed {
            tracing::debug!(session = %id, "Session closed");
        }
        removed
    }

    /// Drops every idle session and returns how many went.
    pub async fn evict_idle(&self) -> usize {
        let mut sessions = self.inner.write().await;
        Self::retain_active(&mut sessions, self.idle_timeout)
    }

    fn retain_active(sessions: &mut HashMap<Uuid, Entry>, idle_timeout: Duration) -> usize {
        let before = sessions.len();
        sessions.retain(|_, entry| entry.last_seen.elapsed() < idle_timeout);
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}
