//! Epoch-guarded loading of a single value

use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use sd_core::events::events::{FetchFailed, StaleResponseDropped};
use sd_core::{EventBus, ViewId};
use sd_data::RemoteError;

/// Fetch function for a key
pub type Fetcher<K, T> = Arc<dyn Fn(K) -> BoxFuture<'static, Result<T, RemoteError>> + Send + Sync>;

/// Called with the value as it is applied, under the loader's lock: a key
/// change cannot interleave, so the key is still current. The callback must
/// not call back into the loader.
pub type OnReady<K, T> = Arc<dyn Fn(&K, &T) + Send + Sync>;

/// A value loaded for the current key
#[derive(Debug, Clone)]
pub struct Loadable<K, T> {
    pub key: Option<K>,
    pub value: Option<T>,
    pub loading: bool,
    pub error: Option<RemoteError>,
    epoch: u64,
}

impl<K, T> Default for Loadable<K, T> {
    fn default() -> Self {
        Self {
            key: None,
            value: None,
            loading: false,
            error: None,
            epoch: 0,
        }
    }
}

impl<K, T> Loadable<K, T> {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// Loads one value per key. Changing the key discards the previous value
/// and any response still in flight for it.
pub struct SingleLoader<K, T> {
    id: ViewId,
    name: String,
    state: Arc<Mutex<Loadable<K, T>>>,
    fetch: Fetcher<K, T>,
    on_ready: Option<OnReady<K, T>>,
    events: Option<Arc<EventBus>>,
    runtime: Handle,
}

impl<K, T> SingleLoader<K, T>
where
    K: Clone + PartialEq + Send + Sync + std::fmt::Debug + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, fetch: Fetcher<K, T>, runtime: Handle) -> Self {
        Self {
            id: ViewId::new_v4(),
            name: name.into(),
            state: Arc::new(Mutex::new(Loadable::default())),
            fetch,
            on_ready: None,
            events: None,
            runtime,
        }
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn on_ready(mut self, callback: OnReady<K, T>) -> Self {
        self.on_ready = Some(callback);
        self
    }

    pub fn id(&self) -> ViewId {
        self.id
    }

    /// Switch to `key`. No-op when the key is unchanged; `None` clears.
    pub fn set_key(&self, key: Option<K>) -> Option<JoinHandle<()>> {
        let epoch = {
            let mut state = self.state.lock();
            if state.key == key {
                return None;
            }
            state.epoch += 1;
            state.key = key.clone();
            state.value = None;
            state.error = None;
            state.loading = key.is_some();
            state.epoch
        };
        key.map(|k| self.spawn(k, epoch))
    }

    /// Fetch the current key again
    pub fn reload(&self) -> Option<JoinHandle<()>> {
        let (key, epoch) = {
            let mut state = self.state.lock();
            let key = state.key.clone()?;
            state.epoch += 1;
            state.error = None;
            state.loading = true;
            (key, state.epoch)
        };
        Some(self.spawn(key, epoch))
    }

    pub fn snapshot(&self) -> Loadable<K, T> {
        self.state.lock().clone()
    }

    pub fn value(&self) -> Option<T> {
        self.state.lock().value.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().loading
    }

    fn spawn(&self, key: K, epoch: u64) -> JoinHandle<()> {
        let state = self.state.clone();
        let on_ready = self.on_ready.clone();
        let events = self.events.clone();
        let view_id = self.id;
        let name = self.name.clone();
        let request = (self.fetch)(key.clone());

        debug!(view = %name, ?key, epoch, "loading");

        self.runtime.spawn(async move {
            let result = request.await;

            let applied = {
                let mut state = state.lock();
                if state.epoch != epoch {
                    Err(state.epoch)
                } else {
                    state.loading = false;
                    match &result {
                        Ok(value) => {
                            state.value = Some(value.clone());
                            if let Some(callback) = &on_ready {
                                callback(&key, value);
                            }
                        }
                        Err(err) => state.error = Some(err.clone()),
                    }
                    Ok(())
                }
            };

            match (applied, result) {
                (Err(current_epoch), _) => {
                    debug!(view = %name, epoch, current_epoch, "dropping stale value");
                    if let Some(events) = events {
                        events.publish(StaleResponseDropped {
                            view_id,
                            epoch,
                            current_epoch,
                        });
                    }
                }
                (Ok(()), Ok(_)) => {}
                (Ok(()), Err(err)) => {
                    warn!(view = %name, error = %err, "load failed");
                    if let Some(events) = events {
                        events.publish(FetchFailed {
                            view_id,
                            view_name: name,
                            endpoint: err.endpoint().to_string(),
                            status: err.status(),
                            message: err.to_string(),
                        });
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::time::Duration;

    fn delayed() -> Fetcher<u32, String> {
        // Lower keys answer later.
        Arc::new(|key: u32| {
            async move {
                tokio::time::sleep(Duration::from_millis(100 / key as u64)).await;
                Ok::<_, RemoteError>(format!("value {key}"))
            }
            .boxed()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_latest_key_lands() {
        let loader = SingleLoader::new("detail", delayed(), Handle::current());
        let slow = loader.set_key(Some(1)).unwrap();
        let fast = loader.set_key(Some(4)).unwrap();
        fast.await.unwrap();
        slow.await.unwrap();

        let state = loader.snapshot();
        assert_eq!(state.key, Some(4));
        assert_eq!(state.value.as_deref(), Some("value 4"));
        assert!(!state.loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_key_is_noop_and_none_clears() {
        let loader = SingleLoader::new("detail", delayed(), Handle::current());
        loader.set_key(Some(10)).unwrap().await.unwrap();
        assert!(loader.set_key(Some(10)).is_none());

        assert!(loader.set_key(None).is_none());
        let state = loader.snapshot();
        assert!(state.value.is_none());
        assert!(!state.loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_on_ready_sees_current_value_only() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let loader = SingleLoader::new("detail", delayed(), Handle::current())
            .on_ready(Arc::new(move |key: &u32, _value: &String| sink.lock().push(*key)));

        let slow = loader.set_key(Some(2)).unwrap();
        loader.set_key(Some(50)).unwrap().await.unwrap();
        slow.await.unwrap();
        assert_eq!(*seen.lock(), vec![50]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_on_ready_never_lags_behind_key_changes() {
        let immediate: Fetcher<u32, String> =
            Arc::new(|key: u32| async move { Ok::<_, RemoteError>(format!("value {key}")) }.boxed());
        let ready = Arc::new(Mutex::new(Vec::new()));
        let sink = ready.clone();
        let loader = Arc::new(
            SingleLoader::new("highlight", immediate, Handle::current())
                .on_ready(Arc::new(move |key: &u32, _value: &String| sink.lock().push(*key))),
        );

        let writers: Vec<_> = [0u32, 1000]
            .into_iter()
            .map(|base| {
                let loader = loader.clone();
                tokio::spawn(async move {
                    let mut tasks = Vec::new();
                    for i in 1..=200 {
                        tasks.extend(loader.set_key(Some(base + i)));
                        tokio::task::yield_now().await;
                    }
                    tasks
                })
            })
            .collect();
        for writer in writers {
            for task in writer.await.unwrap() {
                task.await.unwrap();
            }
        }

        let state = loader.snapshot();
        assert_eq!(ready.lock().last().copied(), state.key);
        assert_eq!(state.value, state.key.map(|k| format!("value {k}")));
    }

    #[tokio::test]
    async fn test_error_is_kept_per_loader() {
        let failing: Fetcher<u32, String> = Arc::new(|_| {
            async {
                Err::<String, _>(RemoteError::NotFound {
                    endpoint: "/api/providers/0".into(),
                })
            }
            .boxed()
        });
        let loader = SingleLoader::new("detail", failing, Handle::current());
        loader.set_key(Some(1)).unwrap().await.unwrap();
        let state = loader.snapshot();
        assert_eq!(state.error.and_then(|e| e.status()), Some(404));
        assert!(state.value.is_none());
    }
}
