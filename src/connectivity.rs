// Host connectivity: a queryable online flag plus offline->online notifications

use std::{future::Future, sync::Arc, time::Duration};

use tokio::{sync::watch, task::JoinHandle};

use crate::remote_client::RemoteAuthority;

pub trait Connectivity: Send + Sync {
    fn is_online(&self) -> bool;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct LinkState {
    online: bool,
    /// Offline->online transitions since the monitor was created.
    reconnects: u64,
}

#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    tx: Arc<watch::Sender<LinkState>>,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (tx, _rx) = watch::channel(LinkState {
            online: initially_online,
            reconnects: 0,
        });
        Self { tx: Arc::new(tx) }
    }

    /// Publish the current state. Returns `true` when it changed.
    pub fn set_online(&self, online: bool) -> bool {
        self.tx.send_if_modified(|current| {
            if current.online == online {
                return false;
            }
            if online {
                current.reconnects += 1;
            }
            current.online = online;
            true
        })
    }

    /// Run `callback` after offline->online transitions until the monitor is dropped.
    ///
    /// Transitions that happen while a callback is running trigger one more call
    /// once it returns; several of them collapse into that single call.
    pub fn on_online<F, Fut>(&self, callback: F) -> JoinHandle<()>
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut rx = self.tx.subscribe();
        tokio::spawn(async move {
            let mut seen = rx.borrow_and_update().reconnects;
            while rx.changed().await.is_ok() {
                let reconnects = rx.borrow_and_update().reconnects;
                if reconnects > seen {
                    seen = reconnects;
                    tracing::info!(reconnects, "connectivity restored");
                    callback().await;
                }
            }
        })
    }

    /// Periodically probe the remote authority and publish the result.
    pub fn spawn_probe(&self, remote: Arc<dyn RemoteAuthority>, every: Duration) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let online = match remote.health_check().await {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::debug!(error = %e, "connectivity probe failed");
                        false
                    }
                };
                if monitor.set_online(online) {
                    tracing::info!(online, "connectivity changed");
                }
            }
        })
    }
}

impl Connectivity for ConnectivityMonitor {
    fn is_online(&self) -> bool {
        self.tx.borrow().online
    }
}
