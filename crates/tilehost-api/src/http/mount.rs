//! Route mounter: attaches collaborator routers under their kind's namespace.
//!
//! # Design
//! - One append-only handler list per namespace; mounts arrive as startup tasks
//!   complete, in whatever order they complete.
//! - The main router's fallback dispatches unmatched requests to the handlers of
//!   the namespace the path falls under, in mount order; the first response that
//!   is not a 404 wins. Each collaborator router dispatches on its own id segment,
//!   so mount order never changes which handler answers.

use std::sync::{Arc, PoisonError, RwLock};

use axum::Router;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tilehost_core::{Mount, ResourceKind};
use tokio::sync::mpsc;
use tower::ServiceExt;
use tracing::{debug, info};

use crate::http::errors::ApiError;
use crate::state::ApiState;

#[derive(Default)]
struct Namespaces {
    entries: Vec<(&'static str, Vec<MountedRouter>)>,
}

struct MountedRouter {
    label: String,
    router: Router,
}

/// Collaborator routers mounted for one generation.
#[derive(Clone, Default)]
pub struct MountTable {
    inner: Arc<RwLock<Namespaces>>,
}

impl MountTable {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a router under its kind's namespace.
    pub fn mount(&self, mount: Mount) {
        let namespace = mount.kind.namespace();
        let mut namespaces = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let position = namespaces
            .entries
            .iter()
            .position(|(candidate, _)| *candidate == namespace);
        let routers = match position {
            Some(index) => &mut namespaces.entries[index].1,
            None => {
                namespaces.entries.push((namespace, Vec::new()));
                let last = namespaces.entries.len() - 1;
                &mut namespaces.entries[last].1
            }
        };
        routers.push(MountedRouter {
            label: mount.label,
            router: mount.router,
        });
    }

    /// Labels mounted under `namespace`, in mount order.
    #[must_use]
    pub fn labels(&self, namespace: &str) -> Vec<String> {
        let namespaces = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        namespaces
            .entries
            .iter()
            .filter(|(candidate, _)| *candidate == namespace)
            .flat_map(|(_, routers)| routers.iter().map(|mounted| mounted.label.clone()))
            .collect()
    }

    /// Total number of mounted routers.
    #[must_use]
    pub fn len(&self) -> usize {
        let namespaces = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        namespaces.entries.iter().map(|(_, routers)| routers.len()).sum()
    }

    /// Whether nothing has been mounted yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Routers responsible for `path`, cloned so no lock is held across awaits.
    fn routers_for(&self, path: &str) -> Vec<Router> {
        let Some(namespace) = namespace_of(path) else {
            return Vec::new();
        };
        let namespaces = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        namespaces
            .entries
            .iter()
            .filter(|(candidate, _)| *candidate == namespace)
            .flat_map(|(_, routers)| routers.iter().map(|mounted| mounted.router.clone()))
            .collect()
    }

    /// Consume a generation's mount stream until its sender is dropped.
    pub async fn run(self, mut mounts: mpsc::UnboundedReceiver<Mount>) {
        while let Some(mount) = mounts.recv().await {
            info!(
                kind = %mount.kind,
                label = %mount.label,
                namespace = mount.kind.namespace(),
                "handler mounted"
            );
            self.mount(mount);
        }
        debug!(mounted = self.len(), "mount stream closed");
    }
}

/// Namespace a request path falls under, if any.
pub(crate) fn namespace_of(path: &str) -> Option<&'static str> {
    ResourceKind::ALL
        .iter()
        .map(|kind| kind.namespace())
        .find(|namespace| {
            path.strip_prefix(namespace)
                .is_some_and(|rest| rest.starts_with('/'))
        })
}

/// Fallback handler dispatching to mounted collaborator routers.
pub(crate) async fn dispatch(State(state): State<Arc<ApiState>>, request: Request) -> Response {
    let (parts, _body) = request.into_parts();
    for router in state.mounts.routers_for(parts.uri.path()) {
        let mut attempt = Request::new(Body::empty());
        *attempt.method_mut() = parts.method.clone();
        *attempt.uri_mut() = parts.uri.clone();
        *attempt.version_mut() = parts.version;
        *attempt.headers_mut() = parts.headers.clone();
        let Ok(response) = router.oneshot(attempt).await;
        if response.status() != StatusCode::NOT_FOUND {
            return response;
        }
    }
    ApiError::not_found(format!("nothing is served at {}", parts.uri.path())).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;

    #[test]
    fn paths_map_to_kind_namespaces() {
        assert_eq!(namespace_of("/data/world.json"), Some("/data"));
        assert_eq!(namespace_of("/styles/basic/style.json"), Some("/styles"));
        assert_eq!(namespace_of("/fonts/Noto/0-255.pbf"), Some("/fonts"));
        assert_eq!(namespace_of("/styles.json"), None);
        assert_eq!(namespace_of("/database"), None);
    }

    #[test]
    fn rendered_and_style_mounts_share_one_namespace() {
        let table = MountTable::new();
        table.mount(Mount::new(ResourceKind::Style, "style:basic", Router::new()));
        table.mount(Mount::new(ResourceKind::Archive, "archive:world", Router::new()));
        table.mount(Mount::new(ResourceKind::Rendered, "rendered:basic", Router::new()));
        assert_eq!(table.labels("/styles"), ["style:basic", "rendered:basic"]);
        assert_eq!(table.labels("/data"), ["archive:world"]);
        assert_eq!(table.len(), 3);
    }

    #[tokio::test]
    async fn run_mounts_until_sender_drops() {
        let table = MountTable::new();
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(Mount::new(
            ResourceKind::Font,
            "fonts",
            Router::new().route("/fonts/{stack}/{range}", get(|| async { "glyphs" })),
        ))
        .expect("send");
        drop(tx);
        table.clone().run(rx).await;
        assert_eq!(table.labels("/fonts"), ["fonts"]);
        assert_eq!(table.routers_for("/fonts/a/0-255.pbf").len(), 1);
        assert!(table.routers_for("/data/x.json").is_empty());
    }
}
