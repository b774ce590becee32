//! Rendezvous dispatcher: one request datagram in, at most one response out.
//!
//! # Request handling order
//!
//! 1. Decode.  A malformed datagram is answered with `ERROR MALFORMED`.
//! 2. Lock the shared state and refresh the sender's session, if any.
//! 3. `AUTH` is handled for anyone.  Every other command needs a session
//!    bound to the sender's address; without one the sender gets
//!    `ERROR UNAUTHENTICATED` (or nothing, for `HEARTBEAT`/`LOGOUT`).
//! 4. Run the command against the registry and catalog.
//!
//! The whole exchange happens under one lock acquisition, so a sweep can
//! never evict a session between the refresh and the command it refreshed.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, info};

use bittrickle_core::{
    decode_request, AuthError, CredentialStore, FileCatalog, PublishOutcome, Request, Response,
    SessionRegistry, UnpublishOutcome,
};

/// Registry and catalog, always locked together.
#[derive(Debug)]
pub struct RendezvousState {
    pub registry: SessionRegistry,
    pub catalog: FileCatalog,
}

impl RendezvousState {
    pub fn new(liveness_timeout: Duration) -> Self {
        Self {
            registry: SessionRegistry::new(liveness_timeout),
            catalog: FileCatalog::new(),
        }
    }
}

/// State shared between the receive loop and the liveness monitor.
pub type SharedState = Arc<Mutex<RendezvousState>>;

/// Routes decoded requests to the registry and catalog.
#[derive(Clone)]
pub struct Dispatcher {
    state: SharedState,
    credentials: Arc<dyn CredentialStore>,
}

impl Dispatcher {
    pub fn new(state: SharedState, credentials: Arc<dyn CredentialStore>) -> Self {
        Self { state, credentials }
    }

    pub fn state(&self) -> SharedState {
        Arc::clone(&self.state)
    }

    /// Handles one datagram from `origin`.
    ///
    /// Returns the response to send back, or `None` when the request gets no
    /// answer.
    pub async fn dispatch(&self, origin: SocketAddr, datagram: &[u8]) -> Option<Response> {
        let request = match decode_request(datagram) {
            Ok(request) => request,
            Err(e) => {
                debug!(%origin, error = %e, "malformed request");
                return Some(Response::Malformed(e.to_string()));
            }
        };
        debug!(%origin, command = %request.kind(), "request");

        let mut state = self.state.lock().await;
        handle_request(
            &mut state,
            self.credentials.as_ref(),
            origin,
            request,
            Instant::now(),
        )
    }
}

/// Applies one decoded request to the locked state.
pub fn handle_request(
    state: &mut RendezvousState,
    credentials: &dyn CredentialStore,
    origin: SocketAddr,
    request: Request,
    now: Instant,
) -> Option<Response> {
    state.registry.touch(origin, now);

    if let Request::Auth {
        identity,
        secret,
        transfer_port,
    } = &request
    {
        return Some(authenticate(
            state,
            credentials,
            origin,
            identity,
            secret,
            *transfer_port,
            now,
        ));
    }

    let Some(identity) = state.registry.identity_at(origin).map(str::to_string) else {
        if request.kind().expects_reply() {
            debug!(%origin, command = %request.kind(), "command from unauthenticated origin");
            return Some(Response::Unauthenticated);
        }
        return None;
    };

    let RendezvousState { registry, catalog } = state;
    let response = match request {
        Request::Auth { .. } | Request::Heartbeat => return None,
        Request::Logout => {
            registry.remove(&identity);
            info!(%identity, %origin, "logged out");
            return None;
        }
        Request::ListActivePeers => Response::ActivePeers(
            registry
                .active_identities()
                .into_iter()
                .filter(|peer| *peer != identity)
                .map(str::to_string)
                .collect(),
        ),
        Request::ListPublished => Response::PublishedFiles(catalog.list_own(&identity)),
        Request::Publish(filename) => match catalog.publish(&identity, &filename) {
            PublishOutcome::Published => {
                info!(%identity, %filename, "published");
                Response::Published(filename)
            }
            PublishOutcome::AlreadyPublished => Response::AlreadyPublished(filename),
        },
        Request::Unpublish(filename) => match catalog.unpublish(&identity, &filename) {
            UnpublishOutcome::Unpublished => {
                info!(%identity, %filename, "unpublished");
                Response::Unpublished(filename)
            }
            UnpublishOutcome::NotPublished => Response::NotPublished(filename),
        },
        Request::Search(term) => {
            let hits = catalog.search_with_owners(&identity, &term, registry.active_identities());
            debug!(%identity, %term, ?hits, "search");
            Response::SearchResults(hits.into_keys().collect())
        }
        Request::Get(filename) => {
            match catalog
                .resolve_owner(&filename, registry.active_identities())
                .and_then(|owner| registry.get(&owner))
            {
                Some(owner) => {
                    debug!(%identity, %filename, owner = %owner.identity, "resolved owner");
                    Response::PeerEndpoint {
                        ip: owner.origin.ip(),
                        port: owner.transfer_port,
                    }
                }
                None => Response::FileNotFound,
            }
        }
    };
    Some(response)
}

fn authenticate(
    state: &mut RendezvousState,
    credentials: &dyn CredentialStore,
    origin: SocketAddr,
    identity: &str,
    secret: &str,
    transfer_port: u16,
    now: Instant,
) -> Response {
    match state
        .registry
        .authenticate(identity, secret, origin, transfer_port, credentials, now)
    {
        Ok(session) => {
            info!(identity, %origin, transfer_port = session.transfer_port, "authenticated");
            Response::AuthSuccess
        }
        Err(AuthError::AlreadyActive) => {
            info!(identity, %origin, "rejected: identity already active");
            Response::UserAlreadyActive
        }
        Err(AuthError::InvalidCredentials) => {
            info!(identity, %origin, "rejected: invalid credentials");
            Response::AuthFailure
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
