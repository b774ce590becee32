//! Client session agent: login state machine and command execution.
//!
//! # State machine
//!
//! ```text
//!                 authenticate()
//!  Unauthenticated ─────────────► Authenticating
//!        ▲                          │        │
//!        │  AUTH_FAILURE /          │        │ AUTH_SUCCESS
//!        │  USER_ALREADY_ACTIVE /   │        ▼
//!        └──── channel error ───────┘      Active ──── execute(cmd) ───┐
//!        │                                   │  ▲                      │
//!        │ close()                   close() │  └──────────────────────┘
//!        ▼                                   ▼
//!     Closing  ◄─────────────────────────────┘   (terminal)
//! ```
//!
//! Every method checks the current state first and returns
//! [`AgentError::InvalidTransition`] if the call makes no sense there.
//!
//! The agent never prints.  [`SessionAgent::execute`] returns the lines to
//! show, so the console loop in `main.rs` stays a thin shell.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use bittrickle_core::protocol::messages::reply;
use bittrickle_core::{Request, Response};

use crate::application::command::UserCommand;
use crate::application::ports::{ChannelError, PeerFetcher, RendezvousChannel, TransferError};

/// Where the agent is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Unauthenticated,
    Authenticating,
    Active,
    Closing,
}

/// Error type for the session agent.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The operation is not allowed in the current state.
    #[error("cannot {operation} while {from:?}")]
    InvalidTransition {
        from: AgentState,
        operation: &'static str,
    },

    /// The server could not be reached during login.
    #[error("rendezvous server unreachable: {0}")]
    Channel(#[from] ChannelError),
}

/// Result of a login attempt that got an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Accepted,
    InvalidCredentials,
    AlreadyActive,
}

impl AuthOutcome {
    /// Text shown to the user.
    pub fn message(self) -> &'static str {
        match self {
            AuthOutcome::Accepted => "Welcome to BitTrickle!",
            AuthOutcome::InvalidCredentials => "Authentication failed! Please try again.",
            AuthOutcome::AlreadyActive => {
                "User is already active. Please try with a different username."
            }
        }
    }
}

/// Drives one user's session against the rendezvous server.
pub struct SessionAgent {
    channel: Arc<dyn RendezvousChannel>,
    fetcher: Arc<dyn PeerFetcher>,
    share_dir: PathBuf,
    state: AgentState,
    identity: Option<String>,
}

impl SessionAgent {
    pub fn new(
        channel: Arc<dyn RendezvousChannel>,
        fetcher: Arc<dyn PeerFetcher>,
        share_dir: PathBuf,
    ) -> Self {
        Self {
            channel,
            fetcher,
            share_dir,
            state: AgentState::Unauthenticated,
            identity: None,
        }
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    /// The logged-in identity, once `Active`.
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    fn transition(
        &mut self,
        from: AgentState,
        to: AgentState,
        operation: &'static str,
    ) -> Result<(), AgentError> {
        if self.state != from {
            return Err(AgentError::InvalidTransition {
                from: self.state,
                operation,
            });
        }
        debug!(?from, ?to, "agent state change");
        self.state = to;
        Ok(())
    }

    /// Attempts to log in, announcing `transfer_port` as this peer's
    /// transfer listener.
    ///
    /// On anything but success the agent is back in `Unauthenticated` and the
    /// caller may try again.
    ///
    /// # Errors
    ///
    /// - [`AgentError::InvalidTransition`] unless `Unauthenticated`.
    /// - [`AgentError::Channel`] if no valid reply arrived.
    pub async fn authenticate(
        &mut self,
        identity: &str,
        secret: &str,
        transfer_port: u16,
    ) -> Result<AuthOutcome, AgentError> {
        self.transition(
            AgentState::Unauthenticated,
            AgentState::Authenticating,
            "authenticate",
        )?;

        let request = Request::Auth {
            identity: identity.to_string(),
            secret: secret.to_string(),
            transfer_port,
        };
        let outcome = match self.channel.request(&request).await {
            Ok(Response::AuthSuccess) => AuthOutcome::Accepted,
            Ok(Response::UserAlreadyActive) => AuthOutcome::AlreadyActive,
            Ok(Response::AuthFailure) => AuthOutcome::InvalidCredentials,
            Ok(other) => {
                self.state = AgentState::Unauthenticated;
                return Err(ChannelError::Protocol(
                    bittrickle_core::ProtocolError::UnexpectedResponse {
                        kind: request.kind(),
                        text: format!("{other:?}"),
                    },
                )
                .into());
            }
            Err(e) => {
                self.state = AgentState::Unauthenticated;
                return Err(e.into());
            }
        };

        if outcome == AuthOutcome::Accepted {
            self.state = AgentState::Active;
            self.identity = Some(identity.to_string());
            info!(identity, "logged in");
        } else {
            self.state = AgentState::Unauthenticated;
        }
        Ok(outcome)
    }

    /// Runs one command and returns the lines to print.
    ///
    /// Server or transfer failures are reported as text, not as errors; the
    /// session stays `Active`.  [`UserCommand::Exit`] closes the session.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidTransition`] unless `Active`.
    pub async fn execute(&mut self, command: UserCommand) -> Result<Vec<String>, AgentError> {
        if self.state != AgentState::Active {
            return Err(AgentError::InvalidTransition {
                from: self.state,
                operation: "run a command",
            });
        }

        let lines = match command {
            UserCommand::Exit => {
                self.close().await?;
                vec!["Exiting gracefully...".to_string()]
            }
            UserCommand::ListActivePeers => self.simple(Request::ListActivePeers).await,
            UserCommand::ListPublished => self.simple(Request::ListPublished).await,
            UserCommand::Unpublish(name) => self.simple(Request::Unpublish(name)).await,
            UserCommand::Publish(name) => self.publish(name).await,
            UserCommand::Search(term) => self.search(term).await,
            UserCommand::Get(name) => self.get(name).await,
        };
        Ok(lines)
    }

    /// Logs out (best effort) and enters the terminal `Closing` state.
    ///
    /// Closing from `Unauthenticated` sends nothing.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidTransition`] if already closing.
    pub async fn close(&mut self) -> Result<(), AgentError> {
        match self.state {
            AgentState::Active => {
                if let Err(e) = self.channel.notify(&Request::Logout).await {
                    warn!(error = %e, "logout notification failed");
                }
                info!(identity = self.identity.as_deref().unwrap_or(""), "logged out");
            }
            AgentState::Unauthenticated => {}
            from @ (AgentState::Authenticating | AgentState::Closing) => {
                return Err(AgentError::InvalidTransition {
                    from,
                    operation: "close",
                });
            }
        }
        self.state = AgentState::Closing;
        Ok(())
    }

    // ── Command handlers ──────────────────────────────────────────────────────

    async fn simple(&self, request: Request) -> Vec<String> {
        match self.channel.request(&request).await {
            Ok(response) => vec![render(&response)],
            Err(e) => vec![channel_failure(&e)],
        }
    }

    async fn publish(&self, name: String) -> Vec<String> {
        let path = self.share_dir.join(&name);
        let is_file = tokio::fs::metadata(&path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            return vec![format!(
                "Error: The file '{name}' does not exist in this user's directory"
            )];
        }
        self.simple(Request::Publish(name)).await
    }

    async fn search(&self, term: String) -> Vec<String> {
        match self.channel.request(&Request::Search(term)).await {
            Ok(Response::SearchResults(files)) => render_search(&files),
            Ok(other) => vec![render(&other)],
            Err(e) => vec![channel_failure(&e)],
        }
    }

    async fn get(&self, name: String) -> Vec<String> {
        let response = match self.channel.request(&Request::Get(name.clone())).await {
            Ok(response) => response,
            Err(e) => return vec![channel_failure(&e)],
        };
        let peer = match response {
            Response::PeerEndpoint { ip, port } => SocketAddr::new(ip, port),
            Response::FileNotFound => return vec!["File not found on active peers.".to_string()],
            other => return vec![render(&other)],
        };

        match self.fetcher.fetch(peer, &name).await {
            Ok(bytes) => vec![format!("Downloaded {name} successfully ({bytes} bytes).")],
            Err(e) => {
                warn!(%peer, filename = %name, error = %e, "download failed");
                vec![transfer_failure(&name, &e)]
            }
        }
    }
}

// ── Rendering ─────────────────────────────────────────────────────────────────

fn render(response: &Response) -> String {
    match response {
        Response::ActivePeers(peers) if peers.is_empty() => reply::NO_ACTIVE_PEERS.to_string(),
        Response::ActivePeers(peers) => {
            format!("{}{}", reply::ACTIVE_PEERS_PREFIX, peers.join(reply::LIST_SEPARATOR))
        }
        Response::PublishedFiles(files) if files.is_empty() => reply::NO_FILES_PUBLISHED.to_string(),
        Response::PublishedFiles(files) => {
            format!("{}{}", reply::PUBLISHED_FILES_PREFIX, files.join(reply::LIST_SEPARATOR))
        }
        Response::Published(name) => format!("{}{name}", reply::PUBLISHED_PREFIX),
        Response::AlreadyPublished(name) => format!("{}{name}", reply::ALREADY_PUBLISHED_PREFIX),
        Response::Unpublished(name) => format!("{}{name}", reply::UNPUBLISHED_PREFIX),
        Response::NotPublished(name) => format!("{}{name}", reply::NOT_PUBLISHED_PREFIX),
        Response::FileNotFound => reply::FILE_NOT_FOUND.to_string(),
        Response::Unauthenticated => {
            "Error: the server no longer recognises this session; please restart the client"
                .to_string()
        }
        Response::Malformed(detail) => format!("Error: request rejected by server: {detail}"),
        other => format!("Error: unexpected reply from server: {other:?}"),
    }
}

fn render_search(files: &[String]) -> Vec<String> {
    let header = match files.len() {
        0 => return vec!["No files found.".to_string()],
        1 => "1 file found:".to_string(),
        n => format!("{n} files found:"),
    };
    std::iter::once(header).chain(files.iter().cloned()).collect()
}

fn channel_failure(error: &ChannelError) -> String {
    match error {
        ChannelError::Protocol(e) => format!("Error: {e}"),
        other => format!("Error: {other}"),
    }
}

fn transfer_failure(name: &str, error: &TransferError) -> String {
    match error {
        TransferError::Unavailable { peer, .. } => {
            format!("Error: peer {peer} holding {name} is unavailable.")
        }
        TransferError::NotServed => format!("Error: the peer no longer serves {name}."),
        TransferError::Interrupted { received, expected } => format!(
            "Error: download of {name} interrupted after {received} of {expected} bytes."
        ),
        other => format!("Error: download of {name} failed: {other}"),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
