//! # Nodes
//!
//! A [`NodeHandle`] is one party's runtime: its identity and keys, its
//! vault, and a dispatcher task that spawns a responder for every session
//! other parties open with it. [`MockNetwork`] wires any number of nodes to
//! a shared notary, network map and message router, all in process.
//!
//! ```text
//! MockNetwork::new() -> create_node("PartyA") -> request / approve / decline
//!                                              -> stop()
//! ```

use std::sync::{Arc, Weak};

use tokio::sync::mpsc;
use tracing::{debug, info};

use super::map::NetworkMap;
use super::messaging::{InMemoryNetwork, IncomingSession};
use super::notary::{InMemoryNotary, UniquenessProvider};
use crate::config::{FlowConfig, DEFAULT_NOTARY_NAME};
use crate::crypto::keys::RemitKeypair;
use crate::flows::{self, ApproveFlow, DeclineFlow, FlowContext, FlowError, RequestFlow};
use crate::identity::Party;
use crate::storage::{InMemoryVault, VaultService};
use crate::transaction::{SignedTransaction, StateAndRef, TransferCommand};

// ---------------------------------------------------------------------------
// MockNetwork
// ---------------------------------------------------------------------------

/// An in-process network: one notary, a network map, a router, and the
/// nodes created on it.
pub struct MockNetwork {
    map: Arc<NetworkMap>,
    messaging: Arc<InMemoryNetwork>,
    notary: Arc<InMemoryNotary>,
    config: FlowConfig,
}

impl MockNetwork {
    /// A network with a freshly keyed notary named [`DEFAULT_NOTARY_NAME`].
    pub fn new(config: FlowConfig) -> Self {
        Self::with_notary(
            InMemoryNotary::new(DEFAULT_NOTARY_NAME, RemitKeypair::generate()),
            config,
        )
    }

    pub fn with_notary(notary: InMemoryNotary, config: FlowConfig) -> Self {
        let map = Arc::new(NetworkMap::new(notary.identity().clone()));
        Self {
            map,
            messaging: Arc::new(InMemoryNetwork::new()),
            notary: Arc::new(notary),
            config,
        }
    }

    /// Creates a node with a fresh keypair. Must be called from within a
    /// Tokio runtime: the node's dispatcher is spawned here.
    pub fn create_node(&self, name: &str) -> NodeHandle {
        self.create_node_with_keypair(name, RemitKeypair::generate())
    }

    pub fn create_node_with_keypair(&self, name: &str, keypair: RemitKeypair) -> NodeHandle {
        let identity = Party::new(name, keypair.public_key());
        let inbox = self.messaging.register(identity.clone());
        self.map.add_node(identity.clone());

        let node = NodeHandle {
            inner: Arc::new(NodeInner {
                vault: Arc::new(InMemoryVault::new(identity.clone())),
                identity,
                keypair,
                map: Arc::clone(&self.map),
                messaging: Arc::clone(&self.messaging),
                notary: Arc::clone(&self.notary),
                config: self.config.clone(),
            }),
        };
        tokio::spawn(dispatch(Arc::downgrade(&node.inner), inbox));
        info!(node = %node.identity(), key = %node.identity().owning_key(), "node started");
        node
    }

    pub fn notary(&self) -> &Arc<InMemoryNotary> {
        &self.notary
    }

    pub fn network_map(&self) -> &NetworkMap {
        &self.map
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }
}

impl Default for MockNetwork {
    fn default() -> Self {
        Self::new(FlowConfig::default())
    }
}

// ---------------------------------------------------------------------------
// NodeHandle
// ---------------------------------------------------------------------------

struct NodeInner {
    identity: Party,
    keypair: RemitKeypair,
    vault: Arc<InMemoryVault>,
    map: Arc<NetworkMap>,
    messaging: Arc<InMemoryNetwork>,
    notary: Arc<InMemoryNotary>,
    config: FlowConfig,
}

/// Cheaply cloneable handle to a running node.
#[derive(Clone)]
pub struct NodeHandle {
    inner: Arc<NodeInner>,
}

impl NodeHandle {
    pub fn identity(&self) -> &Party {
        &self.inner.identity
    }

    pub fn vault(&self) -> &InMemoryVault {
        &self.inner.vault
    }

    /// This node's unconsumed states.
    pub fn states(&self) -> Vec<StateAndRef> {
        self.inner.vault.unconsumed()
    }

    /// A fresh flow context over the current network map.
    pub fn flow_context(&self, flow: &'static str) -> FlowContext {
        let vault: Arc<dyn VaultService> = self.inner.vault.clone();
        let notary: Arc<dyn UniquenessProvider> = self.inner.notary.clone();
        FlowContext::new(
            self.inner.identity.clone(),
            self.inner.keypair.clone(),
            vault,
            notary,
            self.inner.map.all_nodes(),
            Arc::clone(&self.inner.messaging),
            self.inner.config.clone(),
            flow,
        )
    }

    /// Asks `issuer` for `amount`. This node is the requester.
    pub async fn request(
        &self,
        issuer: &Party,
        title: &str,
        description: &str,
        amount: i64,
    ) -> Result<SignedTransaction, FlowError> {
        let ctx = self.flow_context("request");
        RequestFlow::new(issuer.clone(), title, description, amount)
            .call(&ctx)
            .await
    }

    /// Approves the pending request this node issued whose uid starts with
    /// `uid_prefix`, for `amount`.
    pub async fn approve(
        &self,
        uid_prefix: &str,
        amount: i64,
    ) -> Result<SignedTransaction, FlowError> {
        let ctx = self.flow_context("approve");
        ApproveFlow::new(uid_prefix, amount).call(&ctx).await
    }

    /// Declines the pending request this node issued whose uid starts with
    /// `uid_prefix`.
    pub async fn decline(&self, uid_prefix: &str) -> Result<SignedTransaction, FlowError> {
        let ctx = self.flow_context("decline");
        DeclineFlow::new(uid_prefix).call(&ctx).await
    }

    /// Leaves the network. Sessions already open run to completion.
    pub fn stop(&self) {
        self.inner.messaging.unregister(&self.inner.identity);
        self.inner.map.remove_node(&self.inner.identity);
        info!(node = %self.identity(), "node stopped");
    }
}

/// Spawns a responder for every incoming session.
///
/// Holds the node weakly: once every handle and the [`MockNetwork`] are
/// dropped, the router and with it the inbox sender go away, and the loop
/// ends even if [`NodeHandle::stop`] was never called.
async fn dispatch(node: Weak<NodeInner>, mut inbox: mpsc::Receiver<IncomingSession>) {
    while let Some(incoming) = inbox.recv().await {
        let Some(inner) = node.upgrade() else {
            break;
        };
        let node = NodeHandle { inner };
        debug!(
            node = %node.identity(),
            from = %incoming.session.counterparty(),
            flow = %incoming.flow,
            "incoming session"
        );
        tokio::spawn(async move {
            let ctx = node.flow_context(responder_label(incoming.flow));
            // Failures are logged by the responder; nobody awaits them.
            let _ = flows::respond(&ctx, incoming).await;
        });
    }
    debug!("dispatcher stopped");
}

fn responder_label(flow: TransferCommand) -> &'static str {
    match flow {
        TransferCommand::Request => "request-responder",
        TransferCommand::Approve => "approve-responder",
        TransferCommand::Decline => "decline-responder",
    }
}
