//! Everything a flow may touch, captured once when the flow starts.

use std::sync::Arc;

use super::progress::ProgressTracker;
use crate::config::FlowConfig;
use crate::crypto::keys::RemitKeypair;
use crate::identity::Party;
use crate::network::{FlowSession, InMemoryNetwork, SessionError, UniquenessProvider};
use crate::storage::VaultService;
use crate::transaction::{TransactionSignature, TransferCommand};

/// Per-call snapshot of a node's identity and services.
///
/// `parties` is the network map as it was when the flow started; nodes that
/// join later are not observers of requests created before they joined.
pub struct FlowContext {
    me: Party,
    keypair: RemitKeypair,
    vault: Arc<dyn VaultService>,
    notary: Arc<dyn UniquenessProvider>,
    parties: Vec<Party>,
    network: Arc<InMemoryNetwork>,
    config: FlowConfig,
    progress: ProgressTracker,
}

impl FlowContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        me: Party,
        keypair: RemitKeypair,
        vault: Arc<dyn VaultService>,
        notary: Arc<dyn UniquenessProvider>,
        parties: Vec<Party>,
        network: Arc<InMemoryNetwork>,
        config: FlowConfig,
        flow: &'static str,
    ) -> Self {
        Self {
            me,
            keypair,
            vault,
            notary,
            parties,
            network,
            config,
            progress: ProgressTracker::new(flow),
        }
    }

    pub fn me(&self) -> &Party {
        &self.me
    }

    pub fn keypair(&self) -> &RemitKeypair {
        &self.keypair
    }

    pub fn vault(&self) -> &dyn VaultService {
        self.vault.as_ref()
    }

    pub fn notary(&self) -> &dyn UniquenessProvider {
        self.notary.as_ref()
    }

    pub fn notary_identity(&self) -> &Party {
        self.notary.identity()
    }

    /// Every node on the network, notary excluded.
    pub fn parties(&self) -> &[Party] {
        &self.parties
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    /// This node's signature over transaction `tx_id`.
    pub fn sign(&self, tx_id: &str) -> TransactionSignature {
        TransactionSignature::create(&self.keypair, tx_id)
    }

    /// Opens a session to `to` for `flow`, bounded by the configured timeout.
    pub async fn initiate(
        &self,
        to: &Party,
        flow: TransferCommand,
    ) -> Result<FlowSession, SessionError> {
        self.network
            .initiate_session(&self.me, to, flow, self.config.session_timeout)
            .await
    }
}
