//! Directory of well-known parties.

use parking_lot::RwLock;

use crate::identity::Party;

/// The notary plus every node that joined the network.
pub struct NetworkMap {
    notary: Party,
    nodes: RwLock<Vec<Party>>,
}

impl NetworkMap {
    pub fn new(notary: Party) -> Self {
        Self {
            notary,
            nodes: RwLock::new(Vec::new()),
        }
    }

    pub fn notary_identity(&self) -> &Party {
        &self.notary
    }

    /// Adds a node identity. Adding the same party twice is a no-op.
    pub fn add_node(&self, party: Party) {
        let mut nodes = self.nodes.write();
        if !nodes.contains(&party) {
            nodes.push(party);
        }
    }

    pub fn remove_node(&self, party: &Party) {
        self.nodes.write().retain(|p| p != party);
    }

    /// All node identities in join order. Never includes the notary.
    pub fn all_nodes(&self) -> Vec<Party> {
        self.nodes.read().clone()
    }

    pub fn party_by_name(&self, name: &str) -> Option<Party> {
        if self.notary.name() == name {
            return Some(self.notary.clone());
        }
        self.nodes.read().iter().find(|p| p.name() == name).cloned()
    }
}
