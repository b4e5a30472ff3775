//! # Simulation
//!
//! Starts an in-process network with one node per party plus a notary,
//! runs a Request from the requester to the issuer, optionally resolves it,
//! and reports what every vault holds afterwards.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use remit_protocol::config::FlowConfig;
use remit_protocol::flows::FlowError;
use remit_protocol::network::{MockNetwork, NodeHandle};
use remit_protocol::transaction::{SignedTransaction, StateAndRef};

use crate::cli::SimulateArgs;
use crate::metrics::NodeMetrics;

/// What the simulation did and where the states ended up.
#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub request_tx: String,
    pub uid: String,
    pub resolution: Option<Resolution>,
    /// Unconsumed states per party.
    pub vaults: BTreeMap<String, Vec<StateView>>,
}

#[derive(Debug, Serialize)]
pub struct Resolution {
    pub kind: &'static str,
    pub tx: Option<String>,
    pub error: Option<String>,
}

/// Flattened, human-readable view of a transfer state.
#[derive(Debug, Serialize)]
pub struct StateView {
    pub reference: String,
    pub uid: String,
    pub issuer: String,
    pub requester: String,
    pub amount: i64,
    pub approved: bool,
    pub requested_at: String,
    pub valid_until: String,
    pub title: String,
    pub description: String,
}

impl From<&StateAndRef> for StateView {
    fn from(s: &StateAndRef) -> Self {
        Self {
            reference: s.reference.to_string(),
            uid: s.state.uid.clone(),
            issuer: s.state.issuer.to_string(),
            requester: s.state.requester.to_string(),
            amount: s.state.amount,
            approved: s.state.approved,
            requested_at: s.state.requested_at.to_rfc3339(),
            valid_until: s.state.valid_until.to_string(),
            title: s.state.title.clone(),
            description: s.state.description.clone(),
        }
    }
}

/// Checks the party list and picks requester and issuer.
fn select_roles(args: &SimulateArgs) -> Result<(String, String)> {
    let parties: Vec<&str> = args.parties.iter().map(|p| p.trim()).collect();
    if parties.iter().any(|p| p.is_empty()) {
        bail!("party names cannot be empty");
    }
    let unique: BTreeSet<&str> = parties.iter().copied().collect();
    if unique.len() != parties.len() {
        bail!("party names must be unique");
    }
    if parties.len() < 2 {
        bail!("at least two parties are needed, got {}", parties.len());
    }

    let requester = args.requester.as_deref().unwrap_or(parties[0]).to_string();
    let issuer = args.issuer.as_deref().unwrap_or(parties[1]).to_string();
    for role in [&requester, &issuer] {
        if !unique.contains(role.as_str()) {
            bail!("{role} is not one of the parties");
        }
    }
    if requester == issuer {
        bail!("requester and issuer must differ");
    }
    Ok((requester, issuer))
}

async fn timed<F>(metrics: &NodeMetrics, kind: &'static str, flow: F) -> Result<SignedTransaction, FlowError>
where
    F: std::future::Future<Output = Result<SignedTransaction, FlowError>>,
{
    metrics.flow_started(kind);
    let start = Instant::now();
    let result = flow.await;
    metrics.flow_finished(kind, &result, start.elapsed());
    result
}

pub async fn run(args: &SimulateArgs, metrics: &NodeMetrics) -> Result<SimulationReport> {
    let (requester_name, issuer_name) = select_roles(args)?;

    let request_validity = chrono::TimeDelta::try_days(args.validity_days)
        .with_context(|| format!("validity of {} days is out of range", args.validity_days))?;
    let config = FlowConfig {
        request_validity,
        session_timeout: Duration::from_secs(args.session_timeout_secs),
    };
    let network = MockNetwork::new(config);
    let nodes: BTreeMap<String, NodeHandle> = args
        .parties
        .iter()
        .map(|name| {
            let name = name.trim().to_string();
            let node = network.create_node(&name);
            (name, node)
        })
        .collect();
    metrics.nodes.set(nodes.len() as i64);

    let requester = nodes
        .get(&requester_name)
        .context("requester node missing")?;
    let issuer = nodes.get(&issuer_name).context("issuer node missing")?;

    tracing::info!(
        requester = %requester_name,
        issuer = %issuer_name,
        amount = args.amount,
        "simulating transfer request"
    );
    let request = timed(
        metrics,
        "request",
        requester.request(issuer.identity(), &args.title, &args.description, args.amount),
    )
    .await
    .context("request flow failed")?;
    let uid = request
        .tx
        .outputs
        .first()
        .map(|s| s.uid.clone())
        .context("request produced no output")?;

    let resolution = if let Some(amount) = args.approve {
        let result = timed(metrics, "approve", issuer.approve(&uid, amount)).await;
        Some(resolution("approve", result))
    } else if args.decline {
        let result = timed(metrics, "decline", issuer.decline(&uid)).await;
        Some(resolution("decline", result))
    } else {
        None
    };

    let vaults = nodes
        .iter()
        .map(|(name, node)| {
            let states = node.states().iter().map(StateView::from).collect();
            (name.clone(), states)
        })
        .collect();

    for node in nodes.values() {
        node.stop();
    }

    Ok(SimulationReport {
        request_tx: request.id().to_string(),
        uid,
        resolution,
        vaults,
    })
}

fn resolution(kind: &'static str, result: Result<SignedTransaction, FlowError>) -> Resolution {
    match result {
        Ok(stx) => Resolution {
            kind,
            tx: Some(stx.id().to_string()),
            error: None,
        },
        Err(err) => {
            tracing::warn!(kind, error = %err, "resolution failed");
            Resolution {
                kind,
                tx: None,
                error: Some(err.to_string()),
            }
        }
    }
}
