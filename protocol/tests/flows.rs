//! End-to-end flow tests.
//!
//! Every test builds its own in-process network with one notary and a
//! handful of nodes, then drives the Request / Approve / Decline entry
//! points the way a client would. Responders run on spawned tasks, exactly
//! as they do in the node binary.

use std::time::Duration;

use remit_protocol::config::FlowConfig;
use remit_protocol::flows::finality::collect_signature;
use remit_protocol::flows::{FlowError, ProgressStep, RequestFlow};
use remit_protocol::storage::VaultService;
use remit_protocol::identity::{Party, RemitKeypair};
use remit_protocol::network::{
    InMemoryNotary, MockNetwork, NodeHandle, NotaryError, SessionError, SessionMessage,
    UniquenessProvider,
};
use remit_protocol::transaction::{
    Command, ContractError, SignedTransaction, StateAndRef, TransactionBuilder, TransactionError,
    TransactionSignature, TransferCommand, TransferState, ValidUntil,
};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

struct Net {
    network: MockNetwork,
    issuer: NodeHandle,
    requester: NodeHandle,
    observer: NodeHandle,
}

fn setup() -> Net {
    let network = MockNetwork::new(FlowConfig {
        session_timeout: Duration::from_secs(5),
        ..FlowConfig::default()
    });
    let issuer = network.create_node("Issuer");
    let requester = network.create_node("Requester");
    let observer = network.create_node("Observer");
    Net {
        network,
        issuer,
        requester,
        observer,
    }
}

fn uid_of(stx: &SignedTransaction) -> String {
    stx.tx.outputs[0].uid.clone()
}

async fn pending_request(net: &Net, amount: i64) -> String {
    let stx = net
        .requester
        .request(net.issuer.identity(), "t", "d", amount)
        .await
        .expect("request should succeed");
    uid_of(&stx)
}

fn only_state(node: &NodeHandle) -> TransferState {
    let states = node.states();
    assert_eq!(states.len(), 1, "{} should hold exactly one state", node.identity());
    states[0].state.clone()
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

#[tokio::test]
async fn request_creates_pending_state_for_both_counterparties() {
    let net = setup();
    let stx = net
        .requester
        .request(net.issuer.identity(), "t", "d", 1000)
        .await
        .unwrap();

    assert_eq!(stx.tx.inputs.len(), 0);
    let out = &stx.tx.outputs[0];
    assert!(!out.approved);
    assert_eq!(out.amount, 1000);
    assert!(out.valid_until.is_after(out.requested_at));
    assert_eq!(out.issuer, *net.issuer.identity());
    assert_eq!(out.requester, *net.requester.identity());
    assert!(stx.missing_signers().is_empty());

    assert_eq!(only_state(&net.issuer).uid, out.uid);
    assert_eq!(only_state(&net.requester).uid, out.uid);
    assert!(net.observer.states().is_empty());
}

#[tokio::test]
async fn request_observers_are_all_nodes() {
    let net = setup();
    let stx = net
        .requester
        .request(net.issuer.identity(), "t", "d", 5)
        .await
        .unwrap();
    let observers = &stx.tx.outputs[0].observers;
    assert_eq!(observers.len(), 3);
    assert!(observers.contains(net.observer.identity()));
    assert!(!observers.contains(net.network.notary().identity()));
}

#[tokio::test]
async fn empty_title_rejected_before_network_contact() {
    let net = setup();
    let ctx = net.requester.flow_context("request");
    let err = RequestFlow::new(net.issuer.identity().clone(), "", "d", 1000)
        .call(&ctx)
        .await
        .unwrap_err();

    assert_eq!(err, FlowError::VerificationRejected(ContractError::EmptyMetadata));
    assert!(err.to_string().contains("title/description cannot be empty"));
    assert!(!ctx
        .progress()
        .history()
        .contains(&ProgressStep::CollectingSignatures));
    assert_eq!(ctx.progress().current(), ProgressStep::Failed);
    assert!(net.issuer.states().is_empty());
    assert!(net.requester.states().is_empty());
}

#[tokio::test]
async fn non_positive_request_rejected() {
    let net = setup();
    let err = net
        .requester
        .request(net.issuer.identity(), "t", "d", 0)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        FlowError::VerificationRejected(ContractError::NonPositiveRequest { amount: 0 })
    );
}

#[tokio::test]
async fn oversized_validity_fails_without_panicking() {
    let network = MockNetwork::new(FlowConfig {
        request_validity: chrono::Duration::days(100_000_000),
        session_timeout: Duration::from_secs(5),
    });
    let issuer = network.create_node("Issuer");
    let requester = network.create_node("Requester");

    let err = requester
        .request(issuer.identity(), "t", "d", 1000)
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::ValidityOutOfRange { .. }), "got {err:?}");
    assert_eq!(err.kind(), "validity_out_of_range");
    assert!(requester.states().is_empty());
    assert!(issuer.states().is_empty());
}

#[tokio::test]
async fn request_to_unknown_issuer_fails_cleanly() {
    let net = setup();
    let ghost = Party::new("Ghost", RemitKeypair::generate().public_key());
    let err = net
        .requester
        .request(&ghost, "t", "d", 10)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        FlowError::SessionFailure(SessionError::UnknownParty("Ghost".into()))
    );
    assert!(net.requester.states().is_empty());
    assert_eq!(net.network.notary().spent_count(), 0);
}

#[tokio::test]
async fn request_progress_runs_every_step() {
    let net = setup();
    let ctx = net.requester.flow_context("request");
    RequestFlow::new(net.issuer.identity().clone(), "t", "d", 1)
        .call(&ctx)
        .await
        .unwrap();
    assert_eq!(
        ctx.progress().history(),
        vec![
            ProgressStep::Starting,
            ProgressStep::Building,
            ProgressStep::Verifying,
            ProgressStep::Signing,
            ProgressStep::CollectingSignatures,
            ProgressStep::Notarising,
            ProgressStep::Broadcasting,
            ProgressStep::Done,
        ]
    );
}

// ---------------------------------------------------------------------------
// Approve
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_approval_reaches_every_observer() {
    let net = setup();
    let uid = pending_request(&net, 1000).await;

    let stx = net.issuer.approve(&uid, 1000).await.unwrap();
    let out = &stx.tx.outputs[0];
    assert!(out.approved);
    assert_eq!(out.valid_until, ValidUntil::Infinite);
    assert_eq!(out.amount, 1000);
    assert_eq!(out.uid, uid);

    for node in [&net.issuer, &net.requester, &net.observer] {
        let state = only_state(node);
        assert!(state.approved, "{} should hold the approved state", node.identity());
        assert_eq!(state.uid, uid);
    }
}

#[tokio::test]
async fn partial_approval_by_prefix() {
    let net = setup();
    let uid = pending_request(&net, 1000).await;

    let stx = net.issuer.approve(&uid[..8], 600).await.unwrap();
    assert_eq!(stx.tx.outputs[0].amount, 600);
    assert_eq!(only_state(&net.requester).amount, 600);
}

#[tokio::test]
async fn over_approval_rejected() {
    let net = setup();
    let uid = pending_request(&net, 1000).await;

    let err = net.issuer.approve(&uid, 1500).await.unwrap_err();
    assert!(matches!(
        err,
        FlowError::VerificationRejected(ContractError::ApprovesMoreThanRequested {
            requested: 1000,
            approved: 1500
        })
    ));
    assert!(err.to_string().contains("cannot approve more than requested"));

    // Nothing moved.
    assert!(!only_state(&net.requester).approved);
    assert!(!only_state(&net.issuer).approved);
}

#[tokio::test]
async fn only_the_issuer_can_approve() {
    let net = setup();
    let uid = pending_request(&net, 1000).await;
    let err = net.requester.approve(&uid, 1000).await.unwrap_err();
    assert_eq!(err, FlowError::NotFound { prefix: uid });
}

#[tokio::test]
async fn approved_request_cannot_be_approved_again() {
    let net = setup();
    let uid = pending_request(&net, 1000).await;
    net.issuer.approve(&uid, 1000).await.unwrap();
    assert!(matches!(
        net.issuer.approve(&uid, 1000).await,
        Err(FlowError::NotFound { .. })
    ));
}

// ---------------------------------------------------------------------------
// Decline
// ---------------------------------------------------------------------------

#[tokio::test]
async fn decline_consumes_request() {
    let net = setup();
    let uid = pending_request(&net, 1000).await;

    let stx = net.issuer.decline(&uid).await.unwrap();
    assert_eq!(stx.tx.inputs.len(), 1);
    assert!(stx.tx.outputs.is_empty());
    assert!(net.issuer.states().is_empty());
    assert!(net.requester.states().is_empty());
    assert!(net.requester.vault().transaction(stx.id()).is_some());

    let err = net.issuer.approve(&uid, 1000).await.unwrap_err();
    assert!(matches!(err, FlowError::NotFound { .. }));
}

// ---------------------------------------------------------------------------
// Double spends
// ---------------------------------------------------------------------------

#[tokio::test]
async fn resubmitting_finalized_transaction_conflicts() {
    let net = setup();
    let uid = pending_request(&net, 1000).await;
    let stx = net.issuer.approve(&uid, 1000).await.unwrap();

    let err = net.network.notary().commit(&stx).await.unwrap_err();
    assert!(matches!(err, NotaryError::Conflict { ref consumed } if consumed.len() == 1));
    assert!(matches!(
        FlowError::from(err),
        FlowError::ConsumedInput { refs } if refs == stx.tx.input_refs()
    ));
}

#[tokio::test]
async fn concurrent_approve_and_decline_one_wins() {
    let net = setup();
    let uid = pending_request(&net, 1000).await;

    let (approved, declined) = tokio::join!(net.issuer.approve(&uid, 1000), net.issuer.decline(&uid));

    let outcomes = [approved.is_ok(), declined.is_ok()];
    assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
    let loser = approved.err().or(declined.err()).unwrap();
    assert!(matches!(loser, FlowError::ConsumedInput { .. }), "got {loser:?}");
    assert_eq!(net.network.notary().spent_count(), 1);
}

// ---------------------------------------------------------------------------
// Responder checks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn issuer_refuses_request_naming_someone_else() {
    let net = setup();
    let ctx = net.requester.flow_context("request");
    let now = chrono::Utc::now();
    let state = TransferState::new_request(
        net.observer.identity().clone(),
        net.requester.identity().clone(),
        vec![],
        10,
        now,
        now + chrono::Duration::days(1),
        "t",
        "d",
    );
    let tx = TransactionBuilder::new(ctx.notary_identity().clone())
        .add_output(state)
        .add_command(Command::new(
            TransferCommand::Request,
            vec![
                *net.observer.identity().owning_key(),
                *net.requester.identity().owning_key(),
            ],
        ))
        .build();
    let stx = SignedTransaction::signed_by(tx, ctx.keypair());

    let mut session = ctx
        .initiate(net.issuer.identity(), TransferCommand::Request)
        .await
        .unwrap();
    session.send(SessionMessage::Solicit(true)).await.unwrap();
    let err = collect_signature(&ctx, &mut session, stx).await.unwrap_err();
    assert!(
        matches!(err, FlowError::AuthorizationRefused { ref party, .. } if party == "Issuer"),
        "got {err:?}"
    );
    assert!(net.issuer.states().is_empty());
}

#[tokio::test]
async fn responder_rejects_wrong_flow_kind() {
    let net = setup();
    let uid = pending_request(&net, 1000).await;
    let pending = net.issuer.states().remove(0);

    // A decline proposal sent over a Request session.
    let ctx = net.issuer.flow_context("request");
    let tx = TransactionBuilder::new(ctx.notary_identity().clone())
        .add_input(pending)
        .add_command(Command::new(
            TransferCommand::Decline,
            vec![*net.issuer.identity().owning_key()],
        ))
        .build();
    let stx = SignedTransaction::signed_by(tx, ctx.keypair());
    let mut session = ctx
        .initiate(net.requester.identity(), TransferCommand::Request)
        .await
        .unwrap();
    session.send(SessionMessage::Solicit(true)).await.unwrap();
    let err = collect_signature(&ctx, &mut session, stx).await.unwrap_err();
    match err {
        FlowError::AuthorizationRefused { reason, .. } => {
            assert!(reason.contains("expected a Request transaction"), "{reason}");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(only_state(&net.requester).uid, uid);
}

// ---------------------------------------------------------------------------
// Input resolution
// ---------------------------------------------------------------------------

/// An approved request, with its output described as if still pending.
async fn approved_but_described_pending(net: &Net) -> (SignedTransaction, StateAndRef) {
    let uid = pending_request(net, 1000).await;
    let approved = net.issuer.approve(&uid, 1000).await.unwrap();
    let mut state = approved.tx.outputs[0].clone();
    state.approved = false;
    state.valid_until = ValidUntil::At(state.requested_at + chrono::Duration::days(1));
    let forged = StateAndRef {
        state,
        reference: approved.tx.output_ref(0),
    };
    (approved, forged)
}

fn decline_of(net: &Net, input: StateAndRef) -> SignedTransaction {
    let ctx = net.issuer.flow_context("decline");
    let tx = TransactionBuilder::new(ctx.notary_identity().clone())
        .add_input(input)
        .add_command(Command::new(
            TransferCommand::Decline,
            vec![*net.issuer.identity().owning_key()],
        ))
        .build();
    SignedTransaction::signed_by(tx, ctx.keypair())
}

#[tokio::test]
async fn notary_rejects_decline_of_misdescribed_approved_state() {
    let net = setup();
    let (_, forged) = approved_but_described_pending(&net).await;
    let reference = forged.reference.clone();

    let stx = decline_of(&net, forged);
    assert_eq!(
        net.network.notary().commit(&stx).await,
        Err(NotaryError::InvalidTransaction(
            TransactionError::InputMismatch {
                reference: reference.clone()
            }
        ))
    );
    assert_eq!(net.network.notary().consumed_by(&reference), None);
    assert!(only_state(&net.requester).approved);
}

#[tokio::test]
async fn requester_refuses_finality_of_misdescribed_approved_state() {
    let notary_key = RemitKeypair::generate();
    let network = MockNetwork::with_notary(
        InMemoryNotary::new("Notary", notary_key.clone()),
        FlowConfig {
            session_timeout: Duration::from_secs(5),
            ..FlowConfig::default()
        },
    );
    let net = Net {
        issuer: network.create_node("Issuer"),
        requester: network.create_node("Requester"),
        observer: network.create_node("Observer"),
        network,
    };
    let (_, forged) = approved_but_described_pending(&net).await;

    // Notary signature applied without going through the notary.
    let stx = decline_of(&net, forged);
    let stx = stx.with_additional_signature(TransactionSignature::create(&notary_key, stx.id()));
    assert!(stx.verify_required_signatures().is_ok());

    let ctx = net.issuer.flow_context("decline");
    let mut session = ctx
        .initiate(net.requester.identity(), TransferCommand::Decline)
        .await
        .unwrap();
    session.send(SessionMessage::Finalize(stx.clone())).await.unwrap();
    assert!(session.receive_ack().await.is_err());

    assert!(net.requester.vault().transaction(stx.id()).is_none());
    assert!(only_state(&net.requester).approved);
    assert!(only_state(&net.observer).approved);
}

#[tokio::test]
async fn requester_refuses_approval_of_inflated_input() {
    let net = setup();
    let uid = pending_request(&net, 1000).await;
    let mut inflated = net.issuer.states().remove(0);
    assert_eq!(inflated.state.uid, uid);
    inflated.state.amount = 5000;

    let ctx = net.issuer.flow_context("approve");
    let output = inflated.state.approved_for(1500);
    let tx = TransactionBuilder::new(ctx.notary_identity().clone())
        .add_input(inflated)
        .add_output(output)
        .add_command(Command::new(
            TransferCommand::Approve,
            vec![
                *net.issuer.identity().owning_key(),
                *net.requester.identity().owning_key(),
            ],
        ))
        .build();
    let stx = SignedTransaction::signed_by(tx, ctx.keypair());

    let mut session = ctx
        .initiate(net.requester.identity(), TransferCommand::Approve)
        .await
        .unwrap();
    session.send(SessionMessage::Solicit(true)).await.unwrap();
    let err = collect_signature(&ctx, &mut session, stx).await.unwrap_err();
    match err {
        FlowError::AuthorizationRefused { reason, .. } => {
            assert!(reason.contains("does not match the recorded output"), "{reason}");
        }
        other => panic!("unexpected {other:?}"),
    }
    let pending = only_state(&net.requester);
    assert_eq!(pending.amount, 1000);
    assert!(!pending.approved);
}
