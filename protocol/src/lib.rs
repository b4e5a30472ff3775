// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # REMIT Protocol — Core Library
//!
//! REMIT lets parties that do not trust each other agree on the lifecycle of
//! a transfer request: a requester asks an issuer for funds, and the issuer
//! approves (in full or in part) or declines. Every change is checked by a
//! shared contract, signed by the parties it concerns, and committed by a
//! notary that guarantees no request is resolved twice.
//!
//! ## Architecture
//!
//! - **crypto** — Ed25519 keys and signatures, SHA-256 and BLAKE3 digests.
//! - **identity** — `Party`: a name bound to an owning key.
//! - **transaction** — ledger states, transactions, and the contract rules.
//! - **storage** — per-party vaults.
//! - **network** — sessions, the notary, the network map, node runtime.
//! - **flows** — Request / Approve / Decline and their responders.
//! - **config** — protocol constants and flow settings.
//!
//! ## Quick tour
//!
//! ```rust,no_run
//! use remit_protocol::network::MockNetwork;
//!
//! # async fn demo() -> Result<(), remit_protocol::flows::FlowError> {
//! let network = MockNetwork::default();
//! let issuer = network.create_node("Issuer");
//! let requester = network.create_node("Requester");
//!
//! let stx = requester.request(issuer.identity(), "rent", "march", 1_000).await?;
//! let uid = stx.tx.outputs[0].uid.clone();
//! issuer.approve(&uid[..8], 800).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod crypto;
pub mod flows;
pub mod identity;
pub mod network;
pub mod storage;
pub mod transaction;
