//! # Attestation Types
//!
//! A transaction assembled by a domain carries an attestation plan: a list of
//! named requests for either a SIGN (a signature over a payload by a party's
//! key) or an ENDORSE (an approval decision by a designated party, typically
//! the notary). Results are correlated back to the plan by the
//! `(name, type, algorithm, verifier type, party)` tuple, and a transaction
//! only advances once every tuple in the plan is satisfied exactly once.

use serde::{Deserialize, Serialize};

/// Signing algorithm identifiers understood by the key manager.
pub mod algorithms {
    /// ECDSA over the secp256k1 curve.
    pub const ECDSA_SECP256K1: &str = "ecdsa:secp256k1";
}

/// Verifier-type identifiers: the public representation of a resolved key.
pub mod verifier_types {
    /// A 20-byte base-ledger address string.
    pub const ETH_ADDRESS: &str = "eth_address";
}

/// The kind of attestation a plan entry asks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttestationType {
    /// A signature over the request payload, produced by the party's key.
    Sign,
    /// An approval by the party; may carry submission authority.
    Endorse,
}

/// A request to resolve an identity lookup to a public verifier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifierRequest {
    /// Identity lookup string, e.g. `node1.notary`.
    pub lookup: String,
    /// Signing algorithm the verifier must correspond to.
    pub algorithm: String,
    /// Required verifier representation.
    pub verifier_type: String,
}

/// A resolved verifier: the public form of a key for a lookup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedVerifier {
    /// The lookup string the verifier was resolved from.
    pub lookup: String,
    /// Signing algorithm.
    pub algorithm: String,
    /// Verifier representation.
    pub verifier_type: String,
    /// The verifier value itself, e.g. a 0x address.
    pub verifier: String,
}

/// One entry of a domain's attestation plan.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationRequest {
    /// Plan-scoped name, e.g. `sender` or `notary`.
    pub name: String,
    /// SIGN or ENDORSE.
    pub attestation_type: AttestationType,
    /// Signing algorithm for the attestation.
    pub algorithm: String,
    /// Verifier representation expected in the result.
    pub verifier_type: String,
    /// Payload to sign; empty for pure endorsements.
    pub payload: Vec<u8>,
    /// Identity lookups of the parties that must attest.
    pub parties: Vec<String>,
}

/// The result of one party satisfying one attestation request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationResult {
    /// Name of the plan entry this satisfies.
    pub name: String,
    /// SIGN or ENDORSE (must match the plan entry).
    pub attestation_type: AttestationType,
    /// The attesting party's resolved verifier.
    pub verifier: ResolvedVerifier,
    /// Attestation bytes (signature for SIGN; may be empty for ENDORSE).
    pub payload: Vec<u8>,
}

impl AttestationResult {
    /// True when this result satisfies `request` for `party`.
    ///
    /// Correlation is by the full tuple so a result for the wrong party,
    /// algorithm, or verifier type never counts toward the plan.
    pub fn satisfies(&self, request: &AttestationRequest, party: &str) -> bool {
        self.name == request.name
            && self.attestation_type == request.attestation_type
            && self.verifier.algorithm == request.algorithm
            && self.verifier.verifier_type == request.verifier_type
            && self.verifier.lookup == party
    }
}
