//! Reusable test fixtures: a notarized UTXO token domain, an in-memory
//! secp256k1 key manager, a loopback transport network, and an
//! instant-mining fake base ledger, wired together per node.

pub mod key_manager;
pub mod ledger;
pub mod network;
pub mod node;
pub mod simple_token;

pub use key_manager::TestKeyManager;
pub use ledger::FakeChain;
pub use network::LoopbackNetwork;
pub use node::TestNode;
pub use simple_token::SimpleTokenDomain;
