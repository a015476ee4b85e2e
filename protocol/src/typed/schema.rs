//! Type declarations of the boosted intents and the signing domain.
//!
//! The type strings below are part of every signature: changing a single
//! character changes every type hash and invalidates every intent ever
//! signed. They are spelled out literally on purpose.

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_CHAIN_ID, DOMAIN_VERSION};
use crate::crypto::hash::{keccak256, keccak256_concat};

pub const DOMAIN_TYPE: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

pub const BOOSTER_FUEL_TYPE: &str =
    "BoosterFuel(uint96 dubi,uint96 unlockedPrps,uint96 lockedPrps,uint96 intrinsicFuel)";

pub const BOOSTER_PAYLOAD_TYPE: &str =
    "BoosterPayload(address booster,uint64 timestamp,uint64 nonce,bool isLegacySignature)";

const BOOSTED_SEND_TYPE: &str = "BoostedSend(uint8 tag,address sender,address recipient,uint256 amount,bytes data,BoosterFuel fuel,BoosterPayload boosterPayload)";
const BOOSTED_BURN_TYPE: &str = "BoostedBurn(uint8 tag,address account,uint256 amount,bytes data,BoosterFuel fuel,BoosterPayload boosterPayload)";
const BOOSTED_HODL_TYPE: &str = "BoostedHodl(uint8 tag,uint24 hodlId,uint96 amountPrps,uint16 duration,address dubiBeneficiary,address prpsBeneficiary,address creator,BoosterFuel fuel,BoosterPayload boosterPayload)";
const BOOSTED_RELEASE_TYPE: &str = "BoostedRelease(uint8 tag,uint24 id,address creator,address prpsBeneficiary,BoosterFuel fuel,BoosterPayload boosterPayload)";
const BOOSTED_WITHDRAWAL_TYPE: &str = "BoostedWithdrawal(uint8 tag,uint24 id,address creator,address prpsBeneficiary,BoosterFuel fuel,BoosterPayload boosterPayload)";

/// The five intent kinds. The discriminant is the `tag` field every intent
/// starts with, and doubles as the pending-operation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum IntentKind {
    Send = 0,
    Burn = 1,
    Hodl = 2,
    Release = 3,
    Withdrawal = 4,
}

impl IntentKind {
    pub const ALL: [IntentKind; 5] = [
        IntentKind::Send,
        IntentKind::Burn,
        IntentKind::Hodl,
        IntentKind::Release,
        IntentKind::Withdrawal,
    ];

    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.get(tag as usize).copied()
    }

    /// Name of the primary struct type.
    pub fn primary_type(self) -> &'static str {
        match self {
            IntentKind::Send => "BoostedSend",
            IntentKind::Burn => "BoostedBurn",
            IntentKind::Hodl => "BoostedHodl",
            IntentKind::Release => "BoostedRelease",
            IntentKind::Withdrawal => "BoostedWithdrawal",
        }
    }

    /// The primary struct's own declaration.
    pub fn type_string(self) -> &'static str {
        match self {
            IntentKind::Send => BOOSTED_SEND_TYPE,
            IntentKind::Burn => BOOSTED_BURN_TYPE,
            IntentKind::Hodl => BOOSTED_HODL_TYPE,
            IntentKind::Release => BOOSTED_RELEASE_TYPE,
            IntentKind::Withdrawal => BOOSTED_WITHDRAWAL_TYPE,
        }
    }

    /// Full type encoding: the primary declaration followed by the
    /// referenced struct declarations in alphabetical order.
    pub fn encode_type(self) -> String {
        let mut referenced = [BOOSTER_FUEL_TYPE, BOOSTER_PAYLOAD_TYPE];
        referenced.sort_unstable();
        let mut out = String::from(self.type_string());
        for declaration in referenced {
            out.push_str(declaration);
        }
        out
    }

    pub fn type_hash(self) -> B256 {
        keccak256(self.encode_type().as_bytes())
    }

    /// Whether the intent carries a dynamic `bytes` field.
    pub fn has_dynamic_field(self) -> bool {
        matches!(self, IntentKind::Send | IntentKind::Burn)
    }
}

/// The signing domain that binds an intent to one verifying collaborator
/// on one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eip712Domain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: Address,
}

impl Eip712Domain {
    /// A domain with the protocol's version and the default chain id.
    pub fn new(name: impl Into<String>, verifying_contract: Address) -> Self {
        Self {
            name: name.into(),
            version: DOMAIN_VERSION.to_string(),
            chain_id: DEFAULT_CHAIN_ID,
            verifying_contract,
        }
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    pub fn separator(&self) -> B256 {
        let type_hash = keccak256(DOMAIN_TYPE.as_bytes());
        let name_hash = keccak256(self.name.as_bytes());
        let version_hash = keccak256(self.version.as_bytes());
        let chain_id = U256::from(self.chain_id).to_be_bytes::<32>();
        let contract = address_word(self.verifying_contract);
        keccak256_concat(&[
            type_hash.as_slice(),
            name_hash.as_slice(),
            version_hash.as_slice(),
            &chain_id,
            contract.as_slice(),
        ])
    }
}

/// An address left-padded to a 32-byte word.
pub(crate) fn address_word(address: Address) -> B256 {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_slice());
    B256::from(word)
}
