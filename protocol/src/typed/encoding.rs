//! Structural hashing and ABI-style encoding of intents.
//!
//! Both representations walk the same field tree:
//!
//! - the **hash** follows typed-structured-data rules: atomic values become
//!   32-byte words, `bytes` are replaced by their Keccak-256 hash and nested
//!   structs by their own struct hash;
//! - the **encoding** inlines nested structs into one flat parameter list
//!   and lays that list out as ABI parameters.
//!
//! # Encoding layout
//!
//! Static intents (hodl, release, withdrawal) are one word per flattened
//! field. Intents with a `bytes` field are laid out the way the on-ledger
//! decoder expects a single dynamic tuple:
//!
//! ```text
//! 0x20 | head (one word per field, the bytes field holds its offset) | len | data, zero-padded
//! ```
//!
//! The offset is relative to the start of the head. Tags are small, so a
//! first word of `0x20` unambiguously marks the dynamic layout.

use alloy_primitives::{Address, B256, U256};

use super::error::CodecError;
use super::intent::{ensure_width, BoostedIntent, BoosterFuel, BoosterPayload, IntentBody, HODL_ID_BITS};
use super::schema::{address_word, Eip712Domain, IntentKind, BOOSTER_FUEL_TYPE, BOOSTER_PAYLOAD_TYPE};
use crate::config::AMOUNT_BITS;
use crate::crypto::hash::{keccak256, keccak256_concat};

const WORD: usize = 32;

/// One node of an intent's field tree.
enum Field<'a> {
    Word(B256),
    Bytes(&'a [u8]),
    Struct(&'static str, Vec<Field<'a>>),
}

fn uint_word(value: U256) -> B256 {
    B256::from(value.to_be_bytes::<32>())
}

fn u64_word(value: u64) -> B256 {
    uint_word(U256::from(value))
}

fn bool_word(value: bool) -> B256 {
    u64_word(u64::from(value))
}

impl BoosterFuel {
    fn fields(&self) -> Vec<Field<'static>> {
        vec![
            Field::Word(uint_word(self.dubi)),
            Field::Word(uint_word(self.unlocked_prps)),
            Field::Word(uint_word(self.locked_prps)),
            Field::Word(uint_word(self.intrinsic_fuel)),
        ]
    }
}

impl BoosterPayload {
    fn fields(&self) -> Vec<Field<'static>> {
        vec![
            Field::Word(address_word(self.booster)),
            Field::Word(u64_word(self.timestamp)),
            Field::Word(u64_word(self.nonce)),
            Field::Word(bool_word(self.is_legacy_signature)),
        ]
    }
}

impl BoostedIntent {
    fn fields(&self) -> Vec<Field<'_>> {
        let mut fields = vec![Field::Word(u64_word(u64::from(self.kind().tag())))];
        match &self.body {
            IntentBody::Send { sender, recipient, amount, data } => {
                fields.push(Field::Word(address_word(*sender)));
                fields.push(Field::Word(address_word(*recipient)));
                fields.push(Field::Word(uint_word(*amount)));
                fields.push(Field::Bytes(data.as_slice()));
            }
            IntentBody::Burn { account, amount, data } => {
                fields.push(Field::Word(address_word(*account)));
                fields.push(Field::Word(uint_word(*amount)));
                fields.push(Field::Bytes(data.as_slice()));
            }
            IntentBody::Hodl {
                hodl_id,
                amount_prps,
                duration,
                dubi_beneficiary,
                prps_beneficiary,
                creator,
            } => {
                fields.push(Field::Word(u64_word(u64::from(*hodl_id))));
                fields.push(Field::Word(uint_word(*amount_prps)));
                fields.push(Field::Word(u64_word(u64::from(*duration))));
                fields.push(Field::Word(address_word(*dubi_beneficiary)));
                fields.push(Field::Word(address_word(*prps_beneficiary)));
                fields.push(Field::Word(address_word(*creator)));
            }
            IntentBody::Release { id, creator, prps_beneficiary }
            | IntentBody::Withdrawal { id, creator, prps_beneficiary } => {
                fields.push(Field::Word(u64_word(u64::from(*id))));
                fields.push(Field::Word(address_word(*creator)));
                fields.push(Field::Word(address_word(*prps_beneficiary)));
            }
        }
        fields.push(Field::Struct(BOOSTER_FUEL_TYPE, self.fuel.fields()));
        fields.push(Field::Struct(BOOSTER_PAYLOAD_TYPE, self.booster_payload.fields()));
        fields
    }
}

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

fn hash_fields(type_hash: B256, fields: &[Field<'_>]) -> B256 {
    let mut buf = Vec::with_capacity(WORD * (fields.len() + 1));
    buf.extend_from_slice(type_hash.as_slice());
    for field in fields {
        match field {
            Field::Word(word) => buf.extend_from_slice(word.as_slice()),
            Field::Bytes(data) => buf.extend_from_slice(keccak256(data).as_slice()),
            Field::Struct(type_string, nested) => {
                let nested_hash = hash_fields(keccak256(type_string.as_bytes()), nested);
                buf.extend_from_slice(nested_hash.as_slice());
            }
        }
    }
    keccak256(&buf)
}

/// The struct hash of an intent, independent of any domain.
pub fn hash_struct(intent: &BoostedIntent) -> B256 {
    hash_fields(intent.kind().type_hash(), &intent.fields())
}

/// The digest an account signs: `keccak256(0x1901 ‖ domain ‖ struct hash)`.
///
/// Depends only on the intent's values and the domain, never on how the
/// intent travels over the wire.
pub fn signing_hash(intent: &BoostedIntent, domain: &Eip712Domain) -> B256 {
    let separator = domain.separator();
    let struct_hash = hash_struct(intent);
    keccak256_concat(&[&[0x19, 0x01], separator.as_slice(), struct_hash.as_slice()])
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

fn flatten<'a>(fields: Vec<Field<'a>>, out: &mut Vec<Field<'a>>) {
    for field in fields {
        match field {
            Field::Struct(_, nested) => flatten(nested, out),
            leaf => out.push(leaf),
        }
    }
}

/// Flattens the intent into ABI parameters.
pub fn encode(intent: &BoostedIntent) -> Vec<u8> {
    let mut flat = Vec::new();
    flatten(intent.fields(), &mut flat);

    let head_len = flat.len() * WORD;
    let dynamic = flat.iter().find_map(|field| match field {
        Field::Bytes(data) => Some(*data),
        _ => None,
    });

    let mut out = Vec::with_capacity(WORD + head_len + dynamic.map_or(0, |d| WORD + d.len() + WORD));
    if dynamic.is_some() {
        out.extend_from_slice(u64_word(WORD as u64).as_slice());
    }
    for field in &flat {
        match field {
            Field::Word(word) => out.extend_from_slice(word.as_slice()),
            Field::Bytes(_) => out.extend_from_slice(u64_word(head_len as u64).as_slice()),
            Field::Struct(..) => {}
        }
    }
    if let Some(data) = dynamic {
        out.extend_from_slice(u64_word(data.len() as u64).as_slice());
        out.extend_from_slice(data);
        out.resize(out.len() + padding(data.len()), 0);
    }
    out
}

fn padding(len: usize) -> usize {
    (WORD - len % WORD) % WORD
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Reads consecutive 32-byte words.
struct WordReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> WordReader<'a> {
    fn new(bytes: &'a [u8], pos: usize) -> Self {
        Self { bytes, pos }
    }

    fn word(&mut self) -> Result<&'a [u8], CodecError> {
        let end = self.pos + WORD;
        if self.bytes.len() < end {
            return Err(CodecError::Truncated {
                needed: end,
                actual: self.bytes.len(),
            });
        }
        let word = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(word)
    }

    fn uint(&mut self, field: &'static str, bits: usize) -> Result<U256, CodecError> {
        let value = U256::from_be_slice(self.word()?);
        ensure_width(value, field, bits)?;
        Ok(value)
    }

    fn small(&mut self, field: &'static str, bits: usize) -> Result<u64, CodecError> {
        Ok(self.uint(field, bits)?.as_limbs()[0])
    }

    fn address(&mut self, field: &'static str) -> Result<Address, CodecError> {
        let word = self.word()?;
        if word[..12].iter().any(|b| *b != 0) {
            return Err(CodecError::Overflow { field, bits: 160 });
        }
        Ok(Address::from_slice(&word[12..]))
    }

    fn boolean(&mut self, field: &'static str) -> Result<bool, CodecError> {
        let value = U256::from_be_slice(self.word()?);
        if value.is_zero() {
            Ok(false)
        } else if value == U256::from(1u8) {
            Ok(true)
        } else {
            Err(CodecError::InvalidBool(field))
        }
    }

    fn fuel(&mut self) -> Result<BoosterFuel, CodecError> {
        Ok(BoosterFuel {
            dubi: self.uint("dubi", AMOUNT_BITS)?,
            unlocked_prps: self.uint("unlockedPrps", AMOUNT_BITS)?,
            locked_prps: self.uint("lockedPrps", AMOUNT_BITS)?,
            intrinsic_fuel: self.uint("intrinsicFuel", AMOUNT_BITS)?,
        })
    }

    fn booster_payload(&mut self) -> Result<BoosterPayload, CodecError> {
        Ok(BoosterPayload {
            booster: self.address("booster")?,
            timestamp: self.small("timestamp", 64)?,
            nonce: self.small("nonce", 64)?,
            is_legacy_signature: self.boolean("isLegacySignature")?,
        })
    }
}

/// Number of flattened fields of each kind.
fn head_words(kind: IntentKind) -> usize {
    // tag + body + 4 fuel + 4 payload
    let body = match kind {
        IntentKind::Send => 4,
        IntentKind::Burn => 3,
        IntentKind::Hodl => 6,
        IntentKind::Release | IntentKind::Withdrawal => 3,
    };
    1 + body + 8
}

/// Inverse of [`encode`]. Only canonical encodings are accepted.
pub fn decode(bytes: &[u8]) -> Result<BoostedIntent, CodecError> {
    let first = WordReader::new(bytes, 0).uint("tag", 256)?;
    let dynamic = first == U256::from(WORD);
    let head_start = if dynamic { WORD } else { 0 };

    let mut reader = WordReader::new(bytes, head_start);
    let tag = reader.small("tag", 8)? as u8;
    let kind = IntentKind::from_tag(tag).ok_or(CodecError::UnknownTag(tag))?;
    if kind.has_dynamic_field() != dynamic {
        return Err(CodecError::LayoutMismatch(kind));
    }

    let head_len = head_words(kind) * WORD;
    let mut data_offset = None;
    let body = match kind {
        IntentKind::Send => {
            let sender = reader.address("sender")?;
            let recipient = reader.address("recipient")?;
            let amount = reader.uint("amount", 256)?;
            data_offset = Some(reader.word()?);
            IntentBody::Send { sender, recipient, amount, data: Vec::new() }
        }
        IntentKind::Burn => {
            let account = reader.address("account")?;
            let amount = reader.uint("amount", 256)?;
            data_offset = Some(reader.word()?);
            IntentBody::Burn { account, amount, data: Vec::new() }
        }
        IntentKind::Hodl => IntentBody::Hodl {
            hodl_id: reader.small("hodlId", HODL_ID_BITS)? as u32,
            amount_prps: reader.uint("amountPrps", AMOUNT_BITS)?,
            duration: reader.small("duration", 16)? as u16,
            dubi_beneficiary: reader.address("dubiBeneficiary")?,
            prps_beneficiary: reader.address("prpsBeneficiary")?,
            creator: reader.address("creator")?,
        },
        IntentKind::Release => IntentBody::Release {
            id: reader.small("id", HODL_ID_BITS)? as u32,
            creator: reader.address("creator")?,
            prps_beneficiary: reader.address("prpsBeneficiary")?,
        },
        IntentKind::Withdrawal => IntentBody::Withdrawal {
            id: reader.small("id", HODL_ID_BITS)? as u32,
            creator: reader.address("creator")?,
            prps_beneficiary: reader.address("prpsBeneficiary")?,
        },
    };
    let fuel = reader.fuel()?;
    let booster_payload = reader.booster_payload()?;

    let mut end = head_start + head_len;
    let body = match (body, data_offset) {
        (mut body, Some(offset_word)) => {
            let offset = U256::from_be_slice(offset_word);
            if offset != U256::from(head_len) {
                return Err(CodecError::BadDynamicOffset {
                    expected: head_len,
                    got: offset.to_string(),
                });
            }
            let payload = read_dynamic_bytes(bytes, end)?;
            end += WORD + payload.len() + padding(payload.len());
            if let IntentBody::Send { data, .. } | IntentBody::Burn { data, .. } = &mut body {
                *data = payload;
            }
            body
        }
        (body, None) => body,
    };

    if bytes.len() != end {
        return Err(CodecError::TrailingBytes {
            expected: end,
            actual: bytes.len(),
        });
    }

    Ok(BoostedIntent { body, fuel, booster_payload })
}

fn read_dynamic_bytes(bytes: &[u8], at: usize) -> Result<Vec<u8>, CodecError> {
    let len_word = WordReader::new(bytes, at).uint("data length", 64)?;
    let len = usize::try_from(len_word.as_limbs()[0]).map_err(|_| CodecError::Truncated {
        needed: usize::MAX,
        actual: bytes.len(),
    })?;
    let start = at + WORD;
    let needed = start
        .checked_add(len)
        .and_then(|n| n.checked_add(padding(len)))
        .ok_or(CodecError::Truncated { needed: usize::MAX, actual: bytes.len() })?;
    if bytes.len() < needed {
        return Err(CodecError::Truncated { needed, actual: bytes.len() });
    }
    if bytes[start + len..needed].iter().any(|b| *b != 0) {
        return Err(CodecError::DirtyPadding);
    }
    Ok(bytes[start..start + len].to_vec())
}
