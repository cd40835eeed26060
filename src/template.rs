//! C3: template / coinbase builder.
//!
//! Grounded on `template.py`'s `Coinbase`/`BlockTemplate`/`rewards_for_miners`
//! (MentalCollatz odo-miner), re-expressed with Rust's explicit byte types
//! per §9 ("Mixed type discipline") and tagged reward shares per §9 ("Tagged
//! variants"). The coinbase scriptSig layout, witness marker/flag handling,
//! and header byte layout all follow §4.3 exactly.

use crate::encoder::{compact_size, merkle_branch, merkle_root, sha256d, Script};
use crate::error::TemplateError;
use crate::rpc::GetBlockTemplateResult;

/// A reward allotment's share: either a fraction of the total, or the
/// sentinel marking "whatever is left". Exactly one allotment in a
/// `RewardSplit` must be `Remainder`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Share {
    Fraction(f64),
    Remainder,
}

#[derive(Debug, Clone)]
pub struct Allotment {
    pub script: Vec<u8>,
    pub share: Share,
}

/// An ordered sequence of reward allotments (§3 `RewardSplit`).
#[derive(Debug, Clone)]
pub struct RewardSplit {
    allotments: Vec<Allotment>,
}

impl RewardSplit {
    pub fn new(allotments: Vec<Allotment>) -> Result<Self, TemplateError> {
        let remainder_count = allotments
            .iter()
            .filter(|a| a.share == Share::Remainder)
            .count();
        if remainder_count != 1 {
            return Err(TemplateError::RewardSplitRemainderCount(remainder_count));
        }
        Ok(RewardSplit { allotments })
    }

    /// A single-allotment split paying the whole reward to one script —
    /// used when no donation percentage is configured.
    pub fn solo(script: Vec<u8>) -> Self {
        RewardSplit {
            allotments: vec![Allotment {
                script,
                share: Share::Remainder,
            }],
        }
    }

    /// Computes `(value, script)` payouts for a given total. Fractional
    /// allotments receive `floor(share * total)`, clamped to the remaining
    /// balance, in order; the remainder allotment receives whatever is
    /// left and is prepended so it is emitted first — unless nothing is
    /// left, in which case (matching the original) it is omitted entirely.
    pub fn compute(&self, total: u64) -> Vec<(u64, Vec<u8>)> {
        let mut remaining = total;
        let mut result = Vec::new();
        let mut remainder_script: Option<&[u8]> = None;

        for allotment in &self.allotments {
            match allotment.share {
                Share::Fraction(share) => {
                    let portion = ((share * total as f64) as u64).min(remaining);
                    if portion > 0 {
                        result.push((portion, allotment.script.clone()));
                        remaining -= portion;
                    }
                }
                Share::Remainder => {
                    remainder_script = Some(&allotment.script);
                }
            }
        }

        if remaining > 0 {
            let script = remainder_script
                .expect("RewardSplit::new guarantees exactly one Remainder allotment")
                .to_vec();
            result.insert(0, (remaining, script));
        }
        result
    }
}

/// Auxiliary coinbase push-data, keyed by tag name. Values are pushed as
/// raw bytes (not hex-decoded) — the distinguished `"cbstring"` key carries
/// the pool's plain-text coinbase tag, matching `Coinbase._data`'s
/// `aux.encode()` in the original.
pub type CoinbaseAux = Vec<(String, Vec<u8>)>;

#[derive(Debug, Clone)]
pub struct Coinbase {
    pub height: u32,
    pub txouts: Vec<(u64, Vec<u8>)>,
    pub needs_witness: bool,
    pub coinbase_aux: CoinbaseAux,
}

impl Coinbase {
    pub fn new(
        height: u32,
        coinbasevalue: u64,
        reward_split: &RewardSplit,
        needs_witness: bool,
        witness_commitment: Option<Vec<u8>>,
        coinbase_aux: CoinbaseAux,
    ) -> Result<Self, TemplateError> {
        let mut txouts = reward_split.compute(coinbasevalue);
        if needs_witness {
            let commitment =
                witness_commitment.ok_or(TemplateError::MissingWitnessCommitment)?;
            txouts.push((0, commitment));
        }
        Ok(Coinbase {
            height,
            txouts,
            needs_witness,
            coinbase_aux,
        })
    }

    fn script_sig(&self, extra_nonce: u32) -> Result<Vec<u8>, TemplateError> {
        let mut script = Script::new()
            .push_int(self.height as u64, true)
            .push_int(extra_nonce as u64, false);
        for (_key, aux) in &self.coinbase_aux {
            if !aux.is_empty() {
                script = script.push_bytes(aux);
            }
        }
        if script.data.len() > 100 {
            return Err(TemplateError::ScriptSigTooLong(script.data.len()));
        }
        Ok(script.data)
    }

    /// Serializes the coinbase transaction. `extended` requests the
    /// witness marker/flag/stack form used for block submission; it is
    /// forced off when `needs_witness` is false, since the canonical
    /// (non-witness) form is always used for txid hashing.
    fn serialize(&self, extra_nonce: u32, extended: bool) -> Result<Vec<u8>, TemplateError> {
        let extended = extended && self.needs_witness;
        let script_sig = self.script_sig(extra_nonce)?;

        let mut data = Vec::new();
        data.extend_from_slice(&1u32.to_le_bytes()); // tx version
        if extended {
            data.push(0x00); // witness marker
            data.push(0x01); // witness flag
        }
        data.extend_from_slice(&compact_size(1)); // in_count
        data.extend_from_slice(&[0u8; 32]); // prevout hash (null)
        data.extend_from_slice(&[0xff; 4]); // prevout n
        data.extend_from_slice(&compact_size(script_sig.len() as u64));
        data.extend_from_slice(&script_sig);
        data.extend_from_slice(&[0xff; 4]); // sequence
        data.extend_from_slice(&compact_size(self.txouts.len() as u64));
        for (value, script) in &self.txouts {
            data.extend_from_slice(&value.to_le_bytes());
            data.extend_from_slice(&compact_size(script.len() as u64));
            data.extend_from_slice(script);
        }
        if extended {
            data.push(0x01); // witness stack size
            data.push(0x20); // witness item length
            data.extend_from_slice(&[0u8; 32]); // zero witness
        }
        data.extend_from_slice(&[0u8; 4]); // locktime
        Ok(data)
    }

    /// Extended form, used in the full block body on submission.
    pub fn data(&self, extra_nonce: u32) -> Result<Vec<u8>, TemplateError> {
        self.serialize(extra_nonce, true)
    }

    /// `sha256d` of the canonical (non-witness) form — the txid folded
    /// into the Merkle root.
    pub fn txid(&self, extra_nonce: u32) -> Result<[u8; 32], TemplateError> {
        Ok(sha256d(&self.serialize(extra_nonce, false)?))
    }
}

/// Immutable once constructed; produces a unique 80-byte header (and full
/// block) for any extra-nonce (§3 `BlockTemplate`).
#[derive(Debug, Clone)]
pub struct BlockTemplate {
    pub version: u32,
    pub previous_block_hash: [u8; 32],
    pub time: u32,
    pub bits: [u8; 4],
    pub target: String,
    pub odo_key: u32,
    pub merkle_branch: Vec<[u8; 32]>,
    pub tx_data: String,
    pub tx_count: u32,
    pub coinbase: Coinbase,
    pub long_poll_id: String,
}

impl BlockTemplate {
    pub fn from_rpc(
        template: &GetBlockTemplateResult,
        reward_split: &RewardSplit,
    ) -> Result<Self, TemplateError> {
        let previous_block_hash = reversed_32(&template.previousblockhash, "previousblockhash")?;
        let bits = reversed_4(&template.bits, "bits")?;

        let mut txids = Vec::with_capacity(template.transactions.len());
        for tx in &template.transactions {
            txids.push(reversed_32(&tx.txid, "transactions[].txid")?);
        }
        let merkle_branch = merkle_branch(&txids);

        let needs_witness = template
            .transactions
            .iter()
            .any(|tx| tx.txid != tx.hash);
        let witness_commitment = if needs_witness {
            Some(
                hex::decode(
                    template
                        .default_witness_commitment
                        .as_deref()
                        .unwrap_or_default(),
                )
                .map_err(|source| TemplateError::BadHex {
                    field: "default_witness_commitment",
                    source,
                })?,
            )
        } else {
            None
        };

        let coinbase_aux: CoinbaseAux = template
            .coinbaseaux
            .iter()
            .map(|(k, v)| (k.clone(), v.as_bytes().to_vec()))
            .collect();

        let coinbase = Coinbase::new(
            template.height,
            template.coinbasevalue,
            reward_split,
            needs_witness,
            witness_commitment,
            coinbase_aux,
        )?;

        let tx_data = template.transactions.iter().map(|tx| tx.data.as_str()).collect();

        Ok(BlockTemplate {
            version: template.version,
            previous_block_hash,
            time: template.curtime,
            bits,
            target: template.target.clone(),
            odo_key: template.odokey,
            merkle_branch,
            tx_data,
            tx_count: template.transactions.len() as u32 + 1,
            coinbase,
            long_poll_id: template.longpollid.clone(),
        })
    }

    /// The 80-byte header for a given extra-nonce, hex-encoded (160 chars).
    /// Bytes `[36, 68)` equal `merkle_root(coinbase_txid(extra_nonce),
    /// self.merkle_branch)`; the nonce field is zeroed for the miner to fill
    /// in.
    pub fn get_work(&self, extra_nonce: u32) -> Result<String, TemplateError> {
        let txid = self.coinbase.txid(extra_nonce)?;
        let root = merkle_root(txid, &self.merkle_branch);

        let mut header = Vec::with_capacity(80);
        header.extend_from_slice(&self.version.to_le_bytes());
        header.extend_from_slice(&self.previous_block_hash);
        header.extend_from_slice(&root);
        header.extend_from_slice(&self.time.to_le_bytes());
        header.extend_from_slice(&self.bits);
        header.extend_from_slice(&[0u8; 4]); // nonce, miner-filled
        Ok(hex::encode(header))
    }

    /// `compact_size(tx_count) ‖ coinbase_extended(extra_nonce)`, hex
    /// encoded, followed by the already-hex non-coinbase transaction data —
    /// the piece a miner's solved header is concatenated with to build the
    /// full block for submission.
    pub fn get_data(&self, extra_nonce: u32) -> Result<String, TemplateError> {
        let mut prefix = compact_size(self.tx_count as u64);
        prefix.extend_from_slice(&self.coinbase.data(extra_nonce)?);
        Ok(format!("{}{}", hex::encode(prefix), self.tx_data))
    }
}

fn reversed_32(hex_str: &str, field: &'static str) -> Result<[u8; 32], TemplateError> {
    let mut bytes = hex::decode(hex_str).map_err(|source| TemplateError::BadHex { field, source })?;
    bytes.reverse();
    bytes
        .try_into()
        .map_err(|_| TemplateError::BadHex {
            field,
            source: hex::FromHexError::InvalidStringLength,
        })
}

fn reversed_4(hex_str: &str, field: &'static str) -> Result<[u8; 4], TemplateError> {
    let mut bytes = hex::decode(hex_str).map_err(|source| TemplateError::BadHex { field, source })?;
    bytes.reverse();
    bytes
        .try_into()
        .map_err(|_| TemplateError::BadHex {
            field,
            source: hex::FromHexError::InvalidStringLength,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::TemplateTx;

    /// S1 — coinbase on a known template.
    #[test]
    fn s1_known_coinbase() {
        let payout_script = vec![0x76, 0xa9, 0x14]; // stand-in P2PKH prefix, not exercised
        let coinbase_aux: CoinbaseAux = vec![("cbstring".to_string(), b"/test/".to_vec())];
        let reward_split = RewardSplit::solo(payout_script);

        let coinbase = Coinbase::new(1, 5_000_000_000, &reward_split, false, None, coinbase_aux).unwrap();
        let data = coinbase.serialize(0, true).unwrap();

        let mut expected_prefix = Vec::new();
        expected_prefix.extend_from_slice(&1u32.to_le_bytes());
        expected_prefix.push(0x01); // in_count
        expected_prefix.extend_from_slice(&[0u8; 32]);
        expected_prefix.extend_from_slice(&[0xff; 4]);
        // scriptSig = push_int(1) push_int(0, no_opcode) push_bytes("/test/")
        let script_sig = Script::new()
            .push_int(1, true)
            .push_int(0, false)
            .push_bytes(b"/test/")
            .data;
        expected_prefix.push(script_sig.len() as u8);
        expected_prefix.extend_from_slice(&script_sig);
        expected_prefix.extend_from_slice(&[0xff; 4]);
        expected_prefix.push(0x01); // out_count
        expected_prefix.extend_from_slice(&5_000_000_000u64.to_le_bytes());

        assert_eq!(&data[..expected_prefix.len()], &expected_prefix[..]);
        assert_eq!(&data[data.len() - 4..], &[0u8; 4]); // locktime
    }

    /// S3 — donation split: 100_000_000 total, 2% donation, remainder to main.
    #[test]
    fn s3_donation_split() {
        let main_script = vec![0xAA];
        let donation_script = vec![0xBB];
        let split = RewardSplit::new(vec![
            Allotment {
                script: main_script.clone(),
                share: Share::Remainder,
            },
            Allotment {
                script: donation_script.clone(),
                share: Share::Fraction(0.02),
            },
        ])
        .unwrap();

        let payouts = split.compute(100_000_000);
        assert_eq!(payouts, vec![(98_000_000, main_script), (2_000_000, donation_script)]);
    }

    #[test]
    fn reward_split_requires_exactly_one_remainder() {
        let a = Allotment {
            script: vec![1],
            share: Share::Fraction(0.5),
        };
        let b = Allotment {
            script: vec![2],
            share: Share::Fraction(0.5),
        };
        assert!(RewardSplit::new(vec![a, b]).is_err());
    }

    #[test]
    fn distinct_extra_nonces_give_distinct_txids() {
        let split = RewardSplit::solo(vec![0xAA, 0xBB]);
        let coinbase = Coinbase::new(100, 5_000_000_000, &split, false, None, vec![]).unwrap();
        let txid1 = coinbase.txid(1).unwrap();
        let txid2 = coinbase.txid(2).unwrap();
        assert_ne!(txid1, txid2);
    }

    fn sample_template() -> GetBlockTemplateResult {
        GetBlockTemplateResult {
            version: 0x20000000,
            previousblockhash: "11".repeat(32),
            transactions: vec![],
            coinbasevalue: 5_000_000_000,
            height: 42,
            bits: "1d00ffff".to_string(),
            curtime: 1_600_000_000,
            target: "00".repeat(32),
            odokey: 12345,
            longpollid: "abc".to_string(),
            default_witness_commitment: None,
            coinbaseaux: Default::default(),
        }
    }

    #[test]
    fn invariant_header_embeds_merkle_root() {
        let split = RewardSplit::solo(vec![0xAA]);
        let tpl = sample_template();
        let block = BlockTemplate::from_rpc(&tpl, &split).unwrap();
        let header_hex = block.get_work(7).unwrap();
        assert_eq!(header_hex.len(), 160);

        let header_bytes = hex::decode(&header_hex).unwrap();
        let txid = block.coinbase.txid(7).unwrap();
        let expected_root = merkle_root(txid, &block.merkle_branch);
        assert_eq!(&header_bytes[36..68], &expected_root[..]);
    }
}
