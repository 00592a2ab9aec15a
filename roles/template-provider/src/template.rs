//! Conversions between a cached candidate block and the Template
//! Distribution messages derived from it, plus the reconstruction of a
//! full block from a submitted solution.

use binary_sv2::{Seq064K, B016M, U256};
use bitcoin::{
    block::Version,
    consensus::{deserialize, serialize},
    hashes::{sha256d, Hash, HashEngine},
    Amount, Block, Target, Transaction,
};
use template_distribution_sv2::{
    NewTemplate, RequestTransactionDataSuccess, SetNewPrevHash, SubmitSolution,
};

use crate::error::Sv2ClientError;

/// Builds the NewTemplate message describing `block`.
pub fn new_template_message(
    block: &Block,
    template_id: u64,
    future_template: bool,
) -> Result<NewTemplate, Sv2ClientError> {
    let coinbase = coinbase_tx(block)?;
    let coinbase_input = coinbase
        .input
        .first()
        .ok_or(Sv2ClientError::ProtocolViolation("coinbase without input"))?;

    let oversize = |_| Sv2ClientError::ProtocolViolation("template does not fit message limits");

    let empty_outputs = empty_coinbase_outputs(coinbase);
    let mut serialized_outputs = Vec::new();
    for output in &empty_outputs {
        serialized_outputs.extend_from_slice(&serialize(output));
    }

    Ok(NewTemplate {
        template_id,
        future_template,
        version: block.header.version.to_consensus() as u32,
        coinbase_tx_version: coinbase.version.0 as u32,
        coinbase_prefix: coinbase_input
            .script_sig
            .as_bytes()
            .to_vec()
            .try_into()
            .map_err(oversize)?,
        coinbase_tx_input_sequence: coinbase_input.sequence.to_consensus_u32(),
        coinbase_tx_value_remaining: coinbase
            .output
            .iter()
            .map(|output| output.value.to_sat())
            .sum(),
        coinbase_tx_outputs_count: empty_outputs.len() as u32,
        coinbase_tx_outputs: serialized_outputs.try_into().map_err(oversize)?,
        coinbase_tx_locktime: coinbase.lock_time.to_consensus_u32(),
        merkle_path: merkle_path(block).try_into().map_err(oversize)?,
    })
}

/// Builds the SetNewPrevHash message referring to `template_id`.
///
/// The target field is the expansion of `n_bits`; the message carries both.
pub fn set_new_prev_hash_message(block: &Block, template_id: u64) -> SetNewPrevHash {
    let target = Target::from(block.header.bits);
    SetNewPrevHash {
        template_id,
        prev_hash: U256::from(block.header.prev_blockhash.to_byte_array()),
        header_timestamp: block.header.time,
        n_bits: block.header.bits.to_consensus(),
        target: U256::from(target.to_le_bytes()),
    }
}

/// Builds the RequestTransactionData.Success reply for a cached block: the
/// transaction list excluding the coinbase, with the coinbase's witness
/// reserve value as excess data.
pub fn transaction_data_success(
    block: &Block,
    template_id: u64,
) -> Result<RequestTransactionDataSuccess, Sv2ClientError> {
    let oversize = |_| Sv2ClientError::ProtocolViolation("transaction does not fit message limits");

    let mut transaction_list: Vec<B016M> = Vec::with_capacity(block.txdata.len().saturating_sub(1));
    for tx in block.txdata.iter().skip(1) {
        transaction_list.push(serialize(tx).try_into().map_err(oversize)?);
    }

    Ok(RequestTransactionDataSuccess {
        template_id,
        excess_data: witness_reserve_value(block)
            .unwrap_or_default()
            .try_into()
            .map_err(oversize)?,
        transaction_list: Seq064K::try_from(transaction_list).map_err(oversize)?,
    })
}

/// The first witness item of the coinbase input, committed to by the
/// witness commitment output. Absent on templates without segwit data.
pub fn witness_reserve_value(block: &Block) -> Option<Vec<u8>> {
    let coinbase = block.txdata.first()?;
    let input = coinbase.input.first()?;
    input.witness.nth(0).map(|item| item.to_vec())
}

/// Reconstitutes a full block from a cached template and a submitted
/// solution: the supplied coinbase replaces the placeholder, the header
/// takes the solution's version, timestamp and nonce, and the merkle root
/// is recomputed.
pub fn solution_block(cached: &Block, solution: &SubmitSolution) -> Result<Block, Sv2ClientError> {
    let coinbase: Transaction = deserialize(solution.coinbase_tx.as_slice())
        .map_err(|_| Sv2ClientError::ProtocolViolation("invalid solution coinbase"))?;

    let mut block = cached.clone();
    if block.txdata.is_empty() {
        block.txdata.push(coinbase);
    } else {
        block.txdata[0] = coinbase;
    }

    block.header.version = Version::from_consensus(solution.version as i32);
    block.header.time = solution.header_timestamp;
    block.header.nonce = solution.header_nonce;
    block.header.merkle_root = block
        .compute_merkle_root()
        .ok_or(Sv2ClientError::ProtocolViolation("empty solution block"))?;

    Ok(block)
}

fn coinbase_tx(block: &Block) -> Result<&Transaction, Sv2ClientError> {
    block
        .txdata
        .first()
        .ok_or(Sv2ClientError::ProtocolViolation("template without coinbase"))
}

// The zero-valued outputs of the placeholder coinbase, e.g. the witness
// commitment. The value-carrying placeholder output is replaced by the
// client and therefore not part of the template's fixed outputs.
fn empty_coinbase_outputs(coinbase: &Transaction) -> Vec<bitcoin::TxOut> {
    coinbase
        .output
        .iter()
        .filter(|output| output.value == Amount::from_sat(0))
        .cloned()
        .collect()
}

/// Sibling hashes of the coinbase's merkle branch, ordered from deepest.
pub fn merkle_path(block: &Block) -> Vec<U256> {
    let tx_hashes: Vec<sha256d::Hash> = block
        .txdata
        .iter()
        .map(|tx| tx.compute_txid().to_raw_hash())
        .collect();

    // Only the coinbase: the path is empty.
    if tx_hashes.len() <= 1 {
        return Vec::new();
    }

    let mut path = Vec::new();
    let mut current_level = tx_hashes;
    let mut target_index = 0;

    while current_level.len() > 1 {
        let sibling_index = if target_index % 2 == 0 {
            target_index + 1
        } else {
            target_index - 1
        };
        // With an odd node count the last hash is paired with itself.
        let sibling = if sibling_index < current_level.len() {
            current_level[sibling_index]
        } else {
            current_level[target_index]
        };
        path.push(U256::from(*sibling.as_byte_array()));

        let mut next_level = Vec::with_capacity(current_level.len().div_ceil(2));
        for pair in current_level.chunks(2) {
            let left = pair[0];
            let right = *pair.last().expect("chunk is never empty");
            let mut engine = sha256d::Hash::engine();
            engine.input(left.as_byte_array());
            engine.input(right.as_byte_array());
            next_level.push(sha256d::Hash::from_engine(engine));
        }

        current_level = next_level;
        target_index /= 2;
    }

    path
}

#[cfg(test)]
mod test {
    use super::*;
    use bitcoin::{
        absolute::LockTime, block::Header, hashes::Hash, transaction, BlockHash, CompactTarget,
        OutPoint, ScriptBuf, Sequence, TxIn, TxMerkleNode, TxOut, Witness,
    };

    fn coinbase(witness_reserve: Option<[u8; 32]>) -> Transaction {
        let witness = match witness_reserve {
            Some(reserve) => Witness::from_slice(&[reserve.to_vec()]),
            None => Witness::new(),
        };
        Transaction {
            version: transaction::Version(2),
            lock_time: LockTime::from_consensus(0),
            input: vec![TxIn {
                previous_output: OutPoint::null(),
                script_sig: ScriptBuf::from_bytes(vec![0x03, 0x2a, 0x01, 0x00]),
                sequence: Sequence::MAX,
                witness,
            }],
            output: vec![
                TxOut {
                    value: Amount::from_sat(625_000_000),
                    script_pubkey: ScriptBuf::new(),
                },
                TxOut {
                    value: Amount::from_sat(0),
                    script_pubkey: ScriptBuf::from_bytes(vec![0x6a, 0x01, 0xaa]),
                },
            ],
        }
    }

    fn spend(lock: u32) -> Transaction {
        Transaction {
            version: transaction::Version(2),
            lock_time: LockTime::from_consensus(lock),
            input: vec![TxIn {
                previous_output: OutPoint::null(),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            output: vec![TxOut {
                value: Amount::from_sat(50_000),
                script_pubkey: ScriptBuf::new(),
            }],
        }
    }

    fn block(txdata: Vec<Transaction>) -> Block {
        let mut block = Block {
            header: Header {
                version: bitcoin::block::Version::from_consensus(0x2000_0000),
                prev_blockhash: BlockHash::from_byte_array([0x11; 32]),
                merkle_root: TxMerkleNode::from_byte_array([0; 32]),
                time: 1_700_000_000,
                bits: CompactTarget::from_consensus(0x207f_ffff),
                nonce: 0,
            },
            txdata,
        };
        if let Some(root) = block.compute_merkle_root() {
            block.header.merkle_root = root;
        }
        block
    }

    #[test]
    fn merkle_path_verifies_against_merkle_root() {
        for tx_count in [1usize, 2, 3, 5, 8] {
            let txs: Vec<Transaction> = std::iter::once(coinbase(None))
                .chain((0..tx_count as u32 - 1).map(spend))
                .collect();
            let block = block(txs);
            let path = merkle_path(&block);

            // Fold the coinbase txid up the path; the result must be the
            // block's merkle root.
            let mut acc = block.txdata[0].compute_txid().to_raw_hash();
            for sibling in &path {
                let mut engine = sha256d::Hash::engine();
                engine.input(acc.as_byte_array());
                engine.input(sibling.as_ref());
                acc = sha256d::Hash::from_engine(engine);
            }
            assert_eq!(
                acc.to_byte_array(),
                block.header.merkle_root.to_byte_array(),
                "tx_count={}",
                tx_count
            );
        }
    }

    #[test]
    fn new_template_reflects_coinbase() {
        let block = block(vec![coinbase(Some([0; 32])), spend(0)]);
        let msg = new_template_message(&block, 5, true).unwrap();
        assert_eq!(msg.template_id, 5);
        assert!(msg.future_template);
        assert_eq!(msg.coinbase_tx_version, 2);
        assert_eq!(msg.coinbase_prefix.as_slice(), &[0x03, 0x2a, 0x01, 0x00]);
        assert_eq!(msg.coinbase_tx_value_remaining, 625_000_000);
        // Only the zero-value commitment output ships with the template.
        assert_eq!(msg.coinbase_tx_outputs_count, 1);
        assert_eq!(msg.merkle_path.len(), 1);
    }

    #[test]
    fn set_new_prev_hash_matches_header() {
        let block = block(vec![coinbase(None)]);
        let msg = set_new_prev_hash_message(&block, 9);
        assert_eq!(msg.template_id, 9);
        assert_eq!(msg.prev_hash.to_bytes(), [0x11; 32]);
        assert_eq!(msg.header_timestamp, 1_700_000_000);
        assert_eq!(msg.n_bits, 0x207f_ffff);
    }

    #[test]
    fn transaction_data_excludes_coinbase() {
        let block = block(vec![coinbase(Some([0xab; 32])), spend(1), spend(2)]);
        let msg = transaction_data_success(&block, 3).unwrap();
        assert_eq!(msg.transaction_list.len(), 2);
        assert_eq!(msg.excess_data.as_slice(), &[0xab; 32]);
        let first: Transaction = deserialize(msg.transaction_list.as_slice()[0].as_slice()).unwrap();
        assert_eq!(first, block.txdata[1]);
    }

    #[test]
    fn solution_block_recomputes_merkle_root() {
        let template = block(vec![coinbase(None), spend(1)]);
        let new_coinbase = coinbase(Some([0x77; 32]));
        let solution = SubmitSolution {
            template_id: 1,
            version: 0x2000_0001,
            header_timestamp: 1_700_000_123,
            header_nonce: 42,
            coinbase_tx: serialize(&new_coinbase).try_into().unwrap(),
        };
        let solved = solution_block(&template, &solution).unwrap();
        assert_eq!(solved.header.nonce, 42);
        assert_eq!(solved.header.time, 1_700_000_123);
        assert_eq!(solved.header.version.to_consensus(), 0x2000_0001);
        assert_eq!(solved.txdata[0], new_coinbase);
        assert_eq!(
            solved.header.merkle_root,
            solved.compute_merkle_root().unwrap()
        );
        assert_ne!(solved.header.merkle_root, template.header.merkle_root);
    }

    #[test]
    fn malformed_solution_coinbase_is_rejected() {
        let template = block(vec![coinbase(None)]);
        let solution = SubmitSolution {
            template_id: 1,
            version: 0,
            header_timestamp: 0,
            header_nonce: 0,
            coinbase_tx: vec![0xff; 10].try_into().unwrap(),
        };
        assert!(solution_block(&template, &solution).is_err());
    }
}
