use std::collections::{HashMap, VecDeque};

use alloy_primitives::{keccak256, Address, Bytes, TxHash, TxKind};
use alloy_rpc_types_eth::{TransactionInput, TransactionRequest};
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    Artifact, BlockInfo, CallFunctionInteraction, ChainDispatcher, DeployContractInteraction,
    DispatchError, DispatchResult, EvmValue, NetworkTransaction, ReadEventArgumentInteraction,
    StaticCallInteraction, TransactionReceipt,
};

/// How the mock chain treats the next sent transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SendBehavior {
    /// The transaction is accepted, then forgotten by the node.
    Drop,
    /// The transaction is mined but reverts.
    Revert,
    /// The node refuses the transaction with revert data.
    Reject {
        /// The error reported by the node.
        message: String,
        /// The revert data.
        return_data: Option<Bytes>,
    },
    /// The node cannot be reached.
    RpcFailure(String),
}

#[derive(Debug)]
struct MockTransaction {
    request: TransactionRequest,
    from: Address,
    nonce: u64,
    block_number: Option<u64>,
    reverts: bool,
}

#[derive(Debug)]
struct MockChain {
    auto_mine: bool,
    block_number: u64,
    pending_counts: HashMap<Address, u64>,
    latest_counts: HashMap<Address, u64>,
    transactions: HashMap<TxHash, MockTransaction>,
    receipts: HashMap<TxHash, TransactionReceipt>,
    sent: Vec<TransactionRequest>,
    send_behaviors: VecDeque<SendBehavior>,
    static_calls: HashMap<(Address, String), DispatchResult<Bytes>>,
    event_arguments: HashMap<(TxHash, String), EvmValue>,
}

/// An in-memory chain.
///
/// Transactions are mined immediately, one per block, unless auto-mining is disabled. Nonces are
/// allocated from the pending transaction count, so a dropped transaction frees its nonce.
#[derive(Debug)]
pub struct MockChainDispatcher {
    chain: Mutex<MockChain>,
}

impl Default for MockChainDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChainDispatcher {
    /// Creates an auto-mining chain at block zero.
    pub fn new() -> Self {
        Self {
            chain: Mutex::new(MockChain {
                auto_mine: true,
                block_number: 0,
                pending_counts: HashMap::new(),
                latest_counts: HashMap::new(),
                transactions: HashMap::new(),
                receipts: HashMap::new(),
                sent: Vec::new(),
                send_behaviors: VecDeque::new(),
                static_calls: HashMap::new(),
                event_arguments: HashMap::new(),
            }),
        }
    }

    /// Enables or disables mining on send.
    pub fn set_auto_mine(&self, auto_mine: bool) {
        self.chain.lock().auto_mine = auto_mine;
    }

    /// Enables or disables mining on send.
    pub fn auto_mine(self, auto_mine: bool) -> Self {
        self.set_auto_mine(auto_mine);
        self
    }

    /// Queues a behavior for the next sent transaction. Later sends behave normally.
    pub fn push_send_behavior(&self, behavior: SendBehavior) {
        self.chain.lock().send_behaviors.push_back(behavior);
    }

    /// Sets the return data, or the error, of a read-only call.
    pub fn set_static_call_result(
        &self,
        contract_address: Address,
        function_name: &str,
        result: DispatchResult<Bytes>,
    ) {
        let key = (contract_address, function_name.to_string());
        self.chain.lock().static_calls.insert(key, result);
    }

    /// Sets the value of an event argument read from `tx_hash`.
    pub fn set_event_argument(&self, tx_hash: TxHash, event_name: &str, value: EvmValue) {
        self.chain.lock().event_arguments.insert((tx_hash, event_name.to_string()), value);
    }

    /// Pretends that `address` sent `count` transactions.
    pub fn set_pending_transaction_count(&self, address: Address, count: u64) {
        self.chain.lock().pending_counts.insert(address, count);
    }

    /// Mines every pending transaction, each in its own block.
    pub fn mine_pending(&self) {
        let mut chain = self.chain.lock();
        let mut pending: Vec<_> = chain
            .transactions
            .iter()
            .filter(|(_, tx)| tx.block_number.is_none())
            .map(|(hash, tx)| (tx.nonce, *hash))
            .collect();
        pending.sort();
        for (_, hash) in pending {
            chain.mine(hash);
        }
    }

    /// Adds empty blocks.
    pub fn advance_blocks(&self, blocks: u64) {
        self.chain.lock().block_number += blocks;
    }

    /// Every transaction sent so far, dropped ones included.
    pub fn sent_transactions(&self) -> Vec<TransactionRequest> {
        self.chain.lock().sent.clone()
    }

    /// The receipt of a mined transaction.
    pub fn receipt(&self, tx_hash: TxHash) -> Option<TransactionReceipt> {
        self.chain.lock().receipts.get(&tx_hash).copied()
    }
}

impl MockChain {
    fn mine(&mut self, hash: TxHash) {
        self.block_number += 1;
        let block_number = self.block_number;
        let Some(tx) = self.transactions.get_mut(&hash) else { return };
        tx.block_number = Some(block_number);
        *self.latest_counts.entry(tx.from).or_default() += 1;

        let contract_address = match tx.request.to {
            Some(TxKind::Create) | None if !tx.reverts => Some(tx.from.create(tx.nonce)),
            _ => None,
        };
        let receipt = TransactionReceipt {
            tx_hash: hash,
            block_number,
            status: !tx.reverts,
            contract_address,
        };
        self.receipts.insert(hash, receipt);
    }
}

#[async_trait]
impl ChainDispatcher for MockChainDispatcher {
    async fn get_pending_transaction_count(&self, address: Address) -> DispatchResult<u64> {
        Ok(self.chain.lock().pending_counts.get(&address).copied().unwrap_or_default())
    }

    async fn get_latest_transaction_count(&self, address: Address) -> DispatchResult<u64> {
        Ok(self.chain.lock().latest_counts.get(&address).copied().unwrap_or_default())
    }

    async fn get_current_block(&self) -> DispatchResult<BlockInfo> {
        let number = self.chain.lock().block_number;
        Ok(BlockInfo { number, hash: keccak256(number.to_be_bytes()) })
    }

    async fn allocate_next_nonce_for_account(&self, address: Address) -> DispatchResult<u64> {
        self.get_pending_transaction_count(address).await
    }

    async fn construct_deploy_transaction(
        &self,
        artifact: &Artifact,
        interaction: &DeployContractInteraction,
        nonce: u64,
    ) -> DispatchResult<TransactionRequest> {
        Ok(TransactionRequest {
            from: Some(interaction.from),
            value: Some(interaction.value),
            nonce: Some(nonce),
            input: TransactionInput::new(artifact.bytecode.clone()),
            ..Default::default()
        })
    }

    async fn construct_call_transaction(
        &self,
        artifact: &Artifact,
        interaction: &CallFunctionInteraction,
        nonce: u64,
    ) -> DispatchResult<TransactionRequest> {
        let function = artifact
            .abi
            .functions()
            .find(|function| {
                function.name == interaction.function_name ||
                    function.signature() == interaction.function_name
            })
            .ok_or_else(|| {
                DispatchError::Rpc(format!("no function {} in the ABI", interaction.function_name))
            })?;
        Ok(TransactionRequest {
            from: Some(interaction.from),
            to: Some(TxKind::Call(interaction.contract_address)),
            value: Some(interaction.value),
            nonce: Some(nonce),
            input: TransactionInput::new(Bytes::copy_from_slice(function.selector().as_slice())),
            ..Default::default()
        })
    }

    async fn send_tx(&self, tx: &TransactionRequest) -> DispatchResult<TxHash> {
        let mut chain = self.chain.lock();
        let from = tx.from.unwrap_or_default();
        let nonce = tx.nonce.unwrap_or_default();

        let behavior = chain.send_behaviors.pop_front();
        match &behavior {
            Some(SendBehavior::RpcFailure(message)) => {
                return Err(DispatchError::Rpc(message.clone()))
            }
            Some(SendBehavior::Reject { message, return_data }) => {
                return Err(DispatchError::Reverted {
                    message: message.clone(),
                    return_data: return_data.clone(),
                })
            }
            _ => {}
        }

        chain.sent.push(tx.clone());
        let mut preimage = from.to_vec();
        preimage.extend_from_slice(&nonce.to_be_bytes());
        preimage.extend_from_slice(&(chain.sent.len() as u64).to_be_bytes());
        let hash = keccak256(preimage);

        if behavior == Some(SendBehavior::Drop) {
            return Ok(hash);
        }

        *chain.pending_counts.entry(from).or_default() += 1;
        chain.transactions.insert(
            hash,
            MockTransaction {
                request: tx.clone(),
                from,
                nonce,
                block_number: None,
                reverts: behavior == Some(SendBehavior::Revert),
            },
        );
        if chain.auto_mine {
            chain.mine(hash);
        }
        Ok(hash)
    }

    async fn static_call_query(
        &self,
        _artifact: &Artifact,
        interaction: &StaticCallInteraction,
    ) -> DispatchResult<Bytes> {
        self.chain
            .lock()
            .static_calls
            .get(&(interaction.contract_address, interaction.function_name.clone()))
            .cloned()
            .unwrap_or_else(|| {
                Err(DispatchError::Rpc(format!(
                    "no result for {} on {}",
                    interaction.function_name, interaction.contract_address
                )))
            })
    }

    async fn get_transaction(&self, tx_hash: TxHash) -> DispatchResult<Option<NetworkTransaction>> {
        Ok(self.chain.lock().transactions.get(&tx_hash).map(|tx| NetworkTransaction {
            hash: tx_hash,
            from: tx.from,
            nonce: tx.nonce,
            block_number: tx.block_number,
        }))
    }

    async fn get_transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> DispatchResult<Option<TransactionReceipt>> {
        Ok(self.chain.lock().receipts.get(&tx_hash).copied())
    }

    async fn get_event_argument(
        &self,
        _artifact: &Artifact,
        interaction: &ReadEventArgumentInteraction,
    ) -> DispatchResult<EvmValue> {
        self.chain
            .lock()
            .event_arguments
            .get(&(interaction.tx_to_read_from, interaction.event_name.clone()))
            .cloned()
            .ok_or_else(|| {
                DispatchError::Rpc(format!(
                    "no event {} in transaction {}",
                    interaction.event_name, interaction.tx_to_read_from
                ))
            })
    }
}
