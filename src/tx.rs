//! Transaction assembly, signing, and dispatch
//!
//! [`TxBuilder`] assembles legacy (type 0) and EIP-1559 (type 2)
//! transactions, computes their signing digests, and emits the raw wire
//! bytes once a signature is attached. [`TxDispatcher`] is the one
//! submission path shared by the wallet facade and every bridge adapter:
//! estimate, reserve a nonce, sign, broadcast, await the receipt, and report
//! the outcome back to the nonce ledger.

use std::sync::Arc;
use std::time::Duration;

use primitive_types::U256;

use crate::codec::rlp::{self, RlpItem};
use crate::error::WalletError;
use crate::gas::{FeeEstimate, GasOracle};
use crate::hash::keccak256;
use crate::nonce::NonceManager;
use crate::rpc::{CallRequest, EthRpc, TransactionReceipt};
use crate::signer::{Account, Signature};
use crate::types::{Address, Hash};

/// Minimum gas any transaction needs (a plain value transfer)
pub const MIN_GAS_LIMIT: u64 = 21_000;

/// EIP-2930 access list entry
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AccessListItem {
    pub address: Address,
    pub storage_keys: Vec<Hash>,
}

// ============================================================================
// Builder
// ============================================================================

/// Fluent transaction assembler
///
/// Setting `gas_price` selects a legacy transaction; setting the two
/// EIP-1559 fee fields selects type 2. `build` rejects incomplete or
/// contradictory combinations.
#[derive(Debug, Clone, Default)]
pub struct TxBuilder {
    chain_id: Option<u64>,
    nonce: Option<u64>,
    to: Option<Address>,
    value: U256,
    data: Vec<u8>,
    gas_limit: Option<u64>,
    gas_price: Option<U256>,
    max_fee_per_gas: Option<U256>,
    max_priority_fee_per_gas: Option<U256>,
    access_list: Vec<AccessListItem>,
}

impl TxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    #[must_use]
    pub fn nonce(mut self, nonce: u64) -> Self {
        self.nonce = Some(nonce);
        self
    }

    /// Recipient; leave unset for contract creation
    #[must_use]
    pub fn to(mut self, to: Address) -> Self {
        self.to = Some(to);
        self
    }

    #[must_use]
    pub fn value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    #[must_use]
    pub fn data(mut self, data: Vec<u8>) -> Self {
        self.data = data;
        self
    }

    #[must_use]
    pub fn gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }

    #[must_use]
    pub fn gas_price(mut self, gas_price: U256) -> Self {
        self.gas_price = Some(gas_price);
        self
    }

    #[must_use]
    pub fn max_fee_per_gas(mut self, max_fee: U256) -> Self {
        self.max_fee_per_gas = Some(max_fee);
        self
    }

    #[must_use]
    pub fn max_priority_fee_per_gas(mut self, priority: U256) -> Self {
        self.max_priority_fee_per_gas = Some(priority);
        self
    }

    #[must_use]
    pub fn access_list(mut self, access_list: Vec<AccessListItem>) -> Self {
        self.access_list = access_list;
        self
    }

    /// Apply a fee estimate, selecting the transaction type it implies
    #[must_use]
    pub fn fees(self, estimate: &FeeEstimate) -> Self {
        match estimate {
            FeeEstimate::Eip1559 {
                gas_limit,
                max_fee_per_gas,
                max_priority_fee_per_gas,
                ..
            } => self
                .gas_limit(*gas_limit)
                .max_fee_per_gas(*max_fee_per_gas)
                .max_priority_fee_per_gas(*max_priority_fee_per_gas),
            FeeEstimate::Legacy {
                gas_limit,
                gas_price,
                ..
            } => self.gas_limit(*gas_limit).gas_price(*gas_price),
        }
    }

    /// Validate and freeze into an unsigned transaction
    pub fn build(self) -> Result<UnsignedTx, WalletError> {
        let chain_id = self
            .chain_id
            .ok_or(WalletError::IncompleteTransaction { field: "chain_id" })?;
        let nonce = self
            .nonce
            .ok_or(WalletError::IncompleteTransaction { field: "nonce" })?;
        let gas_limit = self
            .gas_limit
            .ok_or(WalletError::IncompleteTransaction { field: "gas_limit" })?;

        if gas_limit < MIN_GAS_LIMIT {
            return Err(WalletError::InvalidTransaction {
                reason: format!("gas limit {gas_limit} below the {MIN_GAS_LIMIT} floor"),
            });
        }

        match (
            self.gas_price,
            self.max_fee_per_gas,
            self.max_priority_fee_per_gas,
        ) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
                Err(WalletError::InvalidTransaction {
                    reason: "legacy gas price and EIP-1559 fees are mutually exclusive"
                        .to_string(),
                })
            }
            (Some(gas_price), None, None) => Ok(UnsignedTx::Legacy(LegacyTx {
                chain_id,
                nonce,
                gas_price,
                gas_limit,
                to: self.to,
                value: self.value,
                data: self.data,
            })),
            (None, Some(max_fee), Some(priority)) => {
                if priority > max_fee {
                    return Err(WalletError::InvalidTransaction {
                        reason: format!(
                            "max priority fee {priority} exceeds max fee {max_fee}"
                        ),
                    });
                }
                Ok(UnsignedTx::Eip1559(Eip1559Tx {
                    chain_id,
                    nonce,
                    max_priority_fee_per_gas: priority,
                    max_fee_per_gas: max_fee,
                    gas_limit,
                    to: self.to,
                    value: self.value,
                    data: self.data,
                    access_list: self.access_list,
                }))
            }
            (None, Some(_), None) => Err(WalletError::IncompleteTransaction {
                field: "max_priority_fee_per_gas",
            }),
            (None, None, Some(_)) => Err(WalletError::IncompleteTransaction {
                field: "max_fee_per_gas",
            }),
            (None, None, None) => Err(WalletError::IncompleteTransaction {
                field: "gas_price or max_fee_per_gas",
            }),
        }
    }
}

// ============================================================================
// Unsigned transactions
// ============================================================================

/// Legacy (type 0) transaction, EIP-155 replay protected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyTx {
    pub chain_id: u64,
    pub nonce: u64,
    pub gas_price: U256,
    pub gas_limit: u64,
    pub to: Option<Address>,
    pub value: U256,
    pub data: Vec<u8>,
}

/// EIP-1559 (type 2) transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eip1559Tx {
    pub chain_id: u64,
    pub nonce: u64,
    pub max_priority_fee_per_gas: U256,
    pub max_fee_per_gas: U256,
    pub gas_limit: u64,
    pub to: Option<Address>,
    pub value: U256,
    pub data: Vec<u8>,
    pub access_list: Vec<AccessListItem>,
}

/// A built transaction awaiting its signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsignedTx {
    Legacy(LegacyTx),
    Eip1559(Eip1559Tx),
}

fn access_list_item(item: &AccessListItem) -> RlpItem {
    RlpItem::List(vec![
        RlpItem::Bytes(item.address.0.to_vec()),
        RlpItem::List(
            item.storage_keys
                .iter()
                .map(|k| RlpItem::Bytes(k.0.to_vec()))
                .collect(),
        ),
    ])
}

impl UnsignedTx {
    pub fn tx_type(&self) -> u8 {
        match self {
            UnsignedTx::Legacy(_) => 0,
            UnsignedTx::Eip1559(_) => 2,
        }
    }

    pub fn nonce(&self) -> u64 {
        match self {
            UnsignedTx::Legacy(tx) => tx.nonce,
            UnsignedTx::Eip1559(tx) => tx.nonce,
        }
    }

    /// The 32-byte digest the sender signs
    pub fn signing_digest(&self) -> [u8; 32] {
        match self {
            UnsignedTx::Legacy(tx) => {
                // EIP-155: the chain id rides in the v slot with empty r/s
                let payload = rlp::encode_list(&[
                    RlpItem::u64(tx.nonce),
                    RlpItem::uint(tx.gas_price),
                    RlpItem::u64(tx.gas_limit),
                    RlpItem::address(tx.to),
                    RlpItem::uint(tx.value),
                    RlpItem::bytes(&tx.data),
                    RlpItem::u64(tx.chain_id),
                    RlpItem::u64(0),
                    RlpItem::u64(0),
                ]);
                keccak256(&payload)
            }
            UnsignedTx::Eip1559(tx) => {
                let payload = rlp::encode_list(&tx.fields_without_signature());
                let mut preimage = Vec::with_capacity(payload.len() + 1);
                preimage.push(0x02);
                preimage.extend_from_slice(&payload);
                keccak256(&preimage)
            }
        }
    }

    /// Attach the signature and emit raw wire bytes
    pub fn into_signed(self, signature: &Signature) -> Vec<u8> {
        match self {
            UnsignedTx::Legacy(tx) => {
                let v = signature.v_legacy(Some(tx.chain_id));
                rlp::encode_list(&[
                    RlpItem::u64(tx.nonce),
                    RlpItem::uint(tx.gas_price),
                    RlpItem::u64(tx.gas_limit),
                    RlpItem::address(tx.to),
                    RlpItem::uint(tx.value),
                    RlpItem::bytes(&tx.data),
                    RlpItem::u64(v),
                    RlpItem::uint(U256::from_big_endian(&signature.r)),
                    RlpItem::uint(U256::from_big_endian(&signature.s)),
                ])
            }
            UnsignedTx::Eip1559(tx) => {
                let mut fields = tx.fields_without_signature();
                fields.push(RlpItem::u64(signature.y_parity as u64));
                fields.push(RlpItem::uint(U256::from_big_endian(&signature.r)));
                fields.push(RlpItem::uint(U256::from_big_endian(&signature.s)));
                let payload = rlp::encode_list(&fields);
                let mut raw = Vec::with_capacity(payload.len() + 1);
                raw.push(0x02);
                raw.extend_from_slice(&payload);
                raw
            }
        }
    }
}

impl Eip1559Tx {
    fn fields_without_signature(&self) -> Vec<RlpItem> {
        vec![
            RlpItem::u64(self.chain_id),
            RlpItem::u64(self.nonce),
            RlpItem::uint(self.max_priority_fee_per_gas),
            RlpItem::uint(self.max_fee_per_gas),
            RlpItem::u64(self.gas_limit),
            RlpItem::address(self.to),
            RlpItem::uint(self.value),
            RlpItem::bytes(&self.data),
            RlpItem::List(self.access_list.iter().map(access_list_item).collect()),
        ]
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// The single submit-and-confirm path for every transaction in the process
///
/// Owns the fee oracle; shares the RPC client, signing account, and nonce
/// manager with its construction site. Bridge adapters receive a clone of
/// the `Arc` so all of their approvals and deposits flow through the same
/// nonce ledger.
pub struct TxDispatcher {
    rpc: Arc<dyn EthRpc>,
    account: Arc<Account>,
    nonce: Arc<NonceManager>,
    oracle: GasOracle,
    receipt_timeout: Duration,
    confirmations: u64,
}

impl TxDispatcher {
    pub fn new(rpc: Arc<dyn EthRpc>, account: Arc<Account>, nonce: Arc<NonceManager>) -> Self {
        TxDispatcher {
            oracle: GasOracle::new(rpc.clone()),
            rpc,
            account,
            nonce,
            receipt_timeout: Duration::from_secs(120),
            confirmations: 1,
        }
    }

    #[must_use]
    pub fn with_receipt_timeout(mut self, timeout: Duration) -> Self {
        self.receipt_timeout = timeout;
        self
    }

    pub fn sender(&self) -> Address {
        self.account.address()
    }

    pub fn rpc(&self) -> &Arc<dyn EthRpc> {
        &self.rpc
    }

    pub fn nonce_manager(&self) -> &Arc<NonceManager> {
        &self.nonce
    }

    pub fn oracle(&self) -> &GasOracle {
        &self.oracle
    }

    /// Estimate fees, then submit a call and await its receipt
    pub async fn send(
        &self,
        to: Option<Address>,
        value: U256,
        data: Vec<u8>,
    ) -> Result<(Hash, TransactionReceipt), WalletError> {
        let mut request = CallRequest {
            from: Some(self.sender()),
            to,
            value: Some(value),
            data: Some(crate::types::Bytes(data.clone())),
            ..Default::default()
        };
        // Some nodes reject estimation with an explicit zero value
        if value.is_zero() {
            request.value = None;
        }
        let fees = self.oracle.estimate(&request).await?;
        self.send_with_fees(to, value, data, &fees).await
    }

    /// Submit with pre-computed fees and await the receipt
    pub async fn send_with_fees(
        &self,
        to: Option<Address>,
        value: U256,
        data: Vec<u8>,
        fees: &FeeEstimate,
    ) -> Result<(Hash, TransactionReceipt), WalletError> {
        let chain_id = self.rpc.chain_id().await?;
        let nonce = self.nonce.next_nonce().await?;

        let mut builder = TxBuilder::new()
            .chain_id(chain_id)
            .nonce(nonce)
            .value(value)
            .data(data)
            .fees(fees);
        if let Some(to) = to {
            builder = builder.to(to);
        }
        let unsigned = builder.build()?;

        let digest = unsigned.signing_digest();
        let signature = self.account.sign_digest(&digest)?;
        let raw = unsigned.into_signed(&signature);

        let hash = match self.rpc.send_raw_transaction(&raw).await {
            Ok(hash) => hash,
            Err(err) => {
                self.nonce.on_failed().await;
                return Err(err);
            }
        };

        tracing::info!(
            tx_hash = %hash,
            nonce,
            chain_id,
            "transaction submitted, waiting for confirmation"
        );

        let receipt = self
            .rpc
            .wait_for_transaction(hash, self.confirmations, self.receipt_timeout)
            .await?;

        // Mined transactions consume their nonce whether or not they
        // succeeded; only submission failures roll the reservation back.
        self.nonce.on_confirmed().await;

        if !receipt.succeeded() {
            tracing::warn!(tx_hash = %hash, "transaction reverted on-chain");
            return Err(WalletError::TransactionReverted { hash, reason: None });
        }

        tracing::info!(
            tx_hash = %hash,
            block = receipt.block_number.unwrap_or_default(),
            gas_used = receipt.gas_used,
            "transaction confirmed"
        );

        Ok((hash, receipt))
    }
}
