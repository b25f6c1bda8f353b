//! Block-range transaction history scanning.
//!
//! The scan walks block bodies over JSON-RPC, so it is O(blocks × txs) and
//! meant for on-demand queries against a full node, not for indexing. Blocks
//! are loaded in batches of 100; a block or receipt that fails to load is
//! skipped rather than failing the scan.

use alloy_consensus::{BlockHeader as _, Transaction as _};
use alloy_network::primitives::{HeaderResponse, TransactionResponse};
use alloy_primitives::{Address, B256};
use alloy_provider::Provider as _;
use alloy_rpc_types_eth::{Block, BlockTransactions, Transaction, TransactionReceipt};
use futures_util::future::join_all;
use tracing::instrument;

use super::{EvmAdapter, erc20};
use crate::error::WalletError;
use crate::types::{
    HistoryRequest, HistoryResponse, HistorySortField, SortOrder, TokenMetadata,
    TokenTransferInfo, TransactionSummary, TxClassification,
};

/// Blocks fetched concurrently per round.
const SCAN_BATCH_SIZE: u64 = 100;

/// Default range span when the request leaves `start_block` at zero.
const DEFAULT_SCAN_SPAN: u64 = 1000;

impl EvmAdapter {
    /// Scans `[start_block, end_block]` for transactions sent by or to
    /// `request.address`, classifies them, and returns one sorted page.
    ///
    /// Only the initial latest-block query can fail; per-block and
    /// per-receipt failures are skipped.
    #[instrument(skip_all, err, fields(network = %self.descriptor().id, address = %request.address))]
    pub async fn get_transaction_history(
        &self,
        request: &HistoryRequest,
    ) -> Result<HistoryResponse, WalletError> {
        let latest = self.latest_block().await?;
        let end = if request.end_block == 0 || request.end_block > latest {
            latest
        } else {
            request.end_block
        };
        let start = if request.start_block == 0 {
            end.saturating_sub(DEFAULT_SCAN_SPAN)
        } else {
            request.start_block
        };

        let mut summaries = Vec::new();
        let mut cursor = start;
        while cursor <= end {
            let batch_end = cursor.saturating_add(SCAN_BATCH_SIZE - 1).min(end);
            let blocks = join_all((cursor..=batch_end).map(|number| self.load_block(number))).await;
            for block in blocks.into_iter().flatten() {
                self.collect_from_block(request.address, block, &mut summaries)
                    .await;
            }
            cursor = match batch_end.checked_add(1) {
                Some(next) => next,
                None => break,
            };
        }

        Ok(finalize(summaries, request))
    }

    async fn load_block(&self, number: u64) -> Option<Block> {
        match self
            .provider
            .get_block_by_number(number.into())
            .full()
            .await
        {
            Ok(block) => block,
            Err(error) => {
                tracing::debug!(number, %error, "skipping block that failed to load");
                None
            }
        }
    }

    async fn collect_from_block(
        &self,
        address: Address,
        block: Block,
        out: &mut Vec<TransactionSummary>,
    ) {
        let block_number = block.header.number();
        let block_hash = block.header.hash();
        let timestamp = block.header.timestamp();
        let BlockTransactions::Full(transactions) = &block.transactions else {
            return;
        };
        for tx in transactions {
            if tx.from() != address && tx.to() != Some(address) {
                continue;
            }
            let receipt = match self.provider.get_transaction_receipt(tx.tx_hash()).await {
                Ok(Some(receipt)) => receipt,
                _ => {
                    tracing::debug!(hash = %tx.tx_hash(), "skipping transaction without receipt");
                    continue;
                }
            };
            out.push(
                self.build_summary(tx, &receipt, block_number, block_hash, timestamp)
                    .await,
            );
        }
    }

    async fn build_summary(
        &self,
        tx: &Transaction,
        receipt: &TransactionReceipt,
        block_number: u64,
        block_hash: B256,
        timestamp: u64,
    ) -> TransactionSummary {
        let input = tx.input();
        let (classification, token) = if input.is_empty() {
            (TxClassification::Eth, None)
        } else if let Some((transfer_to, amount)) = erc20::decode_transfer_input(input) {
            let token_address = tx.to().unwrap_or_default();
            let metadata = self
                .get_erc20_metadata(token_address)
                .await
                .unwrap_or_else(|_| TokenMetadata {
                    name: "Unknown Token".to_string(),
                    symbol: "UNKNOWN".to_string(),
                    decimals: 18,
                });
            (
                TxClassification::Erc20,
                Some(TokenTransferInfo {
                    token_address,
                    name: metadata.name,
                    symbol: metadata.symbol,
                    decimals: metadata.decimals,
                    amount,
                    to_address: transfer_to,
                }),
            )
        } else {
            (TxClassification::Contract, None)
        };

        TransactionSummary {
            hash: tx.tx_hash(),
            from: tx.from(),
            to: tx.to(),
            value: tx.value(),
            gas_price: TransactionResponse::gas_price(tx).unwrap_or(receipt.effective_gas_price),
            gas_used: receipt.gas_used,
            gas_limit: tx.gas_limit(),
            nonce: tx.nonce(),
            block_number,
            block_hash,
            timestamp,
            status: receipt.status() as u8,
            classification,
            token,
        }
    }
}

/// Applies the type filter, sorts, and cuts one page.
fn finalize(summaries: Vec<TransactionSummary>, request: &HistoryRequest) -> HistoryResponse {
    let mut relevant: Vec<TransactionSummary> = summaries
        .into_iter()
        .filter(|summary| request.tx_type.matches(summary.classification))
        .collect();
    relevant.sort_by_key(|summary| match request.sort_by {
        HistorySortField::Timestamp => summary.timestamp,
        HistorySortField::BlockNumber => summary.block_number,
    });
    if request.sort_order == SortOrder::Desc {
        relevant.reverse();
    }

    let total = relevant.len() as u64;
    let limit = request.limit.clamp(1, 100);
    let page = request.page.max(1);
    let total_pages = total.div_ceil(limit);
    let transactions = relevant
        .into_iter()
        .skip(((page - 1) * limit) as usize)
        .take(limit as usize)
        .collect();
    HistoryResponse {
        transactions,
        total,
        page,
        limit,
        total_pages,
    }
}
