use crate::domain::errors::LedgerError;
use crate::domain::models::{
    ParsedLedgerTransaction, RawInstruction, SignatureRecord, TokenBalance,
};
use solana_client::client_error::ClientError;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_client::GetConfirmedSignaturesForAddress2Config;
use solana_client::rpc_config::RpcTransactionConfig;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_transaction_status::option_serializer::OptionSerializer;
use solana_transaction_status::{
    EncodedConfirmedTransactionWithStatusMeta, EncodedTransaction, UiInstruction, UiMessage,
    UiParsedInstruction, UiTransactionEncoding, UiTransactionTokenBalance,
};
use std::str::FromStr;
use std::sync::Arc;

use super::ledger_client::LedgerClient;

/// Production [`LedgerClient`] backed by a Solana JSON-RPC endpoint at
/// confirmed commitment.
#[derive(Clone)]
pub struct SolanaLedger {
    rpc_client: Arc<RpcClient>,
}

impl SolanaLedger {
    pub fn from_url(rpc_url: &str) -> Self {
        Self {
            rpc_client: Arc::new(RpcClient::new_with_commitment(
                rpc_url.to_string(),
                CommitmentConfig::confirmed(),
            )),
        }
    }
}

/// The RPC client surfaces rate limiting as an HTTP 429; everything else on
/// the transport is opaque to this core.
fn classify_client_error(error: ClientError) -> LedgerError {
    let message = error.to_string();
    if message.contains("429")
        || message.contains("Too Many Requests")
        || message.to_lowercase().contains("rate limit")
    {
        LedgerError::RateLimited(message)
    } else {
        LedgerError::Transport(message)
    }
}

fn convert_instruction(instruction: &UiInstruction) -> Option<RawInstruction> {
    match instruction {
        UiInstruction::Parsed(UiParsedInstruction::PartiallyDecoded(ix)) => {
            let data = match bs58::decode(&ix.data).into_vec() {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(program_id = %ix.program_id, "undecodable instruction payload: {e}");
                    Vec::new()
                }
            };
            Some(RawInstruction {
                program_id: ix.program_id.clone(),
                data,
            })
        }
        // Natively parsed programs (system, token) keep their program id;
        // their payload is only needed for program detection, not
        // classification.
        UiInstruction::Parsed(UiParsedInstruction::Parsed(ix)) => Some(RawInstruction {
            program_id: ix.program_id.clone(),
            data: Vec::new(),
        }),
        UiInstruction::Compiled(_) => None,
    }
}

fn convert_token_balance(balance: &UiTransactionTokenBalance) -> TokenBalance {
    let owner = match &balance.owner {
        OptionSerializer::Some(owner) => Some(owner.clone()),
        _ => None,
    };
    TokenBalance {
        account_index: balance.account_index,
        mint: balance.mint.clone(),
        owner,
        raw_amount: balance.ui_token_amount.amount.clone(),
        decimals: Some(balance.ui_token_amount.decimals),
    }
}

fn convert_transaction(
    tx: EncodedConfirmedTransactionWithStatusMeta,
) -> ParsedLedgerTransaction {
    let meta = tx.transaction.meta.as_ref();

    let instructions = match &tx.transaction.transaction {
        EncodedTransaction::Json(ui_tx) => match &ui_tx.message {
            UiMessage::Parsed(message) => message
                .instructions
                .iter()
                .filter_map(convert_instruction)
                .collect(),
            UiMessage::Raw(_) => Vec::new(),
        },
        _ => Vec::new(),
    };

    let token_balances = |serialized: Option<&OptionSerializer<Vec<UiTransactionTokenBalance>>>| {
        match serialized {
            Some(OptionSerializer::Some(balances)) => {
                balances.iter().map(convert_token_balance).collect()
            }
            _ => Vec::new(),
        }
    };

    ParsedLedgerTransaction {
        slot: tx.slot,
        block_time: tx.block_time,
        fee: meta.map(|m| m.fee).unwrap_or_default(),
        err: meta.and_then(|m| m.err.as_ref().map(|e| e.to_string())),
        instructions,
        pre_token_balances: token_balances(meta.map(|m| &m.pre_token_balances)),
        post_token_balances: token_balances(meta.map(|m| &m.post_token_balances)),
    }
}

#[async_trait::async_trait]
impl LedgerClient for SolanaLedger {
    async fn signatures_for_account(
        &self,
        account: &str,
        limit: usize,
    ) -> Result<Vec<SignatureRecord>, LedgerError> {
        let address = Pubkey::from_str(account)
            .map_err(|_| LedgerError::InvalidAccount(account.to_string()))?;

        let statuses = self
            .rpc_client
            .get_signatures_for_address_with_config(
                &address,
                GetConfirmedSignaturesForAddress2Config {
                    limit: Some(limit),
                    commitment: Some(CommitmentConfig::confirmed()),
                    ..Default::default()
                },
            )
            .await
            .map_err(classify_client_error)?;

        Ok(statuses
            .into_iter()
            .map(|status| SignatureRecord {
                signature: status.signature,
                slot: status.slot,
                block_time: status.block_time,
                err: status.err.map(|e| e.to_string()),
            })
            .collect())
    }

    async fn parsed_transaction(
        &self,
        signature: &str,
    ) -> Result<Option<ParsedLedgerTransaction>, LedgerError> {
        let signature = Signature::from_str(signature)
            .map_err(|_| LedgerError::InvalidSignature(signature.to_string()))?;

        let result = self
            .rpc_client
            .get_transaction_with_config(
                &signature,
                RpcTransactionConfig {
                    encoding: Some(UiTransactionEncoding::JsonParsed),
                    commitment: Some(CommitmentConfig::confirmed()),
                    max_supported_transaction_version: Some(0),
                },
            )
            .await;

        match result {
            Ok(tx) => Ok(Some(convert_transaction(tx))),
            // The RPC reports a missing signature through the error channel;
            // surface it as an absence rather than a failure.
            Err(e) if e.to_string().to_lowercase().contains("not found") => Ok(None),
            Err(e) => Err(classify_client_error(e)),
        }
    }
}
