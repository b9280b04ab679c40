//! End-to-end runs of the execution engine against an in-memory chain.

use std::sync::Arc;

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolError, SolValue};
use ignition_core::{
    load_execution_state, resolve_contract_future_to_address, resolve_future_to_value,
    test_utils::{
        artifact, call_start, contract_at_start, deployment_start, depends_on,
        read_event_argument_start, send_data_start, static_call_start, tx_hash, with_strategy,
        MockChainDispatcher, SendBehavior, StaticArtifactLoader, SENDER,
    },
    DeployContractInteraction, ExecutionConfig, ExecutionEngine, ExecutionState, ExecutionStatus,
    FileJournal, FutureRef, FutureStartMessage, FutureType, IgnitionError, Journal,
    JournalMessage, MemoryJournal, NameOrIndex, OnchainInteractionMessage, OnchainStatus,
    OnchainTransactionRequest, StartRunMessage, TransactionMessage,
};
use serde_json::json;

sol! {
    error Unauthorized(address caller);
}

const TOKEN: &str = "Module#Token";
const MINT: &str = "Module#Token.mint";
const SUPPLY: &str = "Module#Token.totalSupply";

fn token_address() -> Address {
    SENDER.create(0)
}

fn artifacts() -> Arc<StaticArtifactLoader> {
    Arc::new(StaticArtifactLoader::new().artifact(
        TOKEN,
        artifact(
            "Token",
            &[
                "constructor()",
                "function mint(uint256 amount)",
                "function totalSupply() view returns (uint256 supply)",
                "error Unauthorized(address caller)",
                "event Transfer(address indexed from, address indexed to, uint256 value)",
            ],
            &[0x60, 0x80, 0x60, 0x40],
        ),
    ))
}

fn new_engine(journal: Arc<dyn Journal>, chain: Arc<MockChainDispatcher>) -> ExecutionEngine {
    ExecutionEngine::new(journal, chain, artifacts(), SENDER)
}

fn token_futures() -> Vec<FutureStartMessage> {
    vec![
        deployment_start(TOKEN, "Token"),
        depends_on(call_start(MINT, TOKEN, token_address(), "mint"), &[TOKEN]),
        depends_on(
            static_call_start(
                SUPPLY,
                TOKEN,
                token_address(),
                "totalSupply",
                NameOrIndex::from("supply"),
            ),
            &[MINT],
        ),
    ]
}

fn status(engine: &ExecutionEngine, future_id: &str) -> ExecutionStatus {
    engine.state().get(future_id).unwrap().status()
}

#[tokio::test]
async fn test_deploy_call_and_read() {
    let chain = Arc::new(MockChainDispatcher::new());
    let supply = U256::from(1000).abi_encode().into();
    chain.set_static_call_result(token_address(), "totalSupply", Ok(supply));
    let journal = Arc::new(MemoryJournal::new());
    let mut engine = new_engine(journal.clone(), chain.clone());

    let result = engine.execute(&token_futures()).await.unwrap();

    assert!(result.is_success(), "{result:?}");
    assert_eq!(result.successful, vec![TOKEN.to_string(), MINT.to_string(), SUPPLY.to_string()]);
    assert_eq!(chain.sent_transactions().len(), 2);
    assert_eq!(chain.sent_transactions()[0].nonce, Some(0));
    assert_eq!(chain.sent_transactions()[1].nonce, Some(1));

    let state = engine.state();
    assert_eq!(
        resolve_contract_future_to_address(&FutureRef::new(TOKEN, FutureType::Deployment), state)
            .unwrap(),
        token_address()
    );
    assert_eq!(
        resolve_future_to_value(&FutureRef::new(SUPPLY, FutureType::StaticCall), state).unwrap(),
        json!("1000")
    );

    assert_eq!(journal.messages()[0], JournalMessage::RunStart(StartRunMessage {}));
    assert_eq!(load_execution_state(journal.as_ref()).unwrap(), *engine.state());
}

#[tokio::test]
async fn test_second_run_skips_succeeded_futures() {
    let chain = Arc::new(MockChainDispatcher::new());
    let supply = U256::from(1).abi_encode().into();
    chain.set_static_call_result(token_address(), "totalSupply", Ok(supply));
    let journal = Arc::new(MemoryJournal::new());

    new_engine(journal.clone(), chain.clone()).execute(&token_futures()).await.unwrap();
    let recorded = journal.len();

    let mut engine = new_engine(journal.clone(), chain.clone());
    engine.load().unwrap();
    let result = engine.execute(&token_futures()).await.unwrap();

    assert!(result.is_success());
    assert_eq!(chain.sent_transactions().len(), 2);
    assert_eq!(journal.len(), recorded + 1);
}

#[tokio::test]
async fn test_custom_error_revert_fails_future() {
    let chain = Arc::new(MockChainDispatcher::new());
    let journal = Arc::new(MemoryJournal::new());
    let mut engine = new_engine(journal, chain.clone());

    engine.execute(&[deployment_start(TOKEN, "Token")]).await.unwrap();
    chain.push_send_behavior(SendBehavior::Reject {
        message: "execution reverted".to_string(),
        return_data: Some(Unauthorized { caller: SENDER }.abi_encode().into()),
    });
    let result = engine
        .execute(&[
            deployment_start(TOKEN, "Token"),
            call_start(MINT, TOKEN, token_address(), "mint"),
        ])
        .await
        .unwrap();

    assert_eq!(result.successful, vec![TOKEN.to_string()]);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].future_id, MINT);
    assert!(
        result.failed[0].error.starts_with("Reverted with custom error Unauthorized("),
        "{}",
        result.failed[0].error
    );
    assert_eq!(status(&engine, MINT), ExecutionStatus::Failed);
    assert!(engine.state().get(MINT).unwrap().base().onchain.is_idle());
}

#[tokio::test]
async fn test_mined_revert_blocks_dependents() {
    let chain = Arc::new(MockChainDispatcher::new());
    chain.push_send_behavior(SendBehavior::Revert);
    let mut engine = new_engine(Arc::new(MemoryJournal::new()), chain.clone());

    let result = engine.execute(&token_futures()).await.unwrap();

    assert_eq!(result.failed.len(), 1);
    assert!(result.failed[0].error.ends_with("reverted"), "{}", result.failed[0].error);
    assert_eq!(result.blocked, vec![MINT.to_string(), SUPPLY.to_string()]);
    assert!(engine.state().get(MINT).is_none());
    assert_eq!(chain.sent_transactions().len(), 1);
}

#[tokio::test]
async fn test_dropped_transaction_is_resent() {
    let chain = Arc::new(MockChainDispatcher::new());
    chain.push_send_behavior(SendBehavior::Drop);
    let mut engine = new_engine(Arc::new(MemoryJournal::new()), chain.clone());

    let result = engine.execute(&[deployment_start(TOKEN, "Token")]).await.unwrap();

    assert!(result.is_success());
    let sent = chain.sent_transactions();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].nonce, sent[1].nonce);

    let token = engine.state().get(TOKEN).unwrap();
    assert!(token
        .base()
        .history
        .iter()
        .any(|message| matches!(message, TransactionMessage::Reset(_))));
    assert_eq!(token.base().onchain.actions[&1].tx_hashes.len(), 2);
}

#[tokio::test]
async fn test_rpc_failure_is_returned() {
    let chain = Arc::new(MockChainDispatcher::new());
    chain.push_send_behavior(SendBehavior::RpcFailure("connection refused".to_string()));
    let mut engine = new_engine(Arc::new(MemoryJournal::new()), chain.clone());

    let err = engine.execute(&[deployment_start(TOKEN, "Token")]).await.unwrap_err();
    assert!(matches!(err, IgnitionError::Dispatch(_)), "{err}");
    assert_eq!(
        engine.state().get(TOKEN).unwrap().base().onchain.status,
        OnchainStatus::DeployContractTransactionRequest
    );

    // Nothing reached the node, so the next run resends with the same nonce.
    let result = engine.execute(&[deployment_start(TOKEN, "Token")]).await.unwrap();
    assert!(result.is_success());
    assert_eq!(chain.sent_transactions().len(), 1);
}

#[tokio::test]
async fn test_resume_keeps_recorded_sender() {
    let chain = Arc::new(MockChainDispatcher::new());
    chain.push_send_behavior(SendBehavior::RpcFailure("connection refused".to_string()));
    let journal = Arc::new(MemoryJournal::new());
    let mut engine = new_engine(journal.clone(), chain.clone());
    assert!(engine.execute(&[deployment_start(TOKEN, "Token")]).await.is_err());

    let other = Address::repeat_byte(0x07);
    let mut engine = ExecutionEngine::new(journal, chain.clone(), artifacts(), other);
    engine.load().unwrap();
    let result = engine.execute(&[deployment_start(TOKEN, "Token")]).await.unwrap();

    assert!(result.is_success(), "{result:?}");
    let sent = chain.sent_transactions();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].from, Some(SENDER));
    let ExecutionState::Deployment(token) = engine.state().get(TOKEN).unwrap() else {
        panic!("expected a deployment");
    };
    assert_eq!(token.from, Some(SENDER));
    assert_eq!(token.contract_address().unwrap(), token_address());
}

#[tokio::test(start_paused = true)]
async fn test_timed_out_transaction_is_resumed_by_next_run() {
    let chain = Arc::new(MockChainDispatcher::new().auto_mine(false));
    let config = ExecutionConfig::default()
        .with_transaction_timeout_ms(10_000)
        .with_poll_interval_ms(1_000);
    let mut engine = new_engine(Arc::new(MemoryJournal::new()), chain.clone()).with_config(config);
    let futures = [deployment_start(TOKEN, "Token")];

    let result = engine.execute(&futures).await.unwrap();
    assert_eq!(result.timed_out.len(), 1);
    assert_eq!(result.timed_out[0].future_id, TOKEN);
    assert_eq!(status(&engine, TOKEN), ExecutionStatus::Timeout);

    chain.mine_pending();
    let result = engine.execute(&futures).await.unwrap();

    assert!(result.is_success(), "{result:?}");
    assert_eq!(chain.sent_transactions().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_waits_for_confirmations() {
    let chain = Arc::new(MockChainDispatcher::new());
    let config = ExecutionConfig::default()
        .with_required_confirmations(3)
        .with_transaction_timeout_ms(5_000);
    let mut engine = new_engine(Arc::new(MemoryJournal::new()), chain.clone()).with_config(config);

    let result = engine.execute(&[deployment_start(TOKEN, "Token")]).await.unwrap();
    assert_eq!(result.timed_out.len(), 1);

    chain.advance_blocks(2);
    let result = engine.execute(&[deployment_start(TOKEN, "Token")]).await.unwrap();
    assert!(result.is_success(), "{result:?}");
}

/// A journal where the nonce of the deployment was recorded but the node's answer was not.
fn crashed_after_request() -> MemoryJournal {
    let interaction = DeployContractInteraction {
        future_id: TOKEN.to_string(),
        execution_id: 1,
        artifact_future_id: TOKEN.to_string(),
        contract_name: "Token".to_string(),
        constructor_args: Vec::new(),
        libraries: Default::default(),
        value: U256::ZERO,
        from: SENDER,
    };
    MemoryJournal::from_messages(vec![
        StartRunMessage {}.into(),
        deployment_start(TOKEN, "Token").into(),
        OnchainInteractionMessage::DeployContract(interaction).into(),
        OnchainTransactionRequest {
            future_id: TOKEN.to_string(),
            execution_id: 1,
            from: SENDER,
            nonce: 0,
            tx: Default::default(),
        }
        .into(),
    ])
}

#[tokio::test]
async fn test_unknown_send_outcome_is_held() {
    let chain = Arc::new(MockChainDispatcher::new());
    chain.set_pending_transaction_count(SENDER, 1);
    let mut engine = new_engine(Arc::new(crashed_after_request()), chain.clone());
    engine.load().unwrap();

    let result = engine.execute(&token_futures()).await.unwrap();

    assert_eq!(result.held.len(), 1);
    assert_eq!(result.held[0].future_id, TOKEN);
    assert!(result.held[0].reason.contains("nonce 0"), "{}", result.held[0].reason);
    assert_eq!(result.blocked, vec![MINT.to_string(), SUPPLY.to_string()]);
    assert!(chain.sent_transactions().is_empty());

    // Held futures stay held.
    let result = engine.execute(&token_futures()).await.unwrap();
    assert_eq!(result.held.len(), 1);
    assert!(chain.sent_transactions().is_empty());
}

#[tokio::test]
async fn test_unsent_transaction_is_resent_after_crash() {
    let chain = Arc::new(MockChainDispatcher::new());
    let mut engine = new_engine(Arc::new(crashed_after_request()), chain.clone());
    engine.load().unwrap();

    let result = engine.execute(&[deployment_start(TOKEN, "Token")]).await.unwrap();

    assert!(result.is_success());
    assert_eq!(chain.sent_transactions().len(), 1);
    let history = &engine.state().get(TOKEN).unwrap().base().history;
    assert!(matches!(history[2], TransactionMessage::Reset(_)));
}

#[tokio::test]
async fn test_changed_future_type_is_rejected() {
    let chain = Arc::new(MockChainDispatcher::new());
    let mut engine = new_engine(Arc::new(MemoryJournal::new()), chain);
    engine.execute(&[deployment_start(TOKEN, "Token")]).await.unwrap();

    let err = engine
        .execute(&[contract_at_start(TOKEN, "Token", token_address())])
        .await
        .unwrap_err();
    assert!(err.is_invariant_violation());
}

#[tokio::test]
async fn test_unknown_strategy_is_rejected() {
    let chain = Arc::new(MockChainDispatcher::new());
    let mut engine = new_engine(Arc::new(MemoryJournal::new()), chain);

    let err = engine
        .execute(&[with_strategy(deployment_start(TOKEN, "Token"), "create2")])
        .await
        .unwrap_err();
    assert!(matches!(err, IgnitionError::UnknownStrategy(name) if name == "create2"));
}

#[tokio::test]
async fn test_futures_without_transactions() {
    let chain = Arc::new(MockChainDispatcher::new());
    let existing = Address::repeat_byte(0x42);
    let mint_tx = tx_hash(7);
    chain.set_event_argument(mint_tx, "Transfer", json!("1000"));
    let mut engine = new_engine(Arc::new(MemoryJournal::new()), chain.clone());

    let result = engine
        .execute(&[
            contract_at_start(TOKEN, "Token", existing),
            read_event_argument_start(
                "Module#Transfer.value",
                TOKEN,
                "Transfer",
                NameOrIndex::from("value"),
                mint_tx,
                existing,
            ),
        ])
        .await
        .unwrap();

    assert!(result.is_success(), "{result:?}");
    assert!(chain.sent_transactions().is_empty());
    let state = engine.state();
    assert_eq!(
        resolve_contract_future_to_address(&FutureRef::new(TOKEN, FutureType::ContractAt), state)
            .unwrap(),
        existing
    );
    assert_eq!(
        resolve_future_to_value(
            &FutureRef::new("Module#Transfer.value", FutureType::ReadEventArgument),
            state,
        )
        .unwrap(),
        json!("1000")
    );
}

#[tokio::test]
async fn test_send_data() {
    let chain = Arc::new(MockChainDispatcher::new());
    let to = Address::repeat_byte(0x11);
    let mut engine = new_engine(Arc::new(MemoryJournal::new()), chain.clone());

    let result = engine
        .execute(&[send_data_start("Module#Fund", to, Bytes::from_static(&[0xde, 0xad]))])
        .await
        .unwrap();

    assert!(result.is_success());
    let sent = chain.sent_transactions();
    assert_eq!(sent[0].input.input(), Some(&Bytes::from_static(&[0xde, 0xad])));
    let ExecutionState::SendData(send) = engine.state().get("Module#Fund").unwrap() else {
        panic!("expected a send-data state");
    };
    assert!(send.tx_id().is_ok());
}

#[tokio::test]
async fn test_mismatched_static_call_output_fails() {
    let chain = Arc::new(MockChainDispatcher::new());
    let existing = Address::repeat_byte(0x42);
    chain.set_static_call_result(existing, "totalSupply", Ok(Bytes::from_static(&[1, 2, 3])));
    let mut engine = new_engine(Arc::new(MemoryJournal::new()), chain);

    let result = engine
        .execute(&[static_call_start(
            SUPPLY,
            TOKEN,
            existing,
            "totalSupply",
            NameOrIndex::default(),
        )])
        .await
        .unwrap();

    assert_eq!(result.failed.len(), 1);
    assert_eq!(
        result.failed[0].error,
        "Function totalSupply returned data that does not match its outputs"
    );
}

#[tokio::test]
async fn test_file_journal_replays_to_live_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("journal.jsonl");
    let chain = Arc::new(MockChainDispatcher::new());
    let supply = U256::from(5).abi_encode().into();
    chain.set_static_call_result(token_address(), "totalSupply", Ok(supply));
    chain.push_send_behavior(SendBehavior::Drop);

    let mut engine = new_engine(Arc::new(FileJournal::new(&path)), chain);
    let result = engine.execute(&token_futures()).await.unwrap();
    assert!(result.is_success(), "{result:?}");

    let replayed = load_execution_state(&FileJournal::new(&path)).unwrap();
    assert_eq!(replayed, *engine.state());
}
