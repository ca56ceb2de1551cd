use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{event, Level};

use crate::abi::{decode_hex, encode_call_hex, AbiType, DecodedValue, InputValue};
use crate::block_reference::BlockReference;
use crate::networking::api_message::{Call, LOGIN_API};
use crate::networking::client::RpcClient;
use crate::time::parse_timestamp;
use crate::transaction::{SignedTransaction, Transaction};
use crate::types::ObjectId;
use crate::{Error, Result};

pub const DATABASE_API: &str = "database";
pub const NETWORK_BROADCAST_API: &str = "network_broadcast";
pub const HISTORY_API: &str = "history";
pub const REGISTRATION_API: &str = "registration";

/// Api ids handed out by the node after login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiIds {
    database: u64,
    network_broadcast: u64,
    history: u64,
    registration: u64,
}

impl ApiIds {
    pub fn new(database: u64, network_broadcast: u64, history: u64, registration: u64) -> Self {
        ApiIds {
            database,
            network_broadcast,
            history,
            registration,
        }
    }

    pub fn get_database(&self) -> u64 {
        self.database
    }

    pub fn get_network_broadcast(&self) -> u64 {
        self.network_broadcast
    }

    pub fn get_history(&self) -> u64 {
        self.history
    }

    pub fn get_registration(&self) -> u64 {
        self.registration
    }
}

///
/// A logged-in connection. Everything that needs an api id or the chain id
/// goes through here rather than through process-wide state.
///
pub struct Session {
    client: Arc<RpcClient>,
    api_ids: ApiIds,
    chain_id: String,
}

impl Session {
    ///
    /// Logs in on an already connected client, then asks the node for the ids
    /// of the apis this crate uses and for the chain id.
    ///
    pub async fn login(client: Arc<RpcClient>, user: &str, password: &str) -> Result<Session> {
        let accepted = client
            .call(Call::new(LOGIN_API, "login", json!([user, password])))
            .await?;
        if accepted != Value::Bool(true) {
            return Err(Error::Protocol {
                code: 0,
                message: String::from("login was rejected"),
            });
        }

        let database = Session::discover_api(&client, DATABASE_API).await?;
        let network_broadcast = Session::discover_api(&client, NETWORK_BROADCAST_API).await?;
        let history = Session::discover_api(&client, HISTORY_API).await?;
        let registration = Session::discover_api(&client, REGISTRATION_API).await?;
        let api_ids = ApiIds::new(database, network_broadcast, history, registration);

        let chain_id = client
            .call(Call::new(database, "get_chain_id", json!([])))
            .await?;
        let chain_id = chain_id
            .as_str()
            .ok_or_else(|| Error::Decode(format!("chain id is not a string: {}", chain_id)))?
            .to_string();

        event!(Level::INFO, "logged in to {} on chain {}", client.get_url(), chain_id);
        Ok(Session {
            client,
            api_ids,
            chain_id,
        })
    }

    async fn discover_api(client: &RpcClient, api_name: &str) -> Result<u64> {
        let api_id = client
            .call(Call::new(LOGIN_API, api_name, json!([])))
            .await?;
        let api_id = api_id
            .as_u64()
            .ok_or_else(|| Error::Decode(format!("{} api id is not a number: {}", api_name, api_id)))?;
        event!(Level::DEBUG, "{} api id is {}", api_name, api_id);
        Ok(api_id)
    }

    pub fn get_client(&self) -> &Arc<RpcClient> {
        &self.client
    }

    pub fn get_api_ids(&self) -> &ApiIds {
        &self.api_ids
    }

    pub fn get_chain_id(&self) -> &str {
        &self.chain_id
    }

    /// Reference to the current head block, expiring `expiration_seconds` later.
    pub async fn get_block_reference(&self, expiration_seconds: u32) -> Result<BlockReference> {
        let properties = self
            .client
            .call(Call::new(
                self.api_ids.database,
                "get_dynamic_global_properties",
                json!([]),
            ))
            .await?;
        let head_block_number = properties["head_block_number"]
            .as_u64()
            .ok_or_else(|| Error::Decode(String::from("missing head_block_number")))?;
        let head_block_id = properties["head_block_id"]
            .as_str()
            .ok_or_else(|| Error::Decode(String::from("missing head_block_id")))?;
        let head_block_time = properties["time"]
            .as_str()
            .ok_or_else(|| Error::Decode(String::from("missing head block time")))?;
        BlockReference::from_head_block(
            head_block_number,
            head_block_id,
            parse_timestamp(head_block_time)?,
            expiration_seconds,
        )
    }

    /// An empty transaction on this chain, anchored to the current head block.
    pub async fn new_transaction(&self, expiration_seconds: u32) -> Result<Transaction> {
        let block_reference = self.get_block_reference(expiration_seconds).await?;
        Ok(Transaction::new(block_reference, &self.chain_id))
    }

    pub async fn broadcast_transaction(&self, transaction: &SignedTransaction) -> Result<Value> {
        event!(Level::INFO, "broadcasting transaction {}", transaction.id());
        self.client
            .call(Call::new(
                self.api_ids.network_broadcast,
                "broadcast_transaction",
                json!([transaction.to_json()]),
            ))
            .await
    }

    pub async fn get_objects(&self, ids: &[ObjectId]) -> Result<Vec<Value>> {
        let objects = self
            .client
            .call(Call::new(self.api_ids.database, "get_objects", json!([ids])))
            .await?;
        match objects {
            Value::Array(objects) => Ok(objects),
            other => Err(Error::Decode(format!("get_objects returned {}", other))),
        }
    }

    /// Registers for object change notices. Replayed after a reconnect.
    pub async fn set_subscribe_callback(&self, callback_id: u64, clear_filter: bool) -> Result<()> {
        self.client
            .call(
                Call::new(
                    self.api_ids.database,
                    "set_subscribe_callback",
                    json!([callback_id, clear_filter]),
                )
                .idempotent(),
            )
            .await?;
        Ok(())
    }

    /// Registers for applied block ids. Replayed after a reconnect.
    pub async fn set_block_applied_callback(&self, callback_id: u64) -> Result<()> {
        self.client
            .call(
                Call::new(
                    self.api_ids.database,
                    "set_block_applied_callback",
                    json!([callback_id]),
                )
                .idempotent(),
            )
            .await?;
        Ok(())
    }

    ///
    /// Runs a contract method against the node's current state without a
    /// transaction and decodes its output as `output_types`.
    ///
    pub async fn query_contract(
        &self,
        contract: ObjectId,
        registrar: ObjectId,
        asset: ObjectId,
        method_name: &str,
        args: &[InputValue],
        output_types: &[AbiType],
    ) -> Result<Vec<DecodedValue>> {
        let code = encode_call_hex(method_name, args)?;
        let output = self
            .client
            .call(Call::new(
                self.api_ids.database,
                "call_contract_no_changing_state",
                json!([contract, registrar, asset, code]),
            ))
            .await?;
        let output = output
            .as_str()
            .ok_or_else(|| Error::Decode(format!("contract output is not a string: {}", output)))?;
        decode_hex(output, output_types)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::networking::client::ConnectionState;
    use crate::test_utilities::mocks::{MockNode, MockSocket};
    use crate::asset::CORE_ASSET;
    use parking_lot::Mutex;

    const CHAIN_ID: &str = "90cc4c8a3a0a7bb0f2f9b2b8b2d7e3a76e3fb6f0a4b1e9a3f1f6f0b4e7b9d6c1";

    fn answer(method: &str, _params: &Value) -> Value {
        match method {
            "login" => json!(true),
            "database" => json!(2),
            "network_broadcast" => json!(3),
            "history" => json!(4),
            "registration" => json!(5),
            "get_chain_id" => json!(CHAIN_ID),
            "get_dynamic_global_properties" => json!({
                "head_block_number": 0x1_2345u64,
                "head_block_id": "00012345a1b2c3d4000000000000000000000000",
                "time": "2018-02-13T10:12:32",
            }),
            "get_objects" => json!([{"id": "1.2.17", "name": "nathan"}]),
            "call_contract_no_changing_state" => json!(
                "000000000000000000000000000000000000000000000000000000000000002a"
            ),
            _ => Value::Null,
        }
    }

    async fn logged_in(socket: &Arc<MockSocket>) -> Session {
        let client = RpcClient::new(socket.clone(), "ws://127.0.0.1:8090");
        client.connect().unwrap();
        assert_eq!(client.get_state(), ConnectionState::Connected);
        Session::login(client, "", "").await.unwrap()
    }

    #[tokio::test]
    async fn login_discovers_apis_test() {
        let socket = Arc::new(MockSocket::new());
        let _node = MockNode::spawn(socket.clone(), answer);
        let session = logged_in(&socket).await;

        assert_eq!(session.get_api_ids(), &ApiIds::new(2, 3, 4, 5));
        assert_eq!(session.get_chain_id(), CHAIN_ID);
    }

    #[tokio::test]
    async fn login_is_first_call_test() {
        let socket = Arc::new(MockSocket::new());
        let first_frames: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(vec![]));
        let seen = first_frames.clone();
        let _node = MockNode::spawn(socket.clone(), move |method, params| {
            seen.lock().push(json!([method, params]));
            answer(method, params)
        });
        logged_in(&socket).await;

        let frames = first_frames.lock();
        assert_eq!(frames[0], json!(["login", ["", ""]]));
        assert_eq!(frames[1][0], "database");
    }

    #[tokio::test]
    async fn rejected_login_test() {
        let socket = Arc::new(MockSocket::new());
        let _node = MockNode::spawn(socket.clone(), |method, params| match method {
            "login" => json!(false),
            _ => answer(method, params),
        });
        let client = RpcClient::new(socket.clone(), "ws://127.0.0.1:8090");
        client.connect().unwrap();
        assert!(matches!(
            Session::login(client, "nathan", "wrong").await,
            Err(Error::Protocol { .. })
        ));
    }

    #[tokio::test]
    async fn block_reference_test() {
        let socket = Arc::new(MockSocket::new());
        let _node = MockNode::spawn(socket.clone(), answer);
        let session = logged_in(&socket).await;

        let block_reference = session.get_block_reference(30).await.unwrap();
        assert_eq!(block_reference.get_ref_block_num(), 0x2345);
        assert_eq!(block_reference.get_ref_block_prefix(), 0xd4c3b2a1);
        assert_eq!(block_reference.get_relative_expiration(), 1518516752 + 30);

        let transaction = session.new_transaction(30).await.unwrap();
        assert_eq!(transaction.get_chain_id(), CHAIN_ID);
        assert_eq!(transaction.get_block_reference(), &block_reference);
    }

    #[tokio::test]
    async fn get_objects_test() {
        let socket = Arc::new(MockSocket::new());
        let _node = MockNode::spawn(socket.clone(), answer);
        let session = logged_in(&socket).await;

        let objects = session.get_objects(&[ObjectId::account(17)]).await.unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0]["name"], "nathan");
    }

    #[tokio::test]
    async fn callbacks_are_replayed_test() {
        let socket = Arc::new(MockSocket::new());
        let node = MockNode::spawn(socket.clone(), answer);
        let session = logged_in(&socket).await;
        drop(node);

        let client = session.get_client().clone();
        let waiting = tokio::spawn(async move { session.set_subscribe_callback(7, false).await });
        while client.pending_count() == 0 {
            tokio::task::yield_now().await;
        }
        socket.take_sent();
        socket.fire_disconnected();
        assert_eq!(client.pending_count(), 1);

        let _node = MockNode::spawn(socket.clone(), answer);
        socket.fire_connected();
        assert!(waiting.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn query_contract_test() {
        let socket = Arc::new(MockSocket::new());
        let calls: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(vec![]));
        let seen = calls.clone();
        let _node = MockNode::spawn(socket.clone(), move |method, params| {
            if method == "call_contract_no_changing_state" {
                seen.lock().push(params.clone());
            }
            answer(method, params)
        });
        let session = logged_in(&socket).await;

        let output = session
            .query_contract(
                ObjectId::contract(3),
                ObjectId::account(17),
                CORE_ASSET,
                "totalSupply",
                &[],
                &[AbiType::Uint(256)],
            )
            .await
            .unwrap();
        assert_eq!(output.len(), 1);
        assert_eq!(output[0].to_string(), "42");

        let calls = calls.lock();
        assert_eq!(calls[0], json!(["1.11.3", "1.2.17", "1.3.0", "18160ddd"]));
    }
}
