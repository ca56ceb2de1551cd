/*!
# Graphene Rust

A client library for Graphene-family blockchains.

It keeps one websocket connection to a node and multiplexes JSON-RPC calls
over it, builds transactions in the node's binary wire format and signs them
with canonical signatures, and encodes and decodes smart contract calls with an
Ethereum ABI compatible scheme.

# Usage

```no_run
use std::sync::Arc;

use graphene_rust::networking::client::RpcClient;
use graphene_rust::networking::session::Session;
use graphene_rust::networking::websocket::WebSocketSocket;

#[tokio::main]
async fn main() -> graphene_rust::Result<()> {
    let socket = Arc::new(WebSocketSocket::new(tokio::runtime::Handle::current()));
    let client = RpcClient::new(socket, "ws://127.0.0.1:8090");
    client.connect()?;
    let session = Session::login(client, "", "").await?;
    println!("{}", session.get_chain_id());
    Ok(())
}
```

# Modules

- `networking`: sockets, the call multiplexer, subscriptions and sessions.
- `operation`, `transaction`, `keypair`: transaction building and signing.
- `abi`: contract call encoding and output decoding.
- `keccak`: the Keccak sponge used by `abi` for method selectors.

*/
pub mod abi;
pub mod asset;
pub mod binary;
pub mod block_reference;
pub mod crypto;
pub mod error;
pub mod keccak;
pub mod keypair;
pub mod networking;
pub mod operation;
pub mod settings;
pub mod time;
pub mod transaction;
pub mod types;

mod test_setup;

#[cfg(test)]
pub mod test_utilities;

pub use error::{Error, Result};
