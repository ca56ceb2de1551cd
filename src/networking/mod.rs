/*!

# Networking

## Introduction

A client holds one duplex websocket connection to a node and multiplexes
every JSON-RPC call over it.

A call is addressed to an api id and a method:

```json
{"id": 4, "method": "call", "params": [2, "get_objects", [["1.2.17"]]]}
```

Api id 1 is the login api. The ids of the other apis are handed out after
login and kept in a `Session`.

The node answers with the same id:

```json
{"id": 4, "jsonrpc": "2.0", "result": [...]}
```

Frames with `"method": "notice"` carry subscription callbacks. They are routed
to the registered `SubscriptionManager`s.

## Layers

- `socket`: the transport seam, implemented by `websocket::WebSocketSocket`.
- `api_message`: outgoing `Call`s and parsed inbound frames.
- `client`: call ids, the pending table and reconnect replay.
- `subscription`: listener registries for accounts, contracts and blocks.
- `session`: login, api discovery and typed helpers on top of the client.

*/
pub mod api_message;
pub mod client;
pub mod session;
pub mod socket;
pub mod subscription;
pub mod websocket;
