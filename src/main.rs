/*!
# Graphene Command Line Interface

Offline helpers for contract calls plus a raw call against a node.

## Usage

```bash
graphenecli help [subcommand]
```

## Examples

```bash
graphenecli keccak "totalSupply()"
graphenecli keccak --variant sha3-256 abc
graphenecli selector "transfer(address,uint256)"
graphenecli encode transfer address=1.2.17 uint256=1000
graphenecli decode 000000000000000000000000000000000000000000000000000000000000002a uint256
graphenecli --config config call database get_objects '[["1.2.17"]]'
```

## Dev

To run from source:

```bash
cargo run -- selector "balanceOf(address)"
```
*/
use std::sync::Arc;

use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use graphene_rust::abi::{decode_hex, encode_call_hex, selector, AbiType, InputValue};
use graphene_rust::keccak::{hash, params_by_name};
use graphene_rust::networking::api_message::Call;
use graphene_rust::networking::client::RpcClient;
use graphene_rust::networking::session::{
    Session, DATABASE_API, HISTORY_API, NETWORK_BROADCAST_API, REGISTRATION_API,
};
use graphene_rust::networking::websocket::WebSocketSocket;
use graphene_rust::settings::{ClientSettings, DEFAULT_CONFIG_NAME};
use graphene_rust::{Error, Result};
use serde_json::Value;
use tracing::{event, Level};

pub fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let matches = App::new("Graphene Command Line Interface")
        .about("Encode contract calls and talk to a Graphene node")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .takes_value(true)
                .global(true)
                .help("config file name"),
        )
        .subcommand(
            SubCommand::with_name("keccak")
                .about("hashes text with a keccak parameter set")
                .arg(Arg::with_name("text").required(true).help("text to hash"))
                .arg(
                    Arg::with_name("variant")
                        .short("v")
                        .long("variant")
                        .default_value("keccak-256")
                        .takes_value(true)
                        .help("keccak-256, sha3-256, shake128, ..."),
                ),
        )
        .subcommand(
            SubCommand::with_name("selector")
                .about("prints the four byte selector of a method signature")
                .arg(
                    Arg::with_name("signature")
                        .required(true)
                        .help("e.g. transfer(address,uint256)"),
                ),
        )
        .subcommand(
            SubCommand::with_name("encode")
                .about("encodes a contract call")
                .arg(Arg::with_name("method").required(true).help("method name"))
                .arg(
                    Arg::with_name("args")
                        .multiple(true)
                        .help("arguments as type=value"),
                ),
        )
        .subcommand(
            SubCommand::with_name("decode")
                .about("decodes contract output")
                .arg(Arg::with_name("output").required(true).help("hex output"))
                .arg(
                    Arg::with_name("types")
                        .multiple(true)
                        .required(true)
                        .help("output types, in order"),
                ),
        )
        .subcommand(
            SubCommand::with_name("call")
                .about("logs in to the configured node and runs one call")
                .arg(
                    Arg::with_name("api")
                        .required(true)
                        .help("api name (database, history, ...) or api id"),
                )
                .arg(Arg::with_name("method").required(true).help("method name"))
                .arg(
                    Arg::with_name("params")
                        .default_value("[]")
                        .help("json array of parameters"),
                ),
        )
        .get_matches();

    match matches.subcommand() {
        ("keccak", Some(sub_matches)) => run_keccak(sub_matches),
        ("selector", Some(sub_matches)) => run_selector(sub_matches),
        ("encode", Some(sub_matches)) => run_encode(sub_matches),
        ("decode", Some(sub_matches)) => run_decode(sub_matches),
        ("call", Some(sub_matches)) => {
            let config_name = sub_matches
                .value_of("config")
                .or_else(|| matches.value_of("config"))
                .unwrap_or(DEFAULT_CONFIG_NAME);
            run_call(sub_matches, ClientSettings::load(config_name)?)
        }
        _ => Ok(()),
    }
}

// clap has already enforced required arguments
fn required<'a>(matches: &'a ArgMatches, name: &str) -> &'a str {
    matches.value_of(name).unwrap_or_default()
}

fn run_keccak(matches: &ArgMatches) -> Result<()> {
    let variant = required(matches, "variant");
    let params = params_by_name(variant)
        .ok_or_else(|| Error::MalformedParameter(format!("unknown variant {:?}", variant)))?;
    println!("{}", hash(required(matches, "text").as_bytes(), &params)?);
    Ok(())
}

fn run_selector(matches: &ArgMatches) -> Result<()> {
    println!("{}", hex::encode(selector(required(matches, "signature"))));
    Ok(())
}

fn run_encode(matches: &ArgMatches) -> Result<()> {
    let args = matches
        .values_of("args")
        .map(|values| values.map(parse_argument).collect::<Result<Vec<InputValue>>>())
        .transpose()?
        .unwrap_or_default();
    println!("{}", encode_call_hex(required(matches, "method"), &args)?);
    Ok(())
}

fn parse_argument(argument: &str) -> Result<InputValue> {
    let (type_name, raw_value) = argument.split_once('=').ok_or_else(|| {
        Error::MalformedParameter(format!("expected type=value, got {:?}", argument))
    })?;
    InputValue::parse(type_name, raw_value)
}

fn run_decode(matches: &ArgMatches) -> Result<()> {
    let types = matches
        .values_of("types")
        .map(|values| {
            values
                .map(|type_name| type_name.parse::<AbiType>())
                .collect::<Result<Vec<AbiType>>>()
        })
        .transpose()?
        .unwrap_or_default();
    for value in decode_hex(required(matches, "output"), &types)? {
        println!("{}", value);
    }
    Ok(())
}

fn run_call(matches: &ArgMatches, settings: ClientSettings) -> Result<()> {
    let params: Value = serde_json::from_str(required(matches, "params"))?;
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| Error::Connection(format!("could not start runtime: {}", e)))?;

    let socket = Arc::new(WebSocketSocket::new(runtime.handle().clone()));
    let client = RpcClient::new(socket, settings.get_url());
    client.connect()?;
    let session = runtime.block_on(Session::login(client.clone(), "", ""))?;
    if let Some(chain_id) = settings.get_chain_id() {
        if chain_id != session.get_chain_id() {
            event!(
                Level::WARN,
                "node is on chain {}, configured chain is {}",
                session.get_chain_id(),
                chain_id
            );
        }
    }

    let api = required(matches, "api");
    let api_ids = session.get_api_ids();
    let api_id = match api {
        DATABASE_API => api_ids.get_database(),
        NETWORK_BROADCAST_API => api_ids.get_network_broadcast(),
        HISTORY_API => api_ids.get_history(),
        REGISTRATION_API => api_ids.get_registration(),
        other => other
            .parse()
            .map_err(|_| Error::MalformedParameter(format!("unknown api {:?}", other)))?,
    };

    let result = client.call_blocking(
        Call::new(api_id, required(matches, "method"), params),
        Some(settings.get_call_timeout()),
    )?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    client.disconnect();
    Ok(())
}
