/*!
# Operations

Every operation a transaction can carry. The node identifies an operation by
its ordinal in the global operation list (`OperationType`); that ordinal is
always the first byte of the operation's wire form and the first element of
its JSON pair `[type_id, {fields}]`.
*/
use std::collections::{BTreeMap, BTreeSet};

use macros::TryFromByte;
use serde::{Serialize, Serializer};

use crate::asset::{AssetAmount, Price};
use crate::binary::ToBytes;
use crate::types::{Extensions, ObjectId, PublicKeyType};

/// The node's global operation list, in declaration order.
#[derive(TryFromByte, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OperationType {
    Transfer = 0,
    LimitOrderCreate = 1,
    LimitOrderCancel = 2,
    CallOrderUpdate = 3,
    FillOrder = 4,
    AccountCreate = 5,
    AccountUpdate = 6,
    AccountWhitelist = 7,
    AccountUpgrade = 8,
    AccountTransfer = 9,
    AssetCreate = 10,
    AssetUpdate = 11,
    AssetUpdateBitasset = 12,
    AssetUpdateFeedProducers = 13,
    AssetIssue = 14,
    AssetReserve = 15,
    AssetFundFeePool = 16,
    AssetSettle = 17,
    AssetGlobalSettle = 18,
    AssetPublishFeed = 19,
    WitnessCreate = 20,
    WitnessUpdate = 21,
    ProposalCreate = 22,
    ProposalUpdate = 23,
    ProposalDelete = 24,
    WithdrawPermissionCreate = 25,
    WithdrawPermissionUpdate = 26,
    WithdrawPermissionClaim = 27,
    WithdrawPermissionDelete = 28,
    CommitteeMemberCreate = 29,
    CommitteeMemberUpdate = 30,
    CommitteeMemberUpdateGlobalParameters = 31,
    VestingBalanceCreate = 32,
    VestingBalanceWithdraw = 33,
    WorkerCreate = 34,
    Custom = 35,
    Assert = 36,
    BalanceClaim = 37,
    OverrideTransfer = 38,
    TransferToBlind = 39,
    BlindTransfer = 40,
    TransferFromBlind = 41,
    AssetSettleCancel = 42,
    AssetClaimFees = 43,
    FbaDistribute = 44,
    ContractCreate = 45,
    ContractCall = 46,
    ContractTransfer = 47,
}

/// Weighted keys and accounts allowed to act for an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authority {
    pub weight_threshold: u32,
    pub account_auths: BTreeMap<ObjectId, u16>,
    pub key_auths: BTreeMap<PublicKeyType, u16>,
}

impl Authority {
    /// A single key with full weight.
    pub fn from_key(key: PublicKeyType) -> Self {
        let mut key_auths = BTreeMap::new();
        key_auths.insert(key, 1);
        Authority {
            weight_threshold: 1,
            account_auths: BTreeMap::new(),
            key_auths,
        }
    }
}

impl ToBytes for Authority {
    fn write_bytes(&self, bytes: &mut Vec<u8>) {
        self.weight_threshold.write_bytes(bytes);
        self.account_auths.write_bytes(bytes);
        self.key_auths.write_bytes(bytes);
        // address_auths, never populated
        BTreeMap::<PublicKeyType, u16>::new().write_bytes(bytes);
    }
}

impl Serialize for Authority {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct AuthorityJson<'a> {
            weight_threshold: u32,
            account_auths: Vec<(&'a ObjectId, &'a u16)>,
            key_auths: Vec<(&'a PublicKeyType, &'a u16)>,
            address_auths: [(); 0],
        }
        AuthorityJson {
            weight_threshold: self.weight_threshold,
            account_auths: self.account_auths.iter().collect(),
            key_auths: self.key_auths.iter().collect(),
            address_auths: [],
        }
        .serialize(serializer)
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct AccountOptions {
    pub memo_key: PublicKeyType,
    pub voting_account: ObjectId,
    pub delegating_account: ObjectId,
    pub extensions: Extensions,
}

impl ToBytes for AccountOptions {
    fn write_bytes(&self, bytes: &mut Vec<u8>) {
        self.memo_key.write_bytes(bytes);
        self.voting_account.write_bytes(bytes);
        self.delegating_account.write_bytes(bytes);
        self.extensions.write_bytes(bytes);
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct AssetOptions {
    pub max_supply: u64,
    pub market_fee_percent: u16,
    pub max_market_fee: u64,
    pub issuer_permissions: u16,
    pub flags: u16,
    pub core_exchange_rate: Price,
    pub whitelist_authorities: BTreeSet<ObjectId>,
    pub blacklist_authorities: BTreeSet<ObjectId>,
    pub whitelist_markets: BTreeSet<ObjectId>,
    pub blacklist_markets: BTreeSet<ObjectId>,
    pub description: String,
    pub extensions: Extensions,
}

impl ToBytes for AssetOptions {
    fn write_bytes(&self, bytes: &mut Vec<u8>) {
        self.max_supply.write_bytes(bytes);
        self.market_fee_percent.write_bytes(bytes);
        self.max_market_fee.write_bytes(bytes);
        self.issuer_permissions.write_bytes(bytes);
        self.flags.write_bytes(bytes);
        self.core_exchange_rate.write_bytes(bytes);
        self.whitelist_authorities.write_bytes(bytes);
        self.blacklist_authorities.write_bytes(bytes);
        self.whitelist_markets.write_bytes(bytes);
        self.blacklist_markets.write_bytes(bytes);
        self.description.write_bytes(bytes);
        self.extensions.write_bytes(bytes);
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct TransferOperation {
    pub fee: AssetAmount,
    pub from: ObjectId,
    pub to: ObjectId,
    pub amount: AssetAmount,
    pub extensions: Extensions,
}

impl TransferOperation {
    pub fn new(fee: AssetAmount, from: ObjectId, to: ObjectId, amount: AssetAmount) -> Self {
        TransferOperation {
            fee,
            from,
            to,
            amount,
            extensions: Extensions,
        }
    }
}

impl ToBytes for TransferOperation {
    fn write_bytes(&self, bytes: &mut Vec<u8>) {
        self.fee.write_bytes(bytes);
        self.from.write_bytes(bytes);
        self.to.write_bytes(bytes);
        self.amount.write_bytes(bytes);
        // memo
        bytes.push(0);
        self.extensions.write_bytes(bytes);
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct AccountCreateOperation {
    pub fee: AssetAmount,
    pub registrar: ObjectId,
    pub referrer: ObjectId,
    pub referrer_percent: u16,
    pub name: String,
    pub owner: Authority,
    pub active: Authority,
    pub options: AccountOptions,
    pub extensions: Extensions,
}

impl ToBytes for AccountCreateOperation {
    fn write_bytes(&self, bytes: &mut Vec<u8>) {
        self.fee.write_bytes(bytes);
        self.registrar.write_bytes(bytes);
        self.referrer.write_bytes(bytes);
        self.referrer_percent.write_bytes(bytes);
        self.name.write_bytes(bytes);
        self.owner.write_bytes(bytes);
        self.active.write_bytes(bytes);
        self.options.write_bytes(bytes);
        self.extensions.write_bytes(bytes);
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct AccountUpdateOperation {
    pub fee: AssetAmount,
    pub account: ObjectId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<Authority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<Authority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_options: Option<AccountOptions>,
    pub extensions: Extensions,
}

impl ToBytes for AccountUpdateOperation {
    fn write_bytes(&self, bytes: &mut Vec<u8>) {
        self.fee.write_bytes(bytes);
        self.account.write_bytes(bytes);
        self.owner.write_bytes(bytes);
        self.active.write_bytes(bytes);
        self.new_options.write_bytes(bytes);
        self.extensions.write_bytes(bytes);
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct AssetCreateOperation {
    pub fee: AssetAmount,
    pub issuer: ObjectId,
    pub symbol: String,
    pub precision: u8,
    pub common_options: AssetOptions,
    pub is_prediction_market: bool,
    pub extensions: Extensions,
}

impl ToBytes for AssetCreateOperation {
    fn write_bytes(&self, bytes: &mut Vec<u8>) {
        self.fee.write_bytes(bytes);
        self.issuer.write_bytes(bytes);
        self.symbol.write_bytes(bytes);
        self.precision.write_bytes(bytes);
        self.common_options.write_bytes(bytes);
        // bitasset_opts
        bytes.push(0);
        self.is_prediction_market.write_bytes(bytes);
        self.extensions.write_bytes(bytes);
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct AssetIssueOperation {
    pub fee: AssetAmount,
    pub issuer: ObjectId,
    pub asset_to_issue: AssetAmount,
    pub issue_to_account: ObjectId,
    pub extensions: Extensions,
}

impl ToBytes for AssetIssueOperation {
    fn write_bytes(&self, bytes: &mut Vec<u8>) {
        self.fee.write_bytes(bytes);
        self.issuer.write_bytes(bytes);
        self.asset_to_issue.write_bytes(bytes);
        self.issue_to_account.write_bytes(bytes);
        // memo
        bytes.push(0);
        self.extensions.write_bytes(bytes);
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ContractCreateOperation {
    pub fee: AssetAmount,
    pub registrar: ObjectId,
    pub value: AssetAmount,
    /// Hex-encoded bytecode followed by ABI-encoded constructor arguments.
    pub code: String,
    pub eth_accuracy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supported_asset_id: Option<ObjectId>,
    pub extensions: Extensions,
}

impl ToBytes for ContractCreateOperation {
    fn write_bytes(&self, bytes: &mut Vec<u8>) {
        self.fee.write_bytes(bytes);
        self.registrar.write_bytes(bytes);
        self.value.write_bytes(bytes);
        self.code.write_bytes(bytes);
        self.eth_accuracy.write_bytes(bytes);
        self.supported_asset_id.write_bytes(bytes);
        self.extensions.write_bytes(bytes);
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ContractCallOperation {
    pub fee: AssetAmount,
    pub registrar: ObjectId,
    pub value: AssetAmount,
    /// Hex-encoded ABI call data, see `abi::encode_call_hex`.
    pub code: String,
    pub callee: ObjectId,
    pub extensions: Extensions,
}

impl ContractCallOperation {
    pub fn new(registrar: ObjectId, callee: ObjectId, value: AssetAmount, code: String) -> Self {
        ContractCallOperation {
            fee: AssetAmount::zero(value.get_asset_id()),
            registrar,
            value,
            code,
            callee,
            extensions: Extensions,
        }
    }
}

impl ToBytes for ContractCallOperation {
    fn write_bytes(&self, bytes: &mut Vec<u8>) {
        self.fee.write_bytes(bytes);
        self.registrar.write_bytes(bytes);
        self.value.write_bytes(bytes);
        self.code.write_bytes(bytes);
        self.callee.write_bytes(bytes);
        self.extensions.write_bytes(bytes);
    }
}

/// An operation as carried by a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Transfer(TransferOperation),
    AccountCreate(AccountCreateOperation),
    AccountUpdate(AccountUpdateOperation),
    AssetCreate(AssetCreateOperation),
    AssetIssue(AssetIssueOperation),
    ContractCreate(ContractCreateOperation),
    ContractCall(ContractCallOperation),
}

// run `$action` against whichever operation body `$operation` holds
macro_rules! with_body {
    ($operation:expr, $body:ident => $action:expr) => {
        match $operation {
            Operation::Transfer($body) => $action,
            Operation::AccountCreate($body) => $action,
            Operation::AccountUpdate($body) => $action,
            Operation::AssetCreate($body) => $action,
            Operation::AssetIssue($body) => $action,
            Operation::ContractCreate($body) => $action,
            Operation::ContractCall($body) => $action,
        }
    };
}

macro_rules! operation_from_body {
    ($($variant:ident($body:ty)),*) => {
        $(
            impl From<$body> for Operation {
                fn from(body: $body) -> Self {
                    Operation::$variant(body)
                }
            }
        )*
    };
}

operation_from_body!(
    Transfer(TransferOperation),
    AccountCreate(AccountCreateOperation),
    AccountUpdate(AccountUpdateOperation),
    AssetCreate(AssetCreateOperation),
    AssetIssue(AssetIssueOperation),
    ContractCreate(ContractCreateOperation),
    ContractCall(ContractCallOperation)
);

impl Operation {
    pub fn get_operation_type(&self) -> OperationType {
        match self {
            Operation::Transfer(_) => OperationType::Transfer,
            Operation::AccountCreate(_) => OperationType::AccountCreate,
            Operation::AccountUpdate(_) => OperationType::AccountUpdate,
            Operation::AssetCreate(_) => OperationType::AssetCreate,
            Operation::AssetIssue(_) => OperationType::AssetIssue,
            Operation::ContractCreate(_) => OperationType::ContractCreate,
            Operation::ContractCall(_) => OperationType::ContractCall,
        }
    }

    pub fn get_fee(&self) -> &AssetAmount {
        with_body!(self, body => &body.fee)
    }

    pub fn set_fee(&mut self, fee: AssetAmount) {
        with_body!(self, body => body.fee = fee)
    }
}

impl ToBytes for Operation {
    fn write_bytes(&self, bytes: &mut Vec<u8>) {
        bytes.push(self.get_operation_type() as u8);
        with_body!(self, body => body.write_bytes(bytes))
    }
}

impl Serialize for Operation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let type_id = self.get_operation_type() as u8;
        with_body!(self, body => (type_id, body).serialize(serializer))
    }
}
