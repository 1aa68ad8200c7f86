//! Typed access to a deployed Trato escrow contract

use super::artifact::CompiledArtifact;
use super::invoker::ContractInvoker;
use crate::account::Account;
use crate::chain::Receipt;
use crate::error::{ClientError, ClientResult};

use ethers::abi::{ParamType, Token};
use ethers::types::{Address, U256};
use std::sync::Arc;
use tracing::info;

/// A member's share and signature state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub percent: U256,
    pub signed: bool,
}

pub struct TratoContract {
    address: Address,
    artifact: Arc<CompiledArtifact>,
    invoker: Arc<ContractInvoker>,
}

impl TratoContract {
    pub fn new(
        address: Address,
        artifact: Arc<CompiledArtifact>,
        invoker: Arc<ContractInvoker>,
    ) -> Self {
        Self {
            address,
            artifact,
            invoker,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    // Writes

    pub async fn register_member(
        &self,
        owner: &Account,
        member: Address,
        percent: U256,
    ) -> ClientResult<Receipt> {
        self.write(
            owner,
            "registerMember",
            vec![Token::Address(member), Token::Uint(percent)],
        )
        .await
    }

    /// Signed by the member itself
    pub async fn sign(&self, member: &Account) -> ClientResult<Receipt> {
        self.write(member, "sign", vec![Token::Address(member.address())])
            .await
    }

    pub async fn create_event(&self, owner: &Account, name: &str) -> ClientResult<Receipt> {
        let name = self.text_arg("createEvent", 0, name)?;
        self.write(owner, "createEvent", vec![name]).await
    }

    pub async fn execute_event(&self, owner: &Account) -> ClientResult<Receipt> {
        self.write(owner, "executeEvent", vec![]).await
    }

    pub async fn refund(&self, owner: &Account) -> ClientResult<Receipt> {
        self.write(owner, "refund", vec![]).await
    }

    pub async fn create_clause(
        &self,
        owner: &Account,
        kind: &str,
        name: &str,
        on_all: bool,
    ) -> ClientResult<Receipt> {
        let args = vec![
            self.text_arg("createClause", 0, kind)?,
            self.text_arg("createClause", 1, name)?,
            Token::Bool(on_all),
        ];
        self.write(owner, "createClause", args).await
    }

    pub async fn set_clause_pay(
        &self,
        owner: &Account,
        clause: U256,
        amount: U256,
        beneficiary: Address,
    ) -> ClientResult<Receipt> {
        self.write(
            owner,
            "setClausePay",
            vec![
                Token::Uint(clause),
                Token::Uint(amount),
                Token::Address(beneficiary),
            ],
        )
        .await
    }

    pub async fn add_condition(
        &self,
        owner: &Account,
        clause: U256,
        member: Address,
        id: &str,
    ) -> ClientResult<Receipt> {
        let args = vec![
            Token::Uint(clause),
            Token::Address(member),
            self.text_arg("addCondition", 2, id)?,
        ];
        self.write(owner, "addCondition", args).await
    }

    pub async fn set_on_all(&self, owner: &Account, flag: bool) -> ClientResult<Receipt> {
        self.write(owner, "setOnAll", vec![Token::Bool(flag)]).await
    }

    pub async fn execute_condition(
        &self,
        owner: &Account,
        clause: U256,
        condition: U256,
    ) -> ClientResult<Receipt> {
        self.write(
            owner,
            "executeCondition",
            vec![Token::Uint(clause), Token::Uint(condition)],
        )
        .await
    }

    pub async fn set_end(
        &self,
        owner: &Account,
        quantity: U256,
        unit: &str,
    ) -> ClientResult<Receipt> {
        let args = vec![Token::Uint(quantity), self.text_arg("setEnd", 1, unit)?];
        self.write(owner, "setEnd", args).await
    }

    pub async fn set_lapseds(
        &self,
        owner: &Account,
        laps: &[U256],
        every: U256,
        unit: &str,
    ) -> ClientResult<Receipt> {
        let args = vec![
            Token::Array(laps.iter().copied().map(Token::Uint).collect()),
            Token::Uint(every),
            self.text_arg("setLapseds", 2, unit)?,
        ];
        self.write(owner, "setLapseds", args).await
    }

    pub async fn dispersions(&self, owner: &Account) -> ClientResult<Receipt> {
        self.write(owner, "dispersions", vec![]).await
    }

    // Reads

    /// Contract type label with trailing zero padding removed
    pub async fn type_contract(&self) -> ClientResult<String> {
        match self.read_one("typeContract", vec![]).await? {
            Token::FixedBytes(bytes) | Token::Bytes(bytes) => Ok(ascii_from_padded(&bytes)),
            Token::String(text) => Ok(text),
            other => Err(unexpected("typeContract", &other)),
        }
    }

    pub async fn investor(&self) -> ClientResult<Address> {
        match self.read_one("getInvestor", vec![]).await? {
            Token::Address(address) => Ok(address),
            other => Err(unexpected("getInvestor", &other)),
        }
    }

    pub async fn member(&self, member: Address) -> ClientResult<Member> {
        let tokens = self.read("getMember", vec![Token::Address(member)]).await?;
        match tokens.as_slice() {
            [Token::Uint(percent), Token::Bool(signed)] => Ok(Member {
                percent: *percent,
                signed: *signed,
            }),
            _ => Err(ClientError::Abi(format!(
                "getMember returned {} values of unexpected types",
                tokens.len()
            ))),
        }
    }

    pub async fn start(&self) -> ClientResult<U256> {
        self.read_uint("getStart").await
    }

    pub async fn end(&self) -> ClientResult<U256> {
        self.read_uint("getEnd").await
    }

    pub async fn next_payment(&self) -> ClientResult<U256> {
        self.read_uint("getNextPayment").await
    }

    async fn write(&self, from: &Account, method: &str, args: Vec<Token>) -> ClientResult<Receipt> {
        let data = self.artifact.encode_call(method, &args)?;
        let receipt = self.invoker.invoke(self.address, data, from).await?;
        info!(
            "{}.{} by {:?} in {:?}",
            self.artifact.name,
            method,
            from.address(),
            receipt.transaction_hash
        );
        Ok(receipt)
    }

    async fn read(&self, method: &str, args: Vec<Token>) -> ClientResult<Vec<Token>> {
        let data = self.artifact.encode_call(method, &args)?;
        let output = self.invoker.query(self.address, data).await?;
        self.artifact.decode_output(method, &output)
    }

    async fn read_one(&self, method: &str, args: Vec<Token>) -> ClientResult<Token> {
        self.read(method, args)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::Abi(format!("{method} returned nothing")))
    }

    async fn read_uint(&self, method: &str) -> ClientResult<U256> {
        match self.read_one(method, vec![]).await? {
            Token::Uint(value) => Ok(value),
            other => Err(unexpected(method, &other)),
        }
    }

    /// Encode text for the declared type of input `index` of `method`
    fn text_arg(&self, method: &str, index: usize, text: &str) -> ClientResult<Token> {
        let function = self.artifact.function(method)?;
        let param = function.inputs.get(index).ok_or_else(|| {
            ClientError::Abi(format!("{method} has no input {index}"))
        })?;
        ascii_token(&param.kind, text)
            .map_err(|e| ClientError::Abi(format!("{method}.{}: {e}", param.name)))
    }
}

/// ASCII text as a `bytesN`, `bytes` or `string` argument
pub fn ascii_token(kind: &ParamType, text: &str) -> Result<Token, String> {
    if !text.is_ascii() {
        return Err(format!("{text:?} is not ASCII"));
    }
    match kind {
        ParamType::FixedBytes(size) => {
            if text.len() > *size {
                return Err(format!("{text:?} does not fit in bytes{size}"));
            }
            let mut padded = text.as_bytes().to_vec();
            padded.resize(*size, 0);
            Ok(Token::FixedBytes(padded))
        }
        ParamType::Bytes => Ok(Token::Bytes(text.as_bytes().to_vec())),
        ParamType::String => Ok(Token::String(text.to_string())),
        other => Err(format!("text cannot be encoded as {other}")),
    }
}

fn ascii_from_padded(bytes: &[u8]) -> String {
    let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

fn unexpected(method: &str, token: &Token) -> ClientError {
    ClientError::Abi(format!("{method} returned unexpected {token:?}"))
}
