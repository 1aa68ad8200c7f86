//! Compiled contract artifacts and ABI encoding

use crate::error::{ClientError, ClientResult};

use ethers::abi::token::{LenientTokenizer, Tokenizer};
use ethers::abi::{Abi, Function, Token};
use ethers::types::Bytes;
use serde_json::Value;

/// Bytecode and ABI of one compiled contract
#[derive(Debug, Clone)]
pub struct CompiledArtifact {
    pub name: String,
    pub abi: Abi,
    pub bytecode: Bytes,
}

impl CompiledArtifact {
    /// Read `contracts[source][contract]` from solc standard-JSON output
    pub fn from_solc_output(json: &str, source: &str, contract: &str) -> ClientResult<Self> {
        let output: Value = serde_json::from_str(json)
            .map_err(|e| ClientError::Artifact(format!("compiler output is not JSON: {e}")))?;

        if let Some(errors) = output.get("errors").and_then(Value::as_array) {
            let fatal: Vec<&str> = errors
                .iter()
                .filter(|e| e.get("severity").and_then(Value::as_str) == Some("error"))
                .filter_map(|e| e.get("formattedMessage").or_else(|| e.get("message")))
                .filter_map(Value::as_str)
                .collect();
            if !fatal.is_empty() {
                return Err(ClientError::Artifact(fatal.join("\n")));
            }
        }

        let entry = output
            .get("contracts")
            .and_then(|c| c.get(source))
            .and_then(|s| s.get(contract))
            .ok_or_else(|| {
                ClientError::Artifact(format!("no contract {contract} in {source}"))
            })?;

        let abi = entry
            .get("abi")
            .ok_or_else(|| ClientError::Artifact(format!("{contract} has no abi")))?;
        let bytecode = entry
            .pointer("/evm/bytecode/object")
            .and_then(Value::as_str)
            .ok_or_else(|| ClientError::Artifact(format!("{contract} has no bytecode")))?;

        Self::build(contract, abi.clone(), bytecode)
    }

    /// Build from a JSON ABI and hex bytecode (with or without `0x`)
    pub fn from_parts(name: &str, abi_json: &str, bytecode_hex: &str) -> ClientResult<Self> {
        let abi: Value = serde_json::from_str(abi_json)
            .map_err(|e| ClientError::Artifact(format!("abi is not JSON: {e}")))?;
        Self::build(name, abi, bytecode_hex)
    }

    fn build(name: &str, abi: Value, bytecode_hex: &str) -> ClientResult<Self> {
        let abi: Abi = serde_json::from_value(abi)
            .map_err(|e| ClientError::Artifact(format!("invalid abi for {name}: {e}")))?;

        let hex_code = bytecode_hex.trim().trim_start_matches("0x");
        if hex_code.is_empty() {
            return Err(ClientError::Artifact(format!(
                "{name} has empty bytecode (abstract contract or interface?)"
            )));
        }
        let bytecode = hex::decode(hex_code).map_err(|e| {
            ClientError::Artifact(format!("{name} bytecode is not hex (unlinked library?): {e}"))
        })?;

        Ok(Self {
            name: name.to_string(),
            abi,
            bytecode: Bytes::from(bytecode),
        })
    }

    /// Creation data: bytecode followed by encoded constructor arguments
    pub fn deploy_data(&self, args: &[Token]) -> ClientResult<Bytes> {
        match self.abi.constructor() {
            Some(constructor) => constructor
                .encode_input(self.bytecode.to_vec(), args)
                .map(Bytes::from)
                .map_err(|e| ClientError::Abi(format!("{} constructor: {e}", self.name))),
            None if args.is_empty() => Ok(self.bytecode.clone()),
            None => Err(ClientError::Abi(format!(
                "{} has no constructor but {} arguments were given",
                self.name,
                args.len()
            ))),
        }
    }

    /// Parse textual constructor arguments against the constructor's types
    pub fn tokenize_constructor_args(&self, args: &[String]) -> ClientResult<Vec<Token>> {
        let inputs = self
            .abi
            .constructor()
            .map(|c| c.inputs.as_slice())
            .unwrap_or_default();
        if inputs.len() != args.len() {
            return Err(ClientError::Abi(format!(
                "{} constructor takes {} arguments, got {}",
                self.name,
                inputs.len(),
                args.len()
            )));
        }

        inputs
            .iter()
            .zip(args)
            .map(|(param, value)| {
                LenientTokenizer::tokenize(&param.kind, value)
                    .map_err(|e| ClientError::Abi(format!("argument {}: {e}", param.name)))
            })
            .collect()
    }

    pub fn function(&self, method: &str) -> ClientResult<&Function> {
        self.abi
            .function(method)
            .map_err(|_| ClientError::Abi(format!("{} has no method {method}", self.name)))
    }

    /// Selector plus encoded arguments
    pub fn encode_call(&self, method: &str, args: &[Token]) -> ClientResult<Bytes> {
        self.function(method)?
            .encode_input(args)
            .map(Bytes::from)
            .map_err(|e| ClientError::Abi(format!("{}.{method}: {e}", self.name)))
    }

    pub fn decode_output(&self, method: &str, output: &[u8]) -> ClientResult<Vec<Token>> {
        self.function(method)?
            .decode_output(output)
            .map_err(|e| ClientError::Abi(format!("{}.{method} output: {e}", self.name)))
    }
}
