//! Contracts: generation from templates and signature capture.

pub mod generate;
pub mod signature;

pub use generate::{contract_values, ContractGenerator, GeneratedContract, GeneratorOptions};
pub use signature::{sign_contract, Point, SignatureError, SignaturePad, DATA_URL_PREFIX};
