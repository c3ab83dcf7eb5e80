use crate::*;
use serde::Serialize;
use std::sync::Arc;

/// One control component node: the three engines over shared keys, stores and card locks.
pub struct ReturnCodesNode {
    config: NodeConfig,
    generation: GenerationEngine,
    decryption: DecryptionEngine,
    exponentiation: ExponentiationEngine,
}

impl ReturnCodesNode {
    pub fn new<S>(config: NodeConfig, keys: Arc<dyn KeyManager>, store: Arc<S>) -> Self
    where
        S: CorrectnessInfoStore + VerificationCardStore + VerificationCardPublicKeyStore + 'static,
    {
        let proofs = Arc::new(SigmaProofService::default());
        let locks = Arc::new(CardLocks::new());

        let generation = GenerationEngine::new(
            keys.clone(),
            store.clone(),
            store.clone(),
            proofs.clone(),
            config.node_id,
        );
        let decryption = DecryptionEngine::new(
            keys.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            proofs.clone(),
            locks.clone(),
            config.node_id,
        );
        let exponentiation = ExponentiationEngine::new(
            keys,
            store.clone(),
            store,
            proofs,
            Sha256HashService,
            locks,
            config.node_id,
            config.max_confirmation_attempts,
        );

        ReturnCodesNode {
            config,
            generation,
            decryption,
            exponentiation,
        }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Process one framed message of the given kind.
    ///
    /// The reply is framed in the encoding of the request. A rejected request is
    /// logged and produces no reply. A frame that does not decode is an error.
    pub fn handle(
        &self,
        kind: MessageKind,
        frame: &[u8],
    ) -> Result<Option<Vec<u8>>, ProcessingError> {
        debug!("{} message received, {} bytes", kind, frame.len());

        match kind {
            MessageKind::Generation => {
                let (encoding, request): (Encoding, GenerationRequest) = decode_message(frame)?;
                let outcome = self.generation.process(&request)?;
                reply(kind, encoding, outcome)
            }
            MessageKind::Decryption => {
                let (encoding, request): (Encoding, ComputationRequest) = decode_message(frame)?;
                let outcome = self.decryption.process(&request)?;
                reply(kind, encoding, outcome)
            }
            MessageKind::Exponentiation => {
                let (encoding, request): (Encoding, ComputationRequest) = decode_message(frame)?;
                let outcome = self.exponentiation.process(&request)?;
                reply(kind, encoding, outcome)
            }
        }
    }
}

fn reply<T: Serialize>(
    kind: MessageKind,
    encoding: Encoding,
    outcome: Outcome<T>,
) -> Result<Option<Vec<u8>>, ProcessingError> {
    match outcome {
        Outcome::Completed(response) => Ok(Some(encode_message(encoding, &response)?)),
        Outcome::Rejected(reason) => {
            warn!("{} message rejected, no reply sent: {}", kind, reason);
            Ok(None)
        }
    }
}
