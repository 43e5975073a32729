//! Local account key signer

use std::time::Duration;

use ethers::signers::{LocalWallet, Signer};
use ethers::types::Address;
use log::debug;
use sealed_compare_core::{DecryptionAuthorization, Eip712Domain, SignedAuthorization};

use crate::capability::WalletSigner;
use crate::error::{ClientError, Result};
use crate::ledger::{SignedTransaction, Transaction};

/// How the simulated account holder answers signature requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Approval {
    /// Sign immediately
    Approve,

    /// Refuse every request
    Reject,

    /// Sign after a delay
    Delay(Duration),
}

/// Wallet backed by an in-memory secp256k1 key
#[derive(Debug, Clone)]
pub struct LocalWalletSigner {
    wallet: LocalWallet,
    approval: Approval,
}

impl LocalWalletSigner {
    /// Wallet that approves every request
    pub fn new(wallet: LocalWallet) -> Self {
        Self::with_approval(wallet, Approval::Approve)
    }

    /// Wallet with a fresh random key
    pub fn random() -> Self {
        Self::new(LocalWallet::new(&mut rand::thread_rng()))
    }

    /// Wallet with a given approval behavior
    pub fn with_approval(wallet: LocalWallet, approval: Approval) -> Self {
        LocalWalletSigner { wallet, approval }
    }

    async fn approve(&self, what: &str) -> Result<()> {
        match self.approval {
            Approval::Approve => Ok(()),
            Approval::Reject => Err(ClientError::Rejected(format!("user denied {}", what))),
            Approval::Delay(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }
}

impl WalletSigner for LocalWalletSigner {
    fn address(&self) -> Address {
        self.wallet.address()
    }

    async fn sign_authorization(
        &self,
        authorization: DecryptionAuthorization,
        domain: &Eip712Domain,
    ) -> Result<SignedAuthorization> {
        self.approve("decryption authorization").await?;
        debug!("Signing decryption authorization for {:?}", self.wallet.address());
        Ok(authorization.sign(domain, &self.wallet)?)
    }

    async fn sign_transaction(&self, transaction: Transaction) -> Result<SignedTransaction> {
        self.approve(transaction.name()).await?;
        SignedTransaction::sign(transaction, &self.wallet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use sealed_compare_core::config::DisclosureConfig;

    fn domain() -> Eip712Domain {
        Eip712Domain::from_config(&DisclosureConfig::default(), 31_337)
    }

    #[tokio::test]
    async fn test_signs_authorization() {
        let signer = LocalWalletSigner::random();
        let auth = DecryptionAuthorization::new([5; 32], vec![Address::repeat_byte(1)], 100, 1);

        let signed = signer.sign_authorization(auth, &domain()).await.unwrap();
        assert_eq!(signed.signer, signer.address());
        assert_eq!(signed.recover_signer(&domain()).unwrap(), signer.address());
    }

    #[tokio::test]
    async fn test_rejecting_wallet() {
        let wallet = LocalWallet::new(&mut rand::thread_rng());
        let signer = LocalWalletSigner::with_approval(wallet, Approval::Reject);

        let err = signer
            .sign_transaction(Transaction::EndGame { game_id: 0 })
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Rejected(msg) if msg.contains("end_game")));
    }

    #[tokio::test]
    async fn test_transaction_signature_recovers() {
        let signer = LocalWalletSigner::random();
        let signed = signer
            .sign_transaction(Transaction::EndGame { game_id: 4 })
            .await
            .unwrap();

        assert_eq!(signed.sender, signer.address());
        assert_eq!(signed.recover_sender().unwrap(), signer.address());
    }
}
