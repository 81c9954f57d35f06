// Copyright 2025 itscheems
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! API credentials and wallet identities
//!
//! Both records are owned by the account component; the gate only reads them.
//! An API credential is immutable once issued and revoked by deletion.

use std::{fmt, path::Path};

use anyhow::{Context, Result};
use dashmap::{DashMap, mapref::entry::Entry};
use keystone_sdk::WalletAddress;
use serde::Deserialize;
use tracing::info;

/// API key and its shared HMAC secret
#[derive(Clone, PartialEq, Eq)]
pub struct ApiCredential {
	pub api_key: String,
	pub api_secret: Vec<u8>,
	pub owner_account_id: String,
}

impl fmt::Debug for ApiCredential {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ApiCredential")
			.field("api_key", &self.api_key)
			.field("api_secret", &"<redacted>")
			.field("owner_account_id", &self.owner_account_id)
			.finish()
	}
}

/// The wallet authorized to sign intents for an account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletIdentity {
	pub account_id: String,
	pub wallet_address: WalletAddress,
}

/// Read access to credential and wallet records
///
/// Implementations must be fast (in-memory or an indexed read): lookups run
/// on the request path for every mutating call.
pub trait CredentialStore: Send + Sync {
	fn api_credential(&self, api_key: &str) -> Option<ApiCredential>;

	fn wallet_identity(&self, account_id: &str) -> Option<WalletIdentity>;
}

/// In-memory credential store
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
	credentials: DashMap<String, ApiCredential>,
	wallets: DashMap<String, WalletIdentity>,
}

/// Account entry of a seed file
#[derive(Debug, Deserialize)]
struct SeedAccount {
	account_id: String,
	api_key: String,
	api_secret: String,
	wallet_address: WalletAddress,
}

impl MemoryCredentialStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Issue a credential. Returns `false` if the key is already taken.
	pub fn issue(&self, credential: ApiCredential) -> bool {
		match self.credentials.entry(credential.api_key.clone()) {
			Entry::Occupied(_) => false,
			Entry::Vacant(slot) => {
				slot.insert(credential);
				true
			}
		}
	}

	pub fn revoke(&self, api_key: &str) -> bool {
		self.credentials.remove(api_key).is_some()
	}

	pub fn register_wallet(&self, identity: WalletIdentity) {
		self.wallets.insert(identity.account_id.clone(), identity);
	}

	pub fn len(&self) -> usize {
		self.credentials.len()
	}

	pub fn is_empty(&self) -> bool {
		self.credentials.is_empty()
	}

	/// Load accounts from a JSON seed file:
	///
	/// ```json
	/// [{"account_id": "acc-1", "api_key": "k", "api_secret": "s", "wallet_address": "0x..."}]
	/// ```
	pub fn from_seed_file(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let content = std::fs::read_to_string(path)
			.with_context(|| format!("Failed to read credentials file: {}", path.display()))?;
		let accounts: Vec<SeedAccount> = serde_json::from_str(&content)
			.with_context(|| format!("Invalid credentials file: {}", path.display()))?;

		let store = Self::new();
		for account in accounts {
			let issued = store.issue(ApiCredential {
				api_key: account.api_key.clone(),
				api_secret: account.api_secret.into_bytes(),
				owner_account_id: account.account_id.clone(),
			});
			if !issued {
				anyhow::bail!("Duplicate API key in credentials file: {}", account.api_key);
			}
			store.register_wallet(WalletIdentity {
				account_id: account.account_id,
				wallet_address: account.wallet_address,
			});
		}

		info!(
			target: "server",
			"Loaded {} API credentials from {}",
			store.len(),
			path.display()
		);
		Ok(store)
	}
}

impl CredentialStore for MemoryCredentialStore {
	fn api_credential(&self, api_key: &str) -> Option<ApiCredential> {
		self.credentials.get(api_key).map(|entry| entry.value().clone())
	}

	fn wallet_identity(&self, account_id: &str) -> Option<WalletIdentity> {
		self.wallets.get(account_id).map(|entry| entry.value().clone())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn credential(api_key: &str, account: &str) -> ApiCredential {
		ApiCredential {
			api_key: api_key.to_string(),
			api_secret: b"top-secret".to_vec(),
			owner_account_id: account.to_string(),
		}
	}

	#[test]
	fn test_issue_and_lookup() {
		let store = MemoryCredentialStore::new();
		assert!(store.issue(credential("key-1", "acc-1")));
		assert_eq!(
			store.api_credential("key-1").map(|c| c.owner_account_id),
			Some("acc-1".to_string())
		);
		assert!(store.api_credential("key-2").is_none());
	}

	#[test]
	fn test_issued_credentials_are_immutable() {
		let store = MemoryCredentialStore::new();
		assert!(store.issue(credential("key-1", "acc-1")));
		assert!(!store.issue(credential("key-1", "acc-2")));
		assert_eq!(
			store.api_credential("key-1").unwrap().owner_account_id,
			"acc-1"
		);
	}

	#[test]
	fn test_revoke() {
		let store = MemoryCredentialStore::new();
		store.issue(credential("key-1", "acc-1"));
		assert!(store.revoke("key-1"));
		assert!(!store.revoke("key-1"));
		assert!(store.api_credential("key-1").is_none());
	}

	#[test]
	fn test_debug_redacts_secret() {
		let rendered = format!("{:?}", credential("key-1", "acc-1"));
		assert!(rendered.contains("<redacted>"));
		assert!(!rendered.contains("top-secret"));
	}

	#[test]
	fn test_seed_file() {
		let path = std::env::temp_dir().join(format!(
			"keystone-credentials-{}.json",
			std::process::id()
		));
		std::fs::write(
			&path,
			r#"[{"account_id":"acc-1","api_key":"key-1","api_secret":"s1",
			"wallet_address":"0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"}]"#,
		)
		.unwrap();

		let store = MemoryCredentialStore::from_seed_file(&path).unwrap();
		std::fs::remove_file(&path).ok();

		assert_eq!(store.len(), 1);
		assert_eq!(store.api_credential("key-1").unwrap().api_secret, b"s1");
		assert_eq!(
			store.wallet_identity("acc-1").unwrap().wallet_address,
			"0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
				.parse::<WalletAddress>()
				.unwrap()
		);
	}
}
