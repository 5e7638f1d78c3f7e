use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "conservatory";

pub struct CredentialStore;

impl CredentialStore {
    /// Store an administrator password in the OS keychain
    pub fn store(email: &str, password: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, email).context("Failed to create keyring entry")?;
        entry
            .set_password(password)
            .context("Failed to store password in keychain")?;
        Ok(())
    }

    pub fn get_password(email: &str) -> Result<String> {
        let entry = Entry::new(SERVICE_NAME, email).context("Failed to create keyring entry")?;
        entry
            .get_password()
            .context("Failed to retrieve password from keychain")
    }

    /// Forget the stored password; a missing entry is not an error.
    pub fn delete(email: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, email).context("Failed to create keyring entry")?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete credential from keychain"),
        }
    }
}
