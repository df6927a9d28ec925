// Randomized resource naming
// Account names are globally unique across the provider, so every session
// gets a fresh suffix to avoid collisions between repeated runs.

use rand::Rng;
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

use crate::types::ResourceNames;

const SUFFIX_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

static ACCOUNT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9-]{1,42}[a-z0-9]$").expect("valid regex"));

static RESOURCE_GROUP_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-\w._()]{1,90}$").expect("valid regex"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NamingError {
    #[error("invalid database account name '{name}': use 3-44 lowercase letters, digits or hyphens, not starting or ending with a hyphen")]
    InvalidAccountName { name: String },
    #[error("invalid resource group name '{name}': use up to 90 letters, digits, '-', '_', '.', '(' or ')', not ending with '.'")]
    InvalidResourceGroupName { name: String },
}

pub fn validate_account_name(name: &str) -> Result<(), NamingError> {
    if ACCOUNT_NAME.is_match(name) {
        Ok(())
    } else {
        Err(NamingError::InvalidAccountName {
            name: name.to_string(),
        })
    }
}

pub fn validate_resource_group_name(name: &str) -> Result<(), NamingError> {
    if RESOURCE_GROUP_NAME.is_match(name) && !name.ends_with('.') {
        Ok(())
    } else {
        Err(NamingError::InvalidResourceGroupName {
            name: name.to_string(),
        })
    }
}

/// Generates `<prefix><suffix>` names with a random lowercase alphanumeric suffix
#[derive(Debug, Clone)]
pub struct ResourceNameGenerator {
    resource_group_prefix: String,
    account_prefix: String,
    suffix_length: usize,
}

impl ResourceNameGenerator {
    pub fn new(resource_group_prefix: &str, account_prefix: &str, suffix_length: usize) -> Self {
        Self {
            resource_group_prefix: resource_group_prefix.to_string(),
            account_prefix: account_prefix.to_string(),
            suffix_length,
        }
    }

    pub fn generate(&self) -> Result<ResourceNames, NamingError> {
        let resource_group = format!("{}{}", self.resource_group_prefix, self.random_suffix());
        let account = format!("{}{}", self.account_prefix, self.random_suffix());

        validate_resource_group_name(&resource_group)?;
        validate_account_name(&account)?;

        Ok(ResourceNames {
            resource_group,
            account,
        })
    }

    fn random_suffix(&self) -> String {
        let mut rng = rand::rng();
        (0..self.suffix_length)
            .map(|_| SUFFIX_CHARSET[rng.random_range(0..SUFFIX_CHARSET.len())] as char)
            .collect()
    }
}

impl Default for ResourceNameGenerator {
    fn default() -> Self {
        Self::new("rg-cosmos-", "docdb", 10)
    }
}
