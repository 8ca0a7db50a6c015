// SPDX-FileCopyrightText: 2026 BookZone Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authentication adapter trait for the external identity collaborator.

use async_trait::async_trait;

use crate::error::BookzoneError;
use crate::traits::adapter::PluginAdapter;
use crate::types::Identity;

/// Resolves caller credentials to a verified [`Identity`].
#[async_trait]
pub trait AuthAdapter: PluginAdapter {
    /// Authenticates a bearer token. Unknown tokens yield [`BookzoneError::Forbidden`].
    async fn authenticate(&self, token: &str) -> Result<Identity, BookzoneError>;
}
