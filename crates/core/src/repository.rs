// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A repository: a directory's enclosing git checkout, when one exists.

use serde::{Deserialize, Serialize};

use crate::RepositoryId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub id: RepositoryId,
    pub name: String,
    pub remote_url: Option<String>,
    pub last_commit_sha: Option<String>,
    pub last_commit_message: Option<String>,
}
