// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A tracked working directory, optionally belonging to a repository.

use serde::{Deserialize, Serialize};

use crate::{DirectoryId, RepositoryId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Directory {
    pub id: DirectoryId,
    pub path: String,
    pub repository_id: Option<RepositoryId>,
}
