/*
 *     Copyright (C) 2023  Fritz Ochsmann
 *
 *     This program is free software: you can redistribute it and/or modify
 *     it under the terms of the GNU Affero General Public License as published
 *     by the Free Software Foundation, either version 3 of the License, or
 *     (at your option) any later version.
 *
 *     This program is distributed in the hope that it will be useful,
 *     but WITHOUT ANY WARRANTY; without even the implied warranty of
 *     MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *     GNU Affero General Public License for more details.
 *
 *     You should have received a copy of the GNU Affero General Public License
 *     along with this program.  If not, see <http://www.gnu.org/licenses/>.
 */

use crate::database::definitions::account::Account;
use crate::prelude::*;
use sqlx::{QueryBuilder, Sqlite};

pub mod permission;

pub trait Authorize {
    fn has_permission(&self, permission: &Permission) -> Result<()>;
}

impl Authorize for Account {
    #[instrument(skip(self), fields(account = self.id()))]
    fn has_permission(&self, permission: &Permission) -> Result<()> {
        let granted = match permission {
            Permission::Authenticated => *self.is_active(),
            Permission::Staff => *self.is_active() && *self.is_staff(),
        };

        if granted {
            Ok(())
        } else {
            Err(ApplicationError::Forbidden(PERMISSION_DENIED.to_owned()))
        }
    }
}

/// The set of records a request may see and modify.
///
/// User routes always work on [Scope::Owned], even if the caller is staff. Only the admin
/// routes hand out [Scope::Unrestricted].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Owned(i64),
    Unrestricted,
}

impl Scope {
    pub fn owned_by(account: &Account) -> Self {
        Scope::Owned(*account.id())
    }

    pub fn staff(account: &Account) -> Result<Self> {
        account.has_permission(&Permission::Staff)?;
        Ok(Scope::Unrestricted)
    }

    /// Appends the ownership condition to a query ending in a `WHERE` clause.
    pub fn restrict(&self, query: &mut QueryBuilder<'_, Sqlite>, column: &str) {
        if let Scope::Owned(owner) = self {
            query.push(" AND ").push(column).push(" = ").push_bind(*owner);
        }
    }

    pub fn permits(&self, owner: i64) -> bool {
        match self {
            Scope::Owned(id) => *id == owner,
            Scope::Unrestricted => true,
        }
    }
}
