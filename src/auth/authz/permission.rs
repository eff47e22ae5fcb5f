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

use crate::prelude::*;

/// What a route requires from the owner of the presented token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Authenticated,
    Staff,
}

impl Permission {
    /// Maps a failed authentication to the response of routes requiring this permission.
    /// Staff routes answer every unauthenticated request with 403.
    pub fn reject(&self, error: ApplicationError) -> ApplicationError {
        match self {
            Permission::Staff if error.is_authentication() => {
                ApplicationError::Forbidden(PERMISSION_DENIED.to_owned())
            }
            _ => error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reject() {
        assert!(matches!(
            Permission::Authenticated.reject(ApplicationError::Unauthorized),
            ApplicationError::Unauthorized
        ));
        assert!(matches!(
            Permission::Staff.reject(ApplicationError::InvalidToken),
            ApplicationError::Forbidden(_)
        ));
        assert!(matches!(
            Permission::Staff.reject(ApplicationError::Unauthorized),
            ApplicationError::Forbidden(_)
        ));
        assert!(matches!(
            Permission::Staff.reject(ApplicationError::InternalServerError),
            ApplicationError::InternalServerError
        ));
    }
}
