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
use crate::validation::FieldErrors;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::response::IntoResponse;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// A JSON body. Fields of the wrong type are reported under their own key.
pub struct Json<T>(pub T);

impl<T, S> FromRequest<S> for Json<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApplicationError;

    async fn from_request(request: Request, state: &S) -> Result<Self> {
        let axum::Json(value) = axum::Json::<Value>::from_request(request, state).await?;

        match T::deserialize(&value) {
            Ok(inner) => Ok(Self(inner)),
            Err(error) => Err(rejected_fields::<T>(&value)
                .map(ApplicationError::Validation)
                .unwrap_or_else(|| ApplicationError::BadRequest(error.to_string()))),
        }
    }
}

/// Deserializes every key of an object body on its own and collects the failing ones.
fn rejected_fields<T>(value: &Value) -> Option<FieldErrors>
where
    T: DeserializeOwned,
{
    let mut errors = FieldErrors::new();
    for (key, field) in value.as_object()? {
        let single = Value::Object(Map::from_iter([(key.clone(), field.clone())]));
        if let Err(error) = T::deserialize(&single) {
            errors.add(key, error.to_string());
        }
    }

    (!errors.is_empty()).then_some(errors)
}

impl<T> IntoResponse for Json<T>
where
    T: Serialize,
{
    fn into_response(self) -> axum::response::Response {
        axum::Json(self.0).into_response()
    }
}

impl From<JsonRejection> for ApplicationError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApplicationError))]
pub struct Query<T>(pub T);

impl From<QueryRejection> for ApplicationError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// Path parameters. Values which do not parse address no record.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApplicationError))]
pub struct Path<T>(pub T);

impl From<PathRejection> for ApplicationError {
    fn from(rejection: PathRejection) -> Self {
        debug!("Rejected path parameters: {}", rejection.body_text());
        Self::NotFound
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct Payload {
        title: Option<String>,
        project: Option<i64>,
    }

    fn rejection(body: Value) -> Option<FieldErrors> {
        rejected_fields::<Payload>(&body)
    }

    #[test]
    fn test_rejected_fields() {
        let errors = rejection(json!({ "title": 5, "project": "x" })).unwrap();
        assert!(errors.get("title").is_some());
        assert!(errors.get("project").is_some());

        let errors = rejection(json!({ "title": "Report", "project": [] })).unwrap();
        assert!(errors.get("title").is_none());
        assert!(errors.get("project").is_some());

        // no object, no field to blame
        assert!(rejection(json!([1, 2])).is_none());
    }
}
