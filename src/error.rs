// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fmt;

/// Errors produced while building a parser, parsing a query string, or
/// rendering a query tree into a target dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Malformed input: unclosed parens, dangling operators, mixed
    /// AND/OR at one nesting level, a negated OR operand, a nested field,
    /// an empty result, etc.
    Parse { input: String, message: String },
    /// Unknown field under strict mode, a validator rejection, or a
    /// malformed range.
    Field {
        input: String,
        field: String,
        detail: String,
    },
    /// Dialect-specific constraint violated at render time (e.g. a
    /// non-numeric SWISH range).
    Dialect { message: String },
    /// Malformed field registry or unknown dialect id at construction.
    Config { message: String },
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::Parse { input, message } => write!(f, "[{}] : {}", input, message),
            QueryError::Field {
                input,
                field,
                detail,
            } => write!(
                f,
                "[{}] : Invalid field value for {}: {}",
                input, field, detail
            ),
            QueryError::Dialect { message } => write!(f, "{}", message),
            QueryError::Config { message } => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for QueryError {}

impl From<fmt::Error> for QueryError {
    fn from(e: fmt::Error) -> Self {
        QueryError::Dialect {
            message: e.to_string(),
        }
    }
}

impl QueryError {
    pub fn parse(input: impl Into<String>, message: impl Into<String>) -> Self {
        QueryError::Parse {
            input: input.into(),
            message: message.into(),
        }
    }

    pub fn field(
        input: impl Into<String>,
        field: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        QueryError::Field {
            input: input.into(),
            field: field.into(),
            detail: detail.into(),
        }
    }

    pub fn dialect(message: impl Into<String>) -> Self {
        QueryError::Dialect {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        QueryError::Config {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;
