//! Positional parameter shapes and per-position decoding.

use std::any::type_name;
use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tandem_wire::RpcError;

/// Declared parameter types of a registered handler, in position order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamShape {
    types: Vec<&'static str>,
}

impl ParamShape {
    /// Builds a shape from per-position type names.
    #[must_use]
    pub const fn new(types: Vec<&'static str>) -> Self {
        Self { types }
    }

    /// Number of positional parameters.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.types.len()
    }

    /// Type name expected at each position.
    #[must_use]
    pub fn types(&self) -> &[&'static str] {
        &self.types
    }

    /// Rejects a parameter list whose length differs from the arity.
    ///
    /// # Errors
    ///
    /// Returns an invalid params error naming both counts.
    pub fn check_arity(&self, params: &[Value]) -> Result<(), RpcError> {
        if params.len() == self.arity() {
            return Ok(());
        }
        Err(RpcError::invalid_params(format!(
            "expected {} arguments {self}, got {}",
            self.arity(),
            params.len()
        )))
    }
}

impl fmt::Display for ParamShape {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "({})", self.types.join(", "))
    }
}

/// Hands out positional parameters one at a time, decoding each into the
/// type its handler declares.
pub(crate) struct ParamCursor {
    values: std::vec::IntoIter<Value>,
    position: usize,
}

impl ParamCursor {
    pub(crate) fn new(params: Vec<Value>) -> Self {
        Self {
            values: params.into_iter(),
            position: 0,
        }
    }

    pub(crate) fn take<T: DeserializeOwned>(&mut self) -> Result<T, RpcError> {
        let position = self.position;
        self.position += 1;
        let value = self.values.next().ok_or_else(|| {
            RpcError::invalid_params(format!(
                "missing argument {position} ({})",
                type_name::<T>()
            ))
        })?;
        serde_json::from_value(value).map_err(|error| {
            RpcError::invalid_params(format!(
                "argument {position} is not a valid {}: {error}",
                type_name::<T>()
            ))
        })
    }

    pub(crate) fn finish(&mut self) -> Result<(), RpcError> {
        let surplus = self.values.len();
        if surplus == 0 {
            return Ok(());
        }
        Err(RpcError::invalid_params(format!(
            "{surplus} unexpected trailing arguments"
        )))
    }
}
