use std::collections::BTreeMap;

use crate::Scalar;

/// Header map carried by the configuration layers.
pub type Headers = BTreeMap<String, Scalar>;

/// Path parameter container for `{name}` / `{0}` URL templates.
#[derive(Clone, Debug, PartialEq)]
pub enum Params {
    /// Positional values; value `i` replaces the `{i}` token.
    Positional(Vec<Scalar>),
    /// Named values in insertion order; replaces `{name}` tokens.
    Named(Vec<(String, Scalar)>),
}

impl Params {
    /// Builds positional parameters.
    pub fn positional(values: impl Into<Vec<Scalar>>) -> Self {
        Self::Positional(values.into())
    }

    /// Builds named parameters.
    pub fn named<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Scalar>,
    {
        Self::Named(
            pairs
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }

    /// Iterates `(key, value)` pairs in substitution order.
    ///
    /// Positional keys are their indices rendered as decimal strings.
    pub fn entries(&self) -> Vec<(String, &Scalar)> {
        match self {
            Self::Positional(values) => values
                .iter()
                .enumerate()
                .map(|(index, value)| (index.to_string(), value))
                .collect(),
            Self::Named(values) => values
                .iter()
                .map(|(name, value)| (name.clone(), value))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Positional(values) => values.is_empty(),
            Self::Named(values) => values.is_empty(),
        }
    }
}

impl Default for Params {
    fn default() -> Self {
        Self::Positional(Vec::new())
    }
}

impl From<Vec<Scalar>> for Params {
    fn from(values: Vec<Scalar>) -> Self {
        Self::Positional(values)
    }
}

impl<const N: usize> From<[Scalar; N]> for Params {
    fn from(values: [Scalar; N]) -> Self {
        Self::Positional(values.into())
    }
}

impl From<Vec<(String, Scalar)>> for Params {
    fn from(values: Vec<(String, Scalar)>) -> Self {
        Self::Named(values)
    }
}

/// Builds a [`Headers`] map from name/value pairs.
pub fn headers<I, K, V>(pairs: I) -> Headers
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Scalar>,
{
    pairs
        .into_iter()
        .map(|(name, value)| (name.into(), value.into()))
        .collect()
}
