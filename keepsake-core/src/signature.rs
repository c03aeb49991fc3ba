//! Declared signatures, call binding, and cache key construction.
//!
//! A cached method declares its parameters once as a [`Signature`]. Each call
//! arrives as [`CallArgs`] (positional values plus named values) and is bound
//! against the signature with defaults applied. The resulting [`BoundArgs`]
//! produce a [`ParamKey`] that is identical for every call with the same
//! effective arguments, whichever mix of positional and keyword form was
//! used.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BindError, CacheResult, SignatureError};
use crate::value::{write_tuple, ArgValue, FromArgValue, KeyAtom};

// ============================================================================
// PARAMETERS
// ============================================================================

/// How a parameter may be supplied. Declaration order must follow the
/// ordering of the variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    /// Only by position.
    PositionalOnly,
    /// By position or by name.
    PositionalOrKeyword,
    /// Collects surplus positional arguments.
    VarPositional,
    /// Only by name.
    KeywordOnly,
    /// Collects surplus named arguments.
    VarKeyword,
}

impl ParamKind {
    pub fn is_variadic(self) -> bool {
        matches!(self, ParamKind::VarPositional | ParamKind::VarKeyword)
    }

    /// Parameters of this kind end up in the positional part of a key.
    fn is_positional(self) -> bool {
        matches!(
            self,
            ParamKind::PositionalOnly | ParamKind::PositionalOrKeyword | ParamKind::VarPositional
        )
    }
}

/// A declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    name: String,
    kind: ParamKind,
    default: Option<ArgValue>,
}

impl Param {
    pub fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
        }
    }

    /// A positional-or-keyword parameter.
    pub fn positional(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::PositionalOrKeyword)
    }

    pub fn positional_only(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::PositionalOnly)
    }

    pub fn keyword_only(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::KeywordOnly)
    }

    pub fn var_positional(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::VarPositional)
    }

    pub fn var_keyword(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::VarKeyword)
    }

    /// Set the default applied when the call omits this parameter.
    pub fn with_default(mut self, value: impl Into<ArgValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ParamKind {
        self.kind
    }

    pub fn default(&self) -> Option<&ArgValue> {
        self.default.as_ref()
    }
}

// ============================================================================
// SIGNATURE
// ============================================================================

/// The parameter list of a cached method, excluding the receiver.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signature {
    params: Vec<Param>,
}

impl Signature {
    /// A signature with no parameters besides the receiver.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Declare a signature, validating parameter names, order, and defaults.
    pub fn new(params: impl IntoIterator<Item = Param>) -> Result<Self, SignatureError> {
        let params: Vec<Param> = params.into_iter().collect();

        let mut top = ParamKind::PositionalOnly;
        let mut seen_default = false;
        for (i, param) in params.iter().enumerate() {
            if params[..i].iter().any(|p| p.name == param.name) {
                return Err(SignatureError::DuplicateParameter {
                    param: param.name.clone(),
                });
            }

            if param.kind < top {
                return Err(SignatureError::WrongOrder {
                    param: param.name.clone(),
                    reason: format!("{:?} parameter after {:?}", param.kind, top),
                });
            }
            if i > 0 && param.kind == top && param.kind.is_variadic() {
                return Err(SignatureError::WrongOrder {
                    param: param.name.clone(),
                    reason: format!("more than one {:?} parameter", param.kind),
                });
            }
            top = param.kind;

            if param.kind.is_variadic() && param.default.is_some() {
                return Err(SignatureError::VariadicDefault {
                    param: param.name.clone(),
                });
            }

            if matches!(
                param.kind,
                ParamKind::PositionalOnly | ParamKind::PositionalOrKeyword
            ) {
                if param.default.is_some() {
                    seen_default = true;
                } else if seen_default {
                    return Err(SignatureError::RequiredAfterDefault {
                        param: param.name.clone(),
                    });
                }
            }
        }

        Ok(Self { params })
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    fn has_var_keyword(&self) -> bool {
        self.params
            .last()
            .is_some_and(|p| p.kind == ParamKind::VarKeyword)
    }

    /// Bind a call to this signature and apply defaults.
    pub fn bind(&self, call: &CallArgs) -> Result<BoundArgs, BindError> {
        let mut keywords: Vec<(String, ArgValue)> = Vec::with_capacity(call.keywords.len());
        for (name, value) in &call.keywords {
            if keywords.iter().any(|(n, _)| n == name) {
                return Err(BindError::MultipleValues {
                    param: name.clone(),
                });
            }
            keywords.push((name.clone(), value.clone()));
        }

        let mut bound: Vec<BoundParam> = Vec::with_capacity(self.params.len());
        let mut positional = call.positional.iter();
        let mut consumed = 0usize;

        for param in &self.params {
            let value = match param.kind {
                ParamKind::PositionalOnly | ParamKind::PositionalOrKeyword => {
                    match positional.next() {
                        Some(value) => {
                            consumed += 1;
                            if param.kind == ParamKind::PositionalOrKeyword
                                && keywords.iter().any(|(n, _)| n == &param.name)
                            {
                                return Err(BindError::MultipleValues {
                                    param: param.name.clone(),
                                });
                            }
                            BoundValue::Single(value.clone())
                        }
                        None => self.bind_by_name(param, &mut keywords)?,
                    }
                }
                ParamKind::VarPositional => {
                    let rest: Vec<ArgValue> = positional.by_ref().cloned().collect();
                    consumed += rest.len();
                    BoundValue::Rest(rest)
                }
                ParamKind::KeywordOnly => self.bind_by_name(param, &mut keywords)?,
                // Filled once every named parameter has claimed its keyword.
                ParamKind::VarKeyword => BoundValue::Extra(Vec::new()),
            };
            bound.push(BoundParam {
                name: param.name.clone(),
                kind: param.kind,
                value,
            });
        }

        if consumed < call.positional.len() {
            return Err(BindError::TooManyPositional {
                expected: consumed,
                got: call.positional.len(),
            });
        }

        if !keywords.is_empty() {
            match bound.last_mut() {
                Some(BoundParam {
                    value: BoundValue::Extra(extra),
                    ..
                }) => extra.append(&mut keywords),
                _ => {
                    let (name, _) = &keywords[0];
                    return Err(BindError::UnexpectedKeyword { name: name.clone() });
                }
            }
        }

        Ok(BoundArgs { params: bound })
    }

    fn bind_by_name(
        &self,
        param: &Param,
        keywords: &mut Vec<(String, ArgValue)>,
    ) -> Result<BoundValue, BindError> {
        if let Some(pos) = keywords.iter().position(|(n, _)| n == &param.name) {
            if param.kind == ParamKind::PositionalOnly {
                // A trailing **kwargs absorbs the name instead.
                if !self.has_var_keyword() {
                    return Err(BindError::PositionalOnlyAsKeyword {
                        param: param.name.clone(),
                    });
                }
            } else {
                let (_, value) = keywords.remove(pos);
                return Ok(BoundValue::Single(value));
            }
        }

        match &param.default {
            Some(default) => Ok(BoundValue::Single(default.clone())),
            None => Err(BindError::MissingArgument {
                param: param.name.clone(),
            }),
        }
    }
}

// ============================================================================
// CALL ARGUMENTS
// ============================================================================

/// The arguments of a concrete call, in the form the caller wrote them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    positional: Vec<ArgValue>,
    keywords: Vec<(String, ArgValue)>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<ArgValue>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Append a keyword argument.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.keywords.push((name.into(), value.into()));
        self
    }

    /// Build a call from JSON.
    ///
    /// An array supplies positional arguments, an object supplies keyword
    /// arguments, and an object of the form `{"args": [...], "kwargs": {...}}`
    /// supplies both. `null` is an empty call; any other value is a single
    /// positional argument.
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::new(),
            serde_json::Value::Array(items) => Self {
                positional: items.into_iter().map(ArgValue::from).collect(),
                keywords: Vec::new(),
            },
            serde_json::Value::Object(mut entries) => {
                let split = entries.len() <= 2
                    && entries.keys().all(|k| k == "args" || k == "kwargs")
                    && entries.get("args").map_or(true, |v| v.is_array())
                    && entries.get("kwargs").map_or(true, |v| v.is_object());
                if split {
                    let mut call = match entries.remove("args") {
                        Some(args) => Self::from_json(args),
                        None => Self::new(),
                    };
                    if let Some(kwargs) = entries.remove("kwargs") {
                        call.keywords = Self::from_json(kwargs).keywords;
                    }
                    call
                } else {
                    Self {
                        positional: Vec::new(),
                        keywords: entries
                            .into_iter()
                            .map(|(k, v)| (k, ArgValue::from(v)))
                            .collect(),
                    }
                }
            }
            other => Self::new().arg(ArgValue::from(other)),
        }
    }

    pub fn positional(&self) -> &[ArgValue] {
        &self.positional
    }

    pub fn keywords(&self) -> &[(String, ArgValue)] {
        &self.keywords
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keywords.is_empty()
    }
}

// ============================================================================
// BOUND ARGUMENTS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum BoundValue {
    Single(ArgValue),
    Rest(Vec<ArgValue>),
    Extra(Vec<(String, ArgValue)>),
}

#[derive(Debug, Clone, PartialEq)]
struct BoundParam {
    name: String,
    kind: ParamKind,
    value: BoundValue,
}

/// A call bound to its signature, with every default applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundArgs {
    params: Vec<BoundParam>,
}

impl BoundArgs {
    /// Bound arguments of a call to an empty signature.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Value bound to a named parameter, or a surplus keyword of that name.
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        for param in &self.params {
            match &param.value {
                BoundValue::Single(value) if param.name == name => return Some(value),
                BoundValue::Extra(extra) => {
                    if let Some((_, value)) = extra.iter().find(|(n, _)| n == name) {
                        return Some(value);
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Typed value bound to a named parameter.
    pub fn arg<T: FromArgValue>(&self, name: &str) -> CacheResult<T> {
        let value = self.get(name).ok_or_else(|| BindError::UnknownParameter {
            param: name.to_string(),
        })?;
        Ok(T::extract(name, value)?)
    }

    /// Surplus positional arguments collected by a variadic parameter.
    pub fn rest(&self) -> &[ArgValue] {
        self.params
            .iter()
            .find_map(|p| match &p.value {
                BoundValue::Rest(rest) => Some(rest.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    /// Surplus keyword arguments collected by a variadic parameter.
    pub fn extra(&self) -> &[(String, ArgValue)] {
        self.params
            .iter()
            .find_map(|p| match &p.value {
                BoundValue::Extra(extra) => Some(extra.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    /// Arguments that are passed positionally, in declaration order.
    pub fn args(&self) -> Vec<&ArgValue> {
        let mut args = Vec::new();
        for param in self.params.iter().take_while(|p| p.kind.is_positional()) {
            match &param.value {
                BoundValue::Single(value) => args.push(value),
                BoundValue::Rest(rest) => args.extend(rest),
                BoundValue::Extra(_) => {}
            }
        }
        args
    }

    /// Arguments that are passed by name.
    pub fn kwargs(&self) -> Vec<(&str, &ArgValue)> {
        let mut kwargs = Vec::new();
        for param in self.params.iter().skip_while(|p| p.kind.is_positional()) {
            match &param.value {
                BoundValue::Single(value) => kwargs.push((param.name.as_str(), value)),
                BoundValue::Extra(extra) => {
                    kwargs.extend(extra.iter().map(|(n, v)| (n.as_str(), v)))
                }
                BoundValue::Rest(_) => {}
            }
        }
        kwargs
    }

    /// Build the cache key for this call.
    ///
    /// Fails with `CacheError::Unhashable` when any argument is a mutable
    /// container.
    pub fn param_key(&self) -> CacheResult<ParamKey> {
        let args = self
            .args()
            .into_iter()
            .map(ArgValue::to_key_atom)
            .collect::<CacheResult<Vec<_>>>()?;
        let mut kwargs = BTreeMap::new();
        for (name, value) in self.kwargs() {
            kwargs.insert(name.to_string(), value.to_key_atom()?);
        }
        Ok(ParamKey { args, kwargs })
    }
}

// ============================================================================
// PARAM KEY
// ============================================================================

/// Canonical key of a method call: positional part plus an unordered
/// keyword part.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamKey {
    args: Vec<KeyAtom>,
    kwargs: BTreeMap<String, KeyAtom>,
}

impl ParamKey {
    pub fn new<A, K, N>(args: A, kwargs: K) -> Self
    where
        A: IntoIterator<Item = KeyAtom>,
        K: IntoIterator<Item = (N, KeyAtom)>,
        N: Into<String>,
    {
        Self {
            args: args.into_iter().collect(),
            kwargs: kwargs.into_iter().map(|(n, v)| (n.into(), v)).collect(),
        }
    }

    /// Key with positional arguments only.
    pub fn positional<A, V>(args: A) -> Self
    where
        A: IntoIterator<Item = V>,
        V: Into<KeyAtom>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            kwargs: BTreeMap::new(),
        }
    }

    pub fn args(&self) -> &[KeyAtom] {
        &self.args
    }

    pub fn kwargs(&self) -> &BTreeMap<String, KeyAtom> {
        &self.kwargs
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        write_tuple(f, &self.args)?;
        write!(f, ", {{")?;
        for (i, (name, value)) in self.kwargs.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", name, value)?;
        }
        write!(f, "}})")
    }
}
