//! Resource Keys
//!
//! A resource is addressed by a path plus an argument tuple. This module
//! canonicalizes both into a [`ResourceKey`] that can be hashed and compared
//! by value, so the same path and arguments always land on the same node.
//!
//! # Canonical Form
//!
//! - Integers are widened to `i64` whenever they fit, whatever their source
//!   type. `1u8`, `1i32` and `1u64` produce the same key.
//! - Floats are compared by bit pattern after folding `-0.0` into `0.0` and
//!   every NaN into one canonical NaN.
//! - Strings are shared (`Arc<str>`), so cloning a key never copies text.

use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::error::{ResourceError, Result};

/// A float stored by canonical bit pattern so that it can be hashed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FloatBits(u64);

impl FloatBits {
    pub fn new(value: f64) -> Self {
        let canonical = if value == 0.0 {
            0.0
        } else if value.is_nan() {
            f64::NAN
        } else {
            value
        };
        Self(canonical.to_bits())
    }

    pub fn get(self) -> f64 {
        f64::from_bits(self.0)
    }
}

impl fmt::Debug for FloatBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.get())
    }
}

/// A single canonical argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Arg {
    Bool(bool),
    Int(i64),
    /// Only used for values above `i64::MAX`.
    Uint(u64),
    Float(FloatBits),
    Str(Arc<str>),
    List(Vec<Arg>),
}

impl Arg {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Arg::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Arg::Int(v) => u64::try_from(*v).ok(),
            Arg::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Arg::Float(v) => Some(v.get()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Arg::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Arg::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Arg]> {
        match self {
            Arg::List(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Bool(v) => write!(f, "{v}"),
            Arg::Int(v) => write!(f, "{v}"),
            Arg::Uint(v) => write!(f, "{v}"),
            Arg::Float(v) => write!(f, "{:?}", v.get()),
            Arg::Str(v) => write!(f, "{v:?}"),
            Arg::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

macro_rules! arg_from_signed {
    ($($t:ty),*) => {
        $(impl From<$t> for Arg {
            fn from(value: $t) -> Self {
                Arg::Int(i64::from(value))
            }
        })*
    };
}

macro_rules! arg_from_unsigned {
    ($($t:ty),*) => {
        $(impl From<$t> for Arg {
            fn from(value: $t) -> Self {
                match i64::try_from(value) {
                    Ok(v) => Arg::Int(v),
                    Err(_) => Arg::Uint(value as u64),
                }
            }
        })*
    };
}

arg_from_signed!(i8, i16, i32, i64);
arg_from_unsigned!(u8, u16, u32, u64, usize);

impl From<isize> for Arg {
    fn from(value: isize) -> Self {
        Arg::Int(value as i64)
    }
}

impl From<bool> for Arg {
    fn from(value: bool) -> Self {
        Arg::Bool(value)
    }
}

impl From<f32> for Arg {
    fn from(value: f32) -> Self {
        Arg::Float(FloatBits::new(f64::from(value)))
    }
}

impl From<f64> for Arg {
    fn from(value: f64) -> Self {
        Arg::Float(FloatBits::new(value))
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Str(Arc::from(value))
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Arg::Str(Arc::from(value))
    }
}

impl From<Arc<str>> for Arg {
    fn from(value: Arc<str>) -> Self {
        Arg::Str(value)
    }
}

impl<T: Into<Arg>> From<Vec<T>> for Arg {
    fn from(values: Vec<T>) -> Self {
        Arg::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Arg>, const N: usize> From<[T; N]> for Arg {
    fn from(values: [T; N]) -> Self {
        Arg::List(values.into_iter().map(Into::into).collect())
    }
}

/// The argument tuple of a resource key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Args(SmallVec<[Arg; 3]>);

impl Args {
    pub fn new() -> Self {
        Self(SmallVec::new())
    }

    pub fn push(&mut self, arg: impl Into<Arg>) {
        self.0.push(arg.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arg> {
        self.0.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arg> {
        self.0.iter()
    }

    /// Integer argument at `index`.
    pub fn int(&self, index: usize) -> Result<i64> {
        self.typed(index, "integer", Arg::as_int)
    }

    /// Non-negative integer argument at `index`.
    pub fn uint(&self, index: usize) -> Result<u64> {
        self.typed(index, "unsigned integer", Arg::as_uint)
    }

    pub fn float(&self, index: usize) -> Result<f64> {
        self.typed(index, "float", Arg::as_float)
    }

    pub fn bool(&self, index: usize) -> Result<bool> {
        self.typed(index, "bool", Arg::as_bool)
    }

    pub fn str(&self, index: usize) -> Result<&str> {
        self.get(index)
            .and_then(Arg::as_str)
            .ok_or(ResourceError::BadArgument {
                index,
                expected: "string",
            })
    }

    fn typed<T>(
        &self,
        index: usize,
        expected: &'static str,
        extract: impl Fn(&Arg) -> Option<T>,
    ) -> Result<T> {
        self.get(index)
            .and_then(extract)
            .ok_or(ResourceError::BadArgument { index, expected })
    }
}

impl FromIterator<Arg> for Args {
    fn from_iter<I: IntoIterator<Item = Arg>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arg) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{arg}")?;
        }
        Ok(())
    }
}

/// Conversion into an argument tuple.
///
/// Implemented for `()`, single scalars, tuples of up to four values and
/// [`Args`] itself.
pub trait IntoArgs {
    fn into_args(self) -> Args;
}

impl IntoArgs for Args {
    fn into_args(self) -> Args {
        self
    }
}

impl IntoArgs for () {
    fn into_args(self) -> Args {
        Args::new()
    }
}

macro_rules! into_args_scalar {
    ($($t:ty),*) => {
        $(impl IntoArgs for $t {
            fn into_args(self) -> Args {
                let mut args = Args::new();
                args.push(self);
                args
            }
        })*
    };
}

into_args_scalar!(
    bool, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, &str, String,
    Arc<str>
);

macro_rules! into_args_tuple {
    ($($name:ident),+) => {
        impl<$($name: Into<Arg>),+> IntoArgs for ($($name,)+) {
            #[allow(non_snake_case)]
            fn into_args(self) -> Args {
                let ($($name,)+) = self;
                let mut args = Args::new();
                $(args.push($name);)+
                args
            }
        }
    };
}

into_args_tuple!(A);
into_args_tuple!(A, B);
into_args_tuple!(A, B, C);
into_args_tuple!(A, B, C, D);

/// Canonical identity of a resource: path plus arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    path: Arc<str>,
    args: Args,
}

impl ResourceKey {
    pub fn new(path: impl Into<Arc<str>>, args: impl IntoArgs) -> Self {
        Self {
            path: path.into(),
            args: args.into_args(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    #[cfg(test)]
    pub(crate) fn shared_path(&self) -> &Arc<str> {
        &self.path
    }

    pub fn args(&self) -> &Args {
        &self.args
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.args.is_empty() {
            f.write_str(&self.path)
        } else {
            write!(f, "{}({})", self.path, self.args)
        }
    }
}
