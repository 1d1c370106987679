//! Name resolution and compile-time semantics: scoped symbol tables, the
//! namespace tree, constant evaluation, and overload resolution.

mod consteval;
mod namespace;
mod overload;
mod scope;

pub use consteval::{ConstEvalError, ConstEvaluator, ConstValue};
pub use namespace::{NamespaceRegistry, UsingDeclaration, UsingDirective};
pub use overload::{resolve_overload, ConversionRank, OverloadError};
pub use scope::{Scope, ScopeStack};
