// symfact extractors
//
// tree-sitter based readers over PHP sources. `base` owns parsing and node
// classification; `php` turns declarations into names, constants and array
// facts.

pub mod base;
pub mod php;

pub use base::{PhpNodeKind, PhpSource, new_php_parser, php_language};
pub use php::constants::{ConstantReference, ConstantTable, StringConstantResolver};
pub use php::namespaces::{NameContext, NameSections};
pub use php::{ClassHandle, DeclaredClass, PhpIndex, declared_classes};
