use kiln_classfile::{ClassFile, TypeShape};

use crate::error::ApiResult;

/// Supplies the declared shape of a compiled type: supertype, interfaces,
/// fields, constructors and methods with their generic signatures.
pub trait TypeInfoProvider: Send + Sync {
    fn type_shape(&self, class: &ClassFile) -> ApiResult<TypeShape>;
}
