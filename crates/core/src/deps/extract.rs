//! Computes the external symbols a compiled class refers to.
//!
//! Two sources are combined: the constant pool (every class, field and
//! method the bytecode touches) and the declared type shape, whose generic
//! signatures mention types erasure keeps out of the pool.

use std::collections::BTreeSet;

use kiln_api::{ApiError, ApiResult, TypeInfoProvider};
use kiln_classfile::{
    ClassFile, Constant, FieldType, GenericType, MethodDescriptor, TypeShape, class::ACC_BRIDGE,
    internal_to_binary, is_anonymous_name, is_primitive_name,
};
use tracing::{debug, warn};

use super::symbol::{SymbolReference, is_in_root_family, root_class_name};

/// Type shapes straight from the class file being examined.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClassFileTypeInfo;

impl TypeInfoProvider for ClassFileTypeInfo {
    fn type_shape(&self, class: &ClassFile) -> ApiResult<TypeShape> {
        TypeShape::from_class_file(class).map_err(|e| ApiError::InvalidArgument(e.to_string()))
    }
}

pub struct ReferenceExtractor<'a> {
    types: &'a dyn TypeInfoProvider,
}

impl<'a> ReferenceExtractor<'a> {
    pub fn new(types: &'a dyn TypeInfoProvider) -> Self {
        Self { types }
    }

    /// References of a class file's bytes. Undecodable input has no
    /// discoverable references.
    pub fn extract_bytes(&self, bytes: &[u8]) -> BTreeSet<SymbolReference> {
        match ClassFile::parse(bytes) {
            Ok(class) => self.extract(&class),
            Err(e) => {
                warn!("Cannot read class file: {}", e);
                BTreeSet::new()
            }
        }
    }

    pub fn extract(&self, class: &ClassFile) -> BTreeSet<SymbolReference> {
        let this_name = match class.binary_name() {
            Ok(name) => name,
            Err(e) => {
                warn!("Class file has no readable name: {}", e);
                return BTreeSet::new();
            }
        };
        let mut collector = Collector {
            root: root_class_name(&this_name).to_string(),
            refs: BTreeSet::new(),
        };

        collector.add_pool_references(class);

        match self.types.type_shape(class) {
            Ok(shape) => collector.add_shape_references(&shape),
            Err(e) => debug!("No type shape for {}: {}", this_name, e),
        }

        collector.refs
    }
}

struct Collector {
    root: String,
    refs: BTreeSet<SymbolReference>,
}

impl Collector {
    fn is_excluded(&self, name: &str) -> bool {
        is_primitive_name(name)
            || is_in_root_family(name, &self.root)
            || is_anonymous_name(name)
            || is_synthetic_name(name)
    }

    fn add_pool_references(&mut self, class: &ClassFile) {
        let pool = &class.constant_pool;
        for (index, constant) in pool.iter() {
            match constant {
                Constant::Class { .. } => {
                    let Ok(internal) = pool.class_name(index) else {
                        continue;
                    };
                    if internal.starts_with('[') {
                        // Array classes are descriptors; keep the element class
                        match FieldType::parse(internal) {
                            Ok(ty) => {
                                if let Some(element) = ty.class_name() {
                                    self.add_class(element);
                                }
                            }
                            Err(e) => debug!("Skipping array class #{}: {}", index, e),
                        }
                    } else {
                        self.add_class(&internal_to_binary(internal));
                    }
                }
                Constant::Fieldref { .. }
                | Constant::Methodref { .. }
                | Constant::InterfaceMethodref { .. } => {
                    let member = match pool.member_ref(index) {
                        Ok(m) => m,
                        Err(e) => {
                            debug!("Skipping member reference #{}: {}", index, e);
                            continue;
                        }
                    };
                    // Members of array types (`clone` on `[I`) have no owning class
                    if member.class_name.starts_with('[') {
                        continue;
                    }
                    let owner = member.owner();
                    if self.is_excluded(&owner) {
                        continue;
                    }
                    if !member.is_method() {
                        self.refs.insert(SymbolReference::Field {
                            owner,
                            name: member.name.to_string(),
                        });
                        continue;
                    }
                    let parameters = match MethodDescriptor::parse(member.descriptor) {
                        Ok(desc) => desc.parameter_names(),
                        Err(e) => {
                            debug!("Skipping {}.{}: {}", owner, member.name, e);
                            continue;
                        }
                    };
                    let reference = if member.is_constructor() {
                        SymbolReference::Constructor { owner, parameters }
                    } else {
                        SymbolReference::Method {
                            owner,
                            name: member.name.to_string(),
                            parameters,
                        }
                    };
                    self.refs.insert(reference);
                }
                _ => {}
            }
        }
    }

    fn add_shape_references(&mut self, shape: &TypeShape) {
        for param in &shape.type_parameters {
            self.walk_all(&param.bounds);
        }
        if let Some(sup) = &shape.superclass {
            self.walk(sup);
        }
        self.walk_all(&shape.interfaces);

        for field in shape.fields.iter().filter(|f| !f.is_synthetic()) {
            self.walk(&field.ty);
        }
        let members = shape.constructors.iter().chain(shape.methods.iter());
        for method in members.filter(|m| !m.is_synthetic() && m.access_flags & ACC_BRIDGE == 0) {
            for param in &method.type_parameters {
                self.walk_all(&param.bounds);
            }
            self.walk_all(&method.parameters);
            if let Some(ret) = &method.return_type {
                self.walk(ret);
            }
            self.walk_all(&method.exceptions);
        }
    }

    fn walk_all(&mut self, types: &[GenericType]) {
        for ty in types {
            self.walk(ty);
        }
    }

    fn walk(&mut self, ty: &GenericType) {
        match ty {
            GenericType::Primitive(_) => {}
            GenericType::Class(name) => self.add_class(name),
            GenericType::Parameterized {
                raw,
                owner,
                arguments,
            } => {
                self.add_class(raw);
                if let Some(owner) = owner {
                    self.walk(owner);
                }
                self.walk_all(arguments);
            }
            GenericType::TypeVariable { bounds, .. } => self.walk_all(bounds),
            GenericType::Wildcard { upper, lower } => {
                self.walk_all(lower);
                self.walk_all(upper);
            }
            GenericType::Array(inner) => self.walk(inner),
        }
    }

    fn add_class(&mut self, name: &str) {
        if self.is_excluded(name) {
            return;
        }
        self.refs.insert(SymbolReference::class(name));
    }
}

/// Compiler-generated class names such as lambda proxies (`Foo$$Lambda`).
fn is_synthetic_name(name: &str) -> bool {
    name.contains("$$")
}
