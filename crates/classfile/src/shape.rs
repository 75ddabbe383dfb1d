//! The declared shape of a type as recovered from its class file: supertype,
//! interfaces, fields, constructors and methods with their generic types.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::class::{ACC_SYNTHETIC, ClassFile, MemberInfo};
use crate::descriptor::{FieldType, MethodDescriptor};
use crate::error::Result;
use crate::signature::{
    ClassSignature, GenericType, MethodSignature, TypeParameter, parse_field_signature,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldShape {
    pub name: String,
    pub access_flags: u16,
    pub ty: GenericType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodShape {
    pub name: String,
    pub access_flags: u16,
    pub type_parameters: Vec<TypeParameter>,
    pub parameters: Vec<GenericType>,
    pub return_type: Option<GenericType>,
    pub exceptions: Vec<GenericType>,
}

impl MethodShape {
    pub fn is_synthetic(&self) -> bool {
        self.access_flags & ACC_SYNTHETIC != 0
    }
}

impl FieldShape {
    pub fn is_synthetic(&self) -> bool {
        self.access_flags & ACC_SYNTHETIC != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeShape {
    /// Dotted binary name.
    pub name: String,
    pub access_flags: u16,
    pub type_parameters: Vec<TypeParameter>,
    pub superclass: Option<GenericType>,
    pub interfaces: Vec<GenericType>,
    pub fields: Vec<FieldShape>,
    pub constructors: Vec<MethodShape>,
    pub methods: Vec<MethodShape>,
}

impl TypeShape {
    /// Builds the shape of `class`. A member whose descriptor or signature
    /// cannot be decoded is logged and left out; header failures are errors.
    pub fn from_class_file(class: &ClassFile) -> Result<Self> {
        let name = class.binary_name()?;

        let (type_parameters, superclass, interfaces) = match class
            .signature
            .as_deref()
            .map(ClassSignature::parse)
        {
            Some(Ok(sig)) => (sig.type_parameters, Some(sig.superclass), sig.interfaces),
            other => {
                if let Some(Err(e)) = other {
                    debug!("Ignoring class signature of {}: {}", name, e);
                }
                (
                    Vec::new(),
                    class.super_class_name()?.map(GenericType::Class),
                    class
                        .interface_names()?
                        .into_iter()
                        .map(GenericType::Class)
                        .collect(),
                )
            }
        };

        let mut shape = Self {
            name,
            access_flags: class.access_flags,
            type_parameters,
            superclass,
            interfaces,
            fields: Vec::new(),
            constructors: Vec::new(),
            methods: Vec::new(),
        };

        for field in &class.fields {
            match field_shape(field) {
                Ok(f) => shape.fields.push(f),
                Err(e) => debug!("Skipping field {}.{}: {}", shape.name, field.name, e),
            }
        }
        for method in &class.methods {
            if method.is_static_initializer() {
                continue;
            }
            match method_shape(method) {
                Ok(m) if method.is_constructor() => shape.constructors.push(m),
                Ok(m) => shape.methods.push(m),
                Err(e) => debug!("Skipping method {}.{}: {}", shape.name, method.name, e),
            }
        }

        shape.resolve_type_variables();
        Ok(shape)
    }

    pub fn is_synthetic(&self) -> bool {
        self.access_flags & ACC_SYNTHETIC != 0
    }

    /// Anonymous classes are named `Outer$1`, `Outer$1$2` and so on.
    pub fn is_anonymous(&self) -> bool {
        is_anonymous_name(&self.name)
    }

    /// Attaches declared bounds to every type variable use. Method type
    /// parameters shadow class type parameters.
    fn resolve_type_variables(&mut self) {
        let class_params = self.type_parameters.clone();
        let scope = [class_params.as_slice()];

        for param in &mut self.type_parameters {
            for bound in &mut param.bounds {
                resolve(bound, &scope);
            }
        }
        if let Some(sup) = &mut self.superclass {
            resolve(sup, &scope);
        }
        for iface in &mut self.interfaces {
            resolve(iface, &scope);
        }
        for field in &mut self.fields {
            resolve(&mut field.ty, &scope);
        }
        for method in self.constructors.iter_mut().chain(self.methods.iter_mut()) {
            let own = method.type_parameters.clone();
            let scope = [own.as_slice(), class_params.as_slice()];
            for param in &mut method.type_parameters {
                for bound in &mut param.bounds {
                    resolve(bound, &scope);
                }
            }
            for ty in method
                .parameters
                .iter_mut()
                .chain(method.return_type.iter_mut())
                .chain(method.exceptions.iter_mut())
            {
                resolve(ty, &scope);
            }
        }
    }
}

/// True when the last `$` segment of a binary name starts with a digit.
pub fn is_anonymous_name(name: &str) -> bool {
    name.rsplit_once('$')
        .and_then(|(_, tail)| tail.chars().next())
        .is_some_and(|c| c.is_ascii_digit())
}

fn field_shape(field: &MemberInfo) -> Result<FieldShape> {
    let ty = match &field.signature {
        Some(sig) => parse_field_signature(sig)?,
        None => GenericType::from(&FieldType::parse(&field.descriptor)?),
    };
    Ok(FieldShape {
        name: field.name.clone(),
        access_flags: field.access_flags,
        ty,
    })
}

fn method_shape(method: &MemberInfo) -> Result<MethodShape> {
    let sig = match &method.signature {
        Some(sig) => MethodSignature::parse(sig)?,
        None => {
            let desc = MethodDescriptor::parse(&method.descriptor)?;
            MethodSignature {
                type_parameters: Vec::new(),
                parameters: desc.parameters.iter().map(GenericType::from).collect(),
                return_type: desc.return_type.as_ref().map(GenericType::from),
                throws: Vec::new(),
            }
        }
    };
    Ok(MethodShape {
        name: method.name.clone(),
        access_flags: method.access_flags,
        type_parameters: sig.type_parameters,
        parameters: sig.parameters,
        return_type: sig.return_type,
        exceptions: sig.throws,
    })
}

fn resolve(ty: &mut GenericType, scopes: &[&[TypeParameter]]) {
    resolve_with(ty, scopes, &mut Vec::new());
}

/// `visiting` holds the variables whose bounds are being resolved, so a
/// recursive bound such as `T extends Comparable<T>` ends at the inner `T`.
fn resolve_with(ty: &mut GenericType, scopes: &[&[TypeParameter]], visiting: &mut Vec<String>) {
    match ty {
        GenericType::TypeVariable { name, bounds } => {
            if !bounds.is_empty() || visiting.contains(name) {
                return;
            }
            let decl = scopes
                .iter()
                .flat_map(|s| s.iter())
                .find(|p| p.name == *name);
            if let Some(decl) = decl {
                let mut resolved = decl.bounds.clone();
                visiting.push(name.clone());
                for bound in &mut resolved {
                    resolve_with(bound, scopes, visiting);
                }
                visiting.pop();
                *bounds = resolved;
            }
        }
        GenericType::Parameterized {
            owner, arguments, ..
        } => {
            if let Some(owner) = owner {
                resolve_with(owner, scopes, visiting);
            }
            for arg in arguments {
                resolve_with(arg, scopes, visiting);
            }
        }
        GenericType::Wildcard { upper, lower } => {
            for b in upper.iter_mut().chain(lower.iter_mut()) {
                resolve_with(b, scopes, visiting);
            }
        }
        GenericType::Array(inner) => resolve_with(inner, scopes, visiting),
        GenericType::Primitive(_) | GenericType::Class(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_names() {
        assert!(is_anonymous_name("com.acme.Foo$1"));
        assert!(is_anonymous_name("com.acme.Foo$Bar$12"));
        assert!(!is_anonymous_name("com.acme.Foo$Bar"));
        assert!(!is_anonymous_name("com.acme.Foo"));
    }

    #[test]
    fn test_resolve_type_variable_bounds() {
        let params = vec![TypeParameter {
            name: "T".into(),
            bounds: vec![GenericType::Class("com.acme.Baz".into())],
        }];
        let mut ty = GenericType::Array(Box::new(GenericType::type_variable("T")));
        resolve(&mut ty, &[params.as_slice()]);
        assert_eq!(
            ty,
            GenericType::Array(Box::new(GenericType::TypeVariable {
                name: "T".into(),
                bounds: vec![GenericType::Class("com.acme.Baz".into())],
            }))
        );
    }

    #[test]
    fn test_bounds_resolve_through_other_variables() {
        // <T extends List<U>, U extends Baz, R extends Comparable<R>>
        let params = vec![
            TypeParameter {
                name: "T".into(),
                bounds: vec![GenericType::Parameterized {
                    raw: "java.util.List".into(),
                    owner: None,
                    arguments: vec![GenericType::type_variable("U")],
                }],
            },
            TypeParameter {
                name: "U".into(),
                bounds: vec![GenericType::Class("com.acme.Baz".into())],
            },
            TypeParameter {
                name: "R".into(),
                bounds: vec![GenericType::Parameterized {
                    raw: "java.lang.Comparable".into(),
                    owner: None,
                    arguments: vec![GenericType::type_variable("R")],
                }],
            },
        ];

        let mut t = GenericType::type_variable("T");
        resolve(&mut t, &[params.as_slice()]);
        let GenericType::TypeVariable { bounds, .. } = &t else {
            panic!("unexpected {t:?}");
        };
        let GenericType::Parameterized { arguments, .. } = &bounds[0] else {
            panic!("unexpected {:?}", bounds[0]);
        };
        assert_eq!(
            arguments[0],
            GenericType::TypeVariable {
                name: "U".into(),
                bounds: vec![GenericType::Class("com.acme.Baz".into())],
            }
        );

        let mut r = GenericType::type_variable("R");
        resolve(&mut r, &[params.as_slice()]);
        assert_eq!(
            r,
            GenericType::TypeVariable {
                name: "R".into(),
                bounds: vec![GenericType::Parameterized {
                    raw: "java.lang.Comparable".into(),
                    owner: None,
                    arguments: vec![GenericType::type_variable("R")],
                }],
            }
        );
    }
}
