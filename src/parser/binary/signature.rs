//! Decoded signatures mapped onto [`TypeRef`].
//!
//! Blob decoding is dotscope's; this module only decides how each element
//! type is named.

use dotscope::metadata::signatures::{
    parse_field_signature, parse_local_var_signature, parse_method_signature,
    parse_method_spec_signature, parse_property_signature, parse_type_spec_signature,
    SignatureParameter, TypeSignature,
};
use dotscope::metadata::token::Token;

use super::MetadataError;
use crate::parser::TypeRef;

type Result<T> = std::result::Result<T, MetadataError>;

const MAX_DEPTH: usize = 64;

/// Turns type tokens found in signatures into references.
pub trait TokenResolver {
    /// Resolve a TypeDef, TypeRef or TypeSpec token.
    fn resolve_type(&self, token: Token, depth: usize) -> TypeRef;

    /// Module that defines the primitive types.
    fn core_library(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSig {
    pub has_this: bool,
    pub generic_count: u32,
    pub return_type: TypeRef,
    pub params: Vec<TypeRef>,
}

pub fn method_sig(blob: &[u8], resolver: &dyn TokenResolver) -> Result<MethodSig> {
    let sig = parse_method_signature(blob)?;
    Ok(MethodSig {
        has_this: sig.has_this,
        generic_count: sig.param_count_generic,
        return_type: parameter(&sig.return_type, resolver, 0)?,
        params: sig
            .params
            .iter()
            .map(|p| parameter(p, resolver, 0))
            .collect::<Result<_>>()?,
    })
}

pub fn field_sig(blob: &[u8], resolver: &dyn TokenResolver) -> Result<TypeRef> {
    let sig = parse_field_signature(blob)?;
    type_ref(&sig.base, resolver, 0)
}

/// Property type plus indexer parameters.
pub fn property_sig(blob: &[u8], resolver: &dyn TokenResolver) -> Result<(TypeRef, Vec<TypeRef>)> {
    let sig = parse_property_signature(blob)?;
    let params = sig
        .params
        .iter()
        .map(|p| parameter(p, resolver, 0))
        .collect::<Result<_>>()?;
    Ok((type_ref(&sig.base, resolver, 0)?, params))
}

pub fn local_sig(blob: &[u8], resolver: &dyn TokenResolver) -> Result<Vec<TypeRef>> {
    let sig = parse_local_var_signature(blob)?;
    sig.locals
        .iter()
        .map(|local| {
            let ty = type_ref(&local.base, resolver, 0)?;
            Ok(if local.is_byref {
                TypeRef::ByRef(Box::new(ty))
            } else {
                ty
            })
        })
        .collect()
}

/// Generic method instantiation.
pub fn method_spec(blob: &[u8], resolver: &dyn TokenResolver) -> Result<Vec<TypeRef>> {
    let sig = parse_method_spec_signature(blob)?;
    sig.generic_args
        .iter()
        .map(|arg| type_ref(arg, resolver, 0))
        .collect()
}

pub fn type_spec(blob: &[u8], resolver: &dyn TokenResolver, depth: usize) -> Result<TypeRef> {
    let sig = parse_type_spec_signature(blob)?;
    type_ref(&sig.base, resolver, depth)
}

/// True if the blob is a field signature (MemberRef disambiguation).
pub fn is_field_sig(blob: &[u8]) -> bool {
    blob.first().is_some_and(|b| b & 0x0F == 0x06)
}

fn parameter(param: &SignatureParameter, resolver: &dyn TokenResolver, depth: usize) -> Result<TypeRef> {
    let ty = type_ref(&param.base, resolver, depth)?;
    Ok(if param.by_ref {
        TypeRef::ByRef(Box::new(ty))
    } else {
        ty
    })
}

fn primitive(sig: &TypeSignature) -> Option<&'static str> {
    Some(match sig {
        TypeSignature::Void => "Void",
        TypeSignature::Boolean => "Boolean",
        TypeSignature::Char => "Char",
        TypeSignature::I1 => "SByte",
        TypeSignature::U1 => "Byte",
        TypeSignature::I2 => "Int16",
        TypeSignature::U2 => "UInt16",
        TypeSignature::I4 => "Int32",
        TypeSignature::U4 => "UInt32",
        TypeSignature::I8 => "Int64",
        TypeSignature::U8 => "UInt64",
        TypeSignature::R4 => "Single",
        TypeSignature::R8 => "Double",
        TypeSignature::String => "String",
        TypeSignature::TypedByRef => "TypedReference",
        TypeSignature::I | TypeSignature::FnPtr(_) => "IntPtr",
        TypeSignature::U => "UIntPtr",
        TypeSignature::Object => "Object",
        _ => return None,
    })
}

pub(crate) fn type_ref(sig: &TypeSignature, resolver: &dyn TokenResolver, depth: usize) -> Result<TypeRef> {
    if depth > MAX_DEPTH {
        return Err(MetadataError::BadSignature("signature nesting too deep"));
    }
    if let Some(name) = primitive(sig) {
        return Ok(TypeRef::named(
            Some(resolver.core_library().to_string()),
            "System",
            name,
        ));
    }
    let inner = |base: &TypeSignature| type_ref(base, resolver, depth + 1).map(Box::new);
    match sig {
        TypeSignature::Ptr(pointer) => Ok(TypeRef::Pointer(inner(&pointer.base)?)),
        TypeSignature::ByRef(base) => Ok(TypeRef::ByRef(inner(base)?)),
        TypeSignature::Class(token) | TypeSignature::ValueType(token) => {
            Ok(resolver.resolve_type(*token, depth + 1))
        }
        TypeSignature::GenericParamType(index) => Ok(TypeRef::GenericParam(format!("T{index}"))),
        TypeSignature::GenericParamMethod(index) => Ok(TypeRef::GenericParam(format!("M{index}"))),
        TypeSignature::SzArray(array) => Ok(TypeRef::Array(inner(&array.base)?)),
        TypeSignature::Array(array) => Ok(TypeRef::Array(inner(&array.base)?)),
        TypeSignature::GenericInst(base, args) => {
            let mut generic = type_ref(base, resolver, depth + 1)?;
            let args = args
                .iter()
                .map(|arg| type_ref(arg, resolver, depth + 1))
                .collect::<Result<Vec<_>>>()?;
            if let TypeRef::Named(named) = &mut generic {
                named.generic_args = args;
            }
            Ok(generic)
        }
        TypeSignature::Pinned(base) => type_ref(base, resolver, depth + 1),
        _ => Err(MetadataError::BadSignature("unsupported element type")),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use dotscope::metadata::signatures::{SignatureArray, SignatureSzArray};

    /// Resolves TypeDef tokens to `m.N.Def{row}` and TypeRef tokens to `Lib.N.Ref{row}`1`.
    pub(crate) struct FakeResolver;

    impl TokenResolver for FakeResolver {
        fn resolve_type(&self, token: Token, _depth: usize) -> TypeRef {
            match token.table() {
                0x02 => TypeRef::named(Some("m".into()), "N", &format!("Def{}", token.row())),
                0x01 => TypeRef::named(Some("Lib".into()), "N", &format!("Ref{}`1", token.row())),
                _ => TypeRef::named(None, "", "?"),
            }
        }

        fn core_library(&self) -> &str {
            "System.Runtime"
        }
    }

    fn display(sig: &TypeSignature) -> String {
        type_ref(sig, &FakeResolver, 0).unwrap().display()
    }

    #[test]
    fn test_method_sig_with_primitives_and_class() {
        // HASTHIS, 2 params, returns void, (int32, class TypeDef row 3)
        let blob = [0x20, 0x02, 0x01, 0x08, 0x12, 0x0C];
        let sig = method_sig(&blob, &FakeResolver).unwrap();
        assert!(sig.has_this);
        assert_eq!(sig.return_type.display(), "Void");
        let params: Vec<String> = sig.params.iter().map(TypeRef::display).collect();
        assert_eq!(params, vec!["Int32", "Def3"]);
    }

    #[test]
    fn test_generic_method_parameters() {
        // GENERIC, 1 generic param, 2 params, returns MVAR 0, (VAR 0, byref int32)
        let blob = [0x10, 0x01, 0x02, 0x1E, 0x00, 0x13, 0x00, 0x10, 0x08];
        let sig = method_sig(&blob, &FakeResolver).unwrap();
        assert_eq!(sig.generic_count, 1);
        assert_eq!(sig.return_type.display(), "M0");
        let params: Vec<String> = sig.params.iter().map(TypeRef::display).collect();
        assert_eq!(params, vec!["T0", "Int32&"]);
        assert!(matches!(sig.params[1], TypeRef::ByRef(_)));
    }

    #[test]
    fn test_generic_instance_keeps_arguments() {
        let list = TypeSignature::GenericInst(
            Box::new(TypeSignature::Class(Token::new(0x0100_0001))),
            vec![TypeSignature::String],
        );
        let ty = type_ref(&list, &FakeResolver, 0).unwrap();
        assert_eq!(ty.display(), "Ref1<String>");
        let named = ty.as_named().unwrap();
        assert_eq!(named.module.as_deref(), Some("Lib"));
        assert_eq!(named.generic_args.len(), 1);
    }

    #[test]
    fn test_arrays_pointers_and_primitives() {
        let sz = TypeSignature::SzArray(SignatureSzArray {
            modifiers: Vec::new(),
            base: Box::new(TypeSignature::I4),
        });
        assert_eq!(display(&sz), "Int32[]");
        let multi = TypeSignature::Array(SignatureArray {
            base: Box::new(TypeSignature::ValueType(Token::new(0x0200_0002))),
            rank: 2,
            dimensions: Vec::new(),
        });
        assert_eq!(display(&multi), "Def2[]");
        assert_eq!(display(&TypeSignature::U), "UIntPtr");
        assert_eq!(display(&TypeSignature::Object), "Object");
        assert!(type_ref(&TypeSignature::Sentinel, &FakeResolver, 0).is_err());
    }

    #[test]
    fn test_local_sig_skips_modifiers() {
        // LOCAL_SIG, 3 locals: pinned string, cmod_opt(TypeRef 1) int32, valuetype TypeDef 2
        let blob = [0x07, 0x03, 0x45, 0x0E, 0x20, 0x05, 0x08, 0x11, 0x08];
        let locals = local_sig(&blob, &FakeResolver).unwrap();
        let names: Vec<String> = locals.iter().map(TypeRef::display).collect();
        assert_eq!(names, vec!["String", "Int32", "Def2"]);
    }

    #[test]
    fn test_field_and_property_sigs() {
        assert_eq!(field_sig(&[0x06, 0x0E], &FakeResolver).unwrap().display(), "String");
        assert!(is_field_sig(&[0x06, 0x0E]));
        assert!(!is_field_sig(&[0x20, 0x00, 0x01]));
        let (ty, params) = property_sig(&[0x28, 0x01, 0x0E, 0x08], &FakeResolver).unwrap();
        assert_eq!(ty.display(), "String");
        assert_eq!(params.len(), 1);
        assert!(field_sig(&[0x20, 0x00], &FakeResolver).is_err());
    }

    #[test]
    fn test_method_spec() {
        let args = method_spec(&[0x0A, 0x02, 0x08, 0x12, 0x04], &FakeResolver).unwrap();
        let names: Vec<String> = args.iter().map(TypeRef::display).collect();
        assert_eq!(names, vec!["Int32", "Def1"]);
    }

    #[test]
    fn test_depth_limit() {
        let mut sig = TypeSignature::I4;
        for _ in 0..=MAX_DEPTH + 1 {
            sig = TypeSignature::ByRef(Box::new(sig));
        }
        assert!(type_ref(&sig, &FakeResolver, 0).is_err());
    }
}
